//! Familienpass Scraper CLI
//!
//! Local execution entry point.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use familienpass::{
    error::Result,
    models::Config,
    pipeline::{self, AppleReminders, DryRun, ReminderSink, TodoFile},
    services::Fetcher,
    storage::CsvSheet,
    utils::http::HttpTransport,
};

/// Familienpass - Munich family pass event scraper
#[derive(Parser, Debug)]
#[command(
    name = "familienpass",
    version,
    about = "Scrapes Familienpass events and turns selected ones into sign-up calendars and reminders"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "familienpass.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scrape all events into the sheet, keeping existing selections
    Scrape,

    /// Build an .ics calendar of sign-up windows for selected events
    #[command(alias = "build-calendar")]
    Calendar,

    /// Create sign-up reminders for selected events
    #[command(alias = "build-reminders")]
    Reminders {
        /// Show what would be created without creating anything
        #[arg(long)]
        dry_run: bool,

        /// Write reminders as VTODOs to this file instead of the Reminders app
        #[arg(long, value_name = "PATH")]
        ics: Option<PathBuf>,
    },

    /// Validate the configuration
    Validate {
        /// Print the effective configuration as TOML
        #[arg(long)]
        show: bool,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = if cli.config.exists() {
        log::info!("Loaded configuration from {}", cli.config.display());
        Config::load(&cli.config)?
    } else {
        Config::load_or_default(&cli.config)
    };
    let sheet = CsvSheet::new(&config.output.sheet_path);

    match cli.command {
        Command::Scrape => {
            config.validate()?;
            let transport = HttpTransport::from_config(&config.crawler)?;
            let fetcher = Fetcher::from_config(transport, &config.crawler);
            pipeline::run_scrape(&config, fetcher, &sheet).await?;
        }

        Command::Calendar => {
            pipeline::run_calendar(&config, &sheet).await?;
        }

        Command::Reminders { dry_run, ics } => {
            let mut sink: Box<dyn ReminderSink> = match (dry_run, ics) {
                (true, _) => Box::new(DryRun::default()),
                (false, Some(path)) => Box::new(TodoFile::new(path, &config.output.reminder_list)),
                (false, None) => Box::new(AppleReminders::new(&config.output.reminder_list)),
            };
            pipeline::run_reminders(&config, &sheet, sink.as_mut()).await?;
        }

        Command::Validate { show } => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            if show {
                println!("{}", config.to_toml()?);
            }
            log::info!("✓ Config OK (site, crawler and output settings)");
        }
    }

    log::info!("Done!");

    Ok(())
}
