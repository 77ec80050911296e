//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Target site layout and pagination
    #[serde(default)]
    pub site: SiteConfig,

    /// HTTP, retry and politeness settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Output file locations
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("cannot read {}: {e}", path.display())))?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Serialize the configuration back to TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.site.base_url)
            .map_err(|e| AppError::validation(format!("site.base_url is invalid: {e}")))?;
        if self.site.total_pages == 0 {
            return Err(AppError::validation("site.total_pages must be > 0"));
        }
        if self.site.page_param.trim().is_empty() {
            return Err(AppError::validation("site.page_param is empty"));
        }
        for selector in self.site.selectors() {
            Selector::parse(selector).map_err(|e| AppError::selector(selector, format!("{e:?}")))?;
        }
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.request_timeout_secs == 0 {
            return Err(AppError::validation(
                "crawler.request_timeout_secs must be > 0",
            ));
        }
        if self.output.sheet_path.as_os_str().is_empty() {
            return Err(AppError::validation("output.sheet_path is empty"));
        }
        if self.output.reminder_list.trim().is_empty() {
            return Err(AppError::validation("output.reminder_list is empty"));
        }
        Ok(())
    }
}

/// Where the event listing lives and how its markup is laid out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// First listing page; later pages append the page parameter
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Number of listing pages to walk
    #[serde(default = "defaults::total_pages")]
    pub total_pages: u32,

    /// Query parameter carrying the page number
    #[serde(default = "defaults::page_param")]
    pub page_param: String,

    /// CSS selector for one event block on a listing page
    #[serde(default = "defaults::row_selector")]
    pub row_selector: String,

    /// CSS selector (inside a block) for the listing date
    #[serde(default = "defaults::listing_date_selector")]
    pub listing_date_selector: String,

    /// CSS selector (inside a block) for the detail link
    #[serde(default = "defaults::listing_link_selector")]
    pub listing_link_selector: String,

    /// CSS selector for the event title on a detail page
    #[serde(default = "defaults::title_selector")]
    pub title_selector: String,

    /// CSS selector for labeled field headings on a detail page
    #[serde(default = "defaults::field_header_selector")]
    pub field_header_selector: String,
}

impl SiteConfig {
    /// URL of a 1-based listing page.
    pub fn page_url(&self, page: u32) -> Result<String> {
        let mut url = url::Url::parse(&self.base_url)?;
        if page > 1 {
            url.query_pairs_mut()
                .append_pair(&self.page_param, &page.to_string());
        }
        Ok(url.to_string())
    }

    fn selectors(&self) -> [&str; 5] {
        [
            &self.row_selector,
            &self.listing_date_selector,
            &self.listing_link_selector,
            &self.title_selector,
            &self.field_header_selector,
        ]
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            total_pages: defaults::total_pages(),
            page_param: defaults::page_param(),
            row_selector: defaults::row_selector(),
            listing_date_selector: defaults::listing_date_selector(),
            listing_link_selector: defaults::listing_link_selector(),
            title_selector: defaults::title_selector(),
            field_header_selector: defaults::field_header_selector(),
        }
    }
}

/// HTTP client, retry and politeness settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::request_timeout")]
    pub request_timeout_secs: u64,

    /// Retries after the first failed attempt
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// First backoff interval; doubles on every retry
    #[serde(default = "defaults::initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Pause before each listing page request
    #[serde(default = "defaults::delay_between_pages")]
    pub delay_between_pages_ms: u64,

    /// Pause before each detail page request
    #[serde(default = "defaults::delay_between_events")]
    pub delay_between_events_ms: u64,
}

impl CrawlerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            request_timeout_secs: defaults::request_timeout(),
            max_retries: defaults::max_retries(),
            initial_backoff_ms: defaults::initial_backoff(),
            delay_between_pages_ms: defaults::delay_between_pages(),
            delay_between_events_ms: defaults::delay_between_events(),
        }
    }
}

/// Output file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Exported event sheet; also the prior state for the next scrape
    #[serde(default = "defaults::sheet_path")]
    pub sheet_path: PathBuf,

    /// Generated sign-up calendar
    #[serde(default = "defaults::calendar_path")]
    pub calendar_path: PathBuf,

    /// Reminder list that receives sign-up reminders
    #[serde(default = "defaults::reminder_list")]
    pub reminder_list: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sheet_path: defaults::sheet_path(),
            calendar_path: defaults::calendar_path(),
            reminder_list: defaults::reminder_list(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Site defaults
    pub fn base_url() -> String {
        "https://veranstaltungen.muenchen.de/ferienangebote-familienpass/familienpassangebote/"
            .into()
    }
    pub fn total_pages() -> u32 {
        4
    }
    pub fn page_param() -> String {
        "pno".into()
    }
    pub fn row_selector() -> String {
        "table.events-table tr".into()
    }
    pub fn listing_date_selector() -> String {
        "td:nth-child(1)".into()
    }
    pub fn listing_link_selector() -> String {
        "td:nth-child(2) a[href]".into()
    }
    pub fn title_selector() -> String {
        "h2".into()
    }
    pub fn field_header_selector() -> String {
        "h3".into()
    }

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; FamilienpassScraper/1.0; Educational Purpose)".into()
    }
    pub fn request_timeout() -> u64 {
        10
    }
    pub fn max_retries() -> u32 {
        3
    }
    pub fn initial_backoff() -> u64 {
        2000
    }
    pub fn delay_between_pages() -> u64 {
        1000
    }
    pub fn delay_between_events() -> u64 {
        500
    }

    // Output defaults
    pub fn sheet_path() -> PathBuf {
        PathBuf::from("output/familienpass_events.csv")
    }
    pub fn calendar_path() -> PathBuf {
        PathBuf::from("output/familienpass_calendar.ics")
    }
    pub fn reminder_list() -> String {
        "Familienpass".into()
    }
}
