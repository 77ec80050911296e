// src/pipeline/reminders.rs

//! Sign-up reminders for selected events.
//!
//! A reminder is due on the first day of the sign-up window. Where it ends up
//! is decided by a [`ReminderSink`]: the macOS Reminders app, a portable
//! `VTODO` file, or nowhere at all for a dry run.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use icalendar::{Calendar, Component, Property, Todo};

use crate::error::{AppError, Result};
use crate::models::{Config, EventRecord};
use crate::storage::EventStore;
use crate::utils::dates::format_date;
use crate::utils::log::{header, summary};

use super::calendar::{SkipReason, Skipped, stable_uid, write_file};

/// A reminder ready to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub title: String,
    pub due: NaiveDate,
    pub url: String,
    pub notes: String,
}

impl Reminder {
    fn from_record(record: &EventRecord) -> std::result::Result<Self, SkipReason> {
        let due = record.signup.start.ok_or(SkipReason::NoStartDate)?;
        Ok(Self {
            title: record.reminder_title(),
            due,
            url: record.detail_url.clone(),
            notes: build_notes(record),
        })
    }
}

/// Notes text: link, sign-up period and one line per date.
pub fn build_notes(record: &EventRecord) -> String {
    let mut lines = vec![
        record.detail_url.clone(),
        format!("Anmeldezeitraum: {}", record.signup.cell_text()),
    ];
    lines.extend(record.occurrences.iter().map(|o| format!("Datum: {}", o.format())));
    lines.join("\n")
}

/// Reminders for the selected records with a sign-up start date.
pub fn collect_reminders(records: &[EventRecord]) -> (Vec<Reminder>, Vec<Skipped>) {
    let mut reminders = Vec::new();
    let mut skipped = Vec::new();

    for record in records.iter().filter(|r| r.selected) {
        match Reminder::from_record(record) {
            Ok(reminder) => reminders.push(reminder),
            Err(reason) => skipped.push(Skipped {
                name: record.name.clone(),
                reason,
            }),
        }
    }
    (reminders, skipped)
}

/// Destination for reminders.
#[async_trait]
pub trait ReminderSink: Send {
    async fn create(&mut self, reminder: &Reminder) -> Result<()>;

    /// Called once after the last reminder.
    async fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Logs every reminder and creates nothing.
#[derive(Debug, Default)]
pub struct DryRun {
    pub seen: Vec<Reminder>,
}

#[async_trait]
impl ReminderSink for DryRun {
    async fn create(&mut self, reminder: &Reminder) -> Result<()> {
        log::info!("[DRY RUN] {}", reminder.title);
        log::info!("    Due   : {}", format_date(reminder.due));
        log::info!("    URL   : {}", reminder.url);
        for line in reminder.notes.lines() {
            log::info!("    Notes : {line}");
        }
        self.seen.push(reminder.clone());
        Ok(())
    }
}

/// Creates reminders in a list of the macOS Reminders app via `osascript`.
#[derive(Debug, Clone)]
pub struct AppleReminders {
    list: String,
}

impl AppleReminders {
    pub fn new(list: impl Into<String>) -> Self {
        Self { list: list.into() }
    }

    fn script(&self, reminder: &Reminder) -> String {
        let list = applescript_string(&self.list);
        format!(
            r#"set dueDate to current date
set day of dueDate to 1
set year of dueDate to {year}
set month of dueDate to {month}
set day of dueDate to {day}
set time of dueDate to 9 * hours
tell application "Reminders"
    if not (exists list {list}) then make new list with properties {{name:{list}}}
    tell list {list}
        make new reminder with properties {{name:{name}, body:{body}, due date:dueDate}}
    end tell
end tell"#,
            year = reminder.due.year(),
            month = reminder.due.month(),
            day = reminder.due.day(),
            name = applescript_string(&reminder.title),
            body = applescript_string(&reminder.notes),
        )
    }
}

#[async_trait]
impl ReminderSink for AppleReminders {
    async fn create(&mut self, reminder: &Reminder) -> Result<()> {
        let output = tokio::process::Command::new("osascript")
            .arg("-e")
            .arg(self.script(reminder))
            .output()
            .await
            .map_err(|e| AppError::reminder(format!("cannot run osascript: {e}")))?;

        if !output.status.success() {
            return Err(AppError::reminder(format!(
                "osascript failed for '{}': {}",
                reminder.title,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        log::info!("Created reminder '{}'", reminder.title);
        Ok(())
    }
}

/// Quoted AppleScript string literal.
fn applescript_string(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Collects reminders as `VTODO`s and writes them to one `.ics` file.
pub struct TodoFile {
    path: PathBuf,
    list: String,
    todos: Vec<Todo>,
}

impl TodoFile {
    pub fn new(path: impl Into<PathBuf>, list: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            list: list.into(),
            todos: Vec::new(),
        }
    }
}

#[async_trait]
impl ReminderSink for TodoFile {
    async fn create(&mut self, reminder: &Reminder) -> Result<()> {
        let mut todo = Todo::new();
        todo.uid(&stable_uid(&[&reminder.title, &reminder.due.to_string()]));
        todo.summary(&reminder.title);
        todo.description(&reminder.notes);
        todo.timestamp(Utc::now());
        let mut due = Property::new("DUE", reminder.due.format("%Y%m%d").to_string());
        due.add_parameter("VALUE", "DATE");
        todo.append_property(due);
        todo.add_property("URL", &reminder.url);
        todo.add_property("CATEGORIES", &self.list);
        self.todos.push(todo);
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        if self.todos.is_empty() {
            return Ok(());
        }
        let mut calendar = Calendar::new();
        for todo in self.todos.drain(..) {
            calendar.push(todo);
        }
        write_file(&self.path, &calendar.to_string()).await?;
        log::info!("Reminders written to {}", self.path.display());
        Ok(())
    }
}

/// Create reminders for the selected events in the sheet.
///
/// Returns the number of reminders handed to the sink.
pub async fn run_reminders(
    config: &Config,
    store: &dyn EventStore,
    sink: &mut dyn ReminderSink,
) -> Result<usize> {
    header("Familienpass Reminders");
    log::info!("Reminder list: {}", config.output.reminder_list);

    let records = store.load().await?;
    let (reminders, skipped) = collect_reminders(&records);
    for skip in &skipped {
        log::warn!("Skipping '{}': {}", skip.name, skip.reason);
    }

    for reminder in &reminders {
        sink.create(reminder).await?;
    }
    sink.finish().await?;

    summary(
        "Reminders",
        &[
            ("Selected", records.iter().filter(|r| r.selected).count().to_string()),
            ("Reminders", reminders.len().to_string()),
            ("Skipped", skipped.len().to_string()),
        ],
    );
    Ok(reminders.len())
}
