// src/pipeline/calendar.rs

//! Sign-up calendar export.
//!
//! Every selected event with a known sign-up window becomes one all-day
//! entry spanning the window, with an alarm when the window opens.

use std::fmt;
use std::path::Path;

use chrono::{Days, NaiveDate, Utc};
use icalendar::{Calendar, Component, Event, Property};
use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};
use crate::models::{Config, EventRecord, SignupKind};
use crate::storage::EventStore;
use crate::utils::log::{header, sub_item, summary};

/// Suffix of every generated UID.
pub const UID_DOMAIN: &str = "familienpass";

const ALARM: &str = "BEGIN:VALARM\r\n\
                     ACTION:DISPLAY\r\n\
                     DESCRIPTION:Anmeldung startet\r\n\
                     TRIGGER;RELATED=START:PT0S\r\n\
                     END:VALARM\r\n";

/// Why a selected event produced no calendar entry or reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Registration happens directly with the organizer
    DirectSignup,
    /// No sign-up window is known
    NoSignupWindow,
    /// No sign-up start date is known
    NoStartDate,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::DirectSignup => "sign-up is directly with the organizer",
            Self::NoSignupWindow => "no sign-up window",
            Self::NoStartDate => "no resolvable sign-up start date",
        };
        f.write_str(text)
    }
}

/// A selected event that was not exported, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub name: String,
    pub reason: SkipReason,
}

/// One all-day calendar entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEntry {
    pub uid: String,
    pub title: String,
    /// First day of the window
    pub start: NaiveDate,
    /// Last day of the window, inclusive
    pub end: NaiveDate,
    pub url: String,
    pub description: String,
}

impl CalendarEntry {
    fn from_record(record: &EventRecord) -> std::result::Result<Self, SkipReason> {
        let signup = &record.signup;
        let (start, end) = match (signup.kind, signup.start, signup.end) {
            (SignupKind::WindowDates, Some(start), Some(end)) => (start, end),
            (SignupKind::DirectWithOrganizer, ..) => return Err(SkipReason::DirectSignup),
            _ => return Err(SkipReason::NoSignupWindow),
        };

        Ok(Self {
            uid: stable_uid(&[
                &record.name,
                &start.to_string(),
                &end.to_string(),
            ]),
            title: record.calendar_title(),
            start,
            end,
            url: record.detail_url.clone(),
            description: format!(
                "{}\nAnmeldezeitraum: {}",
                record.detail_url,
                signup.cell_text()
            ),
        })
    }
}

/// Deterministic UID from the given parts.
pub fn stable_uid(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    format!("{}@{UID_DOMAIN}", hex::encode(hasher.finalize()))
}

/// Calendar entries for the selected records with a sign-up window.
///
/// Unselected records are ignored; selected records without a window are
/// reported as skipped.
pub fn build_calendar(records: &[EventRecord]) -> (Vec<CalendarEntry>, Vec<Skipped>) {
    let mut entries = Vec::new();
    let mut skipped = Vec::new();

    for record in records.iter().filter(|r| r.selected) {
        match CalendarEntry::from_record(record) {
            Ok(entry) => entries.push(entry),
            Err(reason) => skipped.push(Skipped {
                name: record.name.clone(),
                reason,
            }),
        }
    }
    (entries, skipped)
}

/// Render entries as an iCalendar document.
pub fn to_ics(entries: &[CalendarEntry]) -> String {
    let mut calendar = Calendar::new();
    for entry in entries {
        let mut event = Event::new();
        event.uid(&entry.uid);
        event.summary(&entry.title);
        event.description(&entry.description);
        event.timestamp(Utc::now());
        event.append_property(date_property("DTSTART", entry.start));
        event.append_property(date_property("DTEND", entry.end + Days::new(1)));
        event.add_property("URL", &entry.url);
        event.add_property("TRANSP", "TRANSPARENT");
        calendar.push(event);
    }

    // Alarms are injected as raw components
    calendar
        .to_string()
        .replace("END:VEVENT", &format!("{ALARM}END:VEVENT"))
}

fn date_property(key: &str, date: NaiveDate) -> Property {
    let mut property = Property::new(key, date.format("%Y%m%d").to_string());
    property.add_parameter("VALUE", "DATE");
    property
}

/// Build the sign-up calendar from the sheet.
///
/// Returns the number of entries written; no file is written when there are
/// none.
pub async fn run_calendar(config: &Config, store: &dyn EventStore) -> Result<usize> {
    header("Familienpass Calendar");

    let records = store.load().await?;
    let (entries, skipped) = build_calendar(&records);
    for skip in &skipped {
        log::warn!("Skipping '{}': {}", skip.name, skip.reason);
    }

    let path = &config.output.calendar_path;
    if entries.is_empty() {
        log::warn!("No selected events with a sign-up window, nothing written");
    } else {
        write_file(path, &to_ics(&entries)).await?;
        for entry in &entries {
            sub_item(&format!("{} ({} - {})", entry.title, entry.start, entry.end));
        }
    }

    summary(
        "Calendar",
        &[
            ("Selected", records.iter().filter(|r| r.selected).count().to_string()),
            ("Entries", entries.len().to_string()),
            ("Skipped", skipped.len().to_string()),
            ("File", path.display().to_string()),
        ],
    );
    Ok(entries.len())
}

pub(crate) async fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| AppError::calendar(format!("cannot write {}: {e}", path.display())))
}
