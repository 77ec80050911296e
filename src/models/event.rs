//! Event data structures.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::SignupPeriod;
use crate::utils::dates::format_date;

/// An event as listed on a listing page, before its detail page is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventStub {
    /// Link text on the listing page
    pub name: String,

    /// Absolute URL of the detail page
    pub detail_url: String,

    /// Date column of the listing row (may be empty)
    pub listing_date: String,
}

/// One date an event takes place on.
///
/// Ordering is by date, then time text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Occurrence {
    pub date: NaiveDate,
    pub time: String,
}

impl Occurrence {
    pub fn new(date: NaiveDate, time: impl Into<String>) -> Self {
        Self {
            date,
            time: time.into(),
        }
    }

    /// Format the occurrence as "dd.mm.yyyy, time".
    pub fn format(&self) -> String {
        if self.time.is_empty() {
            format_date(self.date)
        } else {
            format!("{}, {}", format_date(self.date), self.time)
        }
    }
}

/// A fully extracted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Event title
    pub name: String,

    /// Absolute detail page URL; identity key across runs
    pub detail_url: String,

    /// Main description paragraph
    pub description: String,

    /// Age requirement (empty when none is stated)
    pub age_requirement: String,

    /// Meeting point
    pub location: String,

    /// Dates in document order until grouped, then ascending
    pub occurrences: Vec<Occurrence>,

    /// Sign-up period
    pub signup: SignupPeriod,

    /// User selection carried over from the exported sheet
    pub selected: bool,
}

impl EventRecord {
    /// A record with only name and URL set.
    pub fn new(name: impl Into<String>, detail_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            detail_url: detail_url.into(),
            description: String::new(),
            age_requirement: String::new(),
            location: String::new(),
            occurrences: Vec::new(),
            signup: SignupPeriod::default(),
            selected: false,
        }
    }

    /// Stable identity used to carry selections between runs.
    pub fn key(&self) -> &str {
        &self.detail_url
    }

    /// Identity used when collapsing multi-date duplicates.
    pub fn group_key(&self) -> (&str, &str) {
        (&self.name, &self.detail_url)
    }

    /// Title used for sign-up calendar entries.
    pub fn calendar_title(&self) -> String {
        format!("Anmeldung {}", self.name)
    }

    /// Title used for sign-up reminders.
    pub fn reminder_title(&self) -> String {
        format!("Anmeldung Familienpass: {}", self.name)
    }

    /// Format the record for display using a template.
    ///
    /// Supported placeholders:
    /// - `{name}`, `{url}`, `{age}`, `{location}`, `{signup}`
    /// - `{dates}` (all occurrences joined with "; ")
    pub fn format(&self, template: &str) -> String {
        let dates = self
            .occurrences
            .iter()
            .map(Occurrence::format)
            .collect::<Vec<_>>()
            .join("; ");
        template
            .replace("{name}", &self.name)
            .replace("{url}", &self.detail_url)
            .replace("{age}", &self.age_requirement)
            .replace("{location}", &self.location)
            .replace("{signup}", &self.signup.cell_text())
            .replace("{dates}", &dates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> EventRecord {
        let mut record = EventRecord::new("Kinderzirkus", "https://example.com/e/1");
        record.location = "Olympiapark".to_string();
        record.occurrences = vec![
            Occurrence::new(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(), "10:00 Uhr"),
            Occurrence::new(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(), ""),
        ];
        record
    }

    #[test]
    fn test_format() {
        let record = sample_record();
        assert_eq!(
            record.format("{name} @ {location}: {dates}"),
            "Kinderzirkus @ Olympiapark: 02.03.2024, 10:00 Uhr; 09.03.2024"
        );
    }

    #[test]
    fn test_titles() {
        let record = sample_record();
        assert_eq!(record.calendar_title(), "Anmeldung Kinderzirkus");
        assert_eq!(
            record.reminder_title(),
            "Anmeldung Familienpass: Kinderzirkus"
        );
    }

    #[test]
    fn test_occurrence_ordering() {
        let early = Occurrence::new(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(), "14:00");
        let later_time = Occurrence::new(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(), "16:00");
        let later_date = Occurrence::new(NaiveDate::from_ymd_opt(2024, 3, 3).unwrap(), "09:00");
        assert!(early < later_time);
        assert!(later_time < later_date);
    }
}
