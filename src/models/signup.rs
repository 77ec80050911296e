//! Sign-up period of an event.

use std::fmt;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils::dates::{find_dates, format_date};
use crate::utils::clean_text;

/// Canonical text for events that are booked with the organizer.
pub const DIRECT_SIGNUP_TEXT: &str = "Die Anmeldung erfolgt direkt beim Veranstalter.";

/// Cell text for an event without any sign-up information.
pub const UNSPECIFIED_SIGNUP_TEXT: &str = "Not specified";

static RE_DIRECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)direkt\s+beim\s+veranstalter").expect("invalid regex: direct sign-up")
});

static RE_LOTTERY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)verlosungszeitraum").expect("invalid regex: lottery"));

static RE_RANGE_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:bis|-|–|—)\s*$").expect("invalid regex: range"));

/// How an event is signed up for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignupKind {
    /// A lottery/registration window with known bounds
    WindowDates,
    /// Registration happens directly with the organizer
    DirectWithOrganizer,
    /// No recognizable sign-up information
    Unspecified,
}

/// The sign-up period as extracted from the event page.
///
/// `WindowDates` always carries `start <= end`; the other kinds carry no dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupPeriod {
    pub kind: SignupKind,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub raw_text: String,
}

/// A sign-up text that names a window which cannot exist.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("sign-up window ends before it starts: {start} > {end}")]
pub struct InvertedWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl SignupPeriod {
    /// A window from `start` to `end` inclusive.
    pub fn window(start: NaiveDate, end: NaiveDate) -> Result<Self, InvertedWindow> {
        if start > end {
            return Err(InvertedWindow { start, end });
        }
        Ok(Self {
            kind: SignupKind::WindowDates,
            start: Some(start),
            end: Some(end),
            raw_text: format!("{} - {}", format_date(start), format_date(end)),
        })
    }

    pub fn direct() -> Self {
        Self {
            kind: SignupKind::DirectWithOrganizer,
            start: None,
            end: None,
            raw_text: DIRECT_SIGNUP_TEXT.to_string(),
        }
    }

    pub fn unspecified(raw_text: impl Into<String>) -> Self {
        Self {
            kind: SignupKind::Unspecified,
            start: None,
            end: None,
            raw_text: raw_text.into(),
        }
    }

    /// Classify free sign-up text.
    ///
    /// Recognizes `<date> bis <date>` (also `-`, `–`, `—`) as a window, a lone
    /// date as a one-day window when the text names a "Verlosungszeitraum",
    /// and "direkt beim Veranstalter" as direct registration. Anything else
    /// is `Unspecified` with the text preserved.
    pub fn from_text(text: &str) -> Result<Self, InvertedWindow> {
        let text = clean_text(text);
        if text.is_empty() || text == UNSPECIFIED_SIGNUP_TEXT {
            return Ok(Self::unspecified(""));
        }

        let dates: Vec<_> = find_dates(&text)
            .into_iter()
            .filter_map(|t| t.date.map(|d| (t.span, d)))
            .collect();

        if let [(first_span, start), (second_span, end), ..] = dates.as_slice() {
            let between = &text[first_span.end..second_span.start];
            if RE_RANGE_SEPARATOR.is_match(between) {
                return Self::window(*start, *end);
            }
        }

        if RE_DIRECT.is_match(&text) {
            return Ok(Self::direct());
        }

        if let [(_, date)] = dates.as_slice() {
            if RE_LOTTERY.is_match(&text) {
                return Self::window(*date, *date);
            }
        }

        Ok(Self::unspecified(text))
    }

    /// Text written to the sheet's sign-up column.
    pub fn cell_text(&self) -> String {
        match self.kind {
            SignupKind::WindowDates => self.raw_text.clone(),
            SignupKind::DirectWithOrganizer => DIRECT_SIGNUP_TEXT.to_string(),
            SignupKind::Unspecified if self.raw_text.is_empty() => {
                UNSPECIFIED_SIGNUP_TEXT.to_string()
            }
            SignupKind::Unspecified => self.raw_text.clone(),
        }
    }
}

impl Default for SignupPeriod {
    fn default() -> Self {
        Self::unspecified("")
    }
}

impl fmt::Display for SignupPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cell_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_window_with_bis() {
        let period = SignupPeriod::from_text("01.03.2024 bis 15.03.2024").unwrap();
        assert_eq!(period.kind, SignupKind::WindowDates);
        assert_eq!(period.start, Some(ymd(2024, 3, 1)));
        assert_eq!(period.end, Some(ymd(2024, 3, 15)));
        assert_eq!(period.raw_text, "01.03.2024 - 15.03.2024");
    }

    #[test]
    fn test_window_with_dash_and_trailing_text() {
        let period = SignupPeriod::from_text("1. März 2024 – 15. März 2024, 12 Uhr").unwrap();
        assert_eq!(period.kind, SignupKind::WindowDates);
        assert_eq!(period.end, Some(ymd(2024, 3, 15)));
    }

    #[test]
    fn test_single_lottery_date_is_one_day_window() {
        let period = SignupPeriod::from_text("Verlosungszeitraum: 04.03.2024").unwrap();
        assert_eq!(period.kind, SignupKind::WindowDates);
        assert_eq!(period.start, Some(ymd(2024, 3, 4)));
        assert_eq!(period.start, period.end);
        assert_eq!(SignupPeriod::from_text(&period.cell_text()).unwrap(), period);
    }

    #[test]
    fn test_stray_single_date_is_unspecified() {
        let text = "Anmeldung telefonisch, Kurs startet am 04.03.2024";
        let period = SignupPeriod::from_text(text).unwrap();
        assert_eq!(period.kind, SignupKind::Unspecified);
        assert_eq!(period.start, None);
        assert_eq!(period.raw_text, text);
    }

    #[test]
    fn test_direct_registration() {
        let period =
            SignupPeriod::from_text("Die Anmeldung erfolgt direkt beim Veranstalter.").unwrap();
        assert_eq!(period.kind, SignupKind::DirectWithOrganizer);
        assert_eq!(period.start, None);
        assert_eq!(period.end, None);
    }

    #[test]
    fn test_unrecognized_text_is_unspecified() {
        let period = SignupPeriod::from_text("Infos folgen").unwrap();
        assert_eq!(period.kind, SignupKind::Unspecified);
        assert_eq!(period.raw_text, "Infos folgen");

        let empty = SignupPeriod::from_text("   ").unwrap();
        assert_eq!(empty.kind, SignupKind::Unspecified);
        assert_eq!(empty.cell_text(), UNSPECIFIED_SIGNUP_TEXT);
        assert_eq!(SignupPeriod::from_text(UNSPECIFIED_SIGNUP_TEXT).unwrap(), empty);
    }

    #[test]
    fn test_inverted_window_is_an_error() {
        let err = SignupPeriod::from_text("15.03.2024 - 01.03.2024").unwrap_err();
        assert_eq!(err.start, ymd(2024, 3, 15));
        assert_eq!(err.end, ymd(2024, 3, 1));
    }

    #[test]
    fn test_cell_text_round_trips() {
        for text in [
            "01.03.2024 - 15.03.2024",
            DIRECT_SIGNUP_TEXT,
            UNSPECIFIED_SIGNUP_TEXT,
            "Infos folgen",
        ] {
            let period = SignupPeriod::from_text(text).unwrap();
            assert_eq!(SignupPeriod::from_text(&period.cell_text()).unwrap(), period);
        }
    }
}
