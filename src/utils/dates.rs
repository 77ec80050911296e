// src/utils/dates.rs

//! Date and time recognition for German event text.
//!
//! Dates come as `dd.mm.yyyy` (day and month may be single digits) or with a
//! month name, `1. März 2024` / `01. Mär. 2024`. Times are free text; the
//! recognizers only find where a time is written so it can be paired with a
//! date.

use std::ops::Range;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

static RE_NUMERIC_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})\.\s?(\d{1,2})\.\s?(\d{4})\b").expect("invalid regex: numeric date")
});

static RE_NAMED_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})\.?\s*([a-zäöü]{3,9})\.?\s+(\d{4})\b")
        .expect("invalid regex: named date")
});

static RE_DAY_MONTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})\.\s?(\d{1,2})\.").expect("invalid regex: day and month")
});

// One time or a range; either end may carry "Uhr" and minutes.
static RE_TIME: LazyLock<Regex> = LazyLock::new(|| {
    let sep = r"\s*(?:-|–|bis)\s*";
    let uhr = r"(?:\s*uhr)?";
    Regex::new(&format!(
        r"(?i)\b(?:\d{{1,2}}[:.]\d{{2}}{uhr}(?:{sep}\d{{1,2}}(?:[:.]\d{{2}})?{uhr})?|\d{{1,2}}{uhr}{sep}\d{{1,2}}[:.]\d{{2}}{uhr}|\d{{1,2}}{uhr}{sep}\d{{1,2}}\s*uhr|\d{{1,2}}\s*uhr)"
    ))
    .expect("invalid regex: time")
});

static RE_LIST_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[,;/\n]|\bund\b|\b(?:mo|di|mi|do|fr|sa|so)\b")
        .expect("invalid regex: list separator")
});

/// A date-shaped fragment found in a piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateToken {
    /// Byte range of the fragment in the scanned text
    pub span: Range<usize>,
    /// The fragment as written
    pub fragment: String,
    /// `None` when the fragment looks like a date but names no real day
    pub date: Option<NaiveDate>,
}

/// Month number for a German month name or abbreviation.
pub fn month_from_name(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    let month = match lower.as_str() {
        "januar" | "jan" | "jänner" | "jän" => 1,
        "februar" | "feb" | "febr" => 2,
        "märz" | "maerz" | "mär" | "mrz" => 3,
        "april" | "apr" => 4,
        "mai" => 5,
        "juni" | "jun" => 6,
        "juli" | "jul" => 7,
        "august" | "aug" => 8,
        "september" | "sep" | "sept" => 9,
        "oktober" | "okt" => 10,
        "november" | "nov" => 11,
        "dezember" | "dez" => 12,
        _ => return None,
    };
    Some(month)
}

/// Find every date fragment in `text`, in document order.
///
/// Numeric fragments whose day or month is out of range are reported with
/// `date: None`. Month-name fragments are only reported when the word is a
/// known month, so ordinary words followed by a year are not mistaken for
/// dates.
pub fn find_dates(text: &str) -> Vec<DateToken> {
    let mut tokens: Vec<DateToken> = RE_NUMERIC_DATE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let day = caps[1].parse().ok()?;
            let month = caps[2].parse().ok()?;
            let year = caps[3].parse().ok()?;
            Some(DateToken {
                span: whole.range(),
                fragment: whole.as_str().to_string(),
                date: NaiveDate::from_ymd_opt(year, month, day),
            })
        })
        .collect();

    for caps in RE_NAMED_DATE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let Some(month) = month_from_name(&caps[2]) else {
            continue;
        };
        if tokens
            .iter()
            .any(|t| t.span.start < whole.end() && whole.start() < t.span.end)
        {
            continue;
        }
        let day = caps[1].parse().ok();
        let year = caps[3].parse().ok();
        let date = day
            .zip(year)
            .and_then(|(day, year)| NaiveDate::from_ymd_opt(year, month, day));
        tokens.push(DateToken {
            span: whole.range(),
            fragment: whole.as_str().to_string(),
            date,
        });
    }

    tokens.sort_by_key(|t| t.span.start);
    let partial = partial_dates(text, &tokens);
    if !partial.is_empty() {
        tokens.extend(partial);
        tokens.sort_by_key(|t| t.span.start);
    }
    tokens
}

/// `dd.mm.` fragments without a year, as in "02.03. und 09.03.2024".
///
/// The year comes from the next full date after the fragment, one year
/// earlier when that would put the fragment after it. Without a later full
/// date the fragment is reported with `date: None`.
fn partial_dates(text: &str, full: &[DateToken]) -> Vec<DateToken> {
    RE_DAY_MONTH
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            if full
                .iter()
                .any(|t| t.span.start < whole.end() && whole.start() < t.span.end)
            {
                return None;
            }
            let day: u32 = caps[1].parse().ok()?;
            let month: u32 = caps[2].parse().ok()?;
            let date = full
                .iter()
                .filter(|t| t.span.start >= whole.end())
                .find_map(|t| t.date)
                .and_then(|anchor| {
                    let date = NaiveDate::from_ymd_opt(anchor.year(), month, day)?;
                    if date > anchor {
                        NaiveDate::from_ymd_opt(anchor.year() - 1, month, day)
                    } else {
                        Some(date)
                    }
                });
            Some(DateToken {
                span: whole.range(),
                fragment: whole.as_str().to_string(),
                date,
            })
        })
        .collect()
}

/// Parse the first valid date in `text`.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    find_dates(text).into_iter().find_map(|t| t.date)
}

/// Find every time fragment in `text`, trimmed.
pub fn find_times(text: &str) -> Vec<String> {
    RE_TIME
        .find_iter(text)
        .map(|m| m.as_str().trim().to_string())
        .collect()
}

/// Times of a field that lists one time per entry.
///
/// Returns the times only when there are at least two and every pair is
/// split by a list separator (`,`, `;`, `/`, a line break, "und" or a
/// weekday). A single time or range yields an empty list.
pub fn find_time_list(text: &str) -> Vec<String> {
    let matches: Vec<_> = RE_TIME.find_iter(text).collect();
    if matches.len() < 2 {
        return Vec::new();
    }
    let separated = matches
        .windows(2)
        .all(|pair| RE_LIST_SEPARATOR.is_match(&text[pair[0].end()..pair[1].start()]));
    if !separated {
        return Vec::new();
    }
    matches.iter().map(|m| m.as_str().trim().to_string()).collect()
}

/// Format a date the way the site writes it.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}
