// src/services/detail.rs

//! Event detail page parser.
//!
//! Detail pages carry the title in a heading and every other field as a
//! labeled section: a field heading ("Alter", "Treffpunkt", "Datum", ...)
//! followed by the element holding its value. Only the title is mandatory;
//! every other field degrades to empty or `Unspecified`.

use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{EventRecord, Occurrence, SignupKind, SignupPeriod, SiteConfig};
use crate::services::html::{
    element_text, excerpt, parse_document, parse_selector, text_segments,
};
use crate::utils::dates::{find_dates, find_time_list, find_times};
use crate::utils::clean_text;

const FIELD_AGE: &str = "Alter";
const FIELD_LOCATION: &str = "Treffpunkt";
const FIELD_DATE: &str = "Datum";
const FIELD_TIME: &str = "Uhrzeit";
const FIELD_SIGNUP_START: &str = "Anmeldebeginn";
const FIELD_SIGNUP: &str = "Anmeldung";

/// Paragraphs shorter than this are captions or labels, not descriptions.
const MIN_DESCRIPTION_CHARS: usize = 50;

const EXCERPT_CHARS: usize = 120;

/// Result of parsing one detail page.
#[derive(Debug)]
pub struct ParsedDetail {
    /// Extracted record; `occurrences` may be empty
    pub record: EventRecord,

    /// Shared time text, for pairing with a fallback date
    pub time_text: String,

    /// Absorbed field-level parse errors
    pub warnings: Vec<AppError>,
}

/// Parser for event detail pages.
pub struct DetailParser {
    title_sel: Selector,
    header_sel: Selector,
    paragraph_sel: Selector,
}

impl DetailParser {
    /// Compile the detail selectors from the site configuration.
    pub fn new(site: &SiteConfig) -> Result<Self> {
        Ok(Self {
            title_sel: parse_selector(&site.title_selector)?,
            header_sel: parse_selector(&site.field_header_selector)?,
            paragraph_sel: parse_selector("p")?,
        })
    }

    /// Parse a detail page into a record.
    ///
    /// Fails with `Structure` for non-markup bodies and with `Parse` when the
    /// event name is missing.
    pub fn parse(&self, html: &str, source_url: &str) -> Result<ParsedDetail> {
        let document = parse_document(html, source_url)?;

        let title = document.select(&self.title_sel).next();
        let name = title.map(element_text).unwrap_or_default();
        if name.is_empty() {
            let fragment = title.map_or_else(|| excerpt(html, EXCERPT_CHARS), |t| t.html());
            return Err(AppError::parse(source_url, fragment, "missing event name"));
        }

        let headers: Vec<ElementRef<'_>> = document.select(&self.header_sel).collect();
        let field = |label: &str| field_segments(&headers, label);
        let field_text = |label: &str| field(label).map(|s| s.join(" ")).unwrap_or_default();

        let mut warnings = Vec::new();
        let mut record = EventRecord::new(name, source_url);
        record.description = title
            .and_then(|t| self.description_after(t, &headers))
            .or_else(|| self.first_long_paragraph(&document))
            .unwrap_or_default();
        record.age_requirement = field_text(FIELD_AGE);
        record.location = field_text(FIELD_LOCATION);

        let time_text = field_text(FIELD_TIME);
        let date_segments = field(FIELD_DATE).unwrap_or_default();
        record.occurrences =
            parse_occurrences(&date_segments, &time_text, source_url, &mut warnings);

        record.signup = parse_signup(
            &[field_text(FIELD_SIGNUP_START), field_text(FIELD_SIGNUP)],
            source_url,
            &mut warnings,
        );

        Ok(ParsedDetail {
            record,
            time_text,
            warnings,
        })
    }

    /// First substantial paragraph between the title and the first field.
    fn description_after(&self, title: ElementRef<'_>, headers: &[ElementRef<'_>]) -> Option<String> {
        title
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .take_while(|el| !headers.contains(el))
            .filter(|el| el.value().name() == "p")
            .map(element_text)
            .find(|text| text.chars().count() > MIN_DESCRIPTION_CHARS)
    }

    fn first_long_paragraph(&self, document: &Html) -> Option<String> {
        document
            .select(&self.paragraph_sel)
            .map(element_text)
            .find(|text| text.chars().count() > MIN_DESCRIPTION_CHARS)
    }
}

/// Value lines of the first field whose heading contains `label`.
///
/// The value is the heading's next sibling element, or the loose text up to
/// the next heading when no element follows. `None` when no heading matches.
fn field_segments(headers: &[ElementRef<'_>], label: &str) -> Option<Vec<String>> {
    let label = label.to_lowercase();
    let header = headers
        .iter()
        .find(|h| element_text(**h).to_lowercase().contains(&label))?;

    let mut segments = Vec::new();
    for sibling in header.next_siblings() {
        if let Some(el) = ElementRef::wrap(sibling) {
            if !headers.contains(&el) {
                segments.extend(text_segments(el));
            }
            break;
        }
        if let Some(text) = sibling.value().as_text() {
            let line = clean_text(text);
            if !line.is_empty() {
                segments.push(line);
            }
        }
    }
    Some(segments)
}

/// Pair every date in the date field with its time.
///
/// A time written next to a date belongs to that date. Otherwise, when the
/// time field is a separated list with exactly one time per date, they pair
/// up in order; in all other cases the whole time field is shared. Repeated
/// dates keep their first entry. Date-like text that names no real day, a
/// day and month with no year to borrow, and lines without any date are
/// reported as warnings and skipped.
pub fn parse_occurrences(
    segments: &[String],
    time_text: &str,
    source_url: &str,
    warnings: &mut Vec<AppError>,
) -> Vec<Occurrence> {
    let mut found: Vec<(chrono::NaiveDate, Option<String>)> = Vec::new();

    for segment in segments {
        let tokens = find_dates(segment);
        if tokens.is_empty() {
            warnings.push(AppError::parse(
                source_url,
                segment.clone(),
                "unrecognized date",
            ));
            continue;
        }

        for (idx, token) in tokens.iter().enumerate() {
            let Some(date) = token.date else {
                warnings.push(AppError::parse(
                    source_url,
                    token.fragment.clone(),
                    "no calendar date",
                ));
                continue;
            };
            if found.iter().any(|(d, _)| *d == date) {
                continue;
            }
            let tail_end = tokens
                .get(idx + 1)
                .map_or(segment.len(), |next| next.span.start);
            let inline_time = find_times(&segment[token.span.end..tail_end])
                .into_iter()
                .next();
            found.push((date, inline_time));
        }
    }

    let shared = clean_text(time_text);
    let listed_times = find_time_list(&shared);
    let paired = found.len() > 1 && listed_times.len() == found.len();

    found
        .into_iter()
        .enumerate()
        .map(|(idx, (date, inline))| {
            let time = inline.unwrap_or_else(|| {
                if paired {
                    listed_times[idx].clone()
                } else {
                    shared.clone()
                }
            });
            Occurrence::new(date, time)
        })
        .collect()
}

/// Classify the sign-up fields, first recognizable one wins.
///
/// An inverted window is absorbed as a warning and the text kept as
/// `Unspecified`.
fn parse_signup(
    candidates: &[String],
    source_url: &str,
    warnings: &mut Vec<AppError>,
) -> SignupPeriod {
    let mut fallback: Option<&str> = None;

    for text in candidates.iter().filter(|t| !t.is_empty()) {
        match SignupPeriod::from_text(text) {
            Ok(period) if period.kind != SignupKind::Unspecified => return period,
            Ok(_) => {}
            Err(e) => warnings.push(AppError::parse(source_url, text.clone(), e.to_string())),
        }
        fallback.get_or_insert(text);
    }

    SignupPeriod::unspecified(fallback.unwrap_or_default())
}
