//! CSV sheet storage.
//!
//! One main row per event, followed by one continuation row for every
//! further occurrence. The event name cell is a `HYPERLINK` formula whose
//! target is the detail URL, which is what identifies a row across runs. The
//! URL is repeated as plain text in the last column, so a sheet re-saved by a
//! spreadsheet app (which exports formulas as their displayed value) still
//! keys its rows. Both `,` and `;` delimited files are read.
//! Writes go to a temporary file first and are renamed into place.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::Utc;
use csv::StringRecord;
use regex::Regex;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{EventRecord, Occurrence, SignupPeriod};
use crate::storage::{EventStore, WriteMetadata};
use crate::utils::clean_text;
use crate::utils::dates::{format_date, parse_date};

/// Column headers, in order.
pub const HEADERS: [&str; 9] = [
    "Selected",
    "Event Name",
    "Description",
    "Age (Alter)",
    "Place (Treffpunkt)",
    "Date",
    "Time",
    "Sign-Up Period (Verlosungszeitraum)",
    "Link",
];

/// Link label of continuation rows.
pub const CONTINUATION_LABEL: &str = "↗";

/// Value written to the Selected column of selected events.
const SELECTED_MARK: &str = "x";

const COL_SELECTED: usize = 0;
const COL_NAME: usize = 1;
const COL_DESCRIPTION: usize = 2;
const COL_AGE: usize = 3;
const COL_LOCATION: usize = 4;
const COL_DATE: usize = 5;
const COL_TIME: usize = 6;
const COL_SIGNUP: usize = 7;
const COL_LINK: usize = 8;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

static RE_HYPERLINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^=HYPERLINK\(\s*"((?:[^"]|"")*)"\s*[,;]\s*"((?:[^"]|"")*)"\s*\)$"#)
        .expect("invalid regex: hyperlink formula")
});

/// Sheet stored as a CSV file.
#[derive(Debug, Clone)]
pub struct CsvSheet {
    path: PathBuf,
}

impl CsvSheet {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.path.with_extension("csv.tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl EventStore for CsvSheet {
    async fn load(&self) -> Result<Vec<EventRecord>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => decode(&bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No previous sheet at {}", self.path.display());
                Ok(Vec::new())
            }
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn save(&self, records: &[EventRecord]) -> Result<WriteMetadata> {
        let (bytes, rows) = encode(records)?;
        self.write_bytes(&bytes).await?;
        log::info!(
            "Sheet: {} events in {} rows written to {}",
            records.len(),
            rows,
            self.path.display()
        );
        Ok(WriteMetadata {
            records: records.len(),
            rows,
            timestamp: Utc::now(),
        })
    }
}

/// Serialize records into CSV bytes, returning the data row count.
pub fn encode(records: &[EventRecord]) -> Result<(Vec<u8>, usize)> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(HEADERS)?;

    let mut rows = 0;
    for record in records {
        let signup = record.signup.cell_text();
        let mut occurrences = record.occurrences.iter();
        let (date, time) = occurrence_cells(occurrences.next());

        let name = hyperlink(&record.detail_url, &record.name);
        let row: [&str; 9] = [
            if record.selected { SELECTED_MARK } else { "" },
            &name,
            &record.description,
            &record.age_requirement,
            &record.location,
            &date,
            &time,
            &signup,
            &record.detail_url,
        ];
        writer.write_record(row)?;
        rows += 1;

        for occurrence in occurrences {
            let (date, time) = occurrence_cells(Some(occurrence));
            let link = hyperlink(&record.detail_url, CONTINUATION_LABEL);
            let row: [&str; 9] = [
                "",
                &link,
                "",
                "",
                "",
                &date,
                &time,
                &signup,
                &record.detail_url,
            ];
            writer.write_record(row)?;
            rows += 1;
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Io(e.into_error()))?;
    Ok((bytes, rows))
}

/// Parse CSV bytes back into records.
///
/// Columns are found by header name, or taken in written order when the
/// header row is not recognized. The detail URL comes from the name cell's
/// `HYPERLINK` target or else from the link column. Rows with neither cannot
/// be matched to an event and are skipped.
pub fn decode(bytes: &[u8]) -> Result<Vec<EventRecord>> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(sniff_delimiter(bytes))
        .from_reader(bytes);

    let columns = column_positions(reader.headers()?);
    let cell = |row: &StringRecord, col: usize| -> String {
        columns[col]
            .and_then(|idx| row.get(idx))
            .unwrap_or_default()
            .to_string()
    };

    let mut records: Vec<EventRecord> = Vec::new();
    for (idx, row) in reader.records().enumerate() {
        let row = row?;
        let name_cell = cell(&row, COL_NAME);
        let link_cell = cell(&row, COL_LINK);
        let (url, label) = match parse_hyperlink(&name_cell) {
            Some(link) => link,
            None if !link_cell.trim().is_empty() => {
                (link_cell.trim().to_string(), name_cell.trim().to_string())
            }
            None => {
                if row.iter().any(|c| !c.trim().is_empty()) {
                    log::warn!("Sheet row {} has no event link, skipping", idx + 2);
                }
                continue;
            }
        };

        let occurrence = parse_date(&cell(&row, COL_DATE))
            .map(|date| Occurrence::new(date, clean_text(&cell(&row, COL_TIME))));

        if label == CONTINUATION_LABEL {
            match records.last_mut() {
                Some(current) if current.detail_url == url => {
                    current.occurrences.extend(occurrence);
                }
                _ => log::warn!("Sheet row {} continues an unknown event, skipping", idx + 2),
            }
            continue;
        }

        let signup_text = cell(&row, COL_SIGNUP);
        let mut record = EventRecord::new(label, url);
        record.selected = !cell(&row, COL_SELECTED).trim().is_empty();
        record.description = cell(&row, COL_DESCRIPTION);
        record.age_requirement = cell(&row, COL_AGE);
        record.location = cell(&row, COL_LOCATION);
        record.occurrences.extend(occurrence);
        record.signup = SignupPeriod::from_text(&signup_text)
            .unwrap_or_else(|_| SignupPeriod::unspecified(clean_text(&signup_text)));
        records.push(record);
    }
    Ok(records)
}

/// `;` when the header line has more semicolons than commas, else `,`.
fn sniff_delimiter(bytes: &[u8]) -> u8 {
    let line = bytes.split(|b| *b == b'\n').next().unwrap_or_default();
    let count = |sep: u8| line.iter().filter(|b| **b == sep).count();
    if count(b';') > count(b',') { b';' } else { b',' }
}

/// Position of every known column in the file, by header name.
///
/// When no header is recognized the columns are taken in written order,
/// without the link column.
fn column_positions(headers: &StringRecord) -> [Option<usize>; HEADERS.len()] {
    let mut positions = [None; HEADERS.len()];
    for (col, name) in HEADERS.iter().enumerate() {
        positions[col] = headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name));
    }
    if positions.iter().all(Option::is_none) {
        for (col, position) in positions.iter_mut().enumerate().take(COL_LINK) {
            *position = Some(col);
        }
    }
    positions
}

/// Spreadsheet formula linking `label` to `url`.
pub fn hyperlink(url: &str, label: &str) -> String {
    format!(
        "=HYPERLINK(\"{}\",\"{}\")",
        url.replace('"', "\"\""),
        label.replace('"', "\"\"")
    )
}

/// Link target and label of a `HYPERLINK` formula.
pub fn parse_hyperlink(cell: &str) -> Option<(String, String)> {
    let caps = RE_HYPERLINK.captures(cell.trim())?;
    let url = caps[1].replace("\"\"", "\"");
    if url.trim().is_empty() {
        return None;
    }
    Some((url, caps[2].replace("\"\"", "\"")))
}

fn occurrence_cells(occurrence: Option<&Occurrence>) -> (String, String) {
    occurrence.map_or_else(
        || (String::new(), String::new()),
        |o| (format_date(o.date), o.time.clone()),
    )
}
