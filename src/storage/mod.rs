//! Storage abstractions for the exported event sheet.
//!
//! The sheet is the only persisted state: each scrape run reads the previous
//! export to carry selections forward, then replaces it.
//!
//! ## Sheet Layout
//!
//! ```text
//! Selected | Event Name | Description | Age | Place | Date | Time | Sign-Up Period
//! x        | =HYPERLINK(url,name)  ...             | 02.03.2024 | 10 Uhr | ...
//!          | =HYPERLINK(url,"↗")                    | 09.03.2024 | 10 Uhr | ...
//! ```

pub mod sheet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::EventRecord;

// Re-export for convenience
pub use sheet::CsvSheet;

/// Metadata about a storage write operation.
#[derive(Debug, Clone)]
pub struct WriteMetadata {
    /// Number of records written
    pub records: usize,
    /// Number of table rows written, header excluded
    pub rows: usize,
    /// Timestamp of the write
    pub timestamp: DateTime<Utc>,
}

/// Trait for event sheet backends.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Load the previously exported records; empty when nothing was exported yet.
    async fn load(&self) -> Result<Vec<EventRecord>>;

    /// Replace the exported records.
    async fn save(&self, records: &[EventRecord]) -> Result<WriteMetadata>;
}
