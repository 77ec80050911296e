// src/pipeline/group.rs

//! Collapsing of multi-date duplicates.

use std::collections::HashMap;

use crate::models::EventRecord;

/// Merge records that describe the same event.
///
/// Records sharing `(name, detail_url)` become one record whose occurrences
/// are the union of all of them, without exact duplicates, sorted by date
/// then time. Every other field comes from the first record of the group.
/// Groups keep the order in which they first appear.
pub fn group(records: Vec<EventRecord>) -> Vec<EventRecord> {
    let mut grouped: Vec<EventRecord> = Vec::with_capacity(records.len());
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for record in records {
        let (name, url) = record.group_key();
        let key = (name.to_string(), url.to_string());
        match index.get(&key) {
            Some(&pos) => grouped[pos].occurrences.extend(record.occurrences),
            None => {
                index.insert(key, grouped.len());
                grouped.push(record);
            }
        }
    }

    for record in &mut grouped {
        record.occurrences.sort();
        record.occurrences.dedup();
    }
    grouped
}
