// src/pipeline/reconcile.rs

//! Carry user selections from the previous export into a fresh scrape.

use std::collections::HashSet;

use crate::models::EventRecord;

/// Copy `selected` from `prior` onto `records`, matched by detail URL.
///
/// The result has exactly the shape and order of `records`; prior records
/// that are no longer listed are dropped.
pub fn reconcile(records: Vec<EventRecord>, prior: &[EventRecord]) -> Vec<EventRecord> {
    let selected: HashSet<&str> = prior
        .iter()
        .filter(|r| r.selected)
        .map(EventRecord::key)
        .collect();

    records
        .into_iter()
        .map(|mut record| {
            record.selected = selected.contains(record.key());
            record
        })
        .collect()
}
