//! Service layer for the scraper.
//!
//! This module contains the building blocks the pipeline drives:
//! - Sequential, retrying page fetching (`Fetcher`)
//! - Listing page parsing (`ListingParser`)
//! - Detail page parsing (`DetailParser`)

mod detail;
mod fetcher;
pub mod html;
mod listing;

#[cfg(test)]
pub mod testing;

pub use detail::{DetailParser, ParsedDetail, parse_occurrences};
pub use fetcher::{
    DelayPolicy, FetchStats, Fetcher, HttpResponse, RequestClass, RetryPolicy, Transport,
};
pub use listing::ListingParser;
