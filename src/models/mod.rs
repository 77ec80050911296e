// src/models/mod.rs

//! Domain models for the scraper application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod event;
mod signup;

// Re-export all public types
pub use config::{Config, CrawlerConfig, OutputConfig, SiteConfig};
pub use event::{EventRecord, EventStub, Occurrence};
pub use signup::{
    DIRECT_SIGNUP_TEXT, InvertedWindow, SignupKind, SignupPeriod, UNSPECIFIED_SIGNUP_TEXT,
};
