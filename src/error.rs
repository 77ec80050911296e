// src/error.rs

//! Unified error handling for the scraper application.

use std::fmt;

use thiserror::Error;

/// Result type alias for scraper operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Transport failure after all retries were spent
    #[error("Network error for {url}: {cause}")]
    Network { url: String, cause: String },

    /// Page body is not markup at all
    #[error("Structure error for {url}: {message}")]
    Structure { url: String, message: String },

    /// An expected field is missing or malformed
    #[error("Parse error for {source_url}: {message} (fragment: {fragment:?})")]
    Parse {
        source_url: String,
        fragment: String,
        message: String,
    },

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be built or a request could not be formed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// CSV reading or writing failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization failed
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Scrape run ended without producing a usable record set
    #[error("Scrape aborted: {0}")]
    Aborted(String),

    /// Calendar export failed
    #[error("Calendar error: {0}")]
    Calendar(String),

    /// Reminder creation failed
    #[error("Reminder error: {0}")]
    Reminder(String),
}

impl AppError {
    /// Create a network error for a URL.
    pub fn network(url: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self::Network {
            url: url.into(),
            cause: cause.to_string(),
        }
    }

    /// Create a structure error for a URL.
    pub fn structure(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Structure {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a parse error carrying the offending fragment.
    pub fn parse(
        source_url: impl Into<String>,
        fragment: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Parse {
            source_url: source_url.into(),
            fragment: fragment.into(),
            message: message.into(),
        }
    }

    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a calendar export error.
    pub fn calendar(message: impl Into<String>) -> Self {
        Self::Calendar(message.into())
    }

    /// Create a reminder error.
    pub fn reminder(message: impl Into<String>) -> Self {
        Self::Reminder(message.into())
    }
}
