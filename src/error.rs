//! Error types for the scrape engine and the table-processing stages.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures raised while driving the portal.
///
/// Every variant aborts the current identifier. Whether the run continues
/// with the next identifier is decided by the caller.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("login did not complete within {seconds}s (still on {url})")]
    LoginTimeout { url: String, seconds: u64 },
    #[error("element '{selector}' did not appear within {seconds}s")]
    ElementTimeout { selector: String, seconds: u64 },
    #[error("results status text does not match 'Showing A-B of C': {text:?}")]
    StatusFormat { text: String },
    #[error("malformed results page: {0}")]
    MalformedPage(String),
    #[error("browser error: {0}")]
    Browser(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl ScrapeError {
    /// Errors caused by the browser or page state rather than local I/O.
    pub fn is_browser_fault(&self) -> bool {
        matches!(
            self,
            ScrapeError::LoginTimeout { .. }
                | ScrapeError::ElementTimeout { .. }
                | ScrapeError::Browser(_)
        )
    }
}

/// Failures in configuration, CSV tables, and data transforms.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error in {path}: {reason}")]
    Config { path: PathBuf, reason: String },
    #[error("table '{table}' is missing required columns: {}", missing.join(", "))]
    MissingColumns { table: String, missing: Vec<String> },
    #[error("table '{table}' line {line}: expected {expected} fields, found {found}")]
    RaggedRow {
        table: String,
        line: u64,
        expected: u64,
        found: u64,
    },
    #[error("no search term recorded for EIN {0}")]
    UnknownIdentifier(String),
    #[error("no CPI index for year {0}")]
    MissingCpiYear(i32),
    #[error("could not parse grant amount {0:?}")]
    InvalidAmount(String),
    #[error("could not parse year {0:?}")]
    InvalidYear(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Polars(#[from] polars::prelude::PolarsError),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
