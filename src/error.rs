//! Error types for aggregation and report rendering.
//!
//! Two tiers exist: [`LineParseError`] describes a single bad input line and
//! is always recovered inside the aggregation loop, while [`ProcessingError`]
//! aborts the whole run and is handed back to the caller.

use thiserror::Error;

/// Failure to turn one JSONL line into a sales record.
#[derive(Debug, Error)]
pub enum LineParseError {
    #[error("line is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("line is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),

    #[error("net_items_sold cannot be converted to an integer: {0}")]
    InvalidQuantity(String),

    #[error("adding {0} items would overflow the running totals")]
    Overflow(i64),
}

/// Run-level failure while building a report.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("failed to read input stream: {0}")]
    Read(#[from] std::io::Error),

    #[error("invalid header colour '{0}', expected #RRGGBB")]
    InvalidHeaderColor(String),

    #[error("failed to write spreadsheet: {0}")]
    Render(#[from] rust_xlsxwriter::XlsxError),
}
