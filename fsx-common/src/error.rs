//! Common error types for fsx
//!
//! All fsx tools use these error types for consistent error handling.

use thiserror::Error;

/// Common result type for fsx operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type shared across the fsx tools
#[derive(Error, Debug)]
pub enum Error {
    /// IO operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV read or write error (wraps csv::Error)
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse error when loading configuration files
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// HTTP transport error talking to the search cluster
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Search cluster returned a non-success response
    #[error("search index error (HTTP {status}): {body}")]
    Search { status: u16, body: String },

    /// Configuration loading or validation error
    #[error("configuration error: {0}")]
    Config(String),

    /// A staged data-grid path did not match any known season layout
    #[error("unrecognized scan path: {0}")]
    PathPattern(String),

    /// A sensor timestamp could not be normalized
    #[error("unparseable timestamp: {0}")]
    Timestamp(String),

    /// Fieldbook rows that cannot form a lookup table
    #[error("fieldbook error: {0}")]
    Fieldbook(String),

    /// Sensor archive missing expected members or otherwise unreadable
    #[error("archive error: {0}")]
    Archive(String),

    /// Requested resource does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid caller-supplied input
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
