//! Error types for the rate window counter.

use thiserror::Error;

/// Main error type for ratewindow operations.
///
/// None of these are retried internally. An error from [`get`] means no
/// decision was made, not that the request was denied.
///
/// [`get`]: crate::ratelimit::FixedWindowStore::get
#[derive(Error, Debug)]
pub enum LimiterError {
    /// A connection could not be obtained from the pool or failed mid-call
    #[error("Connection failure: {0}")]
    ConnectionFailure(String),

    /// A transaction aborted or returned an unexpected shape
    #[error("Transaction failure: {0}")]
    TransactionFailure(String),

    /// The liveness check got something other than the expected acknowledgment
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The rate is malformed or out of range
    #[error("Invalid rate: {0}")]
    InvalidRate(String),

    /// The caller supplied an unusable argument
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for ratewindow operations.
pub type Result<T> = std::result::Result<T, LimiterError>;
