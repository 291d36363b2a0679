//! Error types for snapflow-fetch.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("server did not report a content length")]
    UnknownLength,

    #[error("part ended early: expected bytes up to {expected_end}, got up to {received_end}")]
    ShortBody { expected_end: u64, received_end: u64 },

    #[error("response body overruns the requested range ending at {expected_end}")]
    BodyOverrun { expected_end: u64 },

    #[error("object is {len} bytes, more than the {limit}-byte limit")]
    TooLarge { len: u64, limit: u64 },

    #[error("part {part} failed after {attempts} attempts: {source}")]
    MaxRetriesExceeded {
        part:     u32,
        attempts: u32,
        #[source]
        source:   Box<FetchError>,
    },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("sink rejected write: {0}")]
    Sink(#[from] snapflow_window::Error),
}

impl FetchError {
    /// Whether a fresh attempt at the same part might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::ShortBody { .. })
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;
