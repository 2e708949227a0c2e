//! Error taxonomy shared by the indexing and answering pipeline.

use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised while loading, indexing, retrieving, or answering.
#[derive(Error, Debug)]
pub enum RagError {
    #[error("document not found at {}", .0.display())]
    DocumentMissing(PathBuf),

    #[error("document error: {0}")]
    Document(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} returned {status}: {message}")]
    Upstream {
        provider: &'static str,
        status: StatusCode,
        message: String,
    },

    #[error("{provider} response invalid: {message}")]
    InvalidResponse {
        provider: &'static str,
        message: String,
    },

    #[error("vector index is empty")]
    EmptyIndex,

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Max retries reached after {attempts} attempts: {last}")]
    MaxRetriesReached { attempts: u32, last: String },
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, RagError>;

/// How a failure should be treated by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Upstream throttling (quota / rate limit); safe to retry after a pause.
    Throttled,
    /// Anything else; propagate immediately.
    Fatal,
}

impl RagError {
    /// Classifies the error for the retry loop.
    pub fn class(&self) -> ErrorClass {
        if let RagError::Upstream { status, .. } = self {
            if *status == StatusCode::TOO_MANY_REQUESTS {
                return ErrorClass::Throttled;
            }
        }
        if is_quota_message(&self.to_string()) {
            ErrorClass::Throttled
        } else {
            ErrorClass::Fatal
        }
    }
}

/// Case-insensitive check for quota/rate-limit wording in an error description.
fn is_quota_message(message: &str) -> bool {
    let lowered = message.to_lowercase();
    lowered.contains("quota") || lowered.contains("rate limit")
}
