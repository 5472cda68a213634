//! Error types for econcal.

use thiserror::Error;

use crate::ingest::IngestCounts;

/// Errors that can occur in econcal operations.
#[derive(Error, Debug)]
pub enum EconCalError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid event: {0}")]
    Validation(String),

    #[error("Invalid ingestion payload: {0}")]
    Payload(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Backend '{0}' not found in PATH")]
    BackendNotInstalled(String),

    #[error("Backend request timed out after {0}s")]
    BackendTimeout(u64),

    #[error("Candidate lookup failed: {0}")]
    MatchLookup(String),

    #[error(
        "Submission failed after {batches_completed} batch(es) ({counts}): {source}"
    )]
    Submission {
        counts: IngestCounts,
        batches_completed: usize,
        #[source]
        source: Box<EconCalError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for econcal operations.
pub type EconCalResult<T> = Result<T, EconCalError>;
