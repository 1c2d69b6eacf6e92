//! Error taxonomy for the retrieval engine.
//!
//! Only some of these ever reach a caller. Failed extraction is caught during
//! ingestion and recorded on the [`Document`] instead. Degraded extraction is
//! never an error: it is `Extraction::degraded` plus the document's
//! `degraded_reason`. See [`engine`](crate::engine).
//!
//! [`Document`]: rag_harness_core::models::Document

use std::fmt;

use thiserror::Error;

/// Result alias using [`RagError`].
pub type Result<T> = std::result::Result<T, RagError>;

/// How a remote collaborator (extraction service or fetch target) refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// HTTP 401 or 403.
    InvalidCredentials,
    /// HTTP 429.
    Throttled,
    /// Any other non-success status, or a transport error.
    Failed,
}

impl FailureKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => FailureKind::InvalidCredentials,
            429 => FailureKind::Throttled,
            _ => FailureKind::Failed,
        }
    }

    /// Whether trying another payload shape could help.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureKind::Failed)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidCredentials => write!(f, "invalid credentials"),
            FailureKind::Throttled => write!(f, "throttled"),
            FailureKind::Failed => write!(f, "request failed"),
        }
    }
}

#[derive(Error, Debug)]
pub enum RagError {
    #[error("extraction failed ({kind}): {message}")]
    ExtractionFailed { kind: FailureKind, message: String },

    #[error("fetch of {url} failed ({kind}): {message}")]
    Fetch {
        url: String,
        kind: FailureKind,
        message: String,
    },

    #[error("sync of source {source_id} failed: {message}")]
    SyncFailed { source_id: String, message: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl RagError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        RagError::NotFound {
            kind,
            id: id.into(),
        }
    }
}
