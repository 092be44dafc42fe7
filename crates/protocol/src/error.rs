use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where a failure occurred, carried on every user-visible error so callers can tell a
/// whole-job failure from a single-file one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorScope {
    Project,
    File,
    Batch,
}

/// The error taxonomy the coordinator reasons over explicitly (never an opaque exception).
/// Adapters translate backend-specific errors into one of these variants; the coordinator
/// decides retry vs. fail purely from the variant, not from inspecting messages.
#[derive(Debug, Error, Clone, Serialize, Deserialize)]
pub enum IndexError {
    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("provider unavailable: {message}")]
    ProviderUnavailable {
        message: String,
        hints: Vec<String>,
    },

    #[error("transient failure: {message}")]
    Transient { message: String },

    #[error("batch limit exceeded: {message}")]
    BatchLimit { message: String, max_batch_size: usize },

    #[error("consistency failure in {scope:?} {detail}: {message}")]
    Consistency {
        scope: ErrorScope,
        detail: String,
        message: String,
    },

    #[error("fatal error: {message}")]
    Fatal { message: String },

    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("already indexing: {project_id}")]
    AlreadyIndexing { project_id: String },

    #[error("invalid path: {path}")]
    InvalidPath { path: String },
}

impl IndexError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::BatchLimit { .. })
    }

    #[must_use]
    pub fn provider_unavailable(message: impl Into<String>, hints: Vec<String>) -> Self {
        Self::ProviderUnavailable {
            message: message.into(),
            hints,
        }
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
