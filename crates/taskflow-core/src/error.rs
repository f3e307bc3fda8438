//! Error taxonomy shared by every store backend.

use thiserror::Error;

/// Coarse classification used by callers that only need to know which
/// bucket a failure falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Backend,
}

#[derive(Error, Debug)]
pub enum StoreError {
    /// Input rejected before reaching the backend.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The backend answered but reported a failure.
    #[error("backend error: {0}")]
    Backend(String),

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn task_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: "task",
            id: id.to_string(),
        }
    }

    pub fn category_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: "category",
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Backend(_) | Self::Transport(_) | Self::Decode(_) | Self::Io(_) => ErrorKind::Backend,
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
