//! Error types for goproc-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::ProcId;

/// All errors that can arise from registry and snapshot operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A pid outside the valid positive range was supplied.
    #[error("pid must be positive, got {0}")]
    InvalidPid(i32),

    /// A name violating the length or character rules was supplied.
    #[error("invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// A non-empty name is already in use by another record.
    #[error("name {name:?} is already used by proc {existing}")]
    NameConflict { name: String, existing: ProcId },

    /// No record with the given id exists.
    #[error("proc {0} not found")]
    NotFound(ProcId),

    /// Underlying I/O failure, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Snapshot JSON encode/decode error.
    #[error("snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience constructor for [`RegistryError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RegistryError {
    RegistryError::Io {
        path: path.into(),
        source,
    }
}
