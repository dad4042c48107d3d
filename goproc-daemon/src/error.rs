//! Error types for the goproc daemon runtime, wire protocol, and lifecycle.

use std::path::PathBuf;

use thiserror::Error;

use crate::protocol::RpcError;

/// Error surface for the daemon crate.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("registry error: {0}")]
    Registry(#[from] goproc_core::RegistryError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("daemon protocol error: {0}")]
    Protocol(String),

    /// The daemon returned a typed RPC failure.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("daemon is not running (socket: {socket})")]
    NotRunning { socket: PathBuf },

    #[error("daemon already running on {socket}")]
    AlreadyRunning { socket: PathBuf },

    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),

    #[error("failed to signal pid {target}: {source}")]
    Signal {
        target: i32,
        #[source]
        source: nix::Error,
    },

    /// Startup/shutdown sequencing failure (joined cleanup errors,
    /// stop-daemon refusals, and the like).
    #[error("{0}")]
    Lifecycle(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
