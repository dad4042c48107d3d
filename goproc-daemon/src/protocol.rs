//! JSON newline-delimited wire protocol and the blocking client side.
//!
//! One request object per line in, one response object per line out. The
//! client enforces the caller's deadline through socket read/write
//! timeouts; the daemon never needs to know about it.

use std::io::{BufRead, BufReader, ErrorKind as IoErrorKind, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use goproc_core::ListFilter;

use crate::error::{io_err, DaemonError};
use crate::paths;

/// Budget for the "is anyone there?" ping used by stale-socket checks.
pub const PING_TIMEOUT: Duration = Duration::from_millis(300);

/// Canonical ping reply.
pub const PONG: &str = "pong";

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// The daemon's full method set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Request {
    Ping,
    Add {
        pid: i32,
        #[serde(default)]
        name: String,
        #[serde(default)]
        tags: Vec<String>,
        #[serde(default)]
        groups: Vec<String>,
    },
    List {
        #[serde(default)]
        filter: ListFilter,
    },
    /// Exactly one of `id` (registry id) or `pid` (raw OS pid) must be set.
    Kill {
        #[serde(default)]
        id: Option<u64>,
        #[serde(default)]
        pid: Option<i32>,
    },
    Rm {
        id: u64,
    },
    RenameTag {
        from: String,
        to: String,
    },
    RenameGroup {
        from: String,
        to: String,
    },
    Reset,
}

/// Status category of a failed RPC, mirrored by CLI exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    AlreadyExists,
    Internal,
    Unavailable,
    DeadlineExceeded,
}

/// A typed RPC failure as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct RpcError {
    pub kind: ErrorKind,
    pub message: String,
}

impl RpcError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyExists, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

/// One reply per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(error: RpcError) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error),
        }
    }

    /// Unwrap into the data payload, turning wire errors into typed ones.
    pub fn into_data(self) -> Result<Value, DaemonError> {
        if self.ok {
            Ok(self.data.unwrap_or(Value::Null))
        } else {
            Err(DaemonError::Rpc(self.error.unwrap_or_else(|| {
                RpcError::internal("daemon reported failure without detail")
            })))
        }
    }
}

// ---------------------------------------------------------------------------
// Blocking client
// ---------------------------------------------------------------------------

/// Send one request to the default socket and return one response.
pub fn send_request(request: &Request, timeout: Duration) -> Result<Response, DaemonError> {
    send_request_at(&paths::socket_path(), request, timeout)
}

/// Send one request to an explicit socket path.
pub fn send_request_at(
    socket: &Path,
    request: &Request,
    timeout: Duration,
) -> Result<Response, DaemonError> {
    if timeout.is_zero() {
        return Err(DaemonError::Protocol(
            "timeout must be greater than 0".to_string(),
        ));
    }
    if !socket.exists() {
        return Err(DaemonError::NotRunning {
            socket: socket.to_path_buf(),
        });
    }

    let stream = UnixStream::connect(socket).map_err(|err| {
        if matches!(
            err.kind(),
            IoErrorKind::NotFound | IoErrorKind::ConnectionRefused | IoErrorKind::ConnectionReset
        ) {
            DaemonError::NotRunning {
                socket: socket.to_path_buf(),
            }
        } else {
            io_err(socket, err)
        }
    })?;
    stream
        .set_read_timeout(Some(timeout))
        .map_err(|e| io_err(socket, e))?;
    stream
        .set_write_timeout(Some(timeout))
        .map_err(|e| io_err(socket, e))?;

    let mut writer = &stream;
    let payload = serde_json::to_string(request)?;
    writer
        .write_all(payload.as_bytes())
        .and_then(|()| writer.write_all(b"\n"))
        .and_then(|()| writer.flush())
        .map_err(|err| map_stream_err(socket, err))?;

    let mut reader = BufReader::new(&stream);
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .map_err(|err| map_stream_err(socket, err))?;
    if read == 0 {
        return Err(DaemonError::Protocol(
            "daemon closed connection before responding".to_string(),
        ));
    }

    let response: Response = serde_json::from_str(line.trim_end())?;
    Ok(response)
}

fn map_stream_err(socket: &Path, err: std::io::Error) -> DaemonError {
    if matches!(err.kind(), IoErrorKind::WouldBlock | IoErrorKind::TimedOut) {
        DaemonError::DeadlineExceeded(format!("no reply from {}", socket.display()))
    } else {
        io_err(socket, err)
    }
}

/// Ping the default socket.
pub fn request_ping(timeout: Duration) -> Result<String, DaemonError> {
    request_ping_at(&paths::socket_path(), timeout)
}

/// Ping an explicit socket path.
pub fn request_ping_at(socket: &Path, timeout: Duration) -> Result<String, DaemonError> {
    let data = send_request_at(socket, &Request::Ping, timeout)?.into_data()?;
    match data.as_str() {
        Some(reply) => Ok(reply.to_string()),
        None => Err(DaemonError::Protocol(format!(
            "unexpected ping payload: {data}"
        ))),
    }
}

/// True when the default socket exists and a daemon answers Ping promptly.
pub fn is_running() -> bool {
    is_running_at(&paths::socket_path())
}

/// True when `socket` exists and a daemon answers Ping within
/// [`PING_TIMEOUT`].
pub fn is_running_at(socket: &Path) -> bool {
    socket.exists()
        && matches!(request_ping_at(socket, PING_TIMEOUT), Ok(reply) if reply == PONG)
}
