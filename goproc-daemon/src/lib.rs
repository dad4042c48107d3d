//! goproc daemon runtime: wire protocol, RPC service, liveness watcher,
//! and socket/PID lifecycle management.

pub mod config;
mod error;
pub mod paths;
pub mod pidfile;
pub mod probe;
pub mod protocol;
pub mod server;
pub mod service;
pub mod watcher;

pub use config::{parse_duration, Config};
pub use error::DaemonError;
pub use protocol::{
    is_running, request_ping, send_request, ErrorKind, Request, Response, RpcError,
};
pub use server::{run, start_blocking, stop_running_daemon};
pub use service::Service;
