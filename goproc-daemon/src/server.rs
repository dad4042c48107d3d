//! Daemon runtime: socket bind, single-instance enforcement, the accept
//! loop, graceful shutdown, and the external stop path.
//!
//! Startup order: load the registry (fatal if the snapshot is unreadable),
//! claim the socket (evicting a stale one only when nobody answers Ping),
//! chmod it `0600`, write the PID file, start the liveness watcher, then
//! accept connections. Shutdown unwinds in reverse; cleanup failures are
//! collected into one joined error instead of short-circuiting.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::Signal;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::broadcast;
use tokio::task::JoinSet;

use goproc_core::Registry;

use crate::config::Config;
use crate::error::{io_err, DaemonError};
use crate::paths;
use crate::pidfile;
use crate::probe;
use crate::protocol::{self, Request, Response, RpcError};
use crate::service::Service;
use crate::watcher;

const STOP_WAIT_TERM: Duration = Duration::from_secs(3);
const STOP_WAIT_KILL: Duration = Duration::from_secs(2);
const STOP_POLL: Duration = Duration::from_millis(100);

/// Install tracing, build a runtime, and serve until shutdown.
pub fn start_blocking(config: Config) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(config))
}

/// Serve on the default socket path with SIGTERM/SIGINT wired to shutdown.
pub async fn run(config: Config) -> Result<(), DaemonError> {
    let (shutdown_tx, _) = broadcast::channel::<()>(16);
    spawn_signal_listener(shutdown_tx.clone())?;
    serve(config, paths::socket_path(), shutdown_tx).await
}

/// Serve on an explicit socket path until `shutdown_tx` fires.
pub async fn serve(
    config: Config,
    socket: PathBuf,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), DaemonError> {
    let registry = Arc::new(Registry::new(
        Some(paths::snapshot_path_for(&socket)),
        config.last_seen_interval,
    )?);
    let service = Arc::new(Service::new(registry.clone()));

    paths::ensure_runtime_dir(&socket)?;
    prepare_socket_for_bind(&socket)?;
    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;

    let pid_file = paths::pid_path_for(&socket);
    pidfile::write_pid(&pid_file, std::process::id() as i32)?;

    let watcher_handle = tokio::spawn(watcher::run(
        registry,
        config.liveness_interval,
        shutdown_tx.subscribe(),
    ));

    tracing::info!(socket = %socket.display(), "daemon listening");
    let mut connections = JoinSet::new();
    let mut shutdown_rx = shutdown_tx.subscribe();
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _)) => {
                        let service = service.clone();
                        connections.spawn(async move {
                            if let Err(err) = handle_client(stream, service).await {
                                tracing::error!(error = %err, "client connection error");
                            }
                        });
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "accept failed, shutting down");
                        let _ = shutdown_tx.send(());
                        break;
                    }
                }
            }
            // Reap finished connection tasks as we go.
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    // Drain in-flight requests rather than aborting them.
    tracing::info!("draining connections");
    while connections.join_next().await.is_some() {}
    if let Err(err) = watcher_handle.await {
        tracing::error!(error = %err, "watcher task join failure");
    }

    drop(listener);
    cleanup(&socket, &pid_file)
}

async fn handle_client(stream: UnixStream, service: Arc<Service>) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => {
                // Handlers may touch the filesystem and exec `ps`; keep
                // that off the reactor threads.
                let service = service.clone();
                tokio::task::spawn_blocking(move || service.handle(request))
                    .await
                    .unwrap_or_else(|err| {
                        Response::error(RpcError::internal(format!("handler failed: {err}")))
                    })
            }
            Err(err) => Response::error(RpcError::invalid_argument(format!(
                "invalid request JSON: {err}"
            ))),
        };
        write_response(&mut writer, &response).await?;
    }

    Ok(())
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &Response,
) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(response)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

/// Claim the socket path: a live daemon is fatal, a stale socket file is
/// unlinked.
fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }
    if protocol::is_running_at(socket) {
        return Err(DaemonError::AlreadyRunning {
            socket: socket.to_path_buf(),
        });
    }

    tracing::warn!(socket = %socket.display(), "removing stale daemon socket before bind");
    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn cleanup(socket: &Path, pid_file: &Path) -> Result<(), DaemonError> {
    let mut failures = Vec::new();
    match fs::remove_file(socket) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => failures.push(format!("unlink socket {}: {err}", socket.display())),
    }
    if let Err(err) = pidfile::remove_pid(pid_file) {
        failures.push(format!("unlink PID file {}: {err}", pid_file.display()));
    }

    if failures.is_empty() {
        tracing::info!("daemon stopped");
        Ok(())
    } else {
        Err(DaemonError::Lifecycle(format!(
            "shutdown cleanup failed: {}",
            failures.join("; ")
        )))
    }
}

fn spawn_signal_listener(shutdown: broadcast::Sender<()>) -> Result<(), DaemonError> {
    let mut sigterm =
        signal(SignalKind::terminate()).map_err(|e| io_err("SIGTERM handler", e))?;
    let mut sigint = signal(SignalKind::interrupt()).map_err(|e| io_err("SIGINT handler", e))?;
    tokio::spawn(async move {
        let mut shutdown_rx = shutdown.subscribe();
        tokio::select! {
            _ = shutdown_rx.recv() => {}
            _ = sigterm.recv() => {
                tracing::info!("received SIGTERM, shutting down");
                let _ = shutdown.send(());
            }
            _ = sigint.recv() => {
                tracing::info!("received SIGINT, shutting down");
                let _ = shutdown.send(());
            }
        }
    });
    Ok(())
}

// ---------------------------------------------------------------------------
// External stop path
// ---------------------------------------------------------------------------

/// Stop the daemon recorded in the default PID file.
pub fn stop_running_daemon(force: bool) -> Result<(), DaemonError> {
    stop_running_daemon_at(&paths::socket_path(), force)
}

/// Stop the daemon serving `socket`: SIGTERM, wait up to 3 s, and only
/// with `force` escalate to SIGKILL and wait another 2 s.
pub fn stop_running_daemon_at(socket: &Path, force: bool) -> Result<(), DaemonError> {
    let pid_file = paths::pid_path_for(socket);
    let pid = match pidfile::read_pid(&pid_file) {
        Ok(pid) => pid,
        Err(err) if pidfile::is_missing(&err) => {
            if protocol::is_running_at(socket) {
                return Err(DaemonError::Lifecycle(format!(
                    "daemon answers on {} but PID file {} is missing; stop it manually",
                    socket.display(),
                    pid_file.display()
                )));
            }
            return Ok(());
        }
        Err(err) => return Err(err),
    };

    if pid == std::process::id() as i32 {
        return Err(DaemonError::Lifecycle(
            "refusing to stop current process".to_string(),
        ));
    }

    if signal_daemon(pid, Signal::SIGTERM, &pid_file)? {
        return Ok(());
    }
    if wait_for_shutdown(socket, &pid_file, STOP_WAIT_TERM) {
        return Ok(());
    }
    if !force {
        return Err(DaemonError::Lifecycle(format!(
            "daemon process {pid} did not exit after SIGTERM"
        )));
    }

    if signal_daemon(pid, Signal::SIGKILL, &pid_file)? {
        return Ok(());
    }
    if wait_for_shutdown(socket, &pid_file, STOP_WAIT_KILL) {
        return Ok(());
    }
    Err(DaemonError::Lifecycle(format!(
        "daemon process {pid} did not exit after SIGKILL"
    )))
}

/// Returns `Ok(true)` when the process was already gone (stale PID file
/// cleaned up), `Ok(false)` when the signal was delivered.
fn signal_daemon(pid: i32, sig: Signal, pid_file: &Path) -> Result<bool, DaemonError> {
    match probe::send_signal(pid, sig) {
        Ok(()) => Ok(false),
        Err(DaemonError::Signal {
            source: Errno::ESRCH,
            ..
        }) => {
            let _ = pidfile::remove_pid(pid_file);
            Ok(true)
        }
        Err(err) => Err(err),
    }
}

fn wait_for_shutdown(socket: &Path, pid_file: &Path, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if !protocol::is_running_at(socket) {
            let _ = pidfile::remove_pid(pid_file);
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(STOP_POLL);
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn stale_socket_file_is_evicted() {
        let dir = TempDir::new().expect("tempdir");
        let socket = dir.path().join("goproc.sock");
        fs::write(&socket, b"").expect("fake stale socket");

        prepare_socket_for_bind(&socket).expect("stale eviction");
        assert!(!socket.exists());
    }

    #[test]
    fn absent_socket_is_fine() {
        let dir = TempDir::new().expect("tempdir");
        prepare_socket_for_bind(&dir.path().join("goproc.sock")).expect("no-op");
    }

    #[test]
    fn stop_without_pid_file_or_daemon_is_a_no_op() {
        let dir = TempDir::new().expect("tempdir");
        let socket = dir.path().join("goproc.sock");
        stop_running_daemon_at(&socket, false).expect("nothing to stop");
    }

    #[test]
    fn stop_refuses_own_pid() {
        let dir = TempDir::new().expect("tempdir");
        let socket = dir.path().join("goproc.sock");
        pidfile::write_pid(
            &paths::pid_path_for(&socket),
            std::process::id() as i32,
        )
        .expect("write pid");

        let err = stop_running_daemon_at(&socket, false).unwrap_err();
        assert!(matches!(err, DaemonError::Lifecycle(_)), "got: {err}");
        assert!(err.to_string().contains("current process"));
    }

    #[test]
    fn stop_cleans_up_a_stale_pid_file() {
        let dir = TempDir::new().expect("tempdir");
        let socket = dir.path().join("goproc.sock");
        let pid_file = paths::pid_path_for(&socket);
        // A pid that certainly is not running.
        pidfile::write_pid(&pid_file, 1_999_999_998).expect("write pid");

        stop_running_daemon_at(&socket, false).expect("stale pid handled");
        assert!(!pid_file.exists(), "stale PID file removed");
    }

    #[test]
    fn cleanup_reports_joined_failures() {
        let dir = TempDir::new().expect("tempdir");
        // Both paths absent: unlink is a no-op, not a failure.
        cleanup(&dir.path().join("a.sock"), &dir.path().join("a.pid")).expect("cleanup");
    }
}
