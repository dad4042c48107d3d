//! Well-known filesystem locations for the daemon rendezvous.
//!
//! The socket path anchors everything else: the PID file and the registry
//! snapshot are siblings in the same runtime directory.
//!
//! Socket path precedence (first non-empty wins):
//! 1. `GOPROC_SOCKET` — explicit socket path.
//! 2. `GOPROC_RUNTIME_DIR` joined with `goproc.sock`.
//! 3. Linux: `$XDG_RUNTIME_DIR/goproc.sock`, else `/run/user/<uid>/goproc.sock`.
//! 4. Elsewhere: `/tmp/goproc-<uid>.sock` (short, to stay inside sun_path).

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{io_err, DaemonError};

pub const SOCKET_FILE: &str = "goproc.sock";
pub const PID_FILE: &str = "goproc.pid";
pub const SNAPSHOT_FILE: &str = "goproc.registry.json";

pub const ENV_SOCKET: &str = "GOPROC_SOCKET";
pub const ENV_RUNTIME_DIR: &str = "GOPROC_RUNTIME_DIR";

/// Resolve the rendezvous socket path for the current environment.
pub fn socket_path() -> PathBuf {
    if let Some(explicit) = env_path(ENV_SOCKET) {
        return explicit;
    }
    if let Some(dir) = env_path(ENV_RUNTIME_DIR) {
        return dir.join(SOCKET_FILE);
    }
    default_socket_path()
}

#[cfg(target_os = "linux")]
fn default_socket_path() -> PathBuf {
    if let Some(dir) = env_path("XDG_RUNTIME_DIR") {
        return dir.join(SOCKET_FILE);
    }
    Path::new("/run/user").join(uid_string()).join(SOCKET_FILE)
}

#[cfg(not(target_os = "linux"))]
fn default_socket_path() -> PathBuf {
    PathBuf::from("/tmp").join(format!("goproc-{}.sock", uid_string()))
}

/// `goproc.pid` next to the socket.
pub fn pid_path() -> PathBuf {
    pid_path_for(&socket_path())
}

/// `goproc.pid` next to an explicit socket path.
pub fn pid_path_for(socket: &Path) -> PathBuf {
    runtime_dir_of(socket).join(PID_FILE)
}

/// `goproc.registry.json` next to the socket.
pub fn snapshot_path() -> PathBuf {
    snapshot_path_for(&socket_path())
}

/// `goproc.registry.json` next to an explicit socket path.
pub fn snapshot_path_for(socket: &Path) -> PathBuf {
    runtime_dir_of(socket).join(SNAPSHOT_FILE)
}

/// Create the socket's containing directory with mode `0700` if absent.
pub fn ensure_runtime_dir(socket: &Path) -> Result<PathBuf, DaemonError> {
    let dir = runtime_dir_of(socket);
    if !dir.exists() {
        fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        set_dir_permissions(&dir)?;
    }
    Ok(dir)
}

fn runtime_dir_of(socket: &Path) -> PathBuf {
    socket
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn uid_string() -> String {
    nix::unistd::getuid().to_string()
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700)).map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // socket_path() reads process-global env; keep these tests serial.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        env::remove_var(ENV_SOCKET);
        env::remove_var(ENV_RUNTIME_DIR);
    }

    #[test]
    fn explicit_socket_env_wins() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        env::set_var(ENV_SOCKET, "/custom/place/my.sock");
        env::set_var(ENV_RUNTIME_DIR, "/should/not/matter");
        let path = socket_path();
        clear_env();
        assert_eq!(path, PathBuf::from("/custom/place/my.sock"));
    }

    #[test]
    fn runtime_dir_env_is_joined_with_socket_name() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        env::set_var(ENV_RUNTIME_DIR, "/var/run/goproc");
        let path = socket_path();
        clear_env();
        assert_eq!(path, PathBuf::from("/var/run/goproc").join(SOCKET_FILE));
    }

    #[test]
    fn companion_files_share_the_socket_directory() {
        let socket = Path::new("/run/user/1000/goproc.sock");
        assert_eq!(pid_path_for(socket), Path::new("/run/user/1000/goproc.pid"));
        assert_eq!(
            snapshot_path_for(socket),
            Path::new("/run/user/1000/goproc.registry.json")
        );
    }

    #[cfg(unix)]
    #[test]
    fn ensure_runtime_dir_creates_private_directory() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let socket = tmp.path().join("nested").join(SOCKET_FILE);
        let dir = ensure_runtime_dir(&socket).expect("ensure");
        assert!(dir.is_dir());
        let mode = fs::metadata(&dir).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }
}
