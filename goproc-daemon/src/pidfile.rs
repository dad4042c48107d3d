//! PID file management: `<pid>\n`, written atomically with mode `0600`.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::{io_err, DaemonError};

/// Atomically store `pid` at `path` (tmp sibling + rename).
pub fn write_pid(path: &Path, pid: i32) -> Result<(), DaemonError> {
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    fs::write(&tmp, format!("{pid}\n")).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
    Ok(())
}

/// Read the stored pid. A missing file surfaces as an `Io` error with
/// `NotFound` kind so callers can branch on it.
pub fn read_pid(path: &Path) -> Result<i32, DaemonError> {
    let contents = fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    contents
        .trim()
        .parse()
        .map_err(|_| DaemonError::Protocol(format!("malformed PID file {}", path.display())))
}

/// Delete the PID file; a missing file is fine.
pub fn remove_pid(path: &Path) -> Result<(), DaemonError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(path, err)),
    }
}

/// Whether `err` is a missing-PID-file read failure.
pub fn is_missing(err: &DaemonError) -> bool {
    matches!(err, DaemonError::Io { source, .. } if source.kind() == ErrorKind::NotFound)
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_read_roundtrip() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("goproc.pid");
        write_pid(&path, 4242).expect("write");
        assert_eq!(fs::read_to_string(&path).expect("read"), "4242\n");
        assert_eq!(read_pid(&path).expect("read pid"), 4242);
        assert!(!path.with_file_name("goproc.pid.tmp").exists());
    }

    #[test]
    fn missing_file_is_detectable() {
        let dir = TempDir::new().expect("tempdir");
        let err = read_pid(&dir.path().join("goproc.pid")).unwrap_err();
        assert!(is_missing(&err), "got: {err}");
    }

    #[test]
    fn malformed_contents_are_a_protocol_error() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("goproc.pid");
        fs::write(&path, "not-a-pid\n").expect("write");
        let err = read_pid(&path).unwrap_err();
        assert!(matches!(err, DaemonError::Protocol(_)), "got: {err}");
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("goproc.pid");
        write_pid(&path, 1).expect("write");
        remove_pid(&path).expect("first remove");
        remove_pid(&path).expect("second remove is a no-op");
    }

    #[cfg(unix)]
    #[test]
    fn pid_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("goproc.pid");
        write_pid(&path, 7).expect("write");
        let mode = fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
