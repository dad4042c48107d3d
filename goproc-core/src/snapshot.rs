//! Snapshot persistence for the registry.
//!
//! One versioned JSON document holds the whole catalog. Saves go through a
//! `.tmp` sibling (same directory = same filesystem) followed by an atomic
//! rename, so a crash mid-write leaves the previous snapshot intact.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, RegistryError};
use crate::types::Proc;

/// Current on-disk schema version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// On-disk registry state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub next_id: u64,
    pub created_unix: i64,
    #[serde(default)]
    pub procs: Vec<Proc>,
}

/// Read a snapshot from `path`.
///
/// A nonexistent file is `Ok(None)` (fresh registry); any other I/O or
/// decode failure is an error. Version mismatches are accepted as-is;
/// migrations hook in here once the schema moves past version 1.
pub fn load(path: &Path) -> Result<Option<Snapshot>, RegistryError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_err(path, err)),
    };
    let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
    Ok(Some(snapshot))
}

/// Atomically write `snapshot` to `path`.
///
/// Creates the containing directory with mode `0700` if absent; the file
/// itself is written `0600`. The rename only replaces the previous snapshot
/// once the new bytes are fully on disk.
pub fn save(path: &Path, snapshot: &Snapshot) -> Result<(), RegistryError> {
    if let Some(dir) = path.parent() {
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
            set_dir_permissions(dir)?;
        }
    }

    let tmp = tmp_path(path);
    let json = serde_json::to_vec_pretty(snapshot)?;
    fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
    Ok(())
}

fn tmp_path(path: &Path) -> std::path::PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), RegistryError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), RegistryError> {
    Ok(())
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), RegistryError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700)).map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), RegistryError> {
    Ok(())
}
