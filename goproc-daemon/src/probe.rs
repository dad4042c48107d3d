//! OS probing helpers: liveness checks, process-group lookup, command-line
//! recovery, and signal delivery.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use crate::error::DaemonError;

/// Zero-signal probe: true iff the pid exists and we may signal it.
pub fn pid_alive(pid: i32) -> bool {
    kill(Pid::from_raw(pid), None).is_ok()
}

/// Process group of `pid`, or 0 when unavailable.
pub fn pgid_of(pid: i32) -> i32 {
    nix::unistd::getpgid(Some(Pid::from_raw(pid)))
        .map(Pid::as_raw)
        .unwrap_or(0)
}

/// Deliver `signal` to `target` (a pid, or a negated pgid for group kills).
pub fn send_signal(target: i32, signal: Signal) -> Result<(), DaemonError> {
    kill(Pid::from_raw(target), signal).map_err(|source| DaemonError::Signal { target, source })
}

/// Best-effort human-readable command line for `pid`.
///
/// Tries `/proc/<pid>/cmdline`, then `ps -o command=`, then falls back to a
/// `pid:<n>` placeholder. Cannot fail.
pub fn command_line(pid: i32) -> String {
    if pid <= 0 {
        return format!("pid:{pid}");
    }
    if let Some(cmd) = read_proc_cmdline(pid) {
        return cmd;
    }
    if let Some(cmd) = read_ps_command(pid) {
        return cmd;
    }
    format!("pid:{pid}")
}

fn read_proc_cmdline(pid: i32) -> Option<String> {
    let path = PathBuf::from("/proc").join(pid.to_string()).join("cmdline");
    let data = fs::read(path).ok()?;
    let cmd = data
        .split(|byte| *byte == 0)
        .filter(|part| !part.is_empty())
        .map(|part| String::from_utf8_lossy(part).into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    (!cmd.is_empty()).then_some(cmd)
}

fn read_ps_command(pid: i32) -> Option<String> {
    let output = Command::new("ps")
        .args(["-o", "command=", "-p"])
        .arg(pid.to_string())
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let cmd = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!cmd.is_empty()).then_some(cmd)
}
