//! Daemon configuration: tunable intervals from an optional JSON file with
//! environment overrides on top.
//!
//! Precedence (last wins): built-in defaults, config file values,
//! `GOPROC_LIVENESS_INTERVAL` / `GOPROC_LAST_SEEN_INTERVAL` environment
//! variables. File errors are fatal; malformed env values are logged and
//! ignored.

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{io_err, DaemonError};

pub const DEFAULT_LIVENESS_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_LAST_SEEN_INTERVAL: Duration = Duration::from_secs(30);
/// The watcher never ticks faster than this, whatever the config says.
pub const MIN_LIVENESS_INTERVAL: Duration = Duration::from_secs(1);

pub const ENV_LIVENESS_INTERVAL: &str = "GOPROC_LIVENESS_INTERVAL";
pub const ENV_LAST_SEEN_INTERVAL: &str = "GOPROC_LAST_SEEN_INTERVAL";

/// Tunable timeouts/intervals for the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// How often the liveness watcher probes every tracked pid.
    pub liveness_interval: Duration,
    /// Minimum gap between persisted `last_seen` bumps for a live record.
    pub last_seen_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            liveness_interval: DEFAULT_LIVENESS_INTERVAL,
            last_seen_interval: DEFAULT_LAST_SEEN_INTERVAL,
        }
    }
}

/// Shape of the optional JSON config file; durations are strings like
/// `"15s"` or `"1m30s"`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    liveness_interval: Option<String>,
    last_seen_interval: Option<String>,
}

impl Config {
    /// Build a config from an optional file path plus env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, DaemonError> {
        let mut cfg = Self::default();
        if let Some(path) = path {
            cfg.apply_file(path)?;
        }
        cfg.apply_env();
        Ok(cfg)
    }

    fn apply_file(&mut self, path: &Path) -> Result<(), DaemonError> {
        let data = fs::read(path).map_err(|e| io_err(path, e))?;
        let raw: FileConfig = serde_json::from_slice(&data)?;
        if let Some(value) = raw.liveness_interval {
            self.liveness_interval = parse_positive(&value, "liveness_interval")?;
        }
        if let Some(value) = raw.last_seen_interval {
            self.last_seen_interval = parse_positive(&value, "last_seen_interval")?;
        }
        Ok(())
    }

    fn apply_env(&mut self) {
        apply_env_interval(ENV_LIVENESS_INTERVAL, &mut self.liveness_interval);
        apply_env_interval(ENV_LAST_SEEN_INTERVAL, &mut self.last_seen_interval);
    }
}

fn apply_env_interval(key: &str, slot: &mut Duration) {
    let Ok(raw) = env::var(key) else { return };
    if raw.is_empty() {
        return;
    }
    match parse_duration(&raw) {
        Ok(parsed) if !parsed.is_zero() => *slot = parsed,
        Ok(_) | Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring invalid duration override");
        }
    }
}

fn parse_positive(value: &str, field: &str) -> Result<Duration, DaemonError> {
    let parsed = parse_duration(value)
        .map_err(|err| DaemonError::Config(format!("parse {field}: {err}")))?;
    if parsed.is_zero() {
        return Err(DaemonError::Config(format!("{field} must be > 0")));
    }
    Ok(parsed)
}

/// Parse a compound duration string: one or more `<number><unit>` pieces
/// with units `ms`, `s`, `m`, `h` (e.g. `"500ms"`, `"15s"`, `"1m30s"`).
/// A bare number has no unit and is rejected.
pub fn parse_duration(input: &str) -> Result<Duration, DaemonError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DaemonError::Config("empty duration".to_string()));
    }

    let mut total = Duration::ZERO;
    let mut rest = trimmed;
    while !rest.is_empty() {
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(rest.len());
        let (digits, tail) = rest.split_at(digits_end);
        let value: f64 = digits
            .parse()
            .map_err(|_| DaemonError::Config(format!("invalid duration {input:?}")))?;

        let unit_end = tail
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(tail.len());
        let (unit, remainder) = tail.split_at(unit_end);
        let seconds = match unit {
            "ms" => value / 1_000.0,
            "s" => value,
            "m" => value * 60.0,
            "h" => value * 3_600.0,
            _ => {
                return Err(DaemonError::Config(format!(
                    "invalid duration {input:?}: unknown unit {unit:?}"
                )))
            }
        };
        let piece = Duration::try_from_secs_f64(seconds)
            .map_err(|_| DaemonError::Config(format!("duration {input:?} out of range")))?;
        total = total
            .checked_add(piece)
            .ok_or_else(|| DaemonError::Config(format!("duration {input:?} out of range")))?;
        rest = remainder;
    }
    Ok(total)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
