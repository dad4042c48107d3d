//! Liveness watcher: periodically reconciles the registry's alive flags
//! with the operating system via zero-signal probes.
//!
//! The watcher never removes records; it only flips `alive` and lets the
//! registry rate-limit `last_seen` bumps. A pass that is underway when
//! shutdown arrives runs to completion, so no write is left half-done.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use goproc_core::{ListFilter, Registry};

use crate::config::MIN_LIVENESS_INTERVAL;
use crate::probe;

/// Run the watcher until the shutdown channel fires.
pub async fn run(
    registry: Arc<Registry>,
    interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let every = interval.max(MIN_LIVENESS_INTERVAL);
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.tick().await; // consume the immediate first tick

    tracing::debug!(interval_secs = every.as_secs_f64(), "liveness watcher started");
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => {
                let changed = refresh_liveness(&registry);
                if changed > 0 {
                    tracing::debug!(changed, "liveness pass updated records");
                }
            }
        }
    }
    tracing::debug!("liveness watcher stopped");
}

/// One probe pass over every tracked record; returns how many changed.
///
/// Zero-signal probes return immediately, so the whole pass is synchronous
/// and cheap.
pub fn refresh_liveness(registry: &Registry) -> usize {
    let mut changed = 0;
    for proc in registry.list(&ListFilter::default()) {
        if registry.set_alive(proc.id, probe::pid_alive(proc.pid)) {
            changed += 1;
        }
    }
    changed
}
