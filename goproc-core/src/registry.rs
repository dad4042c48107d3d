//! Thread-safe indexed catalog of tracked processes.
//!
//! One reader-writer lock guards the primary map and every secondary index;
//! they mutate together or not at all. The lock is never held across
//! snapshot I/O: mutations release it, then write the snapshot under a
//! dedicated save mutex. Saves are best-effort; a failed write is logged
//! and the in-memory state stays authoritative.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::Utc;

use crate::error::RegistryError;
use crate::names;
use crate::snapshot::{self, Snapshot, SNAPSHOT_VERSION};
use crate::types::{LabelKind, ListFilter, Proc, ProcId};

/// Interval between persisted `last_seen` bumps while a process stays alive.
pub const DEFAULT_LAST_SEEN_INTERVAL: Duration = Duration::from_secs(30);

/// Parameters for registering one process.
#[derive(Debug, Clone, Default)]
pub struct AddProc {
    pub pid: i32,
    pub pgid: i32,
    pub cmd: String,
    pub name: String,
    pub tags: Vec<String>,
    pub groups: Vec<String>,
}

/// Result of [`Registry::add`]: the record's id, and whether the pid was
/// already tracked (in which case nothing was mutated).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOutcome {
    pub id: ProcId,
    pub existed: bool,
}

#[derive(Debug)]
struct Indexes {
    next_id: u64,
    by_id: BTreeMap<ProcId, Proc>,
    by_pid: HashMap<i32, ProcId>,
    by_name: HashMap<String, ProcId>,
    by_tag: HashMap<String, BTreeSet<ProcId>>,
    by_group: HashMap<String, BTreeSet<ProcId>>,
}

impl Indexes {
    fn new() -> Self {
        Self {
            next_id: 1,
            by_id: BTreeMap::new(),
            by_pid: HashMap::new(),
            by_name: HashMap::new(),
            by_tag: HashMap::new(),
            by_group: HashMap::new(),
        }
    }

    fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut indexes = Self::new();
        for proc in snapshot.procs {
            indexes.install(proc);
        }
        // next_id must exceed every loaded id even if the stored counter
        // went backwards (e.g. a hand-edited snapshot).
        let max_id = indexes.by_id.keys().next_back().map_or(0, |id| id.0);
        indexes.next_id = snapshot.next_id.max(max_id + 1);
        indexes
    }

    /// Insert `proc` into the primary map and every secondary index.
    fn install(&mut self, proc: Proc) {
        let id = proc.id;
        self.by_pid.insert(proc.pid, id);
        if !proc.name.is_empty() {
            self.by_name.insert(proc.name.clone(), id);
        }
        for tag in &proc.tags {
            self.by_tag.entry(tag.clone()).or_default().insert(id);
        }
        for group in &proc.groups {
            self.by_group.entry(group.clone()).or_default().insert(id);
        }
        self.by_id.insert(id, proc);
    }
}

/// The single source of truth for live catalog state.
pub struct Registry {
    inner: RwLock<Indexes>,
    save_lock: Mutex<()>,
    snapshot_path: Option<PathBuf>,
    last_seen_interval: chrono::Duration,
}

impl Registry {
    /// Build a registry, loading `snapshot_path` when it exists.
    ///
    /// A missing snapshot file yields an empty registry; an unreadable or
    /// undecodable one is fatal. Secondary indexes are rebuilt from the
    /// decoded records.
    pub fn new(
        snapshot_path: Option<PathBuf>,
        last_seen_interval: Duration,
    ) -> Result<Self, RegistryError> {
        let interval = if last_seen_interval.is_zero() {
            DEFAULT_LAST_SEEN_INTERVAL
        } else {
            last_seen_interval
        };

        let mut indexes = Indexes::new();
        if let Some(path) = &snapshot_path {
            if let Some(snapshot) = snapshot::load(path)? {
                indexes = Indexes::from_snapshot(snapshot);
            }
        }

        Ok(Self {
            inner: RwLock::new(indexes),
            save_lock: Mutex::new(()),
            snapshot_path,
            last_seen_interval: chrono::Duration::milliseconds(interval.as_millis() as i64),
        })
    }

    /// Where this registry persists itself, if anywhere.
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    /// Register an existing OS process.
    ///
    /// An already-tracked pid returns its record's id with `existed: true`
    /// and mutates nothing. A non-empty name colliding with another record
    /// fails with [`RegistryError::NameConflict`].
    pub fn add(&self, params: AddProc) -> Result<AddOutcome, RegistryError> {
        if params.pid <= 0 {
            return Err(RegistryError::InvalidPid(params.pid));
        }
        let name = names::normalize_name(&params.name)?;

        let outcome = {
            let mut inner = self.write();
            if let Some(&id) = inner.by_pid.get(&params.pid) {
                return Ok(AddOutcome { id, existed: true });
            }
            if !name.is_empty() {
                if let Some(&existing) = inner.by_name.get(&name) {
                    return Err(RegistryError::NameConflict { name, existing });
                }
            }

            let id = ProcId(inner.next_id);
            inner.next_id += 1;
            let now = Utc::now();
            inner.install(Proc {
                id,
                pid: params.pid,
                pgid: params.pgid,
                cmd: params.cmd,
                name,
                // Optimistic; the liveness watcher corrects this later.
                alive: true,
                added_at: now,
                last_seen: now,
                tags: normalize_labels(&params.tags),
                groups: normalize_labels(&params.groups),
            });
            AddOutcome { id, existed: false }
        };

        self.schedule_save();
        Ok(outcome)
    }

    /// Add labels to a record. Unknown labels are created; duplicates and
    /// empties are dropped.
    pub fn add_labels(
        &self,
        id: ProcId,
        kind: LabelKind,
        add: &[String],
    ) -> Result<(), RegistryError> {
        {
            let mut inner = self.write();
            let (by_id, index) = inner.split_for(kind);
            let proc = by_id.get_mut(&id).ok_or(RegistryError::NotFound(id))?;
            for label in normalize_labels(add) {
                if proc_labels_mut(proc, kind).insert(label.clone()) {
                    index.entry(label).or_default().insert(id);
                }
            }
        }
        self.schedule_save();
        Ok(())
    }

    /// Remove labels from a record, pruning index buckets that empty out.
    pub fn remove_labels(
        &self,
        id: ProcId,
        kind: LabelKind,
        remove: &[String],
    ) -> Result<(), RegistryError> {
        {
            let mut inner = self.write();
            let (by_id, index) = inner.split_for(kind);
            let proc = by_id.get_mut(&id).ok_or(RegistryError::NotFound(id))?;
            for label in normalize_labels(remove) {
                if proc_labels_mut(proc, kind).remove(&label) {
                    prune_bucket(index, &label, id);
                }
            }
        }
        self.schedule_save();
        Ok(())
    }

    /// Rename a label across every record carrying it; returns how many
    /// records were touched. Empty endpoints or `from == to` are a no-op.
    pub fn rename_label(&self, kind: LabelKind, from: &str, to: &str) -> usize {
        let from = from.trim();
        let to = to.trim();
        if from.is_empty() || to.is_empty() || from == to {
            return 0;
        }

        let count = {
            let mut inner = self.write();
            let (by_id, index) = inner.split_for(kind);
            let Some(ids) = index.remove(from) else {
                return 0;
            };
            let mut count = 0;
            for id in &ids {
                if let Some(proc) = by_id.get_mut(id) {
                    let labels = proc_labels_mut(proc, kind);
                    if labels.remove(from) {
                        labels.insert(to.to_string());
                        count += 1;
                    }
                }
            }
            index.entry(to.to_string()).or_default().extend(ids);
            count
        };

        if count > 0 {
            self.schedule_save();
        }
        count
    }

    /// Update the alive flag and (rate-limited) `last_seen`.
    ///
    /// Returns whether anything changed; a snapshot is scheduled only then,
    /// keeping writes bounded when the watcher sees a steady state.
    pub fn set_alive(&self, id: ProcId, alive: bool) -> bool {
        let changed = {
            let mut inner = self.write();
            let Some(proc) = inner.by_id.get_mut(&id) else {
                return false;
            };
            let mut changed = false;
            if proc.alive != alive {
                proc.alive = alive;
                changed = true;
            }
            if alive {
                let now = Utc::now();
                if proc.last_seen.timestamp() == 0
                    || now.signed_duration_since(proc.last_seen) >= self.last_seen_interval
                {
                    proc.last_seen = now;
                    changed = true;
                }
            }
            changed
        };

        if changed {
            self.schedule_save();
        }
        changed
    }

    /// Delete a record from every index; returns whether it existed.
    pub fn remove(&self, id: ProcId) -> bool {
        {
            let mut inner = self.write();
            let Some(proc) = inner.by_id.remove(&id) else {
                return false;
            };
            inner.by_pid.remove(&proc.pid);
            if !proc.name.is_empty() {
                inner.by_name.remove(&proc.name);
            }
            for tag in &proc.tags {
                prune_bucket(&mut inner.by_tag, tag, id);
            }
            for group in &proc.groups {
                prune_bucket(&mut inner.by_group, group, id);
            }
        }
        self.schedule_save();
        true
    }

    /// Clear all state and restart the id counter at 1.
    pub fn reset(&self) {
        {
            let mut inner = self.write();
            *inner = Indexes::new();
        }
        self.schedule_save();
    }

    /// Deep copy of one record, if present.
    pub fn get(&self, id: ProcId) -> Option<Proc> {
        self.read().by_id.get(&id).cloned()
    }

    /// Matching records as deep copies, sorted ascending by id.
    pub fn list(&self, filter: &ListFilter) -> Vec<Proc> {
        self.read()
            .by_id
            .values()
            .filter(|proc| filter.matches(proc))
            .cloned()
            .collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, Indexes> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Indexes> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Best-effort snapshot write, serialized on `save_lock` and taken from
    /// a fresh shared-lock view of the state.
    fn schedule_save(&self) {
        let Some(path) = &self.snapshot_path else {
            return;
        };
        let snapshot = {
            let inner = self.read();
            Snapshot {
                version: SNAPSHOT_VERSION,
                next_id: inner.next_id,
                created_unix: Utc::now().timestamp(),
                procs: inner.by_id.values().cloned().collect(),
            }
        };
        let _guard = self.save_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = snapshot::save(path, &snapshot) {
            tracing::warn!(path = %path.display(), error = %err, "registry snapshot failed");
        }
    }
}

impl Indexes {
    /// Split borrows so a record and its label index mutate together.
    fn split_for(
        &mut self,
        kind: LabelKind,
    ) -> (
        &mut BTreeMap<ProcId, Proc>,
        &mut HashMap<String, BTreeSet<ProcId>>,
    ) {
        match kind {
            LabelKind::Tag => (&mut self.by_id, &mut self.by_tag),
            LabelKind::Group => (&mut self.by_id, &mut self.by_group),
        }
    }
}

fn proc_labels_mut(proc: &mut Proc, kind: LabelKind) -> &mut BTreeSet<String> {
    match kind {
        LabelKind::Tag => &mut proc.tags,
        LabelKind::Group => &mut proc.groups,
    }
}

/// Drop `id` from the label's bucket, deleting the bucket once empty so no
/// empty sets linger in the index.
fn prune_bucket(index: &mut HashMap<String, BTreeSet<ProcId>>, label: &str, id: ProcId) {
    if let Some(bucket) = index.get_mut(label) {
        bucket.remove(&id);
        if bucket.is_empty() {
            index.remove(label);
        }
    }
}

/// Trim labels, drop empties, collapse duplicates.
fn normalize_labels(labels: &[String]) -> BTreeSet<String> {
    labels
        .iter()
        .map(|label| label.trim())
        .filter(|label| !label.is_empty())
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
