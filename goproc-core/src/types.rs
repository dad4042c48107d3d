//! Domain types for the goproc registry.
//!
//! A [`Proc`] describes one externally spawned OS process tracked by the
//! daemon. Label sets are `BTreeSet<String>` so serialized output is always
//! in canonical ascending order.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Stable registry identifier for a tracked process.
///
/// Monotonically increasing, never reused within a registry generation;
/// only [`Registry::reset`](crate::registry::Registry::reset) starts over.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct ProcId(pub u64);

impl fmt::Display for ProcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for ProcId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One tracked process entry. Immutable outside registry methods; registry
/// queries hand out deep copies, never references into the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proc {
    pub id: ProcId,
    /// OS process id. Always positive for stored records.
    pub pid: i32,
    /// OS process group id; 0 when unknown.
    pub pgid: i32,
    /// Best-effort human-readable command line.
    pub cmd: String,
    /// Optional unique name; empty when unset.
    #[serde(default)]
    pub name: String,
    pub alive: bool,
    pub added_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub groups: BTreeSet<String>,
}

/// Which of the two user-defined label namespaces an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelKind {
    Tag,
    Group,
}

impl fmt::Display for LabelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelKind::Tag => write!(f, "tag"),
            LabelKind::Group => write!(f, "group"),
        }
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Conjunction of predicates narrowing a registry listing.
///
/// Every populated predicate must match for a record to be included; an
/// empty filter matches everything. Set-valued predicates (`ids`, `pids`,
/// `names`) match by membership; `*_any` by non-empty intersection with the
/// record's label set; `*_all` by subset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListFilter {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<ProcId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pids: Vec<i32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags_any: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags_all: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups_any: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups_all: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub alive_only: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text_search: String,
}

impl ListFilter {
    /// True when no predicate is populated (whitespace-only `text_search`
    /// counts as empty, matching its trim-before-match semantics).
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
            && self.pids.is_empty()
            && self.names.is_empty()
            && self.tags_any.is_empty()
            && self.tags_all.is_empty()
            && self.groups_any.is_empty()
            && self.groups_all.is_empty()
            && !self.alive_only
            && self.text_search.trim().is_empty()
    }

    /// Whether `proc` satisfies every populated predicate.
    pub fn matches(&self, proc: &Proc) -> bool {
        if !self.ids.is_empty() && !self.ids.contains(&proc.id) {
            return false;
        }
        if !self.pids.is_empty() && !self.pids.contains(&proc.pid) {
            return false;
        }
        if !self.names.is_empty() && !self.names.iter().any(|n| *n == proc.name) {
            return false;
        }
        if !self.tags_any.is_empty() && !self.tags_any.iter().any(|t| proc.tags.contains(t)) {
            return false;
        }
        if !self.tags_all.iter().all(|t| proc.tags.contains(t)) {
            return false;
        }
        if !self.groups_any.is_empty() && !self.groups_any.iter().any(|g| proc.groups.contains(g)) {
            return false;
        }
        if !self.groups_all.iter().all(|g| proc.groups.contains(g)) {
            return false;
        }
        if self.alive_only && !proc.alive {
            return false;
        }
        let needle = self.text_search.trim();
        if !needle.is_empty() && !proc.cmd.contains(needle) {
            return false;
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
