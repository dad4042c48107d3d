//! goproc core library — process catalog domain types, the indexed
//! registry, and snapshot persistence.
//!
//! Public API surface:
//! - [`types`] — [`ProcId`], [`Proc`], [`ListFilter`], [`LabelKind`]
//! - [`names`] — record name validation
//! - [`registry`] — the thread-safe [`Registry`]
//! - [`snapshot`] — versioned JSON load/save
//! - [`error`] — [`RegistryError`]

pub mod error;
pub mod names;
pub mod registry;
pub mod snapshot;
pub mod types;

pub use error::RegistryError;
pub use registry::{AddOutcome, AddProc, Registry, DEFAULT_LAST_SEEN_INTERVAL};
pub use types::{LabelKind, ListFilter, Proc, ProcId};
