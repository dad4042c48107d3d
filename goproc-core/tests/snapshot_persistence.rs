//! Registry persistence across restarts: snapshot write-on-mutation,
//! reload with index rebuild, and failure modes.

use std::fs;
use std::time::Duration;

use assert_fs::prelude::*;
use predicates::prelude::*;

use goproc_core::{
    AddProc, LabelKind, ListFilter, Registry, RegistryError, DEFAULT_LAST_SEEN_INTERVAL,
};

fn open(dir: &assert_fs::TempDir) -> Registry {
    Registry::new(
        Some(dir.path().join("goproc.registry.json")),
        DEFAULT_LAST_SEEN_INTERVAL,
    )
    .expect("registry")
}

fn add(reg: &Registry, pid: i32, name: &str, tags: &[&str]) -> goproc_core::ProcId {
    reg.add(AddProc {
        pid,
        pgid: pid,
        cmd: format!("worker --pid {pid}"),
        name: name.to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        ..Default::default()
    })
    .expect("add")
    .id
}

#[test]
fn mutations_write_a_snapshot_file() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let reg = open(&dir);
    dir.child("goproc.registry.json")
        .assert(predicate::path::missing());

    add(&reg, 100, "", &[]);
    dir.child("goproc.registry.json")
        .assert(predicate::path::exists());
    dir.child("goproc.registry.json.tmp")
        .assert(predicate::path::missing());
}

#[test]
fn records_survive_a_restart() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    {
        let reg = open(&dir);
        add(&reg, 100, "api", &["web", "v2"]);
        add(&reg, 200, "worker", &["jobs"]);
    }

    let reopened = open(&dir);
    let procs = reopened.list(&ListFilter::default());
    assert_eq!(procs.len(), 2);
    assert_eq!(procs[0].name, "api");
    assert_eq!(
        procs[0].tags.iter().cloned().collect::<Vec<_>>(),
        vec!["v2".to_string(), "web".to_string()],
        "label order is canonical ascending"
    );
    assert_eq!(procs[1].pid, 200);

    // Indexes were rebuilt, so lookups and uniqueness still work.
    let filtered = reopened.list(&ListFilter {
        tags_all: vec!["jobs".into()],
        ..Default::default()
    });
    assert_eq!(filtered.len(), 1);
    let err = reopened
        .add(AddProc { pid: 300, name: "api".into(), ..Default::default() })
        .unwrap_err();
    assert!(matches!(err, RegistryError::NameConflict { .. }), "got: {err}");

    // Fresh ids keep climbing past everything loaded.
    let next = add(&reopened, 300, "", &[]);
    assert!(next.0 > procs[1].id.0, "next_id must exceed loaded ids");
}

#[test]
fn restart_after_reset_is_empty_with_ids_from_one() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    {
        let reg = open(&dir);
        for pid in [100, 200, 300] {
            add(&reg, pid, "", &[]);
        }
        reg.reset();
    }

    let reopened = open(&dir);
    assert!(reopened.list(&ListFilter::default()).is_empty());
    let id = add(&reopened, 400, "", &[]);
    assert_eq!(id.0, 1, "reset snapshot restarts the counter");
}

#[test]
fn saved_records_roundtrip_exactly() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let reg = open(&dir);
    let id = add(&reg, 100, "api", &["web"]);
    reg.add_labels(id, LabelKind::Group, &["prod".to_string()])
        .expect("group");
    let before = reg.get(id).expect("record");

    let reopened = open(&dir);
    let after = reopened.get(id).expect("record");
    assert_eq!(before, after);
}

#[test]
fn unreadable_snapshot_fails_construction() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let path = dir.path().join("goproc.registry.json");
    fs::write(&path, b"\x00\x01 definitely not json").expect("write");

    let err = Registry::new(Some(path), DEFAULT_LAST_SEEN_INTERVAL)
        .err()
        .expect("construction must fail");
    assert!(matches!(err, RegistryError::Json(_)), "got: {err}");
}

#[test]
fn stored_next_id_is_raised_past_max_loaded_id() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let path = dir.path().join("goproc.registry.json");
    // A snapshot whose counter lags behind its own records.
    fs::write(
        &path,
        br#"{
  "version": 1,
  "next_id": 1,
  "created_unix": 0,
  "procs": [{
    "id": 7, "pid": 100, "pgid": 0, "cmd": "sleep 1", "name": "",
    "alive": false,
    "added_at": "2026-01-01T00:00:00Z",
    "last_seen": "2026-01-01T00:00:00Z"
  }]
}"#,
    )
    .expect("write");

    let reg = Registry::new(Some(path), DEFAULT_LAST_SEEN_INTERVAL).expect("registry");
    let id = reg
        .add(AddProc { pid: 200, ..Default::default() })
        .expect("add")
        .id;
    assert_eq!(id.0, 8, "fresh id must exceed the loaded maximum");
}

#[test]
fn snapshotless_registry_never_touches_disk() {
    let reg = Registry::new(None, Duration::from_secs(30)).expect("registry");
    add(&reg, 100, "", &["x"]);
    assert!(reg.snapshot_path().is_none());
}
