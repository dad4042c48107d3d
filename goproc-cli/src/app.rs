//! High-level controller facade shared by every command.
//!
//! [`Controller`] is the capability surface the command tree programs
//! against; [`App`] implements it over the daemon's wire client. The wire
//! itself sits behind the small [`Transport`] seam so tests can inject a
//! fake daemon.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde_json::Value;

use goproc_core::{LabelKind, ListFilter, Proc};
use goproc_daemon::{paths, pidfile, protocol, server, Config, DaemonError, ErrorKind, Request};

// ---------------------------------------------------------------------------
// Wire seam
// ---------------------------------------------------------------------------

/// Minimal daemon transport; the real one speaks the Unix socket.
pub trait Transport {
    fn request(&self, request: Request, timeout: Duration) -> Result<Value, DaemonError>;
    fn is_running(&self) -> bool;
}

/// Production transport over the rendezvous socket.
pub struct SocketTransport;

impl Transport for SocketTransport {
    fn request(&self, request: Request, timeout: Duration) -> Result<Value, DaemonError> {
        protocol::send_request(&request, timeout)?.into_data()
    }

    fn is_running(&self) -> bool {
        protocol::is_running()
    }
}

// ---------------------------------------------------------------------------
// Operation parameters and reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct AddParams {
    pub pid: i32,
    pub name: String,
    pub tags: Vec<String>,
    pub groups: Vec<String>,
}

/// Outcome of an add: a fresh registration, or a soft conflict report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Registered { id: u64 },
    AlreadyExists { reason: String },
}

/// A filter plus the `--all` escape hatch for multi-match bulk operations.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub filter: ListFilter,
    pub all: bool,
}

#[derive(Debug, Default)]
pub struct RemoveReport {
    pub removed: Vec<Proc>,
}

#[derive(Debug)]
pub struct KillFailure {
    pub proc: Proc,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct KillReport {
    pub matched: usize,
    pub alive: usize,
    pub killed: Vec<Proc>,
    pub failures: Vec<KillFailure>,
}

#[derive(Debug, Clone, Default)]
pub struct LabelParams {
    pub name: String,
    pub rename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameInfo {
    pub from: String,
    pub to: String,
    pub updated: u64,
}

#[derive(Debug)]
pub struct LabelReport {
    /// The label that was listed (the new name after a rename).
    pub label: String,
    pub renamed: Option<RenameInfo>,
    pub procs: Vec<Proc>,
}

#[derive(Debug, Clone)]
pub struct DaemonStatus {
    pub running: bool,
    pub pid: Option<i32>,
    pub socket: PathBuf,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Everything a front-end can ask of the daemon.
pub trait Controller {
    fn ping(&self) -> Result<String>;
    fn add(&self, params: AddParams) -> Result<AddOutcome>;
    fn list(&self, filter: ListFilter) -> Result<Vec<Proc>>;
    fn remove(&self, selection: Selection) -> Result<RemoveReport>;
    fn kill(&self, selection: Selection) -> Result<KillReport>;
    fn tag(&self, params: LabelParams) -> Result<LabelReport>;
    fn group(&self, params: LabelParams) -> Result<LabelReport>;
    fn reset(&self, confirmed: bool) -> Result<()>;
    fn status(&self) -> Result<DaemonStatus>;
    fn stop_daemon(&self, force: bool) -> Result<()>;
    fn start_daemon(&self, config: Config) -> Result<()>;
}

/// The daemon-backed controller.
pub struct App<T: Transport = SocketTransport> {
    transport: T,
    timeout: Duration,
}

impl App<SocketTransport> {
    pub fn new(timeout: Duration) -> Self {
        Self::with_transport(SocketTransport, timeout)
    }
}

impl<T: Transport> App<T> {
    pub fn with_transport(transport: T, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    fn request(&self, request: Request) -> Result<Value, DaemonError> {
        self.transport.request(request, self.timeout)
    }

    fn label_op(&self, kind: LabelKind, params: LabelParams) -> Result<LabelReport> {
        let mut label = params.name.trim().to_string();
        if label.is_empty() {
            bail!("{kind} must not be empty");
        }

        let mut renamed = None;
        let rename = params
            .rename
            .as_deref()
            .map(str::trim)
            .filter(|to| !to.is_empty());
        if let Some(to) = rename {
            let request = match kind {
                LabelKind::Tag => Request::RenameTag {
                    from: label.clone(),
                    to: to.to_string(),
                },
                LabelKind::Group => Request::RenameGroup {
                    from: label.clone(),
                    to: to.to_string(),
                },
            };
            let data = self
                .request(request)
                .with_context(|| format!("daemon rename {kind} RPC failed"))?;
            let updated = data["updated"].as_u64().context("malformed rename reply")?;
            renamed = Some(RenameInfo {
                from: label.clone(),
                to: to.to_string(),
                updated,
            });
            label = to.to_string();
        }

        let filter = match kind {
            LabelKind::Tag => ListFilter {
                tags_all: vec![label.clone()],
                ..Default::default()
            },
            LabelKind::Group => ListFilter {
                groups_all: vec![label.clone()],
                ..Default::default()
            },
        };
        let procs = self.list(filter)?;
        Ok(LabelReport {
            label,
            renamed,
            procs,
        })
    }

    fn guard_selectors(selection: &Selection) -> Result<()> {
        if !selection.all && selection.filter.is_empty() {
            bail!(
                "provide at least one selector \
                 (--id/--pid/--name/--tag/--group/--search) or pass --all"
            );
        }
        Ok(())
    }
}

impl<T: Transport> Controller for App<T> {
    fn ping(&self) -> Result<String> {
        let data = self
            .request(Request::Ping)
            .context("daemon ping RPC failed")?;
        data.as_str()
            .map(str::to_string)
            .context("malformed ping reply")
    }

    fn add(&self, params: AddParams) -> Result<AddOutcome> {
        if params.pid <= 0 {
            bail!("invalid pid {}", params.pid);
        }
        let request = Request::Add {
            pid: params.pid,
            name: params.name.trim().to_string(),
            tags: params.tags,
            groups: params.groups,
        };
        match self.request(request) {
            Ok(data) => {
                let id = data["id"].as_u64().context("malformed add reply")?;
                Ok(AddOutcome::Registered { id })
            }
            Err(DaemonError::Rpc(rpc)) if rpc.kind == ErrorKind::AlreadyExists => {
                Ok(AddOutcome::AlreadyExists {
                    reason: rpc.message,
                })
            }
            Err(err) => Err(err).context("daemon add RPC failed"),
        }
    }

    fn list(&self, filter: ListFilter) -> Result<Vec<Proc>> {
        let data = self
            .request(Request::List { filter })
            .context("daemon list RPC failed")?;
        serde_json::from_value(data["procs"].clone()).context("malformed list reply")
    }

    fn remove(&self, selection: Selection) -> Result<RemoveReport> {
        Self::guard_selectors(&selection)?;
        let procs = self.list(selection.filter)?;
        if procs.is_empty() {
            return Ok(RemoveReport::default());
        }
        if procs.len() > 1 && !selection.all {
            bail!(
                "multiple processes match (ids: {}); use --all to remove all \
                 or narrow the selection",
                sample_ids(&procs)
            );
        }

        let mut removed = Vec::with_capacity(procs.len());
        for proc in procs {
            self.request(Request::Rm { id: proc.id.0 })
                .with_context(|| format!("remove id {} failed", proc.id))?;
            removed.push(proc);
        }
        Ok(RemoveReport { removed })
    }

    fn kill(&self, selection: Selection) -> Result<KillReport> {
        Self::guard_selectors(&selection)?;
        let procs = self.list(selection.filter)?;
        let mut report = KillReport {
            matched: procs.len(),
            ..Default::default()
        };

        let alive: Vec<Proc> = procs.into_iter().filter(|p| p.alive).collect();
        report.alive = alive.len();
        if alive.is_empty() {
            return Ok(report);
        }
        if alive.len() > 1 && !selection.all {
            bail!(
                "multiple alive processes match (ids: {}); use --all to \
                 terminate all or narrow the selection",
                sample_ids(&alive)
            );
        }

        for proc in alive {
            if let Err(err) = self.request(Request::Kill {
                id: Some(proc.id.0),
                pid: None,
            }) {
                report.failures.push(KillFailure {
                    proc,
                    error: format!("kill RPC failed: {err}"),
                });
                continue;
            }
            if let Err(err) = self.request(Request::Rm { id: proc.id.0 }) {
                report.failures.push(KillFailure {
                    proc,
                    error: format!("remove after kill failed: {err}"),
                });
                continue;
            }
            report.killed.push(proc);
        }
        Ok(report)
    }

    fn tag(&self, params: LabelParams) -> Result<LabelReport> {
        self.label_op(LabelKind::Tag, params)
    }

    fn group(&self, params: LabelParams) -> Result<LabelReport> {
        self.label_op(LabelKind::Group, params)
    }

    fn reset(&self, confirmed: bool) -> Result<()> {
        if !confirmed {
            bail!("destructive command: pass --yes to confirm wiping the registry");
        }
        self.request(Request::Reset)
            .context("daemon reset RPC failed")?;
        Ok(())
    }

    fn status(&self) -> Result<DaemonStatus> {
        let socket = paths::socket_path();
        if !self.transport.is_running() {
            return Ok(DaemonStatus {
                running: false,
                pid: None,
                socket,
            });
        }
        let pid = pidfile::read_pid(&paths::pid_path()).ok();
        Ok(DaemonStatus {
            running: true,
            pid,
            socket,
        })
    }

    fn stop_daemon(&self, force: bool) -> Result<()> {
        server::stop_running_daemon(force).context("failed to stop daemon")
    }

    fn start_daemon(&self, config: Config) -> Result<()> {
        goproc_daemon::start_blocking(config).context("daemon exited with error")
    }
}

fn sample_ids(procs: &[Proc]) -> String {
    const LIMIT: usize = 5;
    let mut ids: Vec<String> = procs.iter().take(LIMIT).map(|p| p.id.to_string()).collect();
    if procs.len() > LIMIT {
        ids.push("...".to_string());
    }
    ids.join(", ")
}

// ---------------------------------------------------------------------------
// Tests: App over a scripted fake daemon
// ---------------------------------------------------------------------------
