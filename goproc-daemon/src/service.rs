//! RPC service: validates requests, probes the OS where needed, and
//! translates everything else into registry calls.
//!
//! Only `add` reads OS state, only `kill` sends signals, and only mutating
//! methods cause snapshot writes (via the registry).

use std::sync::Arc;

use nix::sys::signal::Signal;
use serde_json::{json, Value};

use goproc_core::{AddProc, LabelKind, ListFilter, ProcId, Registry, RegistryError};

use crate::probe;
use crate::protocol::{Request, Response, RpcError, PONG};

/// Stateless-per-call dispatcher over the shared registry.
pub struct Service {
    registry: Arc<Registry>,
}

impl Service {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Dispatch one request to its handler and wrap the outcome.
    pub fn handle(&self, request: Request) -> Response {
        let result = match request {
            Request::Ping => Ok(json!(PONG)),
            Request::Add {
                pid,
                name,
                tags,
                groups,
            } => self.add(pid, name, tags, groups),
            Request::List { filter } => self.list(filter),
            Request::Kill { id, pid } => self.kill(id, pid),
            Request::Rm { id } => self.rm(id),
            Request::RenameTag { from, to } => self.rename(LabelKind::Tag, &from, &to),
            Request::RenameGroup { from, to } => self.rename(LabelKind::Group, &from, &to),
            Request::Reset => self.reset(),
        };
        match result {
            Ok(data) => Response::ok(data),
            Err(err) => Response::error(err),
        }
    }

    fn add(
        &self,
        pid: i32,
        name: String,
        tags: Vec<String>,
        groups: Vec<String>,
    ) -> Result<Value, RpcError> {
        if pid <= 0 {
            return Err(RpcError::invalid_argument("pid must be positive"));
        }
        if !probe::pid_alive(pid) {
            return Err(RpcError::not_found(format!(
                "pid {pid} not found or no permission"
            )));
        }

        // The process can still exit between this probe and the insert; the
        // record then stays alive=true until the next watcher pass.
        let params = AddProc {
            pid,
            pgid: probe::pgid_of(pid),
            cmd: probe::command_line(pid),
            name,
            tags,
            groups,
        };
        match self.registry.add(params) {
            Ok(outcome) if outcome.existed => Err(RpcError::already_exists(format!(
                "pid {pid} already registered as id {}",
                outcome.id
            ))),
            Ok(outcome) => {
                tracing::info!(pid, id = %outcome.id, "registered process");
                Ok(json!({ "id": outcome.id }))
            }
            Err(err @ RegistryError::NameConflict { .. }) => {
                Err(RpcError::already_exists(err.to_string()))
            }
            Err(
                err @ (RegistryError::InvalidName { .. } | RegistryError::InvalidPid(_)),
            ) => Err(RpcError::invalid_argument(err.to_string())),
            Err(err) => Err(RpcError::internal(err.to_string())),
        }
    }

    fn list(&self, filter: ListFilter) -> Result<Value, RpcError> {
        validate_filter(&filter)?;
        let procs = self.registry.list(&filter);
        Ok(json!({ "procs": procs }))
    }

    fn kill(&self, id: Option<u64>, pid: Option<i32>) -> Result<Value, RpcError> {
        let (pid, pgid) = match (id, pid) {
            (Some(id), None) => {
                let proc = self
                    .registry
                    .get(ProcId(id))
                    .ok_or_else(|| RpcError::not_found(format!("proc {id} not found")))?;
                (proc.pid, proc.pgid)
            }
            (None, Some(pid)) => {
                if pid <= 0 {
                    return Err(RpcError::invalid_argument("pid must be positive"));
                }
                (pid, probe::pgid_of(pid))
            }
            _ => {
                return Err(RpcError::invalid_argument(
                    "exactly one of id or pid is required",
                ))
            }
        };

        let target = effective_kill_target(pid, pgid);
        probe::send_signal(target, Signal::SIGTERM)
            .map_err(|err| RpcError::internal(err.to_string()))?;
        tracing::info!(pid, pgid, target, "sent SIGTERM");
        Ok(Value::Null)
    }

    fn rm(&self, id: u64) -> Result<Value, RpcError> {
        if id == 0 {
            return Err(RpcError::invalid_argument("id must be provided"));
        }
        if !self.registry.remove(ProcId(id)) {
            return Err(RpcError::not_found(format!("proc {id} not found")));
        }
        Ok(Value::Null)
    }

    fn rename(&self, kind: LabelKind, from: &str, to: &str) -> Result<Value, RpcError> {
        let from = from.trim();
        let to = to.trim();
        if from.is_empty() || to.is_empty() {
            return Err(RpcError::invalid_argument("from and to must be provided"));
        }
        let updated = self.registry.rename_label(kind, from, to);
        Ok(json!({ "updated": updated }))
    }

    fn reset(&self) -> Result<Value, RpcError> {
        self.registry.reset();
        tracing::info!("registry reset");
        Ok(Value::Null)
    }
}

/// Group kill when a process group is known, plain pid kill otherwise.
pub fn effective_kill_target(pid: i32, pgid: i32) -> i32 {
    if pgid > 0 {
        -pgid
    } else {
        pid
    }
}

fn validate_filter(filter: &ListFilter) -> Result<(), RpcError> {
    if filter.ids.iter().any(|id| id.0 == 0) {
        return Err(RpcError::invalid_argument("id filters must be positive"));
    }
    if filter.pids.iter().any(|pid| *pid <= 0) {
        return Err(RpcError::invalid_argument("pid filters must be positive"));
    }
    if filter.names.iter().any(|name| name.trim().is_empty()) {
        return Err(RpcError::invalid_argument("name filters must not be empty"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
