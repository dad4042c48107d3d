//! End-to-end daemon lifecycle over a real Unix socket: bind, serve RPCs,
//! enforce single-instance, shut down cleanly, and persist across restarts.

use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use goproc_daemon::config::Config;
use goproc_daemon::protocol::{self, ErrorKind, Request};
use goproc_daemon::server;
use goproc_daemon::{paths, DaemonError};

const TIMEOUT: Duration = Duration::from_secs(2);

struct TestDaemon {
    socket: PathBuf,
    shutdown: broadcast::Sender<()>,
    task: JoinHandle<Result<(), DaemonError>>,
}

impl TestDaemon {
    async fn start(socket: PathBuf) -> Self {
        let (shutdown, _) = broadcast::channel::<()>(4);
        let task = tokio::spawn(server::serve(
            Config::default(),
            socket.clone(),
            shutdown.clone(),
        ));

        for _ in 0..50 {
            if running(&socket).await {
                return Self { socket, shutdown, task };
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("daemon did not come up on {}", socket.display());
    }

    async fn stop(self) {
        let _ = self.shutdown.send(());
        self.task
            .await
            .expect("server task joins")
            .expect("server exits cleanly");
    }

    async fn request(&self, request: Request) -> Result<serde_json::Value, DaemonError> {
        let socket = self.socket.clone();
        tokio::task::spawn_blocking(move || {
            protocol::send_request_at(&socket, &request, TIMEOUT)?.into_data()
        })
        .await
        .expect("client task joins")
    }
}

async fn running(socket: &Path) -> bool {
    let socket = socket.to_path_buf();
    tokio::task::spawn_blocking(move || protocol::is_running_at(&socket))
        .await
        .expect("probe task joins")
}

fn spawn_sleeper() -> Child {
    Command::new("sleep").arg("60").spawn().expect("spawn sleep")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn serve_rpcs_then_shut_down_cleanly() {
    let dir = TempDir::new().expect("tempdir");
    let socket = dir.path().join("goproc.sock");
    let daemon = TestDaemon::start(socket.clone()).await;

    // The rendezvous files are in place and private.
    assert!(socket.exists());
    let pid_file = paths::pid_path_for(&socket);
    assert!(pid_file.exists());
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&socket)
            .expect("socket metadata")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    // Ping → pong.
    let pong = daemon.request(Request::Ping).await.expect("ping");
    assert_eq!(pong, serde_json::json!("pong"));

    // Add a real child process, list it back, remove it.
    let mut child = spawn_sleeper();
    let pid = child.id() as i32;
    let data = daemon
        .request(Request::Add {
            pid,
            name: "e2e".into(),
            tags: vec!["web".into(), "v2".into()],
            groups: vec!["prod".into()],
        })
        .await
        .expect("add");
    let id = data["id"].as_u64().expect("id");
    assert_eq!(id, 1);

    let data = daemon
        .request(Request::List {
            filter: goproc_core::ListFilter {
                tags_all: vec!["web".into()],
                ..Default::default()
            },
        })
        .await
        .expect("list");
    let procs = data["procs"].as_array().expect("procs");
    assert_eq!(procs.len(), 1);
    assert_eq!(procs[0]["pid"], serde_json::json!(pid));
    assert_eq!(procs[0]["alive"], serde_json::json!(true));

    daemon.request(Request::Rm { id }).await.expect("rm");
    let data = daemon
        .request(Request::List { filter: Default::default() })
        .await
        .expect("list after rm");
    assert!(data["procs"].as_array().expect("procs").is_empty());

    let _ = child.kill();
    let _ = child.wait();

    daemon.stop().await;
    assert!(!socket.exists(), "socket unlinked on shutdown");
    assert!(!pid_file.exists(), "PID file unlinked on shutdown");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn second_instance_is_refused_while_first_serves() {
    let dir = TempDir::new().expect("tempdir");
    let socket = dir.path().join("goproc.sock");
    let daemon = TestDaemon::start(socket.clone()).await;
    assert!(running(&socket).await);

    let (shutdown_b, _) = broadcast::channel::<()>(4);
    let err = server::serve(Config::default(), socket.clone(), shutdown_b)
        .await
        .expect_err("second bind must fail");
    assert!(matches!(err, DaemonError::AlreadyRunning { .. }), "got: {err}");

    // The loser must not have torn down the winner's rendezvous.
    assert!(running(&socket).await);
    daemon.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn registry_survives_daemon_restart() {
    let dir = TempDir::new().expect("tempdir");
    let socket = dir.path().join("goproc.sock");

    let mut child = spawn_sleeper();
    let pid = child.id() as i32;

    let daemon = TestDaemon::start(socket.clone()).await;
    daemon
        .request(Request::Add {
            pid,
            name: "survivor".into(),
            tags: vec!["keep".into()],
            groups: vec![],
        })
        .await
        .expect("add");
    daemon.stop().await;

    let daemon = TestDaemon::start(socket.clone()).await;
    let data = daemon
        .request(Request::List { filter: Default::default() })
        .await
        .expect("list");
    let procs = data["procs"].as_array().expect("procs");
    assert_eq!(procs.len(), 1, "snapshot reloaded on restart");
    assert_eq!(procs[0]["name"], serde_json::json!("survivor"));
    assert_eq!(procs[0]["pid"], serde_json::json!(pid));

    // Fresh ids continue past the reloaded ones.
    let mut second = spawn_sleeper();
    let data = daemon
        .request(Request::Add {
            pid: second.id() as i32,
            name: String::new(),
            tags: vec![],
            groups: vec![],
        })
        .await
        .expect("add second");
    assert_eq!(data["id"].as_u64().expect("id"), 2);

    daemon.stop().await;
    for child in [&mut child, &mut second] {
        let _ = child.kill();
        let _ = child.wait();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn kill_rpc_reaches_the_registered_process() {
    let dir = TempDir::new().expect("tempdir");
    let socket = dir.path().join("goproc.sock");
    let daemon = TestDaemon::start(socket.clone()).await;

    // Own process group so the group kill stays contained.
    let mut child = {
        use std::os::unix::process::CommandExt;
        Command::new("sleep")
            .arg("60")
            .process_group(0)
            .spawn()
            .expect("spawn sleep")
    };
    let pid = child.id() as i32;

    let data = daemon
        .request(Request::Add {
            pid,
            name: String::new(),
            tags: vec![],
            groups: vec![],
        })
        .await
        .expect("add");
    let id = data["id"].as_u64().expect("id");

    daemon
        .request(Request::Kill { id: Some(id), pid: None })
        .await
        .expect("kill");

    let mut exited = false;
    for _ in 0..50 {
        if child.try_wait().expect("try_wait").is_some() {
            exited = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(exited, "victim must exit after the kill RPC");

    let err = daemon
        .request(Request::Kill { id: Some(99), pid: None })
        .await
        .expect_err("unknown id");
    match err {
        DaemonError::Rpc(rpc) => assert_eq!(rpc.kind, ErrorKind::NotFound),
        other => panic!("expected rpc error, got: {other}"),
    }

    daemon.stop().await;
}
