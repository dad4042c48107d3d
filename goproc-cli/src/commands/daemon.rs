//! `goproc daemon` — run, stop, and inspect the background daemon.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;

use goproc_daemon::Config;

use crate::app::Controller;

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run the daemon in the foreground (socket server + liveness watcher).
    Start(StartArgs),
    /// Stop the running daemon via its PID file.
    Stop(StopArgs),
    /// Report whether a daemon is serving the rendezvous socket.
    Status(StatusArgs),
}

#[derive(Args, Debug)]
pub struct StartArgs {
    /// Optional JSON config file with interval overrides.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct StopArgs {
    /// Escalate to SIGKILL if the daemon ignores SIGTERM.
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run(controller: &impl Controller, command: DaemonCommand) -> Result<()> {
    match command {
        DaemonCommand::Start(args) => {
            let config = Config::load(args.config.as_deref()).context("failed to load config")?;
            controller.start_daemon(config)?;
        }
        DaemonCommand::Stop(args) => {
            controller.stop_daemon(args.force)?;
            println!("daemon stopped");
        }
        DaemonCommand::Status(args) => {
            let status = controller.status()?;
            if args.json {
                let payload = serde_json::json!({
                    "running": status.running,
                    "pid": status.pid,
                    "socket": status.socket.display().to_string(),
                });
                println!(
                    "{}",
                    serde_json::to_string_pretty(&payload)
                        .context("failed to render status JSON")?
                );
            } else if status.running {
                match status.pid {
                    Some(pid) => println!("{} (pid {pid})", "running".green()),
                    None => println!("{}", "running".green()),
                }
            } else {
                println!("{} (socket: {})", "not running".red(), status.socket.display());
            }
        }
    }
    Ok(())
}
