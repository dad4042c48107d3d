//! goproc — track, label, and signal externally started processes.
//!
//! # Usage
//!
//! ```text
//! goproc add <pid> [--name NAME] [--tag TAG]... [--group GROUP]...
//! goproc list [selectors] [--json]
//! goproc rm [selectors] [--all]
//! goproc kill [selectors] [--all]
//! goproc tag <name> [--rename NEW]
//! goproc group <name> [--rename NEW]
//! goproc reset --yes
//! goproc ping
//! goproc daemon start|stop|status
//! ```

mod app;
mod commands;

use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

use goproc_daemon::{DaemonError, ErrorKind};

use app::{App, Controller};
use commands::{
    add::AddArgs, daemon::DaemonCommand, group::GroupArgs, kill::KillArgs, list::ListArgs,
    reset::ResetArgs, rm::RmArgs, tag::TagArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "goproc",
    version,
    about = "Track, label, and signal externally started processes",
    long_about = None,
)]
struct Cli {
    /// Per-request deadline for daemon RPCs (e.g. "5s", "500ms").
    #[arg(long, global = true, default_value = "5s", value_parser = parse_timeout)]
    timeout: Duration,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register an already-running pid with the daemon.
    Add(AddArgs),

    /// List registered processes.
    List(ListArgs),

    /// Remove registry entries without signalling anything.
    Rm(RmArgs),

    /// SIGTERM matching processes and drop their records.
    Kill(KillArgs),

    /// Inspect or rename a tag.
    Tag(TagArgs),

    /// Inspect or rename a group.
    Group(GroupArgs),

    /// Wipe the registry.
    Reset(ResetArgs),

    /// Check that the daemon answers.
    Ping,

    /// Manage the background daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

fn parse_timeout(raw: &str) -> std::result::Result<Duration, String> {
    goproc_daemon::parse_duration(raw).map_err(|err| err.to_string())
}

fn main() {
    let cli = Cli::parse();
    let controller = App::new(cli.timeout);
    if let Err(err) = dispatch(&controller, cli.command) {
        eprintln!("error: {err:#}");
        std::process::exit(exit_code(&err));
    }
}

fn dispatch(controller: &impl Controller, command: Commands) -> Result<()> {
    match command {
        Commands::Add(args) => commands::add::run(controller, args),
        Commands::List(args) => commands::list::run(controller, args),
        Commands::Rm(args) => commands::rm::run(controller, args),
        Commands::Kill(args) => commands::kill::run(controller, args),
        Commands::Tag(args) => commands::tag::run(controller, args),
        Commands::Group(args) => commands::group::run(controller, args),
        Commands::Reset(args) => commands::reset::run(controller, args),
        Commands::Ping => commands::ping::run(controller),
        Commands::Daemon { command } => commands::daemon::run(controller, command),
    }
}

/// Map typed daemon failures to stable exit codes; everything else is 1.
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<DaemonError>() {
        Some(DaemonError::Rpc(rpc)) => match rpc.kind {
            ErrorKind::InvalidArgument => 2,
            ErrorKind::NotFound => 3,
            ErrorKind::AlreadyExists => 4,
            ErrorKind::Internal => 5,
            ErrorKind::Unavailable => 6,
            ErrorKind::DeadlineExceeded => 7,
        },
        Some(DaemonError::NotRunning { .. }) => 6,
        Some(DaemonError::DeadlineExceeded(_)) => 7,
        _ => 1,
    }
}
