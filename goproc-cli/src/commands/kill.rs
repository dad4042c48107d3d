//! `goproc kill` — SIGTERM matching processes, then drop their records.

use anyhow::{bail, Result};
use clap::Args;

use crate::app::{Controller, Selection};
use crate::commands::SelectorArgs;

#[derive(Args, Debug)]
pub struct KillArgs {
    #[command(flatten)]
    pub selectors: SelectorArgs,

    /// Kill every alive match instead of refusing on multiple matches.
    #[arg(long)]
    pub all: bool,
}

pub fn run(controller: &impl Controller, args: KillArgs) -> Result<()> {
    let report = controller.kill(Selection {
        filter: args.selectors.into_filter(),
        all: args.all,
    })?;

    if report.matched == 0 {
        println!("no processes match the provided selectors");
        return Ok(());
    }
    if report.alive == 0 {
        println!("matching processes exist but none are currently alive");
        return Ok(());
    }

    for proc in &report.killed {
        println!("killed id {} (pid {}, {})", proc.id, proc.pid, proc.cmd);
    }
    for failure in &report.failures {
        eprintln!("id {}: {}", failure.proc.id, failure.error);
    }

    let succeeded = report.killed.len();
    if succeeded == 0 {
        bail!("no processes were killed (see output above)");
    }
    if succeeded < report.alive {
        bail!("partially successful: killed {succeeded}/{} processes", report.alive);
    }
    Ok(())
}
