//! `goproc rm` — delete registry entries (the processes keep running).

use anyhow::Result;
use clap::Args;

use crate::app::{Controller, Selection};
use crate::commands::SelectorArgs;

#[derive(Args, Debug)]
pub struct RmArgs {
    #[command(flatten)]
    pub selectors: SelectorArgs,

    /// Remove every match instead of refusing on multiple matches.
    #[arg(long)]
    pub all: bool,
}

pub fn run(controller: &impl Controller, args: RmArgs) -> Result<()> {
    let report = controller.remove(Selection {
        filter: args.selectors.into_filter(),
        all: args.all,
    })?;

    if report.removed.is_empty() {
        println!("no matching processes registered");
        return Ok(());
    }
    for proc in &report.removed {
        println!("removed id {} (pid {}, {})", proc.id, proc.pid, proc.cmd);
    }
    Ok(())
}
