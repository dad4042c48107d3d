//! `goproc group` — inspect a group, optionally renaming it first.

use anyhow::Result;
use clap::Args;

use crate::app::{Controller, LabelParams};

#[derive(Args, Debug)]
pub struct GroupArgs {
    /// Group to inspect.
    pub name: String,

    /// Rename the group before listing its records.
    #[arg(long, value_name = "NEW")]
    pub rename: Option<String>,
}

pub fn run(controller: &impl Controller, args: GroupArgs) -> Result<()> {
    let report = controller.group(LabelParams {
        name: args.name,
        rename: args.rename,
    })?;

    if let Some(info) = &report.renamed {
        println!(
            "renamed group {:?} to {:?} on {} record(s)",
            info.from, info.to, info.updated
        );
    }
    if report.procs.is_empty() {
        println!("no processes found with group {:?}", report.label);
        return Ok(());
    }
    for proc in &report.procs {
        println!("id {} (pid {}, {})", proc.id, proc.pid, proc.cmd);
    }
    Ok(())
}
