//! `goproc tag` — inspect a tag, optionally renaming it first.

use anyhow::Result;
use clap::Args;

use crate::app::{Controller, LabelParams};

#[derive(Args, Debug)]
pub struct TagArgs {
    /// Tag to inspect.
    pub name: String,

    /// Rename the tag before listing its records.
    #[arg(long, value_name = "NEW")]
    pub rename: Option<String>,
}

pub fn run(controller: &impl Controller, args: TagArgs) -> Result<()> {
    let report = controller.tag(LabelParams {
        name: args.name,
        rename: args.rename,
    })?;

    if let Some(info) = &report.renamed {
        println!(
            "renamed tag {:?} to {:?} on {} record(s)",
            info.from, info.to, info.updated
        );
    }
    if report.procs.is_empty() {
        println!("no processes found with tag {:?}", report.label);
        return Ok(());
    }
    for proc in &report.procs {
        println!("id {} (pid {}, {})", proc.id, proc.pid, proc.cmd);
    }
    Ok(())
}
