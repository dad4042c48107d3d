//! `goproc add` — register an already-running pid with the daemon.

use anyhow::Result;
use clap::Args;

use crate::app::{AddOutcome, AddParams, Controller};

#[derive(Args, Debug)]
pub struct AddArgs {
    /// OS pid of the process to track.
    pub pid: i32,

    /// Optional unique name for the record.
    #[arg(long, default_value = "")]
    pub name: String,

    /// Tags to attach (repeatable).
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Groups to attach (repeatable).
    #[arg(long = "group", value_name = "GROUP")]
    pub groups: Vec<String>,
}

pub fn run(controller: &impl Controller, args: AddArgs) -> Result<()> {
    let outcome = controller.add(AddParams {
        pid: args.pid,
        name: args.name,
        tags: args.tags,
        groups: args.groups,
    })?;

    match outcome {
        AddOutcome::Registered { id } => {
            println!("registered pid {} as id {id}", args.pid);
        }
        AddOutcome::AlreadyExists { reason } => {
            println!("not added: {reason}");
        }
    }
    Ok(())
}
