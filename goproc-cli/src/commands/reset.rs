//! `goproc reset` — wipe the registry and restart ids from 1.

use anyhow::Result;
use clap::Args;

use crate::app::Controller;

#[derive(Args, Debug)]
pub struct ResetArgs {
    /// Confirm wiping every registry entry.
    #[arg(long)]
    pub yes: bool,
}

pub fn run(controller: &impl Controller, args: ResetArgs) -> Result<()> {
    controller.reset(args.yes)?;
    println!("registry reset");
    Ok(())
}
