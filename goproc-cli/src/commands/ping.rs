//! `goproc ping` — daemon liveness check.

use anyhow::Result;

use crate::app::Controller;

pub fn run(controller: &impl Controller) -> Result<()> {
    let reply = controller.ping()?;
    println!("{reply}");
    Ok(())
}
