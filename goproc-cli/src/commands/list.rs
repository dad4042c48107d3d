//! `goproc list` — tabular or JSON view of the registry.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use goproc_core::Proc;

use crate::app::Controller;
use crate::commands::SelectorArgs;

const CMD_WIDTH: usize = 60;

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub selectors: SelectorArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct ProcRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "PID")]
    pid: i32,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "ALIVE")]
    alive: String,
    #[tabled(rename = "AGE")]
    age: String,
    #[tabled(rename = "TAGS")]
    tags: String,
    #[tabled(rename = "GROUPS")]
    groups: String,
    #[tabled(rename = "CMD")]
    cmd: String,
}

pub fn run(controller: &impl Controller, args: ListArgs) -> Result<()> {
    let procs = controller.list(args.selectors.into_filter())?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&procs).context("failed to render process JSON")?
        );
        return Ok(());
    }

    if procs.is_empty() {
        println!("no processes registered");
        return Ok(());
    }

    let now = Utc::now();
    let rows: Vec<ProcRow> = procs.iter().map(|proc| row(proc, now)).collect();
    let mut table = Table::new(rows);
    table.with(Style::blank());
    println!("{table}");
    Ok(())
}

fn row(proc: &Proc, now: DateTime<Utc>) -> ProcRow {
    let alive = if proc.alive {
        "yes".green().to_string()
    } else {
        "no".red().to_string()
    };
    ProcRow {
        id: proc.id.0,
        pid: proc.pid,
        name: proc.name.clone(),
        alive,
        age: format_age(proc.added_at, now),
        tags: join(&proc.tags),
        groups: join(&proc.groups),
        cmd: truncate(&proc.cmd, CMD_WIDTH),
    }
}

fn join(labels: &std::collections::BTreeSet<String>) -> String {
    labels.iter().cloned().collect::<Vec<_>>().join(",")
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let head: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{head}…")
}

/// Coarse human age: seconds up to a minute, then minutes, hours, days.
fn format_age(since: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = now.signed_duration_since(since).num_seconds().max(0);
    match seconds {
        s if s < 60 => format!("{s}s"),
        s if s < 3_600 => format!("{}m", s / 60),
        s if s < 86_400 => format!("{}h", s / 3_600),
        s => format!("{}d", s / 86_400),
    }
}
