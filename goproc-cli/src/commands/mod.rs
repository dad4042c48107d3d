//! One module per `goproc` subcommand, plus the shared selector flags.

pub mod add;
pub mod daemon;
pub mod group;
pub mod kill;
pub mod list;
pub mod ping;
pub mod reset;
pub mod rm;
pub mod tag;

use clap::Args;

use goproc_core::{ListFilter, ProcId};

/// Record selectors shared by `list`, `rm`, and `kill`.
#[derive(Args, Debug, Default)]
pub struct SelectorArgs {
    /// Match these registry ids (repeatable).
    #[arg(long = "id", value_name = "ID")]
    pub ids: Vec<u64>,

    /// Match these OS pids (repeatable).
    #[arg(long = "pid", value_name = "PID")]
    pub pids: Vec<i32>,

    /// Match these record names (repeatable).
    #[arg(long = "name", value_name = "NAME")]
    pub names: Vec<String>,

    /// Match records carrying any of these tags (repeatable).
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Require every one of these tags (repeatable).
    #[arg(long = "tag-all", value_name = "TAG")]
    pub tags_all: Vec<String>,

    /// Match records in any of these groups (repeatable).
    #[arg(long = "group", value_name = "GROUP")]
    pub groups: Vec<String>,

    /// Require membership in every one of these groups (repeatable).
    #[arg(long = "group-all", value_name = "GROUP")]
    pub groups_all: Vec<String>,

    /// Only records whose process is currently alive.
    #[arg(long)]
    pub alive: bool,

    /// Substring match over the recorded command line.
    #[arg(long, value_name = "TEXT")]
    pub search: Option<String>,
}

impl SelectorArgs {
    pub fn into_filter(self) -> ListFilter {
        ListFilter {
            ids: self.ids.into_iter().map(ProcId).collect(),
            pids: self.pids,
            names: self.names,
            tags_any: self.tags,
            tags_all: self.tags_all,
            groups_any: self.groups,
            groups_all: self.groups_all,
            alive_only: self.alive,
            text_search: self.search.unwrap_or_default(),
        }
    }
}
