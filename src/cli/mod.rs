//! Shadowlint CLI surface (spec §6.1, §6.3).

pub mod cache;
pub mod rules;
pub mod scan;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "shadowlint", version, about = "Quantify shadow logic in FEL codebases")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a full or incremental scan of a project root.
    Scan(scan::ScanArgs),
    /// Validate or list the active ruleset.
    Rules(rules::RulesArgs),
    /// Inspect or clear the on-disk cache.
    Cache(cache::CacheArgs),
}
