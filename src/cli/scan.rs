//! `shadowlint scan` (spec §6.1).

use crate::cache::DiskCache;
use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::evidence::vcs::GitVcs;
use crate::pipeline::{run_scan, ScanKind, ScanRequest};
use chrono::Utc;
use clap::Args;
use std::path::PathBuf;
use std::process::Command;

#[derive(Args)]
pub struct ScanArgs {
    /// Repository root to scan.
    #[arg(long, default_value = ".")]
    pub path: PathBuf,

    /// Commit SHA to attribute the scan to; defaults to HEAD.
    #[arg(long)]
    pub commit: Option<String>,

    /// Branch name to record on the report.
    #[arg(long)]
    pub branch: Option<String>,

    /// Changed file paths (relative to `path`); presence makes this an
    /// incremental scan.
    #[arg(long = "incremental", num_args = 0..)]
    pub incremental: Vec<PathBuf>,

    /// Emit the ScanReport as JSON instead of a summary table.
    #[arg(long)]
    pub json: bool,

    /// Custom rule file to evaluate instead of the bundled default ruleset.
    #[arg(long)]
    pub rules: Option<PathBuf>,
}

fn git_output(root: &PathBuf, args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).current_dir(root).output().ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

pub fn run(args: ScanArgs) -> Result<()> {
    let root = args
        .path
        .canonicalize()
        .map_err(|_| Error::Input {
            message: format!("root path not found: {}", args.path.display()),
        })?;

    let config = Config::load()?;
    Config::ensure_home()?;
    let cache_dir = Config::cache_dir()?;
    let store = DiskCache::new(cache_dir)?;
    let vcs = GitVcs::new(root.clone());

    let commit = args
        .commit
        .or_else(|| git_output(&root, &["rev-parse", "HEAD"]))
        .unwrap_or_else(|| "unknown".to_string());
    let branch = args
        .branch
        .or_else(|| git_output(&root, &["rev-parse", "--abbrev-ref", "HEAD"]));
    let repo_name = root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "repo".to_string());

    let kind = if args.incremental.is_empty() {
        ScanKind::Full
    } else {
        ScanKind::Incremental
    };

    let request = ScanRequest {
        kind,
        root,
        repo_name,
        commit,
        branch,
        changed_files: args.incremental,
        rules_path: args.rules,
    };

    let scan_id = uuid::Uuid::new_v4().to_string();

    match run_scan(&request, &config, &store, &vcs, scan_id, Utc::now()) {
        Ok(report) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_summary(&report);
            }
            Ok(())
        }
        Err(failure) => {
            eprintln!(
                "scan failed at stage '{}': {}",
                failure.stage, failure.reason
            );
            Err(Error::Internal {
                message: failure.reason,
            })
        }
    }
}

fn print_summary(report: &crate::pipeline::ScanReport) {
    println!(
        "shadowlint scan {} ({:?}) — {} units, density {:.2}",
        report.scan_id,
        report.scan_kind,
        report.aggregates.total_units,
        report.aggregates.shadow_logic_density
    );
    println!(
        "average cognitive load {:.1}, redundancy {:.2}, runway {}",
        report.aggregates.average_cognitive_load,
        report.aggregates.redundancy_score,
        report
            .aggregates
            .refactoring_runway_months
            .map(|m| m.to_string())
            .unwrap_or_else(|| "insufficient data".to_string())
    );
    if !report.hotspots.is_empty() {
        println!("\ntop hotspots:");
        for h in &report.hotspots {
            println!(
                "  {} ({}) load={} evidence={}",
                h.name,
                h.file.display(),
                h.cognitive_load,
                h.review_evidence
            );
        }
    }
    if !report.warnings.is_empty() {
        println!("\n{} warning(s)", report.warnings.len());
    }
}
