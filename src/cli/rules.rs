//! `shadowlint rules` (spec §6.3).

use crate::core::error::Result;
use crate::rules::{default_ruleset, RuleFile};
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct RulesArgs {
    /// Rule file to validate; the bundled default is used when omitted.
    #[arg(long)]
    pub validate: Option<PathBuf>,

    /// List the active ruleset's rules.
    #[arg(long)]
    pub list: bool,
}

pub fn run(args: RulesArgs) -> Result<()> {
    let ruleset: RuleFile = match &args.validate {
        Some(path) => RuleFile::load(path).map_err(|message| crate::core::error::Error::Config {
            message,
        })?,
        None => default_ruleset().clone(),
    };

    if args.validate.is_some() {
        println!(
            "ruleset valid: version {}, {} rules",
            ruleset.version,
            ruleset.rules.len()
        );
    }

    if args.list || args.validate.is_none() {
        for rule in &ruleset.rules {
            println!("{:<28} {:<8?} {}", rule.id, rule.severity, rule.name);
        }
    }

    Ok(())
}
