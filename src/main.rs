//! shadowlint CLI entry point

use clap::Parser;
use shadowlint::cli::{Cli, Commands};
use shadowlint::core::error::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_env("SHADOWLINT_LOG"))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan(args) => shadowlint::cli::scan::run(args),
        Commands::Rules(args) => shadowlint::cli::rules::run(args),
        Commands::Cache(args) => shadowlint::cli::cache::run(args),
    }
}
