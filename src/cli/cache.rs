//! `shadowlint cache` (spec §6.2).

use crate::cache::DiskCache;
use crate::core::config::Config;
use crate::core::error::Result;
use clap::Args;

#[derive(Args)]
pub struct CacheArgs {
    /// Remove every entry from the on-disk cache.
    #[arg(long)]
    pub clear: bool,
}

pub fn run(args: CacheArgs) -> Result<()> {
    Config::ensure_home()?;
    let cache_dir = Config::cache_dir()?;
    let disk = DiskCache::new(cache_dir.clone())?;

    if args.clear {
        disk.clear()?;
        println!("cache cleared at {}", cache_dir.display());
        return Ok(());
    }

    let count = disk.entry_count()?;
    println!("{} entries at {}", count, cache_dir.display());
    Ok(())
}
