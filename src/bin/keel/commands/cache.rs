//! `keel cache` command
//!
//! Inspect and clear the content-addressed artifact cache.

use anyhow::Result;

use super::Global;
use crate::cli::{CacheArgs, CacheCommands};
use keel::ops::{cache_report, clean_cache, format_size};
use keel::sources::ArtifactCache;

pub fn execute(args: CacheArgs, global: Global) -> Result<()> {
    let cache_dir = global.ctx.cache_dir();
    let cache = ArtifactCache::open(&cache_dir);

    match args.command {
        CacheCommands::Path => println!("{}", cache_dir.display()),
        CacheCommands::List => {
            let report = cache_report(&cache)?;
            println!("Cache directory: {}", cache_dir.display());
            println!();
            if report.entries.is_empty() {
                println!("  (none)");
            }
            for entry in &report.entries {
                let marker = &entry.marker;
                println!(
                    "  {}:{} (strip {}) {} files, {}",
                    marker.algorithm,
                    &marker.digest[..marker.digest.len().min(12)],
                    marker.strip_root,
                    marker.files,
                    format_size(entry.size)
                );
                println!("      {}", marker.url);
            }
            println!();
            println!("  Total: {}", format_size(report.total_size));
        }
        CacheCommands::Clean => {
            let removed = clean_cache(&cache)?;
            if removed == 0 {
                eprintln!("     Nothing to clean");
            } else {
                eprintln!("     Removed {} artifact(s) from {}", removed, cache_dir.display());
            }
        }
    }
    Ok(())
}
