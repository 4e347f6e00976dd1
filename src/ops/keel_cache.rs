//! Implementation of `keel cache`.

use crate::error::Result;
use crate::sources::{ArtifactCache, CacheEntry};

/// Complete cache entries and their combined size.
#[derive(Debug, Clone, Default)]
pub struct CacheReport {
    pub entries: Vec<CacheEntry>,
    pub total_size: u64,
}

pub fn cache_report(cache: &ArtifactCache) -> Result<CacheReport> {
    let entries = cache.list()?;
    let total_size = entries.iter().map(|e| e.size).sum();
    Ok(CacheReport {
        entries,
        total_size,
    })
}

/// Remove every cached artifact. Returns how many entries were removed.
pub fn clean_cache(cache: &ArtifactCache) -> Result<usize> {
    let removed = cache.clean()?;
    tracing::info!("removed {} cache entr{}", removed, if removed == 1 { "y" } else { "ies" });
    Ok(removed)
}

/// Format a size in bytes to a human-readable string.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
