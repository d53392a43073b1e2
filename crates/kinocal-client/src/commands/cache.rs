//! Cache commands.

use kinocal_providers::DailyCache;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::sources::SourceId;

/// Removes cached entries and prints how many were removed.
///
/// By default today's entries of the selected sources (all if none) are
/// removed; with `stale`, entries from previous days are removed instead.
pub fn clear(config: &ClientConfig, sources: &[SourceId], stale: bool) -> ClientResult<()> {
    let cache = DailyCache::new(config.cache_dir());
    let removed = clear_in(&cache, sources, stale)?;
    println!("Removed {} cache entries from {}", removed, cache.root().display());
    Ok(())
}

/// Show the cache directory.
pub fn path(config: &ClientConfig) -> ClientResult<()> {
    println!("cache: {}", config.cache_dir().display());
    Ok(())
}

fn clear_in(cache: &DailyCache, sources: &[SourceId], stale: bool) -> ClientResult<usize> {
    if stale {
        return Ok(cache.purge_stale()?);
    }

    let selected: &[SourceId] = if sources.is_empty() { &SourceId::ALL } else { sources };
    let mut removed = 0;
    for id in selected {
        let count = cache.invalidate_namespace(id.as_str(), None)?;
        debug!(source = id.as_str(), removed = count, "cleared cache");
        removed += count;
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use kinocal_core::SourceResult;
    use kinocal_providers::CacheKey;

    fn seeded(dir: &tempfile::TempDir) -> DailyCache {
        let yesterday = DailyCache::new(dir.path())
            .with_clock(|| NaiveDate::from_ymd_opt(2025, 1, 4).unwrap());
        yesterday.put(&CacheKey::new("brattle").with_qualifier("coming-soon"), &SourceResult::new()).unwrap();

        let today = DailyCache::new(dir.path())
            .with_clock(|| NaiveDate::from_ymd_opt(2025, 1, 5).unwrap());
        today.put(&CacheKey::new("brattle").with_qualifier("coming-soon"), &SourceResult::new()).unwrap();
        today.put(&CacheKey::new("regent").with_qualifier("month-2025-01"), &SourceResult::new()).unwrap();
        today
    }

    #[test]
    fn clears_only_selected_sources() {
        let dir = tempfile::tempdir().unwrap();
        let cache = seeded(&dir);
        assert_eq!(clear_in(&cache, &[SourceId::Regent], false).unwrap(), 1);
        assert_eq!(clear_in(&cache, &[], false).unwrap(), 1);
        assert_eq!(clear_in(&cache, &[], false).unwrap(), 0);
    }

    #[test]
    fn stale_clears_previous_days() {
        let dir = tempfile::tempdir().unwrap();
        let cache = seeded(&dir);
        assert_eq!(clear_in(&cache, &[], true).unwrap(), 1);
        assert!(cache
            .get::<SourceResult>(&CacheKey::new("brattle").with_qualifier("coming-soon"))
            .is_some());
    }
}
