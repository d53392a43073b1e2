//! Day-scoped on-disk memoization of source fetches.
//!
//! Every entry is stamped with the wall-clock day it was written on. Lookups
//! only ever consider today's stamp, so yesterday's entries are misses by
//! construction even while they still sit on disk.
//!
//! Layout: `<root>/<namespace>/<qualifier>_<YYYY-MM-DD>.json`, or
//! `<root>/<namespace>/<YYYY-MM-DD>.json` for unqualified keys. Namespaces are
//! the source names, so two sources can never collide.

use std::fmt;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace, warn};

use crate::error::{ProviderError, ProviderResult};

/// Identifies one memoized computation: a source plus any parameters that
/// change the shape of its result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    namespace: String,
    qualifier: Option<String>,
}

impl CacheKey {
    /// A key with no qualifier: one entry per source per day.
    pub fn new(namespace: impl AsRef<str>) -> Self {
        Self {
            namespace: sanitize(namespace.as_ref()),
            qualifier: None,
        }
    }

    /// Builder method to add a qualifier (date range, month, page, ...).
    pub fn with_qualifier(mut self, qualifier: impl AsRef<str>) -> Self {
        self.qualifier = Some(sanitize(qualifier.as_ref()));
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    fn file_name(&self, day: NaiveDate) -> String {
        match self.qualifier {
            Some(ref q) => format!("{}_{}.json", q, day),
            None => format!("{}.json", day),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.qualifier {
            Some(ref q) => write!(f, "{}/{}", self.namespace, q),
            None => write!(f, "{}", self.namespace),
        }
    }
}

/// Keeps key components usable as path segments.
fn sanitize(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        "default".to_string()
    } else {
        trimmed.to_string()
    }
}

type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Handle to the daily cache directory.
///
/// Cheap to clone; every adapter holds its own handle to the same root.
#[derive(Clone)]
pub struct DailyCache {
    root: PathBuf,
    clock: Clock,
}

impl fmt::Debug for DailyCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DailyCache")
            .field("root", &self.root)
            .field("today", &self.today())
            .finish()
    }
}

impl DailyCache {
    /// Creates a cache rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            clock: Arc::new(|| Local::now().date_naive()),
        }
    }

    /// Replaces the wall clock used to decide what "today" is.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> NaiveDate + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// The cache epoch: today's date according to the clock.
    pub fn today(&self) -> NaiveDate {
        (self.clock)()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the entry for `key` stamped with `day`.
    pub fn entry_path(&self, key: &CacheKey, day: NaiveDate) -> PathBuf {
        self.root.join(&key.namespace).join(key.file_name(day))
    }

    /// Reads today's entry for `key`.
    ///
    /// A missing entry is a miss. An entry that fails to read or deserialize
    /// is logged and also treated as a miss; the next `put` overwrites it.
    pub fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let path = self.entry_path(key, self.today());
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                trace!(key = %key, "cache miss");
                return None;
            }
            Err(e) => {
                warn!(key = %key, path = %path.display(), error = %e, "unreadable cache entry, ignoring");
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(value) => {
                debug!(key = %key, "cache hit");
                Some(value)
            }
            Err(e) => {
                warn!(key = %key, path = %path.display(), error = %e, "corrupt cache entry, recomputing");
                None
            }
        }
    }

    /// Stores `value` as today's entry for `key`.
    ///
    /// The value is written to a temporary file and renamed into place, so a
    /// crash mid-write never leaves a truncated entry behind.
    pub fn put<T: Serialize>(&self, key: &CacheKey, value: &T) -> ProviderResult<()> {
        let path = self.entry_path(key, self.today());

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ProviderError::cache(format!("failed to create cache directory: {}", e))
                    .with_source(e)
            })?;
        }

        let content = serde_json::to_string(value).map_err(|e| {
            ProviderError::cache(format!("failed to serialize cache entry: {}", e)).with_source(e)
        })?;

        let temp_path = path.with_extension(format!("json.{}.tmp", std::process::id()));
        fs::write(&temp_path, &content).map_err(|e| {
            ProviderError::cache(format!("failed to write cache entry: {}", e)).with_source(e)
        })?;
        fs::rename(&temp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            ProviderError::cache(format!("failed to move cache entry into place: {}", e))
                .with_source(e)
        })?;

        debug!(key = %key, bytes = content.len(), "stored cache entry");
        Ok(())
    }

    /// Returns today's entry for `key`, or runs `compute` and stores its result.
    ///
    /// If `compute` fails nothing is written, so the next call retries. A
    /// failure to write the entry is logged and the computed value is still
    /// returned.
    pub async fn get_or_compute<T, F, Fut>(&self, key: &CacheKey, compute: F) -> ProviderResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let value = compute().await?;

        if let Err(e) = self.put(key, &value) {
            warn!(key = %key, error = %e, "failed to store cache entry");
        }

        Ok(value)
    }

    /// Removes the entry for `key` stamped with `day` (default: today).
    ///
    /// Returns true if an entry was removed.
    pub fn invalidate(&self, key: &CacheKey, day: Option<NaiveDate>) -> ProviderResult<bool> {
        let day = day.unwrap_or_else(|| self.today());
        remove_if_present(&self.entry_path(key, day))
    }

    /// Removes every entry of `namespace` stamped with `day` (default: today).
    ///
    /// Returns the number of entries removed.
    pub fn invalidate_namespace(
        &self,
        namespace: &str,
        day: Option<NaiveDate>,
    ) -> ProviderResult<usize> {
        let day = day.unwrap_or_else(|| self.today());
        let dir = self.root.join(sanitize(namespace));
        let suffix = format!("{}.json", day);

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(
                    ProviderError::cache(format!("failed to list cache directory: {}", e))
                        .with_source(e),
                );
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let stamped_today = name == suffix || name.ends_with(&format!("_{}", suffix));
            if stamped_today && remove_if_present(&entry.path())? {
                removed += 1;
            }
        }

        debug!(namespace = %namespace, day = %day, removed, "invalidated cache entries");
        Ok(removed)
    }

    /// Removes every entry, in every namespace, stamped with a day other
    /// than today. Entries are never read once their day has passed, so this
    /// only reclaims disk space.
    ///
    /// Returns the number of entries removed.
    pub fn purge_stale(&self) -> ProviderResult<usize> {
        let today = self.today();
        let namespaces = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(
                    ProviderError::cache(format!("failed to list cache directory: {}", e))
                        .with_source(e),
                );
            }
        };

        let mut removed = 0;
        for namespace in namespaces.flatten() {
            if !namespace.path().is_dir() {
                continue;
            }
            let Ok(entries) = fs::read_dir(namespace.path()) else {
                continue;
            };
            for entry in entries.flatten() {
                let name = entry.file_name();
                let Some(day) = name.to_str().and_then(entry_day) else {
                    continue;
                };
                if day != today && remove_if_present(&entry.path())? {
                    removed += 1;
                }
            }
        }

        debug!(today = %today, removed, "purged stale cache entries");
        Ok(removed)
    }
}

/// The day an entry file is stamped with, from its `[qualifier_]YYYY-MM-DD.json` name.
fn entry_day(file_name: &str) -> Option<NaiveDate> {
    let stem = file_name.strip_suffix(".json")?;
    let start = stem.len().checked_sub(10)?;
    let stamp = stem.get(start..)?;
    NaiveDate::parse_from_str(stamp, "%Y-%m-%d").ok()
}

fn remove_if_present(path: &Path) -> ProviderResult<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(
            ProviderError::cache(format!("failed to remove cache entry: {}", e)).with_source(e),
        ),
    }
}
