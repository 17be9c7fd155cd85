use std::{
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use tempfile::NamedTempFile;
use time::{Duration, OffsetDateTime};
use tokio::{fs, task};
use tracing::{debug, warn};

use super::stats::CacheStats;
use crate::types::CacheEntry;

/// JSON files under a cache root, one per query fingerprint.
#[derive(Debug)]
pub struct DiskCache {
    root: PathBuf,
    ttl: Option<Duration>,
    stats: CacheStats,
}

impl DiskCache {
    pub fn new<P: Into<PathBuf>>(root: P, ttl: Option<Duration>) -> Self {
        Self {
            root: root.into(),
            ttl,
            stats: CacheStats::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Returns `None` for missing or stale entries.
    pub async fn load<T>(&self, file_name: &str) -> Result<Option<CacheEntry<T>>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let path = self.root.join(file_name);
        if !fs::try_exists(&path).await.unwrap_or(false) {
            self.stats.record_miss();
            return Ok(None);
        }

        let data = fs::read(&path)
            .await
            .with_context(|| format!("failed to read cache file {path:?}"))?;
        let size = data.len() as u64;
        let decoded =
            task::spawn_blocking(move || serde_json::from_slice::<CacheEntry<T>>(&data)).await?;
        let entry = match decoded {
            Ok(entry) => entry,
            Err(error) => {
                // Truncated or foreign file; drop it so the next store replaces it.
                warn!(target: "nahj_cache", file = ?path, %error, "discarding unreadable cache entry");
                self.stats.record_miss();
                if let Err(error) = fs::remove_file(&path).await {
                    debug!(target: "nahj_cache", file = ?path, %error, "failed to remove cache entry");
                }
                return Ok(None);
            }
        };

        if let Some(ttl) = self.ttl {
            if OffsetDateTime::now_utc() - entry.stored_at > ttl {
                debug!(target: "nahj_cache", file = ?path, "ignoring stale cache entry");
                self.stats.record_expired();
                self.stats.record_miss();
                return Ok(None);
            }
        }

        self.stats.record_hit();
        self.stats.record_bytes(size);
        Ok(Some(entry))
    }

    pub async fn store<T>(&self, file_name: &str, value: T) -> Result<()>
    where
        T: Serialize + Send + 'static,
    {
        let path = self.root.join(file_name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create cache dir {parent:?}"))?;
        }

        let entry = CacheEntry {
            value,
            stored_at: OffsetDateTime::now_utc(),
        };
        let dir = path.parent().map_or_else(|| self.root.clone(), Path::to_path_buf);
        let target = path.clone();
        // Readers only ever see a complete file: write aside, then rename over.
        task::spawn_blocking(move || -> Result<()> {
            let mut staged = NamedTempFile::new_in(&dir)
                .with_context(|| format!("failed to stage cache file in {dir:?}"))?;
            serde_json::to_writer(&mut staged, &entry)?;
            staged.flush()?;
            staged
                .persist(&target)
                .map_err(|err| anyhow!("failed to write cache file {target:?}: {}", err.error))?;
            Ok(())
        })
        .await??;

        debug!(target: "nahj_cache", file = ?path, "wrote cache entry");
        Ok(())
    }

    /// Counts `.json` entries currently on disk.
    pub async fn entry_count(&self) -> Result<usize> {
        let mut count = 0;
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(error) => return Err(error.into()),
        };
        while let Some(entry) = dir.next_entry().await? {
            if is_cache_file(&entry.path()) {
                count += 1;
            }
        }
        self.stats.set_entry_count(count);
        Ok(count)
    }

    /// Removes every cache entry and returns how many were deleted.
    pub async fn purge(&self) -> Result<usize> {
        let mut removed = 0;
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(error) => return Err(error.into()),
        };
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if is_cache_file(&path) {
                fs::remove_file(&path)
                    .await
                    .with_context(|| format!("failed to remove cache file {path:?}"))?;
                removed += 1;
            }
        }
        self.stats.set_entry_count(0);
        Ok(removed)
    }
}

fn is_cache_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}
