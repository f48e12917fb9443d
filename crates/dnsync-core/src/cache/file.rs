// # File Push Cache
//
// File-based implementation of PushCache.
//
// ## Lifecycle
//
// - Loaded once when opened; a missing file is a cold start
// - Upserts stay in memory
// - `flush()` rewrites the whole file: temp file, backup of the previous
//   file, rename
// - A corrupt file falls back to its backup, then to an empty cache, with
//   a warning; reconciliation never depends on the cache
//
// ## File Format
//
// ```json
// [
//   {
//     "subdomain": "www",
//     "domain": "example.com",
//     "type": "AAAA",
//     "ip": "2001:db8::1",
//     "ipType": "IPv6",
//     "lastUpdate": "2025-01-09T12:00:00Z"
//   }
// ]
// ```

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::push_cache::{CacheEntry, CacheKey, PushCache};

/// File-based push cache
///
/// # Example
///
/// ```rust,no_run
/// use dnsync_core::cache::FilePushCache;
/// use dnsync_core::traits::PushCache;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let cache = FilePushCache::open("/var/lib/dnsync/cache.json").await?;
///     println!("{} cached records", cache.entries().await?.len());
///     cache.flush().await?;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FilePushCache {
    path: PathBuf,
    state: RwLock<CacheState>,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: Vec<CacheEntry>,
    dirty: bool,
}

impl FilePushCache {
    /// Open the cache at `path`, creating parent directories if needed
    ///
    /// Loading never fails: an unreadable file only costs redundant pushes.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
            && let Err(e) = fs::create_dir_all(parent).await
        {
            // flush reports the write failure at the end of the run
            tracing::warn!(
                "Failed to create cache directory {}: {}",
                parent.display(),
                e
            );
        }

        let entries = Self::load_with_recovery(&path).await;

        Ok(Self {
            path,
            state: RwLock::new(CacheState {
                entries,
                dirty: false,
            }),
        })
    }

    /// Load the main file, falling back to the backup, then to an empty cache
    async fn load_with_recovery(path: &Path) -> Vec<CacheEntry> {
        match Self::load(path).await {
            Ok(entries) => {
                tracing::debug!("Loaded push cache: {} entries", entries.len());
                entries
            }
            Err(Error::Json(e)) => {
                tracing::warn!(
                    "Push cache {} is corrupted: {}. Trying backup.",
                    path.display(),
                    e
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    tracing::warn!("No push cache backup found. Starting with empty cache.");
                    return Vec::new();
                }

                match Self::load(&backup_path).await {
                    Ok(entries) => {
                        tracing::info!("Recovered push cache from backup: {} entries", entries.len());
                        entries
                    }
                    Err(backup_err) => {
                        tracing::warn!(
                            "Push cache backup also unusable: {}. Starting with empty cache.",
                            backup_err
                        );
                        Vec::new()
                    }
                }
            }
            Err(e) => {
                tracing::warn!("{}. Starting with empty cache.", e);
                Vec::new()
            }
        }
    }

    async fn load(path: &Path) -> Result<Vec<CacheEntry>, Error> {
        if !path.exists() {
            tracing::debug!("Push cache file does not exist: {}", path.display());
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::cache(format!(
                "Failed to read cache file {}: {}",
                path.display(),
                e
            ))
        })?;

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        Ok(serde_json::from_str(&content)?)
    }

    /// Write every entry to disk via temp file + rename
    async fn write(&self) -> Result<(), Error> {
        let mut state = self.state.write().await;

        let json = serde_json::to_string_pretty(&state.entries)
            .map_err(|e| Error::cache(format!("Failed to serialize push cache: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::cache(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::cache(format!(
                    "Failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.flush().await.map_err(|e| {
                Error::cache(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists()
            && let Err(e) = fs::copy(&self.path, Self::backup_path(&self.path)).await
        {
            tracing::warn!("Failed to back up push cache: {}", e);
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::cache(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        state.dirty = false;
        tracing::trace!("Push cache written to {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PushCache for FilePushCache {
    async fn lookup(&self, key: &CacheKey) -> Result<Option<CacheEntry>, Error> {
        let state = self.state.read().await;
        Ok(state.entries.iter().find(|e| &e.key() == key).cloned())
    }

    async fn upsert(&self, entry: CacheEntry) -> Result<(), Error> {
        let mut state = self.state.write().await;
        let key = entry.key();
        match state.entries.iter_mut().find(|e| e.key() == key) {
            Some(existing) => *existing = entry,
            None => state.entries.push(entry),
        }
        state.dirty = true;
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> Result<(), Error> {
        let mut state = self.state.write().await;
        let before = state.entries.len();
        state.entries.retain(|e| &e.key() != key);
        if state.entries.len() != before {
            state.dirty = true;
        }
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<CacheEntry>, Error> {
        let state = self.state.read().await;
        Ok(state.entries.clone())
    }

    async fn flush(&self) -> Result<(), Error> {
        if self.state.read().await.dirty {
            self.write().await
        } else {
            Ok(())
        }
    }
}
