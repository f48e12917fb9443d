// # Memory Push Cache
//
// In-memory implementation of PushCache.
//
// Nothing survives the process, so the first run after a restart pushes
// every dirty record. Mostly useful for tests and for seeding a run with
// known values.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::push_cache::{CacheEntry, CacheKey, PushCache};

/// In-memory push cache
///
/// Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryPushCache {
    inner: Arc<RwLock<Vec<CacheEntry>>>,
}

impl MemoryPushCache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache pre-filled with `entries`
    pub fn with_entries(entries: impl IntoIterator<Item = CacheEntry>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(entries.into_iter().collect())),
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl PushCache for MemoryPushCache {
    async fn lookup(&self, key: &CacheKey) -> Result<Option<CacheEntry>, Error> {
        let entries = self.inner.read().await;
        Ok(entries.iter().find(|e| &e.key() == key).cloned())
    }

    async fn upsert(&self, entry: CacheEntry) -> Result<(), Error> {
        let mut entries = self.inner.write().await;
        let key = entry.key();
        match entries.iter_mut().find(|e| e.key() == key) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> Result<(), Error> {
        self.inner.write().await.retain(|e| &e.key() != key);
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<CacheEntry>, Error> {
        Ok(self.inner.read().await.clone())
    }

    async fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}
