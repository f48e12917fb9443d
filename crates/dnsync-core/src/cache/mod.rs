// # Push Cache Implementations
//
// This module provides implementations of the PushCache trait for
// different persistence strategies, plus the factories the registry uses
// to open them from configuration.

pub mod file;
pub mod memory;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::traits::{PushCache, PushCacheFactory};

pub use file::FilePushCache;
pub use memory::MemoryPushCache;

/// Opens [`FilePushCache`] from `CacheConfig::File`
pub struct FilePushCacheFactory;

#[async_trait]
impl PushCacheFactory for FilePushCacheFactory {
    async fn open(&self, config: &CacheConfig) -> Result<Arc<dyn PushCache>> {
        match config {
            CacheConfig::File { path } => Ok(Arc::new(FilePushCache::open(path).await?)),
            other => Err(Error::config(format!(
                "File cache factory cannot open {other:?}"
            ))),
        }
    }
}

/// Opens an empty [`MemoryPushCache`]
pub struct MemoryPushCacheFactory;

#[async_trait]
impl PushCacheFactory for MemoryPushCacheFactory {
    async fn open(&self, _config: &CacheConfig) -> Result<Arc<dyn PushCache>> {
        Ok(Arc::new(MemoryPushCache::new()))
    }
}
