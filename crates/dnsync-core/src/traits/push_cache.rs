// # Push Cache Trait
//
// Defines the optional last-known-address gate in front of provider pushes.
//
// ## Purpose
//
// Before a push the reconciler asks the cache whether it already recorded
// the exact address for the record's key; a hit skips the provider call.
// After a successful push the entry is upserted. Reconciliation never
// depends on the cache: without one, every dirty record is pushed.
//
// ## Implementations
//
// - File-based: `FilePushCache` (JSON array, loaded on open, written on flush)
// - In-memory: `MemoryPushCache`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{DnsRecord, Domain, RecordType};
use crate::net::AddressFamily;

/// Key of a cache entry: `(subdomain, domain, type, family)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub subdomain: String,
    pub domain: String,
    pub record_type: RecordType,
    pub family: AddressFamily,
}

impl CacheKey {
    /// Key of `record`
    ///
    /// The family falls back to the one the record type carries when the
    /// record has no address.
    pub fn for_record(record: &DnsRecord) -> Self {
        Self {
            subdomain: record.domain().sub_domain().to_string(),
            domain: record.domain().domain().to_string(),
            record_type: record.record_type(),
            family: record.effective_family(),
        }
    }
}

/// One persisted cache entry
///
/// Serialized as `{subdomain, domain, type, ip, ipType, lastUpdate}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub subdomain: String,
    pub domain: String,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub ip: Option<String>,
    pub ip_type: AddressFamily,
    pub last_update: Option<DateTime<Utc>>,
}

impl CacheEntry {
    /// Entry recording the current address of `record`
    pub fn from_record(record: &DnsRecord) -> Self {
        let key = CacheKey::for_record(record);
        Self {
            subdomain: key.subdomain,
            domain: key.domain,
            record_type: key.record_type,
            ip: record.address().and_then(|a| a.address()).map(str::to_string),
            ip_type: key.family,
            last_update: record.last_update().or_else(|| Some(Utc::now())),
        }
    }

    pub fn key(&self) -> CacheKey {
        let name = Domain::new(self.subdomain.as_str(), self.domain.as_str());
        CacheKey {
            subdomain: name.sub_domain().to_string(),
            domain: name.domain().to_string(),
            record_type: self.record_type,
            family: self.ip_type,
        }
    }

    /// Whether this entry already holds the address of `record`
    pub fn matches(&self, record: &DnsRecord) -> bool {
        self.ip.as_deref() == record.address().and_then(|a| a.address())
    }
}

/// Trait for push cache implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
///
/// # Persistence
///
/// Stores load their state when opened and persist it on
/// [`flush`](PushCache::flush). The engine flushes once at the end of a run.
#[async_trait]
pub trait PushCache: Send + Sync {
    /// Look up the entry for `key`
    ///
    /// # Returns
    ///
    /// - `Ok(Some(CacheEntry))`: the last pushed value
    /// - `Ok(None)`: nothing recorded for this key
    /// - `Err(Error)`: storage error
    async fn lookup(&self, key: &CacheKey) -> Result<Option<CacheEntry>, crate::Error>;

    /// Insert or replace the entry for its key
    async fn upsert(&self, entry: CacheEntry) -> Result<(), crate::Error>;

    /// Forget the entry for `key`, if any
    async fn remove(&self, key: &CacheKey) -> Result<(), crate::Error>;

    /// All entries, in insertion order
    async fn entries(&self) -> Result<Vec<CacheEntry>, crate::Error>;

    /// Persist pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}

/// Helper trait for constructing push caches from configuration
#[async_trait]
pub trait PushCacheFactory: Send + Sync {
    /// Open a cache described by `config`
    async fn open(
        &self,
        config: &crate::config::CacheConfig,
    ) -> Result<std::sync::Arc<dyn PushCache>, crate::Error>;
}
