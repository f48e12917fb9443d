//! Per-provider reconciliation service
//!
//! A [`ZoneReconciler`] wraps one [`DnsProvider`] for the duration of a run.
//! It memoizes zones, turns desired records into create/update decisions
//! and pushes only what changed.
//!
//! ## Invariants
//!
//! - A zone is fetched at most once per run, whatever the outcome
//! - At most one record matches a `(name, type[, family])` key; more is an
//!   anomaly and leaves the zone untouched
//! - A failed push never stops the remaining records or zones
//! - A cache hit skips the provider call; deletes are never gated

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::model::{DnsRecord, DomainZone, RecordState};
use crate::traits::{CacheEntry, CacheKey, DnsProvider, PushCache};

/// Memo entry for one domain
///
/// A domain without an entry has not been asked for yet.
#[derive(Debug, Clone)]
enum ZoneSlot {
    /// Index into `zones`
    Loaded(usize),
    /// The provider does not know the domain and did not create it
    Absent,
    /// Fetching failed; the message is reported for every later record
    Unavailable(String),
}

/// Session state of the wrapped provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Active,
    Failed,
}

/// Outcome of reconciling one desired record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// No match; the desired record was appended as `PendingCreate`
    Created,
    /// One match with a different address; updated in place
    Updated,
    /// One match already carrying the address
    Unchanged,
}

/// Counters of one push stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushSummary {
    /// Provider calls that succeeded
    pub pushed: usize,
    /// Records skipped because the cache already held their address
    pub cached: usize,
    /// Provider calls that failed
    pub failed: usize,
}

impl PushSummary {
    pub fn absorb(&mut self, other: PushSummary) {
        self.pushed += other.pushed;
        self.cached += other.cached;
        self.failed += other.failed;
    }
}

/// Reconciliation service for one provider
pub struct ZoneReconciler {
    provider: Box<dyn DnsProvider>,
    cache: Option<Arc<dyn PushCache>>,
    zones: Vec<DomainZone>,
    slots: HashMap<String, ZoneSlot>,
    session: SessionState,
}

impl ZoneReconciler {
    pub fn new(provider: Box<dyn DnsProvider>) -> Self {
        Self {
            provider,
            cache: None,
            zones: Vec::new(),
            slots: HashMap::new(),
            session: SessionState::Idle,
        }
    }

    /// Gate pushes through `cache`
    pub fn with_cache(mut self, cache: Arc<dyn PushCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    /// Zones fetched so far, in first-access order
    pub fn zones(&self) -> &[DomainZone] {
        &self.zones
    }

    /// Memoized zone of `domain`, without fetching
    pub fn zone(&self, domain: &str) -> Option<&DomainZone> {
        match self.slots.get(domain) {
            Some(ZoneSlot::Loaded(index)) => self.zones.get(*index),
            _ => None,
        }
    }

    pub fn session(&self) -> SessionState {
        self.session
    }

    /// Authenticate the provider for this run
    pub async fn open_session(&mut self) -> Result<()> {
        match self.provider.acquire_session().await {
            Ok(()) => {
                self.session = SessionState::Active;
                Ok(())
            }
            Err(e) => {
                self.session = SessionState::Failed;
                Err(match e {
                    session @ Error::ProviderSession { .. } => session,
                    other => Error::session(self.provider.provider_name(), other.to_string()),
                })
            }
        }
    }

    /// Release an active session; failures are logged, never returned
    pub async fn close_session(&mut self) {
        if self.session != SessionState::Active {
            return;
        }
        if let Err(e) = self.provider.release_session().await {
            warn!(provider = self.provider.provider_name(), error = %e, "Failed to release provider session");
        }
        self.session = SessionState::Idle;
    }

    /// Zone of `domain`, fetched from the provider on first access
    ///
    /// # Returns
    ///
    /// - `Ok(Some(zone))`: fetched or created zone
    /// - `Ok(None)`: the provider has no zone for the domain
    /// - `Err(Error)`: the first fetch failed (later calls repeat the error)
    pub async fn get_domain_zone(&mut self, domain: &str) -> Result<Option<&DomainZone>> {
        let index = self.zone_index(domain).await?;
        Ok(index.and_then(|i| self.zones.get(i)))
    }

    async fn zone_index(&mut self, domain: &str) -> Result<Option<usize>> {
        if let Some(slot) = self.slots.get(domain) {
            return match slot {
                ZoneSlot::Loaded(index) => Ok(Some(*index)),
                ZoneSlot::Absent => Ok(None),
                ZoneSlot::Unavailable(message) => {
                    Err(Error::provider(self.provider.provider_name(), message.clone()))
                }
            };
        }

        let fetched = match self.provider.fetch_zone(domain).await {
            Ok(Some(zone)) => Ok(Some(zone)),
            Ok(None) => self.provider.create_zone(domain).await,
            Err(e) => Err(e),
        };

        match fetched {
            Ok(Some(zone)) => {
                debug!(
                    provider = self.provider.provider_name(),
                    zone = domain,
                    records = zone.len(),
                    "Zone loaded"
                );
                self.zones.push(zone);
                let index = self.zones.len() - 1;
                self.slots.insert(domain.to_string(), ZoneSlot::Loaded(index));
                Ok(Some(index))
            }
            Ok(None) => {
                self.slots.insert(domain.to_string(), ZoneSlot::Absent);
                Ok(None)
            }
            Err(e) => {
                self.slots
                    .insert(domain.to_string(), ZoneSlot::Unavailable(e.to_string()));
                Err(e)
            }
        }
    }

    /// Reconcile one desired record against its zone
    ///
    /// # Errors
    ///
    /// - `Error::NotFound`: no zone for the record's domain
    /// - `Error::RecordAnomaly`: more than one record matched; the zone is
    ///   left unmodified
    /// - provider errors from the first zone fetch
    pub async fn update_dns_record(&mut self, mut desired: DnsRecord) -> Result<Reconciliation> {
        let domain = desired.domain().domain().to_string();
        let Some(index) = self.zone_index(&domain).await? else {
            return Err(Error::not_found(format!(
                "{} has no zone for {}",
                self.provider.provider_name(),
                domain
            )));
        };

        let now = Utc::now();
        desired.set_last_update(Some(now));

        let match_family = self.provider.matches_by_family();
        let zone = &mut self.zones[index];
        let matches = zone.find_matches(&desired, match_family);

        match matches.as_slice() {
            [] => {
                desired.mark_pending_create();
                debug!(record = %desired.label(), "Record queued for create");
                zone.append(desired);
                Ok(Reconciliation::Created)
            }
            [existing] => {
                let Some(existing) = zone.record_mut(*existing) else {
                    return Err(Error::not_found(desired.label()));
                };
                if existing.address_differs(desired.address()) {
                    debug!(
                        record = %desired.label(),
                        from = %existing.address().map(ToString::to_string).unwrap_or_default(),
                        to = %desired.address().map(ToString::to_string).unwrap_or_default(),
                        "Record queued for update"
                    );
                    existing.apply_update(desired.address().cloned(), now);
                    Ok(Reconciliation::Updated)
                } else {
                    Ok(Reconciliation::Unchanged)
                }
            }
            many => Err(Error::anomaly(desired.label(), many.len())),
        }
    }

    /// Push every dirty record of every zone
    ///
    /// Failures are logged and counted; the record stays dirty.
    pub async fn push(&mut self) -> PushSummary {
        let mut summary = PushSummary::default();
        for zone_index in 0..self.zones.len() {
            summary.absorb(self.push_zone(zone_index).await);
        }
        summary
    }

    async fn push_zone(&mut self, zone_index: usize) -> PushSummary {
        let mut summary = PushSummary::default();
        let mut handled = HashSet::new();
        let provider_name = self.provider.provider_name();
        let combines = self.provider.combines_families();

        for record_index in self.zones[zone_index].dirty_indices() {
            if !handled.insert(record_index) {
                continue;
            }

            let gated = matches!(
                self.zones[zone_index].records()[record_index].state(),
                RecordState::PendingCreate | RecordState::PendingUpdate
            );
            if gated && self.cache_hit(&self.zones[zone_index].records()[record_index]).await {
                if let Some(record) = self.zones[zone_index].record_mut(record_index) {
                    debug!(record = %record.label(), "Push skipped, address already cached");
                    record.mark_clean();
                }
                summary.cached += 1;
                continue;
            }

            let (outcome, sibling_index) = {
                let zone = &self.zones[zone_index];
                let record = &zone.records()[record_index];
                let sibling_index = if combines {
                    zone.sibling_index(record.domain(), record.effective_family().opposite())
                } else {
                    None
                };
                let sibling = sibling_index.and_then(|i| zone.records().get(i));
                let outcome = self.provider.push_record(zone, record, sibling).await;
                (outcome, sibling_index)
            };

            // one call per hostname: a dirty sibling rode along
            let rode_along = sibling_index.filter(|&i| self.zones[zone_index].records()[i].is_dirty());
            if let Some(i) = rode_along {
                handled.insert(i);
            }

            match outcome {
                Ok(()) => {
                    summary.pushed += 1;
                    for index in std::iter::once(record_index).chain(rode_along) {
                        let (entry, deleted) = match self.zones[zone_index].record_mut(index) {
                            Some(record) => {
                                info!(provider = provider_name, record = %record.label(), "Record pushed");
                                let deleted = record.state() == RecordState::PendingDelete;
                                record.mark_clean();
                                (CacheEntry::from_record(record), deleted)
                            }
                            None => continue,
                        };
                        if deleted {
                            self.forget(&entry.key()).await;
                        } else {
                            self.remember(entry).await;
                        }
                    }
                }
                Err(e) => {
                    summary.failed += 1;
                    error!(
                        provider = provider_name,
                        zone = self.zones[zone_index].domain(),
                        record = %self.zones[zone_index].records()[record_index].label(),
                        error = %e,
                        "Push failed"
                    );
                }
            }
        }

        let zone = &mut self.zones[zone_index];
        if zone.is_pending_create() && zone.dirty_indices().is_empty() {
            zone.clear_pending_create();
        }

        summary
    }

    async fn cache_hit(&self, record: &DnsRecord) -> bool {
        let Some(cache) = &self.cache else {
            return false;
        };
        match cache.lookup(&CacheKey::for_record(record)).await {
            Ok(Some(entry)) => entry.matches(record),
            Ok(None) => false,
            Err(e) => {
                warn!(record = %record.label(), error = %e, "Push cache lookup failed");
                false
            }
        }
    }

    async fn forget(&self, key: &CacheKey) {
        if let Some(cache) = &self.cache
            && let Err(e) = cache.remove(key).await
        {
            warn!(error = %e, "Push cache removal failed");
        }
    }

    async fn remember(&self, entry: CacheEntry) {
        if let Some(cache) = &self.cache
            && let Err(e) = cache.upsert(entry).await
        {
            warn!(error = %e, "Push cache update failed");
        }
    }
}
