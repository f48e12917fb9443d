// # DNS Provider Trait
//
// Defines the per-backend half of the reconciliation contract.
//
// ## Implementations
//
// - DynDNS2 / IPv64 key-based endpoints: `dnsync-provider-dyndns` crate
// - Custom backends registered through `ProviderRegistry`
//
// ## Usage
//
// ```rust,ignore
// use dnsync_core::{DnsProvider, ZoneReconciler};
//
// let mut service = ZoneReconciler::new(provider);
// service.update_dns_record(desired).await?;
// let summary = service.push().await;
// ```
//
// The provider only knows how to fetch a zone and how to send one record
// (plus its sibling) upstream. Zone memoization, matching, anomaly
// detection, dirty-state bookkeeping and failure isolation are owned by
// `ZoneReconciler`.

use async_trait::async_trait;

use crate::model::{DnsRecord, DomainZone};

/// Trait for DNS provider implementations
///
/// # Zones
///
/// Providers with a per-domain record listing return it from
/// [`fetch_zone`](DnsProvider::fetch_zone). Key-based update APIs that have
/// no listing return an empty zone instead. `Ok(None)` means the provider
/// does not know the domain; the reconciler then asks
/// [`create_zone`](DnsProvider::create_zone), which fails the record by
/// default.
///
/// # Sessions
///
/// [`acquire_session`](DnsProvider::acquire_session) is called once before
/// any zone is fetched and [`release_session`](DnsProvider::release_session)
/// once after the run, even when the run failed. Implementations without a
/// session keep the defaults.
///
/// # Forbidden
///
/// - Retrying or backing off (a failed push stays dirty for the next run)
/// - Deciding whether a record needs a push (owned by `ZoneReconciler`)
/// - Touching the push cache
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Get the provider name (for logging and error reports)
    fn provider_name(&self) -> &'static str;

    /// Whether records of both families may share one type key
    ///
    /// When `true`, matching also compares the address family of the
    /// existing and desired values.
    fn matches_by_family(&self) -> bool {
        false
    }

    /// Whether one push conveys the A and AAAA values of a hostname together
    ///
    /// When `true`, [`push_record`](DnsProvider::push_record) receives the
    /// opposite-family record of the same name as read-only context and a
    /// dirty sibling is considered pushed along with it.
    fn combines_families(&self) -> bool {
        false
    }

    /// Authenticate before the run
    async fn acquire_session(&self) -> Result<(), crate::Error> {
        Ok(())
    }

    /// Tear the session down after the run
    async fn release_session(&self) -> Result<(), crate::Error> {
        Ok(())
    }

    /// Fetch the current zone of `domain`
    ///
    /// # Returns
    ///
    /// - `Ok(Some(zone))`: the provider's record set
    /// - `Ok(None)`: the provider does not manage this domain
    /// - `Err(Error)`: the request failed
    async fn fetch_zone(&self, domain: &str) -> Result<Option<DomainZone>, crate::Error>;

    /// Produce a zone for a domain the provider does not know yet
    ///
    /// Returning `Ok(None)` fails the record that asked for the zone.
    async fn create_zone(&self, domain: &str) -> Result<Option<DomainZone>, crate::Error> {
        let _ = domain;
        Ok(None)
    }

    /// Send one dirty record upstream
    ///
    /// # Parameters
    ///
    /// - `zone`: zone the record belongs to
    /// - `record`: the record to create, update or delete (see its state)
    /// - `sibling`: same name, other family; only passed to providers that
    ///   [`combine families`](DnsProvider::combines_families)
    async fn push_record(
        &self,
        zone: &DomainZone,
        record: &DnsRecord,
        sibling: Option<&DnsRecord>,
    ) -> Result<(), crate::Error>;
}

/// Helper trait for constructing DNS providers from configuration
pub trait DnsProviderFactory: Send + Sync {
    /// Create a DnsProvider instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Configuration of the module being built
    /// - `dry_run`: whether the run suppresses remote side effects
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
        dry_run: bool,
    ) -> Result<Box<dyn DnsProvider>, crate::Error>;
}
