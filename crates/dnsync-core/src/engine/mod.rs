//! Run driver
//!
//! The DdnsEngine performs one reconciliation run:
//! - Detecting the host addresses via IpDetector
//! - Building the desired A/AAAA record of every configured subdomain
//! - Reconciling them against provider zones (ZoneReconciler)
//! - Pushing changed records, gated by the PushCache
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │ IpDetector  │─── Ipv4 / Ipv6 ───┐
//! └─────────────┘                   │
//!                                   ▼
//!                          ┌──────────────┐
//!                          │  DdnsEngine  │── one ZoneReconciler per module
//!                          └──────────────┘
//!                                   │
//!         ┌─────────────────────────┼─────────────────────────┐
//!         ▼                         ▼                         ▼
//! ┌─────────────┐          ┌──────────────┐          ┌─────────────┐
//! │ DomainZone  │          │ DnsProvider  │          │  PushCache  │
//! │ (reconcile) │          │ (push)       │          │ (gate)      │
//! └─────────────┘          └──────────────┘          └─────────────┘
//! ```
//!
//! ## Run Flow
//!
//! 1. Validate configuration (fatal)
//! 2. Detect addresses (fatal only when no enabled family is available)
//! 3. Acquire provider sessions
//! 4. Reconcile every subdomain in configuration order
//! 5. Push, unless dry-run
//! 6. Release sessions, always
//! 7. Flush the push cache

pub mod reconciler;

pub use reconciler::{PushSummary, Reconciliation, SessionState, ZoneReconciler};

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::{DdnsConfig, DomainConfig, SubdomainConfig};
use crate::error::{Error, Result};
use crate::model::{DnsRecord, Domain};
use crate::net::{Ipv4, Ipv6, Ipv6Builder};
use crate::registry::ProviderRegistry;
use crate::traits::{DnsProvider, IpDetector, PushCache};

/// Addresses detected at the start of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectedAddresses {
    pub ipv4: Option<Ipv4>,
    pub ipv6: Option<Ipv6>,
}

/// Counters of one run
///
/// Per-record failures are counted here and never turn into an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Desired records appended as new
    pub created: usize,
    /// Existing records updated in place
    pub updated: usize,
    /// Records already carrying the desired address
    pub unchanged: usize,
    /// Records aborted because more than one record matched
    pub anomalies: usize,
    /// Records that could not be reconciled (zone missing, fetch failed)
    pub failed: usize,
    /// Records not attempted because their module has no session
    pub skipped: usize,
    /// Push stage counters (all zero on a dry run)
    pub push: PushSummary,
    /// Whether the push stage was suppressed
    pub dry_run: bool,
}

impl RunReport {
    /// Records that went through reconciliation
    pub fn reconciled(&self) -> usize {
        self.created + self.updated + self.unchanged
    }
}

/// Single-run DDNS engine
///
/// ## Lifecycle
///
/// 1. Create with [`DdnsEngine::new()`] or [`DdnsEngine::from_registry()`]
/// 2. Call [`DdnsEngine::run_once()`]
///
/// Zones are memoized for the lifetime of the engine, so a fresh engine is
/// built for every run.
pub struct DdnsEngine {
    config: DdnsConfig,
    detector: Box<dyn IpDetector>,
    /// One service per module, in configuration order
    services: Vec<(String, ZoneReconciler)>,
    cache: Option<Arc<dyn PushCache>>,
}

impl DdnsEngine {
    /// Create an engine from already constructed collaborators
    ///
    /// # Parameters
    ///
    /// - `config`: validated before anything else is touched
    /// - `detector`: IP detector
    /// - `providers`: `(module name, provider)` pairs; every module named by
    ///   the configuration must be present
    /// - `cache`: optional push cache gate shared by all providers
    pub fn new(
        config: DdnsConfig,
        detector: Box<dyn IpDetector>,
        providers: Vec<(String, Box<dyn DnsProvider>)>,
        cache: Option<Arc<dyn PushCache>>,
    ) -> Result<Self> {
        config.validate()?;

        for module in &config.modules {
            if !providers.iter().any(|(name, _)| name == &module.name) {
                return Err(Error::config(format!(
                    "No provider supplied for module {}",
                    module.name
                )));
            }
        }

        let services = providers
            .into_iter()
            .map(|(name, provider)| {
                let service = ZoneReconciler::new(provider);
                let service = match &cache {
                    Some(cache) => service.with_cache(cache.clone()),
                    None => service,
                };
                (name, service)
            })
            .collect();

        Ok(Self {
            config,
            detector,
            services,
            cache,
        })
    }

    /// Create an engine whose collaborators come from `registry`
    pub async fn from_registry(config: DdnsConfig, registry: &ProviderRegistry) -> Result<Self> {
        config.validate()?;

        let detector = registry.create_detector(&config.detector)?;

        let mut providers = Vec::with_capacity(config.modules.len());
        for module in &config.modules {
            let provider = registry.create_provider(&module.provider, config.dry_run)?;
            debug!(module = %module.name, provider = provider.provider_name(), "Provider created");
            providers.push((module.name.clone(), provider));
        }

        let cache = match registry.open_cache(&config.cache).await {
            Ok(cache) => cache,
            Err(e @ Error::Config(_)) => return Err(e),
            Err(e) => {
                warn!(error = %e, "Push cache unavailable, every dirty record will be pushed");
                None
            }
        };

        Self::new(config, detector, providers, cache)
    }

    pub fn config(&self) -> &DdnsConfig {
        &self.config
    }

    /// Service of module `name`
    pub fn service(&self, name: &str) -> Option<&ZoneReconciler> {
        self.services
            .iter()
            .find(|(module, _)| module == name)
            .map(|(_, service)| service)
    }

    /// Run one reconciliation pass
    ///
    /// # Returns
    ///
    /// - `Ok(RunReport)`: the run completed; individual records may still
    ///   have failed
    /// - `Err(Error)`: configuration or address detection failed before any
    ///   provider was touched
    pub async fn run_once(&mut self) -> Result<RunReport> {
        self.config.validate()?;

        let addresses = self.detect().await?;
        let mut report = RunReport {
            dry_run: self.config.dry_run,
            ..RunReport::default()
        };

        self.acquire_sessions().await;
        self.reconcile_all(&addresses, &mut report).await;

        if self.config.dry_run {
            info!("Dry run: {} record(s) reconciled, push suppressed", report.reconciled());
        } else {
            for (module, service) in &mut self.services {
                if service.session() == SessionState::Failed {
                    continue;
                }
                let summary = service.push().await;
                debug!(module = %module, ?summary, "Push stage finished");
                report.push.absorb(summary);
            }
        }

        self.release_sessions().await;

        if let Some(cache) = &self.cache
            && let Err(e) = cache.flush().await
        {
            error!(error = %e, "Failed to flush push cache");
        }

        info!(
            created = report.created,
            updated = report.updated,
            unchanged = report.unchanged,
            anomalies = report.anomalies,
            failed = report.failed,
            pushed = report.push.pushed,
            cached = report.push.cached,
            push_failed = report.push.failed,
            "Run finished"
        );

        Ok(report)
    }

    /// Detect the addresses of every enabled family
    ///
    /// A family that fails is skipped with an error log; the run only
    /// fails when no enabled family could be detected.
    async fn detect(&self) -> Result<DetectedAddresses> {
        let mut detected = DetectedAddresses::default();
        let mut failures = Vec::new();

        if self.config.use_ipv4 {
            match self.detector.wan_ipv4().await {
                Ok(ip) if ip.validate() => {
                    info!(address = ip.address(), "Detected IPv4 address");
                    detected.ipv4 = Some(ip);
                }
                Ok(ip) => failures.push(format!("IPv4 address {} is invalid", ip.address())),
                Err(e) => failures.push(format!("IPv4: {e}")),
            }
        }

        if self.config.use_ipv6 {
            match self.detector.wan_ipv6().await {
                Ok(ip) if ip.validate() => {
                    info!(
                        address = ip.address().unwrap_or_default(),
                        prefix = ip.network_cidr().unwrap_or_default(),
                        "Detected IPv6 address"
                    );
                    detected.ipv6 = Some(ip);
                }
                Ok(_) => failures.push("IPv6 address is invalid".to_string()),
                Err(e) => failures.push(format!("IPv6: {e}")),
            }
        }

        if detected.ipv4.is_none() && detected.ipv6.is_none() {
            return Err(Error::address_detection(format!(
                "{} detected no usable address ({})",
                self.detector.detector_name(),
                failures.join("; ")
            )));
        }

        for failure in failures {
            error!(detector = self.detector.detector_name(), "Address detection failed, skipping family: {}", failure);
        }

        Ok(detected)
    }

    async fn acquire_sessions(&mut self) {
        for (module, service) in &mut self.services {
            if let Err(e) = service.open_session().await {
                error!(module = %module, error = %e, "Provider session failed, skipping its records");
            }
        }
    }

    async fn release_sessions(&mut self) {
        for (_, service) in &mut self.services {
            service.close_session().await;
        }
    }

    async fn reconcile_all(&mut self, addresses: &DetectedAddresses, report: &mut RunReport) {
        for domain in &self.config.domains {
            let Some(service) = self
                .services
                .iter_mut()
                .find(|(module, _)| module == &domain.module)
                .map(|(_, service)| service)
            else {
                error!(zone = %domain.domain, module = %domain.module, "No service for module");
                report.failed += domain.subdomains.len();
                continue;
            };

            let desired = desired_records(&self.config, domain, addresses);

            if service.session() == SessionState::Failed {
                warn!(zone = %domain.domain, "Skipping {} record(s), provider has no session", desired.len());
                report.skipped += desired.len();
                continue;
            }

            for record in desired {
                let label = record.label();
                match service.update_dns_record(record).await {
                    Ok(Reconciliation::Created) => report.created += 1,
                    Ok(Reconciliation::Updated) => report.updated += 1,
                    Ok(Reconciliation::Unchanged) => {
                        debug!(record = %label, "Record up to date");
                        report.unchanged += 1;
                    }
                    Err(e @ Error::RecordAnomaly { .. }) => {
                        error!(record = %label, error = %e, "Record skipped");
                        report.anomalies += 1;
                    }
                    Err(e) => {
                        error!(record = %label, error = %e, "Record could not be reconciled");
                        report.failed += 1;
                    }
                }
            }
        }
    }
}

/// Desired records of every subdomain of `domain`, A before AAAA
fn desired_records(
    config: &DdnsConfig,
    domain: &DomainConfig,
    addresses: &DetectedAddresses,
) -> Vec<DnsRecord> {
    let mut records = Vec::new();
    for sub in &domain.subdomains {
        let name = Domain::new(sub.name.as_str(), domain.domain.as_str());

        if config.use_ipv4
            && let Some(ip) = desired_ipv4(sub, addresses)
        {
            records.push(DnsRecord::with_address(name.clone(), ip.into()));
        }

        if config.use_ipv6
            && let Some(ip) = desired_ipv6(sub, addresses, config.update_network_prefix)
        {
            records.push(DnsRecord::with_address(name, ip.into()));
        }
    }
    records
}

/// Static override wins over the detected address
fn desired_ipv4(sub: &SubdomainConfig, addresses: &DetectedAddresses) -> Option<Ipv4> {
    match &sub.ipv4 {
        Some(fixed) => Some(Ipv4::new(fixed.as_str())),
        None => addresses.ipv4.clone(),
    }
}

/// Detected address, or the static interface identifier behind the
/// detected network prefix
///
/// Without prefix propagation the value carries the address only.
fn desired_ipv6(
    sub: &SubdomainConfig,
    addresses: &DetectedAddresses,
    propagate_prefix: bool,
) -> Option<Ipv6> {
    let detected = addresses.ipv6.as_ref()?;

    let builder = Ipv6Builder::new()
        .address(detected.address())
        .network_prefix(detected.network_prefix())
        .network_prefix_length(detected.network_prefix_length())
        .interface_identifier(sub.ipv6.as_deref().or(detected.interface_identifier()));

    let ip = match &sub.ipv6 {
        Some(iid) => match builder.clone().build_by_network_and_interface() {
            Ok(ip) => ip,
            Err(e) => {
                warn!(
                    subdomain = %sub.name,
                    interface = %iid,
                    error = %e,
                    "Using detected IPv6 address instead of interface identifier"
                );
                builder.build()
            }
        },
        None => builder.build(),
    };

    if propagate_prefix {
        Some(ip)
    } else {
        let mut plain = Ipv6::default();
        plain.set_address(ip.address());
        plain.set_kind(ip.kind());
        Some(plain)
    }
}
