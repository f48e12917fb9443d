//! Test doubles and common utilities for contract tests
//!
//! The doubles count every call so tests can assert which side effects a
//! run did or did not cause.

#![allow(dead_code)]

use dnsync_core::config::{DdnsConfig, DomainConfig, ModuleConfig, ProviderConfig, SubdomainConfig};
use dnsync_core::error::{Error, Result};
use dnsync_core::model::{DnsRecord, Domain, DomainZone};
use dnsync_core::net::{Ipv4, Ipv6};
use dnsync_core::traits::{DnsProvider, DnsProviderFactory};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A mock DnsProvider that tracks calls
///
/// Unknown domains get an empty zone unless `strict_zones` is set.
pub struct MockDnsProvider {
    pub name: &'static str,
    zones: HashMap<String, DomainZone>,
    strict_zones: bool,
    combine: bool,
    match_family: bool,
    failing_domains: HashSet<String>,
    failing_session: bool,
    fetch_call_count: Arc<AtomicUsize>,
    push_call_count: Arc<AtomicUsize>,
    acquire_call_count: Arc<AtomicUsize>,
    release_call_count: Arc<AtomicUsize>,
    pushed_records: Arc<Mutex<Vec<String>>>,
}

impl MockDnsProvider {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            zones: HashMap::new(),
            strict_zones: false,
            combine: false,
            match_family: false,
            failing_domains: HashSet::new(),
            failing_session: false,
            fetch_call_count: Arc::new(AtomicUsize::new(0)),
            push_call_count: Arc::new(AtomicUsize::new(0)),
            acquire_call_count: Arc::new(AtomicUsize::new(0)),
            release_call_count: Arc::new(AtomicUsize::new(0)),
            pushed_records: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Serve `zone` for its domain
    pub fn with_zone(mut self, zone: DomainZone) -> Self {
        self.zones.insert(zone.domain().to_string(), zone);
        self
    }

    /// Answer `Ok(None)` for domains without a preset zone
    pub fn with_strict_zones(mut self) -> Self {
        self.strict_zones = true;
        self
    }

    /// Reject every push for records of `domain`
    pub fn failing_on(mut self, domain: &str) -> Self {
        self.failing_domains.insert(domain.to_string());
        self
    }

    /// Fail `acquire_session`
    pub fn with_failing_session(mut self) -> Self {
        self.failing_session = true;
        self
    }

    pub fn combining_families(mut self) -> Self {
        self.combine = true;
        self
    }

    pub fn matching_by_family(mut self) -> Self {
        self.match_family = true;
        self
    }

    pub fn fetch_call_count(&self) -> usize {
        self.fetch_call_count.load(Ordering::SeqCst)
    }

    pub fn push_call_count(&self) -> usize {
        self.push_call_count.load(Ordering::SeqCst)
    }

    pub fn acquire_call_count(&self) -> usize {
        self.acquire_call_count.load(Ordering::SeqCst)
    }

    pub fn release_call_count(&self) -> usize {
        self.release_call_count.load(Ordering::SeqCst)
    }

    /// Labels of records pushed successfully, in call order
    pub fn pushed_records(&self) -> Vec<String> {
        self.pushed_records.lock().unwrap().clone()
    }

    /// Create a new MockDnsProvider that shares counters with an existing one
    ///
    /// Zones and failure injection are copied.
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            name: other.name,
            zones: other.zones.clone(),
            strict_zones: other.strict_zones,
            combine: other.combine,
            match_family: other.match_family,
            failing_domains: other.failing_domains.clone(),
            failing_session: other.failing_session,
            fetch_call_count: Arc::clone(&other.fetch_call_count),
            push_call_count: Arc::clone(&other.push_call_count),
            acquire_call_count: Arc::clone(&other.acquire_call_count),
            release_call_count: Arc::clone(&other.release_call_count),
            pushed_records: Arc::clone(&other.pushed_records),
        }
    }
}

#[async_trait::async_trait]
impl DnsProvider for MockDnsProvider {
    fn provider_name(&self) -> &'static str {
        self.name
    }

    fn matches_by_family(&self) -> bool {
        self.match_family
    }

    fn combines_families(&self) -> bool {
        self.combine
    }

    async fn acquire_session(&self) -> Result<()> {
        self.acquire_call_count.fetch_add(1, Ordering::SeqCst);
        if self.failing_session {
            return Err(Error::session(self.name, "login rejected"));
        }
        Ok(())
    }

    async fn release_session(&self) -> Result<()> {
        self.release_call_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn fetch_zone(&self, domain: &str) -> Result<Option<DomainZone>> {
        self.fetch_call_count.fetch_add(1, Ordering::SeqCst);
        match self.zones.get(domain) {
            Some(zone) => Ok(Some(zone.clone())),
            None if self.strict_zones => Ok(None),
            None => Ok(Some(DomainZone::new(domain))),
        }
    }

    async fn push_record(
        &self,
        _zone: &DomainZone,
        record: &DnsRecord,
        _sibling: Option<&DnsRecord>,
    ) -> Result<()> {
        self.push_call_count.fetch_add(1, Ordering::SeqCst);
        if self.failing_domains.contains(record.domain().domain()) {
            return Err(Error::provider_with_response(
                self.name,
                "update rejected",
                serde_json::json!({ "status": "error" }),
            ));
        }
        self.pushed_records.lock().unwrap().push(record.label());
        Ok(())
    }
}

/// Factory handing out providers that share counters with a template
///
/// Records the `dry_run` flag it was asked to honor.
pub struct MockProviderFactory {
    template: MockDnsProvider,
    pub dry_run_requests: Arc<AtomicUsize>,
}

impl MockProviderFactory {
    pub fn new(template: &MockDnsProvider) -> Self {
        Self {
            template: MockDnsProvider::sharing_counters_with(template),
            dry_run_requests: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl DnsProviderFactory for MockProviderFactory {
    fn create(&self, _config: &ProviderConfig, dry_run: bool) -> Result<Box<dyn DnsProvider>> {
        if dry_run {
            self.dry_run_requests.fetch_add(1, Ordering::SeqCst);
        }
        Ok(Box::new(MockDnsProvider::sharing_counters_with(&self.template)))
    }
}

/// `(module name, provider)` pair as taken by `DdnsEngine::new`
pub fn module(name: &str, provider: MockDnsProvider) -> (String, Box<dyn DnsProvider>) {
    (name.to_string(), Box::new(provider))
}

pub fn a_record(sub: &str, domain: &str, ip: &str) -> DnsRecord {
    DnsRecord::with_address(Domain::new(sub, domain), Ipv4::new(ip).into())
}

pub fn aaaa_record(sub: &str, domain: &str, ip: &str) -> DnsRecord {
    DnsRecord::with_address(Domain::new(sub, domain), Ipv6::new(ip).into())
}

/// IPv4-only configuration binding every domain to module `test`
pub fn minimal_config(domains: &[&str], subdomains: &[&str]) -> DdnsConfig {
    let bindings: Vec<(&str, &str)> = domains.iter().map(|d| ("test", *d)).collect();
    config_with_modules(&bindings, subdomains)
}

/// IPv4-only configuration from `(module, domain)` bindings
///
/// Every module gets a `mock` provider; every domain gets `subdomains`.
pub fn config_with_modules(bindings: &[(&str, &str)], subdomains: &[&str]) -> DdnsConfig {
    let mut modules: Vec<&str> = Vec::new();
    for (module, _) in bindings {
        if !modules.contains(module) {
            modules.push(module);
        }
    }

    DdnsConfig {
        use_ipv4: true,
        use_ipv6: false,
        update_network_prefix: false,
        dry_run: false,
        detector: Default::default(),
        modules: modules
            .iter()
            .map(|name| ModuleConfig {
                name: name.to_string(),
                provider: ProviderConfig::Custom {
                    factory: "mock".to_string(),
                    config: serde_json::json!({}),
                },
            })
            .collect(),
        domains: bindings
            .iter()
            .map(|(module, domain)| DomainConfig {
                domain: domain.to_string(),
                module: module.to_string(),
                subdomains: subdomains.iter().map(|s| SubdomainConfig::new(*s)).collect(),
            })
            .collect(),
        cache: Default::default(),
    }
}
