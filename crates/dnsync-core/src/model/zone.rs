//! Domain zones
//!
//! A [`DomainZone`] owns the records a provider holds for one registered
//! domain. Records keep their insertion order; the push stage walks them in
//! that order.

use super::domain::Domain;
use super::record::{DnsRecord, DEFAULT_TTL};
use crate::net::AddressFamily;

/// Default zone refresh interval in seconds
pub const DEFAULT_REFRESH_INTERVAL: u32 = 3600;

/// A provider's record set for one registered domain
#[derive(Debug, Clone, PartialEq)]
pub struct DomainZone {
    domain: String,
    ttl: u32,
    refresh_interval: u32,
    records: Vec<DnsRecord>,
    pending_create: bool,
    provider_raw: Option<serde_json::Value>,
}

impl DomainZone {
    /// Create an empty zone
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ttl: DEFAULT_TTL,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            records: Vec::new(),
            pending_create: false,
            provider_raw: None,
        }
    }

    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_refresh_interval(mut self, refresh_interval: u32) -> Self {
        self.refresh_interval = refresh_interval;
        self
    }

    /// Seed the zone with records fetched from a provider
    pub fn with_records(mut self, records: impl IntoIterator<Item = DnsRecord>) -> Self {
        self.records.extend(records);
        self
    }

    pub fn with_provider_raw(mut self, raw: serde_json::Value) -> Self {
        self.provider_raw = Some(raw);
        self
    }

    /// Mark a zone the provider will have to create on push
    pub fn with_pending_create(mut self) -> Self {
        self.pending_create = true;
        self
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    pub fn refresh_interval(&self) -> u32 {
        self.refresh_interval
    }

    pub fn provider_raw(&self) -> Option<&serde_json::Value> {
        self.provider_raw.as_ref()
    }

    pub fn is_pending_create(&self) -> bool {
        self.pending_create
    }

    pub(crate) fn clear_pending_create(&mut self) {
        self.pending_create = false;
    }

    pub fn records(&self) -> &[DnsRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn record_mut(&mut self, index: usize) -> Option<&mut DnsRecord> {
        self.records.get_mut(index)
    }

    /// Append a record, returning its index
    pub(crate) fn append(&mut self, record: DnsRecord) -> usize {
        self.records.push(record);
        self.records.len() - 1
    }

    /// Indices of records sharing `desired`'s `(sub_domain, domain, type)` key
    ///
    /// With `match_family` the address family of both values must agree
    /// too.
    pub fn find_matches(&self, desired: &DnsRecord, match_family: bool) -> Vec<usize> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, existing)| existing.same_key(desired))
            .filter(|(_, existing)| !match_family || existing.family() == desired.family())
            .map(|(index, _)| index)
            .collect()
    }

    /// Record for the same name carrying the other address family
    pub fn find_sibling(&self, record: &DnsRecord) -> Option<&DnsRecord> {
        let wanted = record.effective_family().opposite();
        self.sibling_index(record.domain(), wanted)
            .and_then(|index| self.records.get(index))
    }

    pub(crate) fn sibling_index(&self, domain: &Domain, family: AddressFamily) -> Option<usize> {
        self.records
            .iter()
            .position(|r| r.domain() == domain && r.effective_family() == family)
    }

    /// Indices of records waiting for a push, in insertion order
    pub fn dirty_indices(&self) -> Vec<usize> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_dirty())
            .map(|(index, _)| index)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecordType;
    use crate::net::{Ipv4, Ipv6};

    fn zone() -> DomainZone {
        DomainZone::new("example.com").with_records([
            DnsRecord::with_address(Domain::new("www", "example.com"), Ipv4::new("192.0.2.1").into()),
            DnsRecord::with_address(
                Domain::new("www", "example.com"),
                Ipv6::new("2001:db8::1").into(),
            ),
            DnsRecord::with_address(Domain::new("mail", "example.com"), Ipv4::new("192.0.2.9").into()),
        ])
    }

    #[test]
    fn test_find_matches_by_key() {
        let zone = zone();
        let desired = DnsRecord::with_address(
            Domain::new("www", "example.com"),
            Ipv6::new("2001:db8::2").into(),
        );
        assert_eq!(zone.find_matches(&desired, false), vec![1]);

        let missing = DnsRecord::new(Domain::new("ftp", "example.com"), RecordType::A);
        assert!(zone.find_matches(&missing, false).is_empty());
    }

    #[test]
    fn test_find_matches_by_family() {
        // provider stored an IPv4 value under an AAAA key
        let mut stray = DnsRecord::new(Domain::new("www", "example.com"), RecordType::Aaaa);
        stray.set_address(Some(Ipv4::new("192.0.2.1").into()));
        let zone = DomainZone::new("example.com").with_records([stray]);

        let desired = DnsRecord::with_address(
            Domain::new("www", "example.com"),
            Ipv6::new("2001:db8::2").into(),
        );
        assert_eq!(zone.find_matches(&desired, false), vec![0]);
        assert!(zone.find_matches(&desired, true).is_empty());
    }

    #[test]
    fn test_find_sibling() {
        let zone = zone();
        let sibling = zone.find_sibling(&zone.records()[0]).unwrap();
        assert_eq!(sibling.record_type(), RecordType::Aaaa);
        assert!(zone.find_sibling(&zone.records()[2]).is_none());
    }

    #[test]
    fn test_find_sibling_by_address_family() {
        // both values stored under A keys by a family-mixing provider
        let v4 = DnsRecord::with_address(Domain::new("www", "example.com"), Ipv4::new("192.0.2.1").into());
        let mut v6 = DnsRecord::new(Domain::new("www", "example.com"), RecordType::A);
        v6.set_address(Some(Ipv6::new("2001:db8::1").into()));
        let zone = DomainZone::new("example.com").with_records([v4, v6]);

        let sibling = zone.find_sibling(&zone.records()[0]).unwrap();
        assert_eq!(sibling.family(), Some(AddressFamily::V6));
        let sibling = zone.find_sibling(&zone.records()[1]).unwrap();
        assert_eq!(sibling.family(), Some(AddressFamily::V4));
    }

    #[test]
    fn test_new_zone_is_clean() {
        let zone = zone();
        assert!(zone.dirty_indices().is_empty());
        assert!(!zone.is_pending_create());
        assert_eq!(zone.len(), 3);
    }
}
