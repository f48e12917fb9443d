//! DNS records
//!
//! A [`DnsRecord`] is either a desired state built by the engine for one
//! reconciliation pass or a remote state fetched from a provider. Its
//! [`RecordState`] tracks what still has to be pushed.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::Domain;
use crate::net::{AddressFamily, IpAddress};

/// Default record TTL in seconds
pub const DEFAULT_TTL: u32 = 300;

/// Managed record types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    /// IPv4 host record
    A,
    /// IPv6 host record
    #[serde(rename = "AAAA")]
    Aaaa,
}

impl RecordType {
    /// Record type carrying addresses of `family`
    pub fn for_family(family: AddressFamily) -> Self {
        match family {
            AddressFamily::V4 => Self::A,
            AddressFamily::V6 => Self::Aaaa,
        }
    }

    /// Address family this type carries
    pub fn family(self) -> AddressFamily {
        match self {
            Self::A => AddressFamily::V4,
            Self::Aaaa => AddressFamily::V6,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::Aaaa => "AAAA",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Push state of a record within one run
///
/// `Clean -> PendingCreate | PendingUpdate -> Clean` on a successful push.
/// Create and update never turn into each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordState {
    #[default]
    Clean,
    PendingCreate,
    PendingUpdate,
    /// Accepted from providers, never produced by the address update path
    PendingDelete,
}

/// One A or AAAA record
#[derive(Debug, Clone, PartialEq)]
pub struct DnsRecord {
    domain: Domain,
    record_type: RecordType,
    address: Option<IpAddress>,
    last_update: Option<DateTime<Utc>>,
    ttl: u32,
    state: RecordState,
    provider_id: Option<String>,
    provider_raw: Option<serde_json::Value>,
}

impl DnsRecord {
    pub fn new(domain: Domain, record_type: RecordType) -> Self {
        Self {
            domain,
            record_type,
            address: None,
            last_update: None,
            ttl: DEFAULT_TTL,
            state: RecordState::Clean,
            provider_id: None,
            provider_raw: None,
        }
    }

    /// Record whose type follows the family of `address`
    pub fn with_address(domain: Domain, address: IpAddress) -> Self {
        let mut record = Self::new(domain, RecordType::for_family(address.family()));
        record.address = Some(address);
        record
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    pub fn address(&self) -> Option<&IpAddress> {
        self.address.as_ref()
    }

    pub fn set_address(&mut self, address: Option<IpAddress>) {
        self.address = address;
    }

    /// Family of the address value, if one is set
    pub fn family(&self) -> Option<AddressFamily> {
        self.address.as_ref().map(IpAddress::family)
    }

    /// Family of the address, or the one the record type implies
    pub fn effective_family(&self) -> AddressFamily {
        self.family().unwrap_or_else(|| self.record_type.family())
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    pub fn set_last_update(&mut self, last_update: Option<DateTime<Utc>>) {
        self.last_update = last_update;
    }

    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn state(&self) -> RecordState {
        self.state
    }

    pub fn is_dirty(&self) -> bool {
        self.state != RecordState::Clean
    }

    pub fn provider_id(&self) -> Option<&str> {
        self.provider_id.as_deref()
    }

    pub fn with_provider_id(mut self, id: impl Into<String>) -> Self {
        self.provider_id = Some(id.into());
        self
    }

    pub fn provider_raw(&self) -> Option<&serde_json::Value> {
        self.provider_raw.as_ref()
    }

    pub fn with_provider_raw(mut self, raw: serde_json::Value) -> Self {
        self.provider_raw = Some(raw);
        self
    }

    /// Presentation name used in logs and errors (`www.example.com (AAAA)`)
    pub fn label(&self) -> String {
        format!("{} ({})", self.domain.record_name(), self.record_type)
    }

    /// Same `(sub_domain, domain, type)`
    pub fn same_key(&self, other: &Self) -> bool {
        self.record_type == other.record_type && self.domain == other.domain
    }

    /// Whether the address differs from `address`
    pub fn address_differs(&self, address: Option<&IpAddress>) -> bool {
        match (self.address.as_ref(), address) {
            (Some(current), Some(new)) => !current.same_address(new),
            (None, None) => false,
            _ => true,
        }
    }

    pub(crate) fn mark_pending_create(&mut self) {
        self.state = RecordState::PendingCreate;
    }

    /// Take over a new address and mark the record for update
    ///
    /// A record still waiting to be created stays `PendingCreate`.
    pub(crate) fn apply_update(&mut self, address: Option<IpAddress>, at: DateTime<Utc>) {
        self.address = address;
        self.last_update = Some(at);
        if self.state != RecordState::PendingCreate {
            self.state = RecordState::PendingUpdate;
        }
    }

    /// Mark a remote record for removal
    pub fn mark_pending_delete(&mut self) {
        self.state = RecordState::PendingDelete;
    }

    pub(crate) fn mark_clean(&mut self) {
        self.state = RecordState::Clean;
    }
}
