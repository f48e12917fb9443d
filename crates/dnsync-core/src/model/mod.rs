//! Record and zone data model

pub mod domain;
pub mod record;
pub mod zone;

pub use domain::Domain;
pub use record::{DnsRecord, RecordState, RecordType, DEFAULT_TTL};
pub use zone::DomainZone;
