// # dnsync-core
//
// Core library for dnsync, a DNS record synchronizer for hosts with a
// changing IPv4/IPv6 address.
//
// ## Architecture Overview
//
// - **net**: IPv6 address algebra (hextets, binary prefix math, builders)
//   and the IPv4/IPv6 value types
// - **model**: Domain, DnsRecord and DomainZone with per-record push state
// - **ZoneReconciler**: per-provider zone memo, create/update decisions,
//   anomaly detection and the isolated push stage
// - **PushCache**: optional last-pushed-address gate (file or memory)
// - **DdnsEngine**: one run from address detection to push
// - **ProviderRegistry**: factories for providers, detectors and caches
//
// ## Design Principles
//
// 1. **Sequential**: one run walks domains and records in configuration order
// 2. **Fail soft**: only configuration and detection errors end a run
// 3. **Plugin-Based**: providers and detectors are registered by type name
// 4. **Library-First**: the binary only wires configuration to the engine

pub mod cache;
pub mod config;
pub mod detector;
pub mod engine;
pub mod error;
pub mod model;
pub mod net;
pub mod registry;
pub mod traits;

// Re-export core types for convenience
pub use cache::{FilePushCache, MemoryPushCache};
pub use config::{CacheConfig, DdnsConfig, DetectorConfig, DynDnsProtocol, ProviderConfig};
pub use detector::StaticDetector;
pub use engine::{DdnsEngine, DetectedAddresses, Reconciliation, RunReport, ZoneReconciler};
pub use error::{Error, Result};
pub use model::{DnsRecord, Domain, DomainZone, RecordState, RecordType};
pub use net::{AddressFamily, IpAddress, Ipv4, Ipv6, Ipv6Builder, Ipv6Type};
pub use registry::ProviderRegistry;
pub use traits::{DnsProvider, IpDetector, PushCache};
