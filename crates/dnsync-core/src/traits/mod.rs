//! Core traits for dnsync
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`DnsProvider`]: Fetch zones and push records to a provider
//! - [`IpDetector`]: Detect the host's current addresses
//! - [`PushCache`]: Last-pushed-address gate

pub mod dns_provider;
pub mod ip_detector;
pub mod push_cache;

pub use dns_provider::{DnsProvider, DnsProviderFactory};
pub use ip_detector::{IpDetector, IpDetectorFactory};
pub use push_cache::{CacheEntry, CacheKey, PushCache, PushCacheFactory};
