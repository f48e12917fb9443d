// # IP Detector Trait
//
// Defines the interface for detecting the host's current addresses.
//
// ## Implementations
//
// - Public HTTP APIs: `dnsync-ip-api` crate
// - Local interfaces via Netlink: `dnsync-ip-netlink` crate
// - Fixed addresses: `StaticDetector` in this crate
//
// The reconciliation core only consumes the returned value objects, never
// the detection mechanism.

use async_trait::async_trait;

use crate::net::{Ipv4, Ipv6};

/// Trait for IP detector implementations
///
/// Every lookup fails with [`Error::NotFound`](crate::Error::NotFound) or
/// [`Error::AddressDetection`](crate::Error::AddressDetection) when no
/// address is available. The engine decides whether that is fatal.
#[async_trait]
pub trait IpDetector: Send + Sync {
    /// Get the detector name (for logging)
    fn detector_name(&self) -> &'static str;

    /// Public IPv4 address
    async fn wan_ipv4(&self) -> Result<Ipv4, crate::Error>;

    /// Public IPv6 address, decorated with its network prefix when known
    async fn wan_ipv6(&self) -> Result<Ipv6, crate::Error>;

    /// Local IPv4 address
    async fn lan_ipv4(&self) -> Result<Ipv4, crate::Error> {
        Err(crate::Error::not_found(format!(
            "{} does not detect LAN IPv4 addresses",
            self.detector_name()
        )))
    }

    /// Local IPv6 address
    async fn lan_ipv6(&self) -> Result<Ipv6, crate::Error> {
        Err(crate::Error::not_found(format!(
            "{} does not detect LAN IPv6 addresses",
            self.detector_name()
        )))
    }
}

/// Helper trait for constructing IP detectors from configuration
pub trait IpDetectorFactory: Send + Sync {
    /// Create an IpDetector instance from configuration
    fn create(
        &self,
        config: &crate::config::DetectorConfig,
    ) -> Result<Box<dyn IpDetector>, crate::Error>;
}
