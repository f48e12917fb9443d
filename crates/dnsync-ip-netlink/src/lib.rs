// # Local Interface IP Detector
//
// This crate provides an IP detector that reads the addresses assigned to
// the host's own network interfaces through a Netlink `RTM_GETADDR` dump.
//
// ## Selection
//
// - IPv4: the first non-loopback address
// - IPv6: the first address classified as global unicast. Stable addresses
//   win over temporary (privacy) ones; tentative, deprecated and
//   DAD-failed addresses are never picked.
// - LAN IPv4 / IPv6: the first private IPv4 and the first unique local
//   IPv6 address
//
// An `interface` option restricts every lookup to one interface.
//
// ## Platform Support
//
// Netlink is Linux-only. On other targets the factory refuses to build
// the detector.

use async_trait::async_trait;
use dnsync_core::config::DetectorConfig;
use dnsync_core::detector::decorate_ipv6;
use dnsync_core::net::{ipv6, Ipv4, Ipv6, Ipv6Type};
use dnsync_core::traits::{IpDetector, IpDetectorFactory};
use dnsync_core::{Error, ProviderRegistry, Result};
use std::net::IpAddr;

#[cfg(target_os = "linux")]
mod dump;

/// Address flags the kernel reports in `ifa_flags` / `IFA_FLAGS`
const IFA_F_TEMPORARY: u32 = 0x01;
const IFA_F_DADFAILED: u32 = 0x08;
const IFA_F_DEPRECATED: u32 = 0x20;
const IFA_F_TENTATIVE: u32 = 0x40;

/// One address assigned to a network interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceAddress {
    /// Kernel interface index
    pub index: u32,
    pub address: IpAddr,
    pub prefix_len: u8,
    /// `IFA_F_*` bits
    pub flags: u32,
    pub scope: u8,
}

impl InterfaceAddress {
    fn usable(&self) -> bool {
        self.flags & (IFA_F_TENTATIVE | IFA_F_DADFAILED | IFA_F_DEPRECATED) == 0
    }

    fn temporary(&self) -> bool {
        self.flags & IFA_F_TEMPORARY != 0
    }

    fn ipv6_kind(&self) -> Option<Ipv6Type> {
        match self.address {
            IpAddr::V6(ip) => ipv6::classify(&ip.to_string()).ok(),
            IpAddr::V4(_) => None,
        }
    }
}

/// Where a lookup gets its addresses from
trait AddressSource: Send + Sync {
    fn addresses(&self) -> Result<Vec<InterfaceAddress>>;
}

/// Live kernel state
#[cfg(target_os = "linux")]
struct NetlinkSource;

#[cfg(target_os = "linux")]
impl AddressSource for NetlinkSource {
    fn addresses(&self) -> Result<Vec<InterfaceAddress>> {
        dump::interface_addresses()
    }
}

/// IP detector reading local interface addresses
pub struct LocalDetector {
    interface: Option<String>,
    prefix_length: Option<u8>,
    source: std::sync::Arc<dyn AddressSource>,
}

impl std::fmt::Debug for LocalDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalDetector")
            .field("interface", &self.interface)
            .field("prefix_length", &self.prefix_length)
            .finish()
    }
}

impl LocalDetector {
    /// Create a detector over the kernel's interface table
    #[cfg(target_os = "linux")]
    pub fn new(interface: Option<String>, prefix_length: Option<u8>) -> Self {
        Self {
            interface,
            prefix_length,
            source: std::sync::Arc::new(NetlinkSource),
        }
    }

    pub fn interface(&self) -> Option<&str> {
        self.interface.as_deref()
    }

    /// Addresses of the configured interface (or all interfaces)
    async fn candidates(&self) -> Result<Vec<InterfaceAddress>> {
        let source = self.source.clone();
        let interface = self.interface.clone();
        tokio::task::spawn_blocking(move || {
            let addresses = source.addresses()?;
            match interface {
                Some(name) => {
                    let index = interface_index(&name)?;
                    Ok(addresses.into_iter().filter(|a| a.index == index).collect())
                }
                None => Ok(addresses),
            }
        })
        .await
        .map_err(|e| Error::address_detection(format!("Interface lookup task failed: {e}")))?
    }

    fn not_found(&self, what: &str) -> Error {
        match &self.interface {
            Some(name) => Error::not_found(format!("No {what} address found on {name}")),
            None => Error::not_found(format!("No {what} address found on any interface")),
        }
    }
}

#[cfg(target_os = "linux")]
fn interface_index(name: &str) -> Result<u32> {
    dump::interface_index(name)
}

#[cfg(not(target_os = "linux"))]
fn interface_index(_name: &str) -> Result<u32> {
    Err(Error::config("Interface lookup is only supported on Linux"))
}

/// First IPv4 address that is not a loopback address
pub fn select_ipv4(addresses: &[InterfaceAddress]) -> Option<std::net::Ipv4Addr> {
    addresses.iter().find_map(|a| match a.address {
        IpAddr::V4(ip) if !ip.is_loopback() => Some(ip),
        _ => None,
    })
}

/// First private IPv4 address
pub fn select_lan_ipv4(addresses: &[InterfaceAddress]) -> Option<std::net::Ipv4Addr> {
    addresses.iter().find_map(|a| match a.address {
        IpAddr::V4(ip) if ip.is_private() => Some(ip),
        _ => None,
    })
}

/// First usable IPv6 address of `kind`, stable before temporary
pub fn select_ipv6(addresses: &[InterfaceAddress], kind: Ipv6Type) -> Option<std::net::Ipv6Addr> {
    let matching = || {
        addresses
            .iter()
            .filter(|a| a.usable() && a.ipv6_kind() == Some(kind))
    };
    matching()
        .find(|a| !a.temporary())
        .or_else(|| matching().next())
        .and_then(|a| match a.address {
            IpAddr::V6(ip) => Some(ip),
            IpAddr::V4(_) => None,
        })
}

#[async_trait]
impl IpDetector for LocalDetector {
    fn detector_name(&self) -> &'static str {
        "local"
    }

    async fn wan_ipv4(&self) -> Result<Ipv4> {
        let addresses = self.candidates().await?;
        select_ipv4(&addresses)
            .map(|ip| Ipv4::new(ip.to_string()))
            .ok_or_else(|| self.not_found("IPv4"))
    }

    async fn wan_ipv6(&self) -> Result<Ipv6> {
        let addresses = self.candidates().await?;
        let ip = select_ipv6(&addresses, Ipv6Type::GlobalUnicast)
            .ok_or_else(|| self.not_found("global IPv6"))?;
        Ok(decorate_ipv6(ip.to_string(), self.prefix_length))
    }

    async fn lan_ipv4(&self) -> Result<Ipv4> {
        let addresses = self.candidates().await?;
        select_lan_ipv4(&addresses)
            .map(|ip| Ipv4::new(ip.to_string()))
            .ok_or_else(|| self.not_found("private IPv4"))
    }

    async fn lan_ipv6(&self) -> Result<Ipv6> {
        let addresses = self.candidates().await?;
        let ip = select_ipv6(&addresses, Ipv6Type::UniqueLocal)
            .ok_or_else(|| self.not_found("unique local IPv6"))?;
        Ok(decorate_ipv6(ip.to_string(), self.prefix_length))
    }
}

/// Factory for creating local interface detectors
pub struct LocalDetectorFactory;

#[cfg(target_os = "linux")]
impl IpDetectorFactory for LocalDetectorFactory {
    fn create(&self, config: &DetectorConfig) -> Result<Box<dyn IpDetector>> {
        match config {
            DetectorConfig::Local {
                interface,
                prefix_length,
            } => Ok(Box::new(LocalDetector::new(interface.clone(), *prefix_length))),
            _ => Err(Error::config("Invalid config for local detector")),
        }
    }
}

#[cfg(not(target_os = "linux"))]
impl IpDetectorFactory for LocalDetectorFactory {
    fn create(&self, _config: &DetectorConfig) -> Result<Box<dyn IpDetector>> {
        Err(Error::config("Local interface detector is only supported on Linux"))
    }
}

/// Register the local interface detector with a registry
pub fn register(registry: &ProviderRegistry) {
    registry.register_detector("local", Box::new(LocalDetectorFactory));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(index: u32, ip: &str, flags: u32) -> InterfaceAddress {
        InterfaceAddress {
            index,
            address: ip.parse().unwrap(),
            prefix_len: 64,
            flags,
            scope: 0,
        }
    }

    /// A typical dual-stack host: loopback first, then the uplink
    fn host() -> Vec<InterfaceAddress> {
        vec![
            addr(1, "127.0.0.1", 0),
            addr(1, "::1", 0),
            addr(2, "192.168.1.20", 0),
            addr(2, "fe80::1a2b:3c4d", 0),
            addr(2, "fd00::20", 0),
            addr(2, "2001:db8:1:2:aaaa::1", IFA_F_TEMPORARY),
            addr(2, "2001:db8:1:2::20", 0),
        ]
    }

    struct FixedSource(Vec<InterfaceAddress>);

    impl AddressSource for FixedSource {
        fn addresses(&self) -> Result<Vec<InterfaceAddress>> {
            Ok(self.0.clone())
        }
    }

    fn fixed_detector(addresses: Vec<InterfaceAddress>, prefix_length: Option<u8>) -> LocalDetector {
        LocalDetector {
            interface: None,
            prefix_length,
            source: std::sync::Arc::new(FixedSource(addresses)),
        }
    }

    #[test]
    fn test_select_ipv4_skips_loopback() {
        assert_eq!(select_ipv4(&host()), Some("192.168.1.20".parse().unwrap()));
        assert_eq!(select_ipv4(&[addr(1, "127.0.0.1", 0)]), None);
    }

    #[test]
    fn test_select_lan_ipv4() {
        let addresses = vec![addr(2, "203.0.113.5", 0), addr(3, "10.0.0.2", 0)];
        assert_eq!(select_lan_ipv4(&addresses), Some("10.0.0.2".parse().unwrap()));
        assert_eq!(select_ipv4(&addresses), Some("203.0.113.5".parse().unwrap()));
    }

    #[test]
    fn test_select_global_ipv6_prefers_stable() {
        assert_eq!(
            select_ipv6(&host(), Ipv6Type::GlobalUnicast),
            Some("2001:db8:1:2::20".parse().unwrap())
        );
    }

    #[test]
    fn test_select_global_ipv6_falls_back_to_temporary() {
        let addresses = vec![
            addr(2, "fe80::1", 0),
            addr(2, "2001:db8::aaaa", IFA_F_TEMPORARY),
        ];
        assert_eq!(
            select_ipv6(&addresses, Ipv6Type::GlobalUnicast),
            Some("2001:db8::aaaa".parse().unwrap())
        );
    }

    #[test]
    fn test_select_ipv6_skips_unusable() {
        let addresses = vec![
            addr(2, "2001:db8::1", IFA_F_TENTATIVE),
            addr(2, "2001:db8::2", IFA_F_DEPRECATED),
            addr(2, "2001:db8::3", IFA_F_DADFAILED),
        ];
        assert_eq!(select_ipv6(&addresses, Ipv6Type::GlobalUnicast), None);
    }

    #[test]
    fn test_select_unique_local() {
        assert_eq!(
            select_ipv6(&host(), Ipv6Type::UniqueLocal),
            Some("fd00::20".parse().unwrap())
        );
    }

    #[tokio::test]
    async fn test_wan_ipv6_is_decorated() {
        let detector = fixed_detector(host(), Some(64));

        let ip = detector.wan_ipv6().await.unwrap();
        assert_eq!(ip.address(), Some("2001:db8:1:2::20"));
        assert_eq!(ip.network_prefix(), Some("2001:db8:1:2"));
        assert_eq!(ip.network_prefix_length(), Some(64));
        assert_eq!(ip.kind(), Ipv6Type::GlobalUnicast);
    }

    #[tokio::test]
    async fn test_wan_ipv6_without_prefix_length() {
        let detector = fixed_detector(host(), None);

        let ip = detector.wan_ipv6().await.unwrap();
        assert_eq!(ip.address(), Some("2001:db8:1:2::20"));
        assert_eq!(ip.network_prefix(), None);
    }

    #[tokio::test]
    async fn test_link_local_only_host() {
        let detector = fixed_detector(vec![addr(1, "::1", 0), addr(2, "fe80::1", 0)], Some(64));

        let result = detector.wan_ipv6().await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert!(matches!(detector.wan_ipv4().await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_lan_lookups() {
        let detector = fixed_detector(host(), None);

        assert_eq!(detector.lan_ipv4().await.unwrap().address(), "192.168.1.20");
        assert_eq!(detector.lan_ipv6().await.unwrap().address(), Some("fd00::20"));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_factory_creation() {
        let config = DetectorConfig::Local {
            interface: Some("eth0".to_string()),
            prefix_length: Some(64),
        };
        let detector = LocalDetectorFactory.create(&config).unwrap();
        assert_eq!(detector.detector_name(), "local");

        let wrong = DetectorConfig::default();
        assert!(LocalDetectorFactory.create(&wrong).is_err());
    }

    #[test]
    #[cfg(not(target_os = "linux"))]
    fn test_factory_unsupported() {
        let config = DetectorConfig::Local {
            interface: None,
            prefix_length: None,
        };
        assert!(LocalDetectorFactory.create(&config).is_err());
    }

    #[test]
    fn test_register() {
        let registry = ProviderRegistry::new();
        register(&registry);
        assert!(registry.has_detector("local"));
    }
}
