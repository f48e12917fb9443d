//! Fixed-address detector
//!
//! [`StaticDetector`] answers with configured addresses. It backs hosts with
//! a fixed uplink and the `static` detector type.

use async_trait::async_trait;

use crate::config::DetectorConfig;
use crate::error::{Error, Result};
use crate::net::{Ipv4, Ipv6, Ipv6Builder};
use crate::traits::{IpDetector, IpDetectorFactory};

/// Detector returning configured addresses
#[derive(Debug, Clone, Default)]
pub struct StaticDetector {
    ipv4: Option<Ipv4>,
    ipv6: Option<Ipv6>,
}

impl StaticDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ipv4(mut self, address: impl Into<String>) -> Self {
        self.ipv4 = Some(Ipv4::new(address));
        self
    }

    /// Set the IPv6 answer, splitting off the network prefix when
    /// `prefix_length` is given
    pub fn with_ipv6(mut self, address: impl Into<String>, prefix_length: Option<u8>) -> Self {
        self.ipv6 = Some(decorate_ipv6(address.into(), prefix_length));
        self
    }
}

/// Build an IPv6 value decorated with its network prefix
///
/// Falls back to the plain address with a warning when the split fails.
pub fn decorate_ipv6(address: String, prefix_length: Option<u8>) -> Ipv6 {
    let builder = Ipv6Builder::new()
        .address(Some(address))
        .network_prefix_length(prefix_length);

    if prefix_length.is_none() {
        return builder.build();
    }

    match builder.clone().build_by_address_and_prefix_length() {
        Ok(ip) => ip,
        Err(e) => {
            tracing::warn!(error = %e, "Using detected IPv6 address without network prefix");
            builder.build()
        }
    }
}

#[async_trait]
impl IpDetector for StaticDetector {
    fn detector_name(&self) -> &'static str {
        "static"
    }

    async fn wan_ipv4(&self) -> Result<Ipv4> {
        let ip = self
            .ipv4
            .clone()
            .ok_or_else(|| Error::not_found("No static IPv4 address configured"))?;
        if !ip.validate() {
            return Err(Error::address_detection(format!(
                "Static IPv4 address {} is invalid",
                ip.address()
            )));
        }
        Ok(ip)
    }

    async fn wan_ipv6(&self) -> Result<Ipv6> {
        let ip = self
            .ipv6
            .clone()
            .ok_or_else(|| Error::not_found("No static IPv6 address configured"))?;
        if !ip.validate() {
            return Err(Error::address_detection("Static IPv6 address is invalid"));
        }
        Ok(ip)
    }
}

/// Builds [`StaticDetector`] from `DetectorConfig::Static`
pub struct StaticDetectorFactory;

impl IpDetectorFactory for StaticDetectorFactory {
    fn create(&self, config: &DetectorConfig) -> Result<Box<dyn IpDetector>> {
        let DetectorConfig::Static {
            ipv4,
            ipv6,
            prefix_length,
        } = config
        else {
            return Err(Error::config("Static detector factory needs a static detector config"));
        };

        let mut detector = StaticDetector::new();
        if let Some(ip) = ipv4 {
            detector = detector.with_ipv4(ip.as_str());
        }
        if let Some(ip) = ipv6 {
            detector = detector.with_ipv6(ip.as_str(), *prefix_length);
        }
        Ok(Box::new(detector))
    }
}
