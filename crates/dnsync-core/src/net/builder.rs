//! Builders for address values
//!
//! [`Ipv6Builder::build`] never fails and only copies what it was given.
//! The `build_by_*` paths derive the missing parts and fail with
//! [`Error::BuildIpv6Address`]; callers fall back to `build()` and log a
//! warning.

use super::address::Ipv6;
use super::ipv6::{self, Ipv6Type};
use crate::error::{Error, Result};

/// Builder for [`Ipv6`] values
#[derive(Debug, Clone, Default)]
pub struct Ipv6Builder {
    address: Option<String>,
    network_prefix: Option<String>,
    network_prefix_length: Option<u8>,
    interface_identifier: Option<String>,
    subnet_mask: Option<String>,
    kind: Option<Ipv6Type>,
}

impl Ipv6Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn address(mut self, address: Option<impl Into<String>>) -> Self {
        self.address = address.map(Into::into);
        self
    }

    pub fn network_prefix(mut self, network_prefix: Option<impl Into<String>>) -> Self {
        self.network_prefix = network_prefix.map(Into::into);
        self
    }

    pub fn network_prefix_length(mut self, length: Option<u8>) -> Self {
        self.network_prefix_length = length;
        self
    }

    pub fn interface_identifier(mut self, interface_identifier: Option<impl Into<String>>) -> Self {
        self.interface_identifier = interface_identifier.map(Into::into);
        self
    }

    pub fn subnet_mask(mut self, subnet_mask: Option<impl Into<String>>) -> Self {
        self.subnet_mask = subnet_mask.map(Into::into);
        self
    }

    pub fn kind(mut self, kind: Ipv6Type) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Copy the configured parts into a value without deriving anything
    ///
    /// An unset type is classified from the address when possible.
    pub fn build(&self) -> Ipv6 {
        let mut ip = Ipv6::default();
        ip.set_address(self.address.as_deref());
        ip.set_network_prefix(self.network_prefix.as_deref());
        ip.set_network_prefix_length(self.network_prefix_length);
        ip.set_interface_identifier(self.interface_identifier.as_deref());
        ip.set_subnet_mask(self.subnet_mask.as_deref());

        let kind = self.kind.unwrap_or_else(|| {
            ip.address()
                .and_then(|a| ipv6::classify(a).ok())
                .unwrap_or_default()
        });
        ip.set_kind(kind);
        ip
    }

    /// Compose the address from network prefix and interface identifier
    pub fn build_by_network_and_interface(mut self) -> Result<Ipv6> {
        let (Some(network), Some(interface)) = (
            self.network_prefix.as_deref(),
            self.interface_identifier.as_deref(),
        ) else {
            return Err(Error::build_ipv6(
                "network prefix and interface identifier are both required",
            ));
        };

        self.address = Some(ipv6::join(network, interface)?);
        self.kind = None;
        Self::validated(self.build())
    }

    /// Derive network prefix and subnet mask by splitting the address
    pub fn build_by_address_and_prefix_length(mut self) -> Result<Ipv6> {
        let (Some(address), Some(length)) = (self.address.as_deref(), self.network_prefix_length)
        else {
            return Err(Error::build_ipv6(
                "address and network prefix length are both required",
            ));
        };

        let (network, interface) = ipv6::split(address, length)?;
        self.network_prefix = Some(network);
        if length % 16 == 0 {
            self.interface_identifier = interface;
        }
        self.subnet_mask = Some(ipv6::subnet_mask(length)?);
        Self::validated(self.build())
    }

    /// Infer the prefix length from the subnet mask, then split the address
    pub fn build_by_address_and_subnet_mask(mut self) -> Result<Ipv6> {
        let Some(mask) = self.subnet_mask.as_deref() else {
            return Err(Error::build_ipv6("subnet mask is required"));
        };
        self.network_prefix_length = Some(ipv6::prefix_length_from_mask(mask)?);
        self.build_by_address_and_prefix_length()
    }

    fn validated(ip: Ipv6) -> Result<Ipv6> {
        if ip.validate() {
            Ok(ip)
        } else {
            Err(Error::build_ipv6(format!(
                "generated address {} is not valid",
                ip.address().unwrap_or("<none>")
            )))
        }
    }
}
