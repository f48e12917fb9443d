//! Address value types
//!
//! [`Ipv6`] and [`Ipv4`] carry an address plus the optional decorations
//! (network prefix, interface identifier, masks) that specific build paths
//! attach. Only the address is required for validity.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ipv6::{self, Ipv6Type};

/// Address family of a record value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressFamily {
    /// IPv4
    #[serde(rename = "IPv4")]
    V4,
    /// IPv6
    #[serde(rename = "IPv6")]
    V6,
}

impl AddressFamily {
    /// The other family
    pub fn opposite(self) -> Self {
        match self {
            Self::V4 => Self::V6,
            Self::V6 => Self::V4,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V4 => f.write_str("IPv4"),
            Self::V6 => f.write_str("IPv6"),
        }
    }
}

/// IPv6 value with optional prefix/interface decorations
///
/// Every setter normalizes its input (leading zeros stripped, full
/// addresses in canonical compressed form).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ipv6 {
    address: Option<String>,
    network_prefix: Option<String>,
    network_prefix_length: Option<u8>,
    interface_identifier: Option<String>,
    subnet_mask: Option<String>,
    kind: Ipv6Type,
}

impl Ipv6 {
    /// Create a value holding just an address
    pub fn new(address: impl AsRef<str>) -> Self {
        let mut ip = Self::default();
        ip.set_address(Some(address.as_ref()));
        ip
    }

    /// Whether the address is present and syntactically valid
    pub fn validate(&self) -> bool {
        self.address.as_deref().is_some_and(ipv6::validate)
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn set_address(&mut self, address: Option<&str>) {
        self.address = address.map(|a| ipv6::trim(a).unwrap_or_else(|_| ipv6::strip_hextets(a)));
    }

    pub fn network_prefix(&self) -> Option<&str> {
        self.network_prefix.as_deref()
    }

    pub fn set_network_prefix(&mut self, network_prefix: Option<&str>) {
        self.network_prefix = network_prefix.map(ipv6::strip_hextets);
    }

    pub fn network_prefix_length(&self) -> Option<u8> {
        self.network_prefix_length
    }

    pub fn set_network_prefix_length(&mut self, length: Option<u8>) {
        self.network_prefix_length = length;
    }

    pub fn interface_identifier(&self) -> Option<&str> {
        self.interface_identifier.as_deref()
    }

    pub fn set_interface_identifier(&mut self, interface_identifier: Option<&str>) {
        self.interface_identifier = interface_identifier.map(ipv6::strip_hextets);
    }

    pub fn subnet_mask(&self) -> Option<&str> {
        self.subnet_mask.as_deref()
    }

    pub fn set_subnet_mask(&mut self, subnet_mask: Option<&str>) {
        self.subnet_mask = subnet_mask.map(ipv6::strip_hextets);
    }

    pub fn kind(&self) -> Ipv6Type {
        self.kind
    }

    pub fn set_kind(&mut self, kind: Ipv6Type) {
        self.kind = kind;
    }

    /// `prefix/length` notation of the network prefix, when both are known
    pub fn network_cidr(&self) -> Option<String> {
        let prefix = self.network_prefix.as_deref()?;
        let length = self.network_prefix_length?;
        let network = ipv6::join(prefix, "::").unwrap_or_else(|_| prefix.to_string());
        Some(format!("{network}/{length}"))
    }
}

/// IPv4 value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ipv4 {
    address: String,
    subnet_mask: Option<String>,
    prefix: Option<u8>,
}

impl Ipv4 {
    /// Create a value holding just an address
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into().trim().to_string(),
            subnet_mask: None,
            prefix: None,
        }
    }

    /// Whether the address is a valid dotted-quad
    pub fn validate(&self) -> bool {
        Ipv4Addr::from_str(&self.address).is_ok()
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn set_address(&mut self, address: impl Into<String>) {
        self.address = address.into().trim().to_string();
    }

    pub fn subnet_mask(&self) -> Option<&str> {
        self.subnet_mask.as_deref()
    }

    /// Set the subnet mask, deriving the prefix when the mask is contiguous
    pub fn set_subnet_mask(&mut self, subnet_mask: Option<&str>) {
        self.subnet_mask = subnet_mask.map(str::to_string);
        if let Some(prefix) = subnet_mask.and_then(Self::prefix_from_mask) {
            self.prefix = Some(prefix);
        }
    }

    pub fn prefix(&self) -> Option<u8> {
        self.prefix
    }

    pub fn set_prefix(&mut self, prefix: Option<u8>) {
        self.prefix = prefix;
    }

    /// Prefix length of a dotted-quad mask (`255.255.255.0` -> 24)
    pub fn prefix_from_mask(mask: &str) -> Option<u8> {
        let bits = u32::from(Ipv4Addr::from_str(mask).ok()?);
        let ones = bits.leading_ones();
        if bits.checked_shl(ones).unwrap_or(0) != 0 {
            return None;
        }
        u8::try_from(ones).ok()
    }
}

/// Address value of a DNS record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpAddress {
    V4(Ipv4),
    V6(Ipv6),
}

impl IpAddress {
    /// Address family of this value
    pub fn family(&self) -> AddressFamily {
        match self {
            Self::V4(_) => AddressFamily::V4,
            Self::V6(_) => AddressFamily::V6,
        }
    }

    /// Normalized address text
    pub fn address(&self) -> Option<&str> {
        match self {
            Self::V4(ip) => Some(ip.address()),
            Self::V6(ip) => ip.address(),
        }
    }

    /// Whether the address is valid for its family
    pub fn validate(&self) -> bool {
        match self {
            Self::V4(ip) => ip.validate(),
            Self::V6(ip) => ip.validate(),
        }
    }

    /// Two values carry the same address (decorations are ignored)
    pub fn same_address(&self, other: &Self) -> bool {
        self.family() == other.family() && self.address() == other.address()
    }

    /// Parse a textual address, choosing the family by syntax
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if ipv6::validate(text) {
            Some(Self::V6(Ipv6::new(text)))
        } else if Ipv4Addr::from_str(text).is_ok() {
            Some(Self::V4(Ipv4::new(text)))
        } else {
            None
        }
    }
}

impl From<Ipv4> for IpAddress {
    fn from(ip: Ipv4) -> Self {
        Self::V4(ip)
    }
}

impl From<Ipv6> for IpAddress {
    fn from(ip: Ipv6) -> Self {
        Self::V6(ip)
    }
}

impl fmt::Display for IpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.address().unwrap_or("<none>"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv6_setters_normalize() {
        let mut ip = Ipv6::new("2001:0db8:0000:0000:0000:0000:0000:0001");
        assert_eq!(ip.address(), Some("2001:db8::1"));

        ip.set_network_prefix(Some("2001:0db8:0001:0000"));
        assert_eq!(ip.network_prefix(), Some("2001:db8:1:0"));

        ip.set_interface_identifier(Some("::00ab:0001"));
        assert_eq!(ip.interface_identifier(), Some("::ab:1"));
    }

    #[test]
    fn test_ipv6_validity_needs_address() {
        assert!(!Ipv6::default().validate());
        assert!(Ipv6::new("fe80::1").validate());
        assert!(!Ipv6::new("fe80::1::2").validate());
    }

    #[test]
    fn test_network_cidr() {
        let mut ip = Ipv6::new("2001:db8:1:2::1");
        assert_eq!(ip.network_cidr(), None);
        ip.set_network_prefix(Some("2001:0db8:0001:0002"));
        ip.set_network_prefix_length(Some(64));
        assert_eq!(ip.network_cidr().as_deref(), Some("2001:db8:1:2::/64"));
    }

    #[test]
    fn test_ipv4_prefix_from_mask() {
        assert_eq!(Ipv4::prefix_from_mask("255.255.255.0"), Some(24));
        assert_eq!(Ipv4::prefix_from_mask("255.255.255.255"), Some(32));
        assert_eq!(Ipv4::prefix_from_mask("0.0.0.0"), Some(0));
        assert_eq!(Ipv4::prefix_from_mask("255.0.255.0"), None);

        let mut ip = Ipv4::new("192.0.2.10");
        ip.set_subnet_mask(Some("255.255.254.0"));
        assert_eq!(ip.prefix(), Some(23));
    }

    #[test]
    fn test_same_address_ignores_decorations() {
        let mut decorated = Ipv6::new("2001:db8::1");
        decorated.set_network_prefix_length(Some(64));
        let a = IpAddress::from(decorated);
        let b = IpAddress::from(Ipv6::new("2001:0db8::0001"));
        assert!(a.same_address(&b));
        assert!(!a.same_address(&IpAddress::from(Ipv4::new("192.0.2.1"))));
    }

    #[test]
    fn test_parse_picks_family() {
        assert_eq!(
            IpAddress::parse("203.0.113.7").map(|ip| ip.family()),
            Some(AddressFamily::V4)
        );
        assert_eq!(
            IpAddress::parse(" 2001:db8::7\n").map(|ip| ip.family()),
            Some(AddressFamily::V6)
        );
        assert!(IpAddress::parse("example.com").is_none());
    }
}
