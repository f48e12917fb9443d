// # IPv6 Address Algebra
//
// IPv6 addresses handled as text (hextet strings) the way DNS providers and
// configuration files present them, with the arithmetic done on the 128-bit
// value underneath.
//
// ## Forms
//
// - expanded: `2001:0db8:0000:0000:0000:0000:0000:0001`
// - trimmed:  `2001:db8::1` (canonical, leading zeros stripped, longest zero run compressed)
// - binary:   128 characters of `0`/`1`, four per hex nibble
//
// A network prefix and an interface identifier are partial hextet strings
// (`2001:db8:1:2`, `::1`) that only become an address once combined.

use std::net::Ipv6Addr;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Number of hextets in a full IPv6 address
pub const HEXTET_COUNT: usize = 8;

/// Number of bits in an IPv6 address
pub const ADDRESS_BITS: u8 = 128;

/// Bits per hextet
const HEXTET_BITS: usize = 16;

/// Classification of an IPv6 address by its leading bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Ipv6Type {
    /// `::`, or an address that has not been classified
    #[default]
    Unspecified,
    /// `::1`
    Loopback,
    /// `::ffff:0:0/96`
    Ipv4Mapped,
    /// `fc00::/7` and the remaining `f...` space
    UniqueLocal,
    /// `fe80::/10`
    LinkLocal,
    /// `ff00::/8`
    Multicast,
    /// Everything else
    GlobalUnicast,
}

/// Syntactic IPv6 check (at most one `::`, 1-4 hex digits per hextet)
pub fn validate(ip: &str) -> bool {
    Ipv6Addr::from_str(ip).is_ok()
}

fn parse(addr: &str) -> Result<Ipv6Addr> {
    Ipv6Addr::from_str(addr.trim())
        .map_err(|_| Error::invalid_input(format!("not a valid IPv6 address: {addr}")))
}

/// Expand an address to eight zero-padded hextets, resolving any `::`
pub fn expand(addr: &str) -> Result<String> {
    let ip = parse(addr)?;
    Ok(ip
        .segments()
        .iter()
        .map(|segment| format!("{segment:04x}"))
        .collect::<Vec<_>>()
        .join(":"))
}

/// Canonical compressed form of an address
///
/// `trim(expand(x)) == trim(x)` for every valid `x`.
pub fn trim(addr: &str) -> Result<String> {
    Ok(parse(addr)?.to_string())
}

/// Strip leading zeros from every hextet without touching `::` runs
///
/// Works on partial hextet strings such as network prefixes and
/// interface identifiers.
pub fn strip_hextets(hextets: &str) -> String {
    hextets
        .trim()
        .split(':')
        .map(|hextet| {
            if hextet.is_empty() {
                String::new()
            } else {
                let stripped = hextet.trim_start_matches('0');
                if stripped.is_empty() {
                    "0".to_string()
                } else {
                    stripped.to_ascii_lowercase()
                }
            }
        })
        .collect::<Vec<_>>()
        .join(":")
}

/// Number of explicit hextets once a `::` run is removed
pub fn segment_count(addr: &str) -> usize {
    addr.split(':').filter(|hextet| !hextet.is_empty()).count()
}

/// 128-character binary form of an address
pub fn to_binary(addr: &str) -> Result<String> {
    Ok(format!("{:0128b}", u128::from(parse(addr)?)))
}

/// Hextet form of a binary string
///
/// Every 16 bits become one hextet zero-padded to four hex digits. A
/// trailing group shorter than 16 bits is padded on the right, so the bits
/// keep their high-order position (prefix semantics).
pub fn from_binary(bits: &str) -> Result<String> {
    if bits.is_empty() || bits.len() > usize::from(ADDRESS_BITS) {
        return Err(Error::invalid_input(format!(
            "binary address must be 1-128 bits, got {}",
            bits.len()
        )));
    }

    bits.as_bytes()
        .chunks(HEXTET_BITS)
        .map(|chunk| {
            let mut group = String::with_capacity(HEXTET_BITS);
            for &bit in chunk {
                match bit {
                    b'0' | b'1' => group.push(char::from(bit)),
                    _ => {
                        return Err(Error::invalid_input(format!(
                            "binary address contains non-binary digit: {}",
                            char::from(bit)
                        )));
                    }
                }
            }
            while group.len() < HEXTET_BITS {
                group.push('0');
            }
            let value = u16::from_str_radix(&group, 2)
                .map_err(|e| Error::invalid_input(e.to_string()))?;
            Ok(format!("{value:04x}"))
        })
        .collect::<Result<Vec<_>>>()
        .map(|hextets| hextets.join(":"))
}

/// Subnet mask of `prefix_length` set bits in hextet form
///
/// Fewer than eight significant hextets are followed by a trailing `::`.
pub fn subnet_mask(prefix_length: u8) -> Result<String> {
    if prefix_length > ADDRESS_BITS {
        return Err(Error::invalid_input(format!(
            "prefix length must be 0-128, got {prefix_length}"
        )));
    }
    if prefix_length == 0 {
        return Ok("::".to_string());
    }

    let bits = "1".repeat(usize::from(prefix_length));
    let mask = strip_hextets(&from_binary(&bits)?);
    if segment_count(&mask) < HEXTET_COUNT {
        Ok(format!("{mask}::"))
    } else {
        Ok(mask)
    }
}

/// Prefix length encoded by a subnet mask
///
/// The mask must be contiguous set bits followed by zero bits.
pub fn prefix_length_from_mask(mask: &str) -> Result<u8> {
    let bits = to_binary(mask)?;
    let significant = bits.trim_end_matches('0');
    if significant.contains('0') {
        return Err(Error::build_ipv6(format!(
            "subnet mask {mask} is not contiguous"
        )));
    }
    u8::try_from(significant.len()).map_err(|e| Error::build_ipv6(e.to_string()))
}

/// Split an address at `prefix_length` bits into network prefix and
/// interface identifier (both zero-padded hextet strings)
///
/// The interface part is padded on the left so its hextets keep their
/// low-order position.
pub fn split(addr: &str, prefix_length: u8) -> Result<(String, Option<String>)> {
    if prefix_length == 0 || prefix_length > ADDRESS_BITS {
        return Err(Error::build_ipv6(format!(
            "prefix length must be 1-128, got {prefix_length}"
        )));
    }

    let bits = to_binary(addr)?;
    let (network_bits, interface_bits) = bits.split_at(usize::from(prefix_length));
    let network = from_binary(network_bits)?;

    if interface_bits.is_empty() {
        return Ok((network, None));
    }

    let pad = (HEXTET_BITS - interface_bits.len() % HEXTET_BITS) % HEXTET_BITS;
    let padded = format!("{}{}", "0".repeat(pad), interface_bits);
    Ok((network, Some(from_binary(&padded)?)))
}

/// Compose an address from a network prefix and an interface identifier
///
/// Operands are joined with `:` when their hextets add up to eight and with
/// `::` otherwise, so the gap is filled with zero hextets.
pub fn join(network_prefix: &str, interface_identifier: &str) -> Result<String> {
    let network = network_prefix.trim().trim_end_matches(':');
    let interface = interface_identifier.trim().trim_start_matches(':');

    let candidate = if segment_count(network) + segment_count(interface) == HEXTET_COUNT {
        format!("{network}:{interface}")
    } else {
        format!("{network}::{interface}")
    };

    trim(&candidate).map_err(|_| {
        Error::build_ipv6(format!(
            "{network_prefix} + {interface_identifier} does not form a valid address ({candidate})"
        ))
    })
}

/// Classify an address by its leading hextets
pub fn classify(addr: &str) -> Result<Ipv6Type> {
    let ip = parse(addr)?;
    let segments = ip.segments();
    let first = segments[0];

    let kind = if ip.is_unspecified() {
        Ipv6Type::Unspecified
    } else if ip.is_loopback() {
        Ipv6Type::Loopback
    } else if segments[..5].iter().all(|&s| s == 0) && segments[5] == 0xffff {
        Ipv6Type::Ipv4Mapped
    } else if first & 0xff00 == 0xff00 {
        Ipv6Type::Multicast
    } else if first & 0xffc0 == 0xfe80 {
        Ipv6Type::LinkLocal
    } else if first & 0xf000 == 0xf000 {
        Ipv6Type::UniqueLocal
    } else {
        Ipv6Type::GlobalUnicast
    };

    Ok(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_resolves_compression() {
        assert_eq!(
            expand("2001:db8::1").unwrap(),
            "2001:0db8:0000:0000:0000:0000:0000:0001"
        );
        assert_eq!(
            expand("::").unwrap(),
            "0000:0000:0000:0000:0000:0000:0000:0000"
        );
        assert_eq!(
            expand("fe80::").unwrap(),
            "fe80:0000:0000:0000:0000:0000:0000:0000"
        );
    }

    #[test]
    fn test_trim_expand_round_trip() {
        let samples = [
            "2001:db8::1",
            "2001:0db8:0000:0000:0000:ff00:0042:8329",
            "fe80::1ff:fe23:4567:890a",
            "::1",
            "ff02::1",
            "2001:db8:0:1:1:1:1:1",
            "2a01:4f8:c17:b8f::2",
        ];
        for sample in samples {
            assert!(validate(sample), "{sample} should validate");
            let expanded = expand(sample).unwrap();
            assert_eq!(trim(&expanded).unwrap(), trim(sample).unwrap(), "{sample}");
        }
    }

    #[test]
    fn test_trim_is_canonical() {
        assert_eq!(
            trim("2001:0DB8:0000:0000:0000:0000:0000:0001").unwrap(),
            "2001:db8::1"
        );
    }

    #[test]
    fn test_strip_hextets_keeps_partial_forms() {
        assert_eq!(strip_hextets("2001:0db8:0001:0000"), "2001:db8:1:0");
        assert_eq!(strip_hextets("::0001"), "::1");
        assert_eq!(strip_hextets("ffff:ffff:ffff:ffff::"), "ffff:ffff:ffff:ffff::");
    }

    #[test]
    fn test_validate_rejects_malformed() {
        assert!(!validate("2001:db8::1::2"));
        assert!(!validate("2001:db8:1:2:3:4:5:6:7"));
        assert!(!validate("12345::1"));
        assert!(!validate("2001:db8:g::1"));
        assert!(!validate(""));
        assert!(!validate("192.168.1.1"));
    }

    #[test]
    fn test_segment_count() {
        assert_eq!(segment_count("2001:db8:1:2"), 4);
        assert_eq!(segment_count("::1"), 1);
        assert_eq!(segment_count("2001:db8::"), 2);
        assert_eq!(segment_count("1:2:3:4:5:6:7:8"), 8);
    }

    #[test]
    fn test_binary_conversion() {
        let bits = to_binary("8000::1").unwrap();
        assert_eq!(bits.len(), 128);
        assert!(bits.starts_with("1000000000000000"));
        assert!(bits.ends_with("0001"));

        let hextets = from_binary(&bits).unwrap();
        assert_eq!(hextets, "8000:0000:0000:0000:0000:0000:0000:0001");
    }

    #[test]
    fn test_from_binary_pads_partial_group_on_the_right() {
        assert_eq!(from_binary("11111111").unwrap(), "ff00");
        assert_eq!(from_binary("1111111111111111001").unwrap(), "ffff:2000");
        assert!(from_binary("0102").is_err());
        assert!(from_binary("").is_err());
    }

    #[test]
    fn test_subnet_mask() {
        assert_eq!(subnet_mask(64).unwrap(), "ffff:ffff:ffff:ffff::");
        assert_eq!(subnet_mask(56).unwrap(), "ffff:ffff:ffff:ff00::");
        assert_eq!(
            subnet_mask(128).unwrap(),
            "ffff:ffff:ffff:ffff:ffff:ffff:ffff:ffff"
        );
        assert_eq!(subnet_mask(0).unwrap(), "::");
        assert!(subnet_mask(129).is_err());
    }

    #[test]
    fn test_prefix_length_from_mask() {
        assert_eq!(prefix_length_from_mask("ffff:ffff:ffff:ffff::").unwrap(), 64);
        assert_eq!(prefix_length_from_mask("ffff:ffff:ffff:ff00::").unwrap(), 56);
        assert!(prefix_length_from_mask("ffff:0:ffff::").is_err());
    }

    #[test]
    fn test_split_reproduces_prefix_for_every_length() {
        let address = "2a02:8071:5e2:c100:1a2b:3c4d:5e6f:7081";
        for length in 1..128u8 {
            let (network, _) = split(address, length).unwrap();
            let again = split(address, length).unwrap().0;
            assert_eq!(network, again);

            // The prefix bits are exactly the leading bits of the address
            let address_bits = to_binary(address).unwrap();
            let network_bits: String = network
                .split(':')
                .map(|h| format!("{:016b}", u16::from_str_radix(h, 16).unwrap()))
                .collect();
            assert_eq!(
                &network_bits[..usize::from(length)],
                &address_bits[..usize::from(length)],
                "length {length}"
            );
            assert!(network_bits[usize::from(length)..].chars().all(|c| c == '0'));
        }
    }

    #[test]
    fn test_join_and_split_are_inverse() {
        let cases = [
            ("2001:db8:1:2", "0:0:0:1"),
            ("2001:db8:abcd:12", "1a2b:3c4d:5e6f:7081"),
            ("2a02:8071", "1:2:3:4:5:6"),
            ("fd00:1:2:3:4:5:6", "7"),
        ];
        for (network, interface) in cases {
            let joined = join(network, interface).unwrap();
            let bits = u8::try_from(segment_count(network) * 16).unwrap();
            let (split_network, split_interface) = split(&joined, bits).unwrap();
            assert_eq!(strip_hextets(&split_network), network);
            assert_eq!(strip_hextets(&split_interface.unwrap()), interface);
        }
    }

    #[test]
    fn test_join_inserts_zero_run() {
        assert_eq!(join("2001:db8:1:2", "::1").unwrap(), "2001:db8:1:2::1");
        assert_eq!(join("2001:db8:1:2::", "::a:b").unwrap(), "2001:db8:1:2::a:b");
        assert_eq!(
            join("2001:db8:1:2", "a:b:c:d").unwrap(),
            "2001:db8:1:2:a:b:c:d"
        );
    }

    #[test]
    fn test_join_rejects_overlong_result() {
        let err = join("2001:db8:1:2:3", "a:b:c:d").unwrap_err();
        assert!(matches!(err, Error::BuildIpv6Address(_)));
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("fe80::1").unwrap(), Ipv6Type::LinkLocal);
        assert_eq!(classify("ff02::1").unwrap(), Ipv6Type::Multicast);
        assert_eq!(classify("ff00::").unwrap(), Ipv6Type::Multicast);
        assert_eq!(classify("2001:db8::1").unwrap(), Ipv6Type::GlobalUnicast);
        assert_eq!(classify("::1").unwrap(), Ipv6Type::Loopback);
        assert_eq!(classify("::").unwrap(), Ipv6Type::Unspecified);
        assert_eq!(classify("::ffff:192.0.2.1").unwrap(), Ipv6Type::Ipv4Mapped);
        assert_eq!(classify("fd12:3456::1").unwrap(), Ipv6Type::UniqueLocal);
        assert!(classify("not-an-address").is_err());
    }
}
