//! One-shot `RTM_GETADDR` dump over a NETLINK_ROUTE socket
//!
//! The kernel answers a dump request with a batch of `RTM_NEWADDR`
//! messages terminated by `NLMSG_DONE`. Each message carries an
//! `ifaddrmsg` header followed by route attributes; only the address and
//! the extended flag word are read here.

use std::ffi::CString;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use dnsync_core::{Error, Result};

use crate::InterfaceAddress;

const NLM_F_REQUEST: u16 = libc::NLM_F_REQUEST as u16;
const NLM_F_DUMP: u16 = libc::NLM_F_DUMP as u16;
const NLMSG_DONE: u16 = libc::NLMSG_DONE as u16;
const NLMSG_ERROR: u16 = libc::NLMSG_ERROR as u16;
const RTM_NEWADDR: u16 = libc::RTM_NEWADDR;
const RTM_GETADDR: u16 = libc::RTM_GETADDR;

const IFA_ADDRESS: u16 = libc::IFA_ADDRESS;
const IFA_LOCAL: u16 = libc::IFA_LOCAL;
const IFA_FLAGS: u16 = libc::IFA_FLAGS;

const AF_INET: u8 = libc::AF_INET as u8;
const AF_INET6: u8 = libc::AF_INET6 as u8;

const NLMSG_HDRLEN: usize = 16;
const IFADDRMSG_LEN: usize = 8;
const RTA_HEADER_SIZE: usize = 4;
const ALIGN_TO: usize = 4;

const DUMP_BUFFER_SIZE: usize = 16384;
const DUMP_SEQ: u32 = 1;

fn align(len: usize) -> usize {
    (len + ALIGN_TO - 1) & !(ALIGN_TO - 1)
}

fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    data.get(offset..offset + 2)
        .and_then(|b| b.try_into().ok())
        .map(u16::from_ne_bytes)
}

fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    data.get(offset..offset + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_ne_bytes)
}

/// Resolve an interface name to its kernel index
pub(crate) fn interface_index(name: &str) -> Result<u32> {
    let c_name = CString::new(name)
        .map_err(|_| Error::config(format!("Invalid interface name: {name}")))?;
    let index = unsafe { libc::if_nametoindex(c_name.as_ptr()) };
    if index == 0 {
        return Err(Error::address_detection(format!(
            "Network interface {name} not found"
        )));
    }
    Ok(index)
}

/// Every address currently assigned to any interface, in kernel order
pub(crate) fn interface_addresses() -> Result<Vec<InterfaceAddress>> {
    let fd = unsafe {
        libc::socket(
            libc::AF_NETLINK,
            libc::SOCK_RAW | libc::SOCK_CLOEXEC,
            libc::NETLINK_ROUTE,
        )
    };
    if fd < 0 {
        return Err(os_error("create netlink socket"));
    }
    // Closed on every return path from here on.
    let socket = unsafe { OwnedFd::from_raw_fd(fd) };

    let mut addr: libc::sockaddr_nl = unsafe { std::mem::zeroed() };
    addr.nl_family = libc::AF_NETLINK as libc::sa_family_t;
    let res = unsafe {
        libc::bind(
            socket.as_raw_fd(),
            &addr as *const _ as *const libc::sockaddr,
            std::mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t,
        )
    };
    if res < 0 {
        return Err(os_error("bind netlink socket"));
    }

    let request = dump_request();
    let sent = unsafe {
        libc::send(
            socket.as_raw_fd(),
            request.as_ptr() as *const libc::c_void,
            request.len(),
            0,
        )
    };
    if sent < 0 {
        return Err(os_error("send netlink dump request"));
    }

    let mut addresses = Vec::new();
    let mut buf = vec![0u8; DUMP_BUFFER_SIZE];
    loop {
        let n = unsafe {
            libc::recv(
                socket.as_raw_fd(),
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
                0,
            )
        };
        if n < 0 {
            return Err(os_error("receive netlink dump"));
        }
        if n == 0 || parse_dump(&buf[..n as usize], &mut addresses)? {
            break;
        }
    }

    tracing::debug!(count = addresses.len(), "Interface addresses dumped");
    Ok(addresses)
}

fn os_error(action: &str) -> Error {
    Error::address_detection(format!(
        "Failed to {action}: {}",
        std::io::Error::last_os_error()
    ))
}

/// `RTM_GETADDR` dump request for all address families
fn dump_request() -> [u8; NLMSG_HDRLEN + IFADDRMSG_LEN] {
    let mut buf = [0u8; NLMSG_HDRLEN + IFADDRMSG_LEN];
    buf[0..4].copy_from_slice(&((NLMSG_HDRLEN + IFADDRMSG_LEN) as u32).to_ne_bytes());
    buf[4..6].copy_from_slice(&RTM_GETADDR.to_ne_bytes());
    buf[6..8].copy_from_slice(&(NLM_F_REQUEST | NLM_F_DUMP).to_ne_bytes());
    buf[8..12].copy_from_slice(&DUMP_SEQ.to_ne_bytes());
    // ifa_family stays AF_UNSPEC
    buf
}

/// Parse one receive buffer of a dump, appending every address found
///
/// Returns `Ok(true)` once `NLMSG_DONE` is seen. Truncated or malformed
/// messages end the buffer without failing the dump.
pub(crate) fn parse_dump(data: &[u8], out: &mut Vec<InterfaceAddress>) -> Result<bool> {
    let mut msg_offset = 0usize;

    while msg_offset + NLMSG_HDRLEN <= data.len() {
        let Some(nlmsg_len) = read_u32(data, msg_offset).map(|l| l as usize) else {
            break;
        };
        let Some(nlmsg_type) = read_u16(data, msg_offset + 4) else {
            break;
        };
        if nlmsg_len < NLMSG_HDRLEN {
            break;
        }

        match nlmsg_type {
            NLMSG_DONE => return Ok(true),
            NLMSG_ERROR => {
                return Err(Error::address_detection("Netlink answered with an error"));
            }
            RTM_NEWADDR => {
                let msg_end = (msg_offset + nlmsg_len).min(data.len());
                if let Some(address) = parse_address(&data[msg_offset + NLMSG_HDRLEN..msg_end]) {
                    out.push(address);
                }
            }
            _ => {}
        }

        msg_offset += align(nlmsg_len);
    }

    Ok(false)
}

/// Parse an `ifaddrmsg` payload and its attributes
fn parse_address(payload: &[u8]) -> Option<InterfaceAddress> {
    let header = payload.get(..IFADDRMSG_LEN)?;
    let family = header[0];
    let prefix_len = header[1];
    let mut flags = u32::from(header[2]);
    let scope = header[3];
    let index = read_u32(header, 4)?;

    let mut address = None;
    let mut local = None;
    let mut rta_offset = IFADDRMSG_LEN;
    while rta_offset + RTA_HEADER_SIZE <= payload.len() {
        let rta_len = read_u16(payload, rta_offset)? as usize;
        let rta_type = read_u16(payload, rta_offset + 2)?;
        if rta_len < RTA_HEADER_SIZE || rta_offset + rta_len > payload.len() {
            break;
        }
        let value = &payload[rta_offset + RTA_HEADER_SIZE..rta_offset + rta_len];

        match rta_type {
            IFA_ADDRESS => address = parse_ip(family, value),
            IFA_LOCAL => local = parse_ip(family, value),
            IFA_FLAGS => flags = read_u32(value, 0).unwrap_or(flags),
            _ => {}
        }

        rta_offset += align(rta_len);
    }

    // IFA_ADDRESS is the peer on point-to-point links; IFA_LOCAL is ours.
    Some(InterfaceAddress {
        index,
        address: local.or(address)?,
        prefix_len,
        flags,
        scope,
    })
}

fn parse_ip(family: u8, value: &[u8]) -> Option<IpAddr> {
    match family {
        AF_INET => <[u8; 4]>::try_from(value).ok().map(|b| IpAddr::V4(Ipv4Addr::from(b))),
        AF_INET6 => <[u8; 16]>::try_from(value).ok().map(|b| IpAddr::V6(Ipv6Addr::from(b))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One `RTM_NEWADDR` message carrying a single address attribute
    fn newaddr(family: u8, flags: u8, index: u32, attr: u16, ip: &[u8]) -> Vec<u8> {
        let rta_len = RTA_HEADER_SIZE + ip.len();
        let len = NLMSG_HDRLEN + IFADDRMSG_LEN + rta_len;
        let mut buf = vec![0u8; align(len)];
        buf[0..4].copy_from_slice(&(len as u32).to_ne_bytes());
        buf[4..6].copy_from_slice(&RTM_NEWADDR.to_ne_bytes());

        let ifa = NLMSG_HDRLEN;
        buf[ifa] = family;
        buf[ifa + 1] = if family == AF_INET { 24 } else { 64 };
        buf[ifa + 2] = flags;
        buf[ifa + 3] = libc::RT_SCOPE_UNIVERSE;
        buf[ifa + 4..ifa + 8].copy_from_slice(&index.to_ne_bytes());

        let rta = ifa + IFADDRMSG_LEN;
        buf[rta..rta + 2].copy_from_slice(&(rta_len as u16).to_ne_bytes());
        buf[rta + 2..rta + 4].copy_from_slice(&attr.to_ne_bytes());
        buf[rta + 4..rta + 4 + ip.len()].copy_from_slice(ip);
        buf
    }

    fn done() -> Vec<u8> {
        let mut buf = vec![0u8; NLMSG_HDRLEN + 4];
        buf[0..4].copy_from_slice(&((NLMSG_HDRLEN + 4) as u32).to_ne_bytes());
        buf[4..6].copy_from_slice(&NLMSG_DONE.to_ne_bytes());
        buf
    }

    const DOC_V6: [u8; 16] = [0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1];

    #[test]
    fn test_align() {
        assert_eq!(align(0), 0);
        assert_eq!(align(1), 4);
        assert_eq!(align(16), 16);
        assert_eq!(align(17), 20);
    }

    #[test]
    fn test_dump_request_header() {
        let request = dump_request();
        assert_eq!(read_u32(&request, 0), Some(24));
        assert_eq!(read_u16(&request, 4), Some(RTM_GETADDR));
        assert_eq!(read_u16(&request, 6), Some(NLM_F_REQUEST | NLM_F_DUMP));
        assert_eq!(request[16], 0);
    }

    #[test]
    fn test_parse_both_families() {
        let mut data = newaddr(AF_INET, 0, 2, IFA_LOCAL, &[192, 0, 2, 10]);
        data.extend(newaddr(AF_INET6, 0, 2, IFA_ADDRESS, &DOC_V6));

        let mut out = Vec::new();
        assert!(!parse_dump(&data, &mut out).unwrap());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].address, "192.0.2.10".parse::<IpAddr>().unwrap());
        assert_eq!(out[0].index, 2);
        assert_eq!(out[0].prefix_len, 24);
        assert_eq!(out[1].address, "2001:db8::1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_parse_stops_at_done() {
        let mut data = newaddr(AF_INET6, 0, 3, IFA_ADDRESS, &DOC_V6);
        data.extend(done());
        data.extend(newaddr(AF_INET, 0, 3, IFA_LOCAL, &[192, 0, 2, 11]));

        let mut out = Vec::new();
        assert!(parse_dump(&data, &mut out).unwrap());
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_parse_error_message() {
        let mut data = done();
        data[4..6].copy_from_slice(&NLMSG_ERROR.to_ne_bytes());

        let result = parse_dump(&data, &mut Vec::new());
        assert!(matches!(result, Err(Error::AddressDetection(_))));
    }

    #[test]
    fn test_parse_keeps_flags() {
        let data = newaddr(AF_INET6, libc::IFA_F_TENTATIVE as u8, 2, IFA_ADDRESS, &DOC_V6);

        let mut out = Vec::new();
        parse_dump(&data, &mut out).unwrap();
        assert_eq!(out[0].flags & libc::IFA_F_TENTATIVE, libc::IFA_F_TENTATIVE);
    }

    #[test]
    fn test_parse_ignores_wrong_payload_length() {
        let data = newaddr(AF_INET6, 0, 2, IFA_ADDRESS, &[0x20, 0x01, 0x0d, 0xb8]);

        let mut out = Vec::new();
        parse_dump(&data, &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_parse_truncated_buffer() {
        let data = newaddr(AF_INET6, 0, 2, IFA_ADDRESS, &DOC_V6);

        let mut out = Vec::new();
        assert!(!parse_dump(&data[..10], &mut out).unwrap());
        parse_dump(&data[..NLMSG_HDRLEN + 4], &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_loopback_index_resolves() {
        assert!(interface_index("lo").is_ok());
        assert!(interface_index("no-such-if0").is_err());
    }
}
