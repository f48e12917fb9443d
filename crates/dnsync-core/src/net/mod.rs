//! Address algebra and value types
//!
//! - [`ipv6`]: stateless hextet/binary arithmetic on IPv6 text
//! - [`address`]: [`Ipv6`], [`Ipv4`] and the [`IpAddress`] record value
//! - [`builder`]: builders composing addresses from prefix/interface parts

pub mod address;
pub mod builder;
pub mod ipv6;

pub use address::{AddressFamily, IpAddress, Ipv4, Ipv6};
pub use builder::Ipv6Builder;
pub use ipv6::Ipv6Type;
