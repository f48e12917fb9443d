// # Key-Based Update Providers
//
// This crate provides DNS providers for services that expose a single
// update URL per hostname instead of a record API:
//
// - `dyndns`: DynDNS2 protocol (`/nic/update?hostname=..&myip=..`)
// - `ipv64`: ipv64.net update endpoint (`?key=..&domain=..&prefix=..`)
//
// ## Zone Model
//
// Neither service can list records, so `fetch_zone` synthesizes an empty
// zone. Every configured record is therefore created on each run and the
// push cache is what keeps unchanged addresses from being resent.
//
// ## Combined Push
//
// One update call carries both the IPv4 and the IPv6 address of a
// hostname. The reconciler hands the opposite-family record in as the
// sibling and the provider folds both into one request.
//
// ## Security
//
// Credentials never appear in logs or `Debug` output.

mod dyndns;
mod ipv64;

pub use dyndns::{DynDnsFactory, DynDnsProvider};
pub use ipv64::{Ipv64Factory, Ipv64Provider};

use dnsync_core::model::DnsRecord;
use dnsync_core::net::{IpAddress, Ipv4, Ipv6};
use dnsync_core::registry::ProviderRegistry;
use dnsync_core::{Error, Result};
use std::time::Duration;

/// Default HTTP timeout for update requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

fn http_client(provider: &str) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(DEFAULT_HTTP_TIMEOUT)
        .build()
        .map_err(|e| Error::config(format!("{provider}: failed to build HTTP client: {e}")))
}

/// Map a non-success HTTP status to a provider error carrying the body
fn status_error(provider: &str, status: reqwest::StatusCode, body: String) -> Error {
    let message = match status.as_u16() {
        401 | 403 => format!("Authentication failed: invalid credentials. Status: {status}"),
        404 => format!("Update endpoint not found. Status: {status}"),
        429 => format!("Rate limit exceeded. Please retry later. Status: {status}"),
        500..=599 => format!("Server error (transient). Status: {status}"),
        _ => format!("Update failed. Status: {status}"),
    };
    Error::provider_with_response(provider, message, serde_json::Value::String(body))
}

/// IPv4 and IPv6 addresses carried by a record and its sibling
fn family_addresses<'a>(
    record: &'a DnsRecord,
    sibling: Option<&'a DnsRecord>,
) -> (Option<&'a Ipv4>, Option<&'a Ipv6>) {
    let mut ipv4 = None;
    let mut ipv6 = None;
    for address in std::iter::once(record).chain(sibling).filter_map(|r| r.address()) {
        match address {
            IpAddress::V4(ip) => ipv4 = Some(ip),
            IpAddress::V6(ip) => ipv6 = Some(ip),
        }
    }
    (ipv4, ipv6)
}

/// Register both providers with a registry
///
/// # Example
///
/// ```rust
/// use dnsync_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// dnsync_provider_dyndns::register(&registry);
/// assert!(registry.has_provider("dyndns"));
/// ```
pub fn register(registry: &ProviderRegistry) {
    registry.register_provider("dyndns", Box::new(DynDnsFactory));
    registry.register_provider("ipv64", Box::new(Ipv64Factory));
}
