//! IPv64 update endpoint
//!
//! ```http
//! GET /nic/update?key=..&domain=home.ipv64.net&output=full&prefix=www&ip=..&ip6=..&ip6lanprefix=2001:db8:1:2::/64
//! ```
//!
//! The endpoint answers JSON; `"status": "success"` means the update was
//! applied.

use async_trait::async_trait;
use dnsync_core::config::ProviderConfig;
use dnsync_core::model::{DnsRecord, DomainZone};
use dnsync_core::traits::{DnsProvider, DnsProviderFactory};
use dnsync_core::{Error, Result};
use reqwest::Url;
use serde_json::Value;

use crate::{family_addresses, http_client, status_error};

const PROVIDER_NAME: &str = "ipv64";

/// IPv64 update endpoint
const IPV64_UPDATE_URL: &str = "https://ipv64.net/nic/update";

/// IPv64 provider
///
/// # Network Prefix
///
/// When the pushed IPv6 value carries a network prefix, it is sent as
/// `ip6lanprefix` so the service can update prefix-delegated records.
/// The engine only leaves the prefix on the value when prefix propagation
/// is enabled.
///
/// # Security
///
/// The Debug implementation does NOT expose the update key.
pub struct Ipv64Provider {
    update_url: Url,
    update_key: String,
    client: reqwest::Client,
    dry_run: bool,
}

impl std::fmt::Debug for Ipv64Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ipv64Provider")
            .field("update_url", &self.update_url.as_str())
            .field("update_key", &"<REDACTED>")
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl Ipv64Provider {
    /// Create a provider
    ///
    /// `update_url` defaults to the public ipv64.net endpoint.
    pub fn new(update_key: impl Into<String>, update_url: Option<&str>, dry_run: bool) -> Result<Self> {
        let update_key = update_key.into();
        if update_key.is_empty() {
            return Err(Error::config("IPv64 update key is required"));
        }

        let raw_url = update_url.unwrap_or(IPV64_UPDATE_URL);
        let update_url = Url::parse(raw_url)
            .map_err(|e| Error::config(format!("Invalid IPv64 update URL {raw_url}: {e}")))?;

        Ok(Self {
            update_url,
            update_key,
            client: http_client(PROVIDER_NAME)?,
            dry_run,
        })
    }

    fn request_url(&self, record: &DnsRecord, sibling: Option<&DnsRecord>) -> Result<Url> {
        let (ipv4, ipv6) = family_addresses(record, sibling);
        let ipv6_address = ipv6.and_then(|ip| ip.address());
        if ipv4.is_none() && ipv6_address.is_none() {
            return Err(Error::invalid_input(format!(
                "{} carries no address to push",
                record.label()
            )));
        }

        let mut url = self.update_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("key", &self.update_key);
            query.append_pair("domain", record.domain().domain());
            query.append_pair("output", "full");
            if let Some(label) = record.domain().host_label() {
                query.append_pair("prefix", label);
            }
            if let Some(ip) = ipv4 {
                query.append_pair("ip", ip.address());
            }
            if let Some(ip) = ipv6_address {
                query.append_pair("ip6", ip);
            }
            if let Some(network) = ipv6.and_then(|ip| ip.network_cidr()) {
                query.append_pair("ip6lanprefix", &network);
            }
        }
        Ok(url)
    }
}

/// Check an IPv64 JSON response
fn check_response(body: Value) -> Result<()> {
    if body.get("status").and_then(Value::as_str) == Some("success") {
        return Ok(());
    }
    let info = body
        .get("info")
        .and_then(Value::as_str)
        .unwrap_or("no status in response")
        .to_string();
    Err(Error::provider_with_response(
        PROVIDER_NAME,
        format!("Update rejected: {info}"),
        body,
    ))
}

#[async_trait]
impl DnsProvider for Ipv64Provider {
    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn combines_families(&self) -> bool {
        true
    }

    async fn fetch_zone(&self, domain: &str) -> Result<Option<DomainZone>> {
        Ok(Some(DomainZone::new(domain)))
    }

    async fn push_record(
        &self,
        _zone: &DomainZone,
        record: &DnsRecord,
        sibling: Option<&DnsRecord>,
    ) -> Result<()> {
        let url = self.request_url(record, sibling)?;

        if self.dry_run {
            tracing::info!(
                record = %record.label(),
                "[DRY-RUN] Would send IPv64 update to {}",
                self.update_url
            );
            return Ok(());
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER_NAME, format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(PROVIDER_NAME, status, body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::provider(PROVIDER_NAME, format!("Failed to parse response: {e}")))?;

        check_response(body)?;
        tracing::debug!(record = %record.label(), "IPv64 update accepted");
        Ok(())
    }
}

/// Factory for creating IPv64 providers
pub struct Ipv64Factory;

impl DnsProviderFactory for Ipv64Factory {
    fn create(&self, config: &ProviderConfig, dry_run: bool) -> Result<Box<dyn DnsProvider>> {
        match config {
            ProviderConfig::Ipv64 {
                update_key,
                update_url,
            } => {
                if dry_run {
                    tracing::warn!("IPv64 provider running in DRY-RUN mode - no changes will be made");
                }
                Ok(Box::new(Ipv64Provider::new(
                    update_key.as_str(),
                    update_url.as_deref(),
                    dry_run,
                )?))
            }
            _ => Err(Error::config("Invalid config for IPv64 provider")),
        }
    }
}
