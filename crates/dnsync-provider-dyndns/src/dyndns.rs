//! DynDNS update protocols
//!
//! ```http
//! GET /nic/update?hostname=www.example.com&myip=203.0.113.7,2001:db8::10
//! Authorization: Basic <user:password>
//! ```
//!
//! The body answers one line per hostname; `good` and `nochg` mean success,
//! anything else (`badauth`, `nohost`, `abuse`, `911`, ...) is a rejection.
//!
//! Older self-hosted endpoints speak a legacy dialect instead:
//!
//! ```http
//! GET /update?key=..&host=www.example.com&ip=203.0.113.7&ip6=2001:db8::10
//! ```
//!
//! and report success with `Updated 1 hostname` somewhere in the body.

use async_trait::async_trait;
use dnsync_core::config::{DynDnsProtocol, ProviderConfig};
use dnsync_core::model::{DnsRecord, DomainZone};
use dnsync_core::traits::{DnsProvider, DnsProviderFactory};
use dnsync_core::{Error, Result};
use reqwest::Url;

use crate::{family_addresses, http_client, status_error};

const PROVIDER_NAME: &str = "dyndns";

/// DynDNS2 provider
///
/// # Dry-Run Mode
///
/// When `dry_run` is true the update URL is logged and no request is sent.
///
/// # Protocol
///
/// [`DynDnsProtocol::DynDns2`] unless changed with
/// [`with_protocol`](Self::with_protocol). The legacy dialect always sends
/// the update key.
///
/// # Security
///
/// The Debug implementation does NOT expose the password or update key.
pub struct DynDnsProvider {
    update_url: Url,
    credentials: Credentials,
    protocol: DynDnsProtocol,
    client: reqwest::Client,
    dry_run: bool,
}

enum Credentials {
    Basic { username: String, password: String },
    Key(String),
}

impl std::fmt::Debug for DynDnsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let auth = match &self.credentials {
            Credentials::Basic { username, .. } => format!("basic({username}, <REDACTED>)"),
            Credentials::Key(_) => "key(<REDACTED>)".to_string(),
        };
        f.debug_struct("DynDnsProvider")
            .field("update_url", &self.update_url.as_str())
            .field("auth", &auth)
            .field("protocol", &self.protocol)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl DynDnsProvider {
    /// Provider authenticating with HTTP basic auth
    pub fn with_basic_auth(
        update_url: &str,
        username: impl Into<String>,
        password: impl Into<String>,
        dry_run: bool,
    ) -> Result<Self> {
        Self::new(
            update_url,
            Credentials::Basic {
                username: username.into(),
                password: password.into(),
            },
            dry_run,
        )
    }

    /// Provider authenticating with an update key query parameter
    pub fn with_update_key(update_url: &str, key: impl Into<String>, dry_run: bool) -> Result<Self> {
        Self::new(update_url, Credentials::Key(key.into()), dry_run)
    }

    fn new(update_url: &str, credentials: Credentials, dry_run: bool) -> Result<Self> {
        let update_url = Url::parse(update_url)
            .map_err(|e| Error::config(format!("Invalid DynDNS update URL {update_url}: {e}")))?;
        Ok(Self {
            update_url,
            credentials,
            protocol: DynDnsProtocol::DynDns2,
            client: http_client(PROVIDER_NAME)?,
            dry_run,
        })
    }

    /// Switch the query dialect
    ///
    /// The legacy dialect has no basic auth and is rejected for basic
    /// credentials.
    pub fn with_protocol(mut self, protocol: DynDnsProtocol) -> Result<Self> {
        if protocol == DynDnsProtocol::Legacy && matches!(self.credentials, Credentials::Basic { .. }) {
            return Err(Error::config("Legacy DynDNS protocol needs an update key"));
        }
        self.protocol = protocol;
        Ok(self)
    }

    /// Update URL for `record`, carrying the sibling's address too
    fn request_url(&self, record: &DnsRecord, sibling: Option<&DnsRecord>) -> Result<Url> {
        let (ipv4, ipv6) = family_addresses(record, sibling);
        let ipv4 = ipv4.map(|ip| ip.address());
        let ipv6 = ipv6.and_then(|ip| ip.address());

        if ipv4.is_none() && ipv6.is_none() {
            return Err(Error::invalid_input(format!(
                "{} carries no address to push",
                record.label()
            )));
        }

        let hostname = record.domain().full_name();
        let mut url = self.update_url.clone();
        {
            let mut query = url.query_pairs_mut();
            match self.protocol {
                DynDnsProtocol::DynDns2 => {
                    let addresses: Vec<&str> = ipv4.into_iter().chain(ipv6).collect();
                    query.append_pair("hostname", &hostname);
                    query.append_pair("myip", &addresses.join(","));
                    if let Credentials::Key(key) = &self.credentials {
                        query.append_pair("key", key);
                    }
                }
                DynDnsProtocol::Legacy => {
                    if let Credentials::Key(key) = &self.credentials {
                        query.append_pair("key", key);
                    }
                    query.append_pair("host", &hostname);
                    if let Some(ip) = ipv4 {
                        query.append_pair("ip", ip);
                    }
                    if let Some(ip) = ipv6 {
                        query.append_pair("ip6", ip);
                    }
                }
            }
        }
        Ok(url)
    }

    fn check_response(&self, body: &str) -> Result<()> {
        match self.protocol {
            DynDnsProtocol::DynDns2 => check_response(body),
            DynDnsProtocol::Legacy => check_legacy_response(body),
        }
    }
}

/// Check a DynDNS2 response body
fn check_response(body: &str) -> Result<()> {
    let rejected = body
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .find(|line| !(line.starts_with("good") || line.starts_with("nochg")));

    match rejected {
        None if !body.trim().is_empty() => Ok(()),
        None => Err(Error::provider(PROVIDER_NAME, "Empty update response")),
        Some(code) => Err(Error::provider_with_response(
            PROVIDER_NAME,
            format!("Update rejected: {code}"),
            serde_json::Value::String(body.to_string()),
        )),
    }
}

/// Check a legacy response body
fn check_legacy_response(body: &str) -> Result<()> {
    if body.contains("Updated 1 hostname") {
        return Ok(());
    }
    let summary = body.lines().map(str::trim).find(|line| !line.is_empty()).unwrap_or("empty response");
    Err(Error::provider_with_response(
        PROVIDER_NAME,
        format!("Update rejected: {summary}"),
        serde_json::Value::String(body.to_string()),
    ))
}

#[async_trait]
impl DnsProvider for DynDnsProvider {
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
                "[DRY-RUN] Would send DynDNS update to {}",
                self.update_url
            );
            return Ok(());
        }

        let mut request = self.client.get(url);
        if let Credentials::Basic { username, password } = &self.credentials {
            request = request.basic_auth(username, Some(password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER_NAME, format!("HTTP request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response".to_string());

        if !status.is_success() {
            return Err(status_error(PROVIDER_NAME, status, body));
        }

        self.check_response(&body)?;
        tracing::debug!(record = %record.label(), response = body.trim(), "DynDNS update accepted");
        Ok(())
    }
}

/// Factory for creating DynDNS providers
pub struct DynDnsFactory;

impl DnsProviderFactory for DynDnsFactory {
    fn create(&self, config: &ProviderConfig, dry_run: bool) -> Result<Box<dyn DnsProvider>> {
        let ProviderConfig::DynDns {
            update_url,
            username,
            password,
            update_key,
            protocol,
        } = config
        else {
            return Err(Error::config("Invalid config for DynDNS provider"));
        };

        if dry_run {
            tracing::warn!("DynDNS provider running in DRY-RUN mode - no changes will be made");
        }

        let provider = match (username, password, update_key) {
            // the legacy dialect authenticates with the key only
            (_, _, Some(key)) if *protocol == DynDnsProtocol::Legacy && !key.is_empty() => {
                DynDnsProvider::with_update_key(update_url, key.as_str(), dry_run)?
            }
            (Some(user), Some(pass), _) => {
                DynDnsProvider::with_basic_auth(update_url, user.as_str(), pass.as_str(), dry_run)?
            }
            (None, None, Some(key)) if !key.is_empty() => {
                DynDnsProvider::with_update_key(update_url, key.as_str(), dry_run)?
            }
            _ => {
                return Err(Error::config(
                    "DynDNS needs either username/password or an update key",
                ));
            }
        };
        Ok(Box::new(provider.with_protocol(*protocol)?))
    }
}
