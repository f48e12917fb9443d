//! Configuration types for dnsync
//!
//! One [`DdnsConfig`] value is built at startup and passed by reference into
//! the engine; nothing reads configuration from ambient state.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{Error, Result};
use crate::net::{ipv6, Ipv4};

/// Main dnsync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DdnsConfig {
    /// Track the IPv4 address (A records)
    #[serde(default = "default_true")]
    pub use_ipv4: bool,

    /// Track the IPv6 address (AAAA records)
    #[serde(default)]
    pub use_ipv6: bool,

    /// Propagate the detected IPv6 network prefix to providers that accept it
    #[serde(default)]
    pub update_network_prefix: bool,

    /// Run the full reconciliation but never push
    #[serde(default)]
    pub dry_run: bool,

    /// IP detection collaborator
    #[serde(default)]
    pub detector: DetectorConfig,

    /// Provider modules domains are bound to
    pub modules: Vec<ModuleConfig>,

    /// Domains to manage, processed in this order
    pub domains: Vec<DomainConfig>,

    /// Push cache gate
    #[serde(default)]
    pub cache: CacheConfig,
}

impl DdnsConfig {
    /// Parse a JSON configuration document
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::config(format!("Invalid configuration: {e}")))
    }

    /// Read and parse a JSON configuration file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::config(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_json(&text)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.use_ipv4 && !self.use_ipv6 {
            return Err(Error::config("IPv4 and IPv6 tracking are both disabled"));
        }

        if self.modules.is_empty() {
            return Err(Error::config("No modules configured"));
        }

        if self.domains.is_empty() {
            return Err(Error::config("No domains configured"));
        }

        let mut names = HashSet::new();
        for module in &self.modules {
            if module.name.is_empty() {
                return Err(Error::config("Module name cannot be empty"));
            }
            if !names.insert(module.name.as_str()) {
                return Err(Error::config(format!("Duplicate module name: {}", module.name)));
            }
            module.provider.validate()?;
        }

        for domain in &self.domains {
            domain.validate()?;
            if !names.contains(domain.module.as_str()) {
                return Err(Error::config(format!(
                    "Domain {} is bound to unknown module {}",
                    domain.domain, domain.module
                )));
            }
        }

        self.detector.validate()?;
        self.cache.validate()?;

        Ok(())
    }

    /// Look up a module by name
    pub fn module(&self, name: &str) -> Option<&ModuleConfig> {
        self.modules.iter().find(|m| m.name == name)
    }
}

fn default_true() -> bool {
    true
}

/// IP detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DetectorConfig {
    /// Public "what is my IP" HTTP APIs
    Api {
        /// IPv4 endpoints, tried in order (built-in list when empty)
        #[serde(default)]
        ipv4_urls: Vec<String>,
        /// IPv6 endpoints, tried in order (built-in list when empty)
        #[serde(default)]
        ipv6_urls: Vec<String>,
        /// Network prefix length to decorate IPv6 answers with
        #[serde(default)]
        prefix_length: Option<u8>,
    },

    /// Addresses assigned to the host's own network interfaces
    Local {
        /// Only look at this interface (all interfaces when unset)
        #[serde(default)]
        interface: Option<String>,
        /// Network prefix length to decorate IPv6 addresses with
        #[serde(default)]
        prefix_length: Option<u8>,
    },

    /// Fixed addresses
    Static {
        ipv4: Option<String>,
        ipv6: Option<String>,
        #[serde(default)]
        prefix_length: Option<u8>,
    },

    /// Custom detector
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl DetectorConfig {
    /// Validate the detector configuration
    pub fn validate(&self) -> Result<()> {
        match self {
            DetectorConfig::Api {
                ipv4_urls,
                ipv6_urls,
                prefix_length,
            } => {
                if ipv4_urls.iter().chain(ipv6_urls).any(|u| u.is_empty()) {
                    return Err(Error::config("Detector URL cannot be empty"));
                }
                validate_prefix_length(*prefix_length)
            }
            DetectorConfig::Local {
                interface,
                prefix_length,
            } => {
                if interface.as_deref().is_some_and(str::is_empty) {
                    return Err(Error::config("Detector interface cannot be empty"));
                }
                validate_prefix_length(*prefix_length)
            }
            DetectorConfig::Static {
                ipv4,
                ipv6,
                prefix_length,
            } => {
                if let Some(ip) = ipv4
                    && !Ipv4::new(ip.as_str()).validate()
                {
                    return Err(Error::config(format!("Invalid static IPv4 address: {ip}")));
                }
                if let Some(ip) = ipv6
                    && !ipv6::validate(ip)
                {
                    return Err(Error::config(format!("Invalid static IPv6 address: {ip}")));
                }
                validate_prefix_length(*prefix_length)
            }
            DetectorConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(Error::config("Custom detector factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(Error::config("Custom detector config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the detector type name
    pub fn type_name(&self) -> &str {
        match self {
            DetectorConfig::Api { .. } => "api",
            DetectorConfig::Local { .. } => "local",
            DetectorConfig::Static { .. } => "static",
            DetectorConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        DetectorConfig::Api {
            ipv4_urls: Vec::new(),
            ipv6_urls: Vec::new(),
            prefix_length: None,
        }
    }
}

fn validate_prefix_length(prefix_length: Option<u8>) -> Result<()> {
    match prefix_length {
        Some(len) if len == 0 || len > 128 => Err(Error::config(format!(
            "IPv6 prefix length must be within 1..=128, got {len}"
        ))),
        _ => Ok(()),
    }
}

/// A named provider module
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Name domains refer to
    pub name: String,

    /// Provider backing this module
    pub provider: ProviderConfig,
}

/// DNS provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// DynDNS2 style update endpoint
    #[serde(rename = "dyndns")]
    DynDns {
        /// Update endpoint (e.g. `https://members.dyndns.org/nic/update`)
        update_url: String,
        /// Basic auth user
        #[serde(default)]
        username: Option<String>,
        /// Basic auth password
        #[serde(default)]
        password: Option<String>,
        /// Update key sent instead of basic auth
        #[serde(default)]
        update_key: Option<String>,
        /// Query dialect of the endpoint
        #[serde(default)]
        protocol: DynDnsProtocol,
    },

    /// IPv64 style key-based endpoint
    Ipv64 {
        /// Account update key
        update_key: String,
        /// Update endpoint override
        #[serde(default)]
        update_url: Option<String>,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

/// Query dialect of a DynDNS update endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DynDnsProtocol {
    /// `hostname` + `myip`, answers `good`/`nochg`
    #[default]
    #[serde(rename = "dyndns2")]
    DynDns2,
    /// `key` + `host` + `ip` + `ip6`, answers `Updated 1 hostname`
    #[serde(rename = "legacy")]
    Legacy,
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<()> {
        match self {
            ProviderConfig::DynDns {
                update_url,
                username,
                password,
                update_key,
                protocol,
            } => {
                if update_url.is_empty() {
                    return Err(Error::config("DynDNS update URL cannot be empty"));
                }
                if *protocol == DynDnsProtocol::Legacy && update_key.is_none() {
                    return Err(Error::config("Legacy DynDNS protocol needs an update key"));
                }
                if username.is_some() != password.is_some() {
                    return Err(Error::config(
                        "DynDNS username and password must be set together",
                    ));
                }
                if username.is_none() && update_key.is_none() {
                    return Err(Error::config(
                        "DynDNS needs either username/password or an update key",
                    ));
                }
                Ok(())
            }
            ProviderConfig::Ipv64 { update_key, .. } => {
                if update_key.is_empty() {
                    return Err(Error::config("IPv64 update key cannot be empty"));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(Error::config("Custom provider factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(Error::config("Custom provider config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::DynDns { .. } => "dyndns",
            ProviderConfig::Ipv64 { .. } => "ipv64",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

/// A registered domain and the subdomains managed below it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Registered domain (e.g. `example.com`)
    pub domain: String,

    /// Name of the module handling this domain
    pub module: String,

    /// Subdomains, processed in this order
    pub subdomains: Vec<SubdomainConfig>,
}

impl DomainConfig {
    fn validate(&self) -> Result<()> {
        if self.domain.is_empty() {
            return Err(Error::config("Domain name cannot be empty"));
        }
        if self.subdomains.is_empty() {
            return Err(Error::config(format!("Domain {} has no subdomains", self.domain)));
        }
        for sub in &self.subdomains {
            sub.validate(&self.domain)?;
        }
        Ok(())
    }
}

/// One subdomain with optional static overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubdomainConfig {
    /// Label, `@` for the apex or `*` for a wildcard
    pub name: String,

    /// Static IPv4 address used instead of the detected one
    #[serde(default)]
    pub ipv4: Option<String>,

    /// Static IPv6 interface identifier combined with the detected prefix
    #[serde(default)]
    pub ipv6: Option<String>,
}

impl SubdomainConfig {
    /// Create a subdomain entry without overrides
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ipv4: None,
            ipv6: None,
        }
    }

    fn validate(&self, domain: &str) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::config(format!("Empty subdomain name below {domain}")));
        }
        if let Some(ip) = &self.ipv4
            && !Ipv4::new(ip.as_str()).validate()
        {
            return Err(Error::config(format!(
                "Invalid static IPv4 address {ip} for {}.{domain}",
                self.name
            )));
        }
        if let Some(iid) = &self.ipv6
            && ipv6::join("0:0:0:0", iid).is_err()
        {
            return Err(Error::config(format!(
                "Invalid IPv6 interface identifier {iid} for {}.{domain}",
                self.name
            )));
        }
        Ok(())
    }
}

/// Push cache configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheConfig {
    /// JSON file persisted across runs
    File {
        /// Path to the cache file
        path: String,
    },

    /// In-memory cache (not persistent)
    Memory,

    /// No cache; every dirty record is pushed
    #[default]
    Disabled,
}

impl CacheConfig {
    fn validate(&self) -> Result<()> {
        match self {
            CacheConfig::File { path } if path.is_empty() => {
                Err(Error::config("Cache file path cannot be empty"))
            }
            _ => Ok(()),
        }
    }
}
