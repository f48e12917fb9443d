//! Error types for dnsync
//!
//! Severity decides where an error is caught: configuration and address
//! detection errors abort a run before any provider is touched, everything
//! else is caught at the smallest enclosing scope (record, zone, push call)
//! and turned into a log entry.

use thiserror::Error;

/// Result type alias for dnsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for dnsync
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or unusable configuration (fatal)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The host address could not be detected or failed validation
    #[error("Address detection error: {0}")]
    AddressDetection(String),

    /// An IPv6 address could not be composed from its parts
    #[error("IPv6 build failed: {0}")]
    BuildIpv6Address(String),

    /// More than one record matched the same name/type/family key
    #[error("Record anomaly: {count} records found for {record}")]
    RecordAnomaly {
        /// Presentation name and type of the offending record
        record: String,
        /// Number of matches found
        count: usize,
    },

    /// Transport failure, non-success status or malformed provider response
    #[error("Provider request failed ({provider}): {message}")]
    ProviderRequest {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
        /// Decoded response body, when one was received
        response: Option<serde_json::Value>,
    },

    /// A session-based provider could not authenticate
    #[error("Provider session error ({provider}): {message}")]
    ProviderSession {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Push cache load/save errors
    #[error("Push cache error: {0}")]
    Cache(String),

    /// Requested item does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an address detection error
    pub fn address_detection(msg: impl Into<String>) -> Self {
        Self::AddressDetection(msg.into())
    }

    /// Create an IPv6 build error
    pub fn build_ipv6(msg: impl Into<String>) -> Self {
        Self::BuildIpv6Address(msg.into())
    }

    /// Create a record anomaly error
    pub fn anomaly(record: impl Into<String>, count: usize) -> Self {
        Self::RecordAnomaly {
            record: record.into(),
            count,
        }
    }

    /// Create a provider request error without a response body
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderRequest {
            provider: provider.into(),
            message: message.into(),
            response: None,
        }
    }

    /// Create a provider request error carrying the decoded response body
    pub fn provider_with_response(
        provider: impl Into<String>,
        message: impl Into<String>,
        response: serde_json::Value,
    ) -> Self {
        Self::ProviderRequest {
            provider: provider.into(),
            message: message.into(),
            response: Some(response),
        }
    }

    /// Create a provider session error
    pub fn session(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderSession {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a push cache error
    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether this error must abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::AddressDetection(_))
    }

    /// The decoded provider response attached to this error, if any
    pub fn response(&self) -> Option<&serde_json::Value> {
        match self {
            Self::ProviderRequest { response, .. } => response.as_ref(),
            _ => None,
        }
    }
}
