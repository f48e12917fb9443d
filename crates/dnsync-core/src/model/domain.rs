//! Configured domain names
//!
//! A [`Domain`] is a `(sub_domain, domain)` pair where the subdomain may be a
//! literal label, the apex marker `@` or the wildcard marker `*`.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Apex marker
pub const APEX: &str = "@";

/// Wildcard marker
pub const WILDCARD: &str = "*";

/// Length of the random label a wildcard resolves to
const WILDCARD_LABEL_LEN: usize = 6;

/// A subdomain of a registered domain
///
/// An empty subdomain is stored as [`APEX`], so both spellings of the apex
/// compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "DomainParts")]
pub struct Domain {
    sub_domain: String,
    domain: String,
}

#[derive(Deserialize)]
struct DomainParts {
    sub_domain: String,
    domain: String,
}

impl From<DomainParts> for Domain {
    fn from(parts: DomainParts) -> Self {
        Domain::new(parts.sub_domain, parts.domain)
    }
}

impl Domain {
    pub fn new(sub_domain: impl Into<String>, domain: impl Into<String>) -> Self {
        let mut sub_domain = sub_domain.into();
        if sub_domain.is_empty() {
            sub_domain = APEX.to_string();
        }
        Self {
            sub_domain,
            domain: domain.into(),
        }
    }

    pub fn sub_domain(&self) -> &str {
        &self.sub_domain
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn is_apex(&self) -> bool {
        self.sub_domain == APEX
    }

    pub fn is_wildcard(&self) -> bool {
        self.sub_domain == WILDCARD
    }

    /// Record name as configured (`sub.domain`, markers kept verbatim)
    ///
    /// This is the key records are matched on.
    pub fn record_name(&self) -> String {
        format!("{}.{}", self.sub_domain, self.domain)
    }

    /// Label to send to providers that take the host part separately
    ///
    /// `None` for the apex.
    pub fn host_label(&self) -> Option<&str> {
        if self.is_apex() {
            None
        } else {
            Some(&self.sub_domain)
        }
    }

    /// Concrete hostname
    ///
    /// The apex resolves to the bare domain, a wildcard to a random
    /// lowercase label below it.
    pub fn full_name(&self) -> String {
        if self.is_apex() {
            self.domain.clone()
        } else if self.is_wildcard() {
            let mut rng = rand::rng();
            let label: String = (0..WILDCARD_LABEL_LEN)
                .map(|_| char::from(rng.random_range(b'a'..=b'z')))
                .collect();
            format!("{label}.{}", self.domain)
        } else {
            self.record_name()
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.sub_domain, self.domain)
    }
}
