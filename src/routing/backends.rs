//! Backend set abstraction.
//!
//! # Responsibilities
//! - Hold the ordered list of backend base addresses
//! - Reject an empty list and malformed addresses at startup
//! - Resolve a backend index to its base address

use url::Url;

/// Error building a [`BackendSet`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("empty servers list")]
    Empty,
    #[error("invalid server address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },
}

/// Ordered, immutable list of backend base addresses (scheme + host + port).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSet {
    bases: Vec<String>,
}

impl BackendSet {
    /// Validate and build the set.
    ///
    /// Addresses are stored in their serialized URL form (ASCII only, host
    /// lowercased) with any trailing `/` dropped, so joining with an absolute
    /// path never doubles the separator.
    pub fn new<I, S>(addresses: I) -> Result<Self, BackendError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut bases = Vec::new();
        for address in addresses {
            let address = address.as_ref().trim();
            let url = Url::parse(address).map_err(|e| BackendError::InvalidAddress {
                address: address.to_string(),
                reason: e.to_string(),
            })?;
            if url.host_str().is_none() {
                return Err(BackendError::InvalidAddress {
                    address: address.to_string(),
                    reason: "missing host".to_string(),
                });
            }
            bases.push(url.as_str().trim_end_matches('/').to_string());
        }

        if bases.is_empty() {
            return Err(BackendError::Empty);
        }

        Ok(Self { bases })
    }

    /// Base address for `index`.
    ///
    /// # Panics
    /// If `index >= self.len()`.
    pub fn base(&self, index: usize) -> &str {
        &self.bases[index]
    }

    /// Number of backends; always at least one.
    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.bases.iter().map(String::as_str)
    }
}
