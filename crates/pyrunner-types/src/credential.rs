//! Per-request backend credential.
//!
//! A credential is passed explicitly with each flow request that needs one.
//! It is never stored in process-wide state, and its `Debug` output is
//! redacted so it cannot leak through logs.

use serde::{Deserialize, Serialize};

/// An API key supplied by the user for a single backend call.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw key. Surrounding whitespace is trimmed.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into().trim().to_string())
    }

    /// The raw key, for placing in a request header.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// An empty key counts as no key at all.
    pub fn is_blank(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for Credential {
    fn from(key: String) -> Self {
        Self::new(key)
    }
}

impl From<Credential> for String {
    fn from(credential: Credential) -> Self {
        credential.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}
