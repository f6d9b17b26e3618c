//! Typed correlation identifiers.
//!
//! Every dispatched flow request gets a [`RequestId`] (UUIDv7, time-ordered,
//! globally unique). The id ties a request to its eventual result and is
//! never reused. The `short()` form (first 8 hex chars) is for human-facing
//! output only, never a lookup key.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A correlation identifier for one flow request (UUIDv7).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(uuid::Uuid);

impl RequestId {
    /// Create a fresh time-ordered ID (UUIDv7).
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    /// First 8 hex characters, for display only.
    pub fn short(&self) -> String {
        self.0.as_simple().to_string()[..8].to_string()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<uuid::Uuid> for RequestId {
    fn from(u: uuid::Uuid) -> Self {
        Self(u)
    }
}

impl From<RequestId> for uuid::Uuid {
    fn from(id: RequestId) -> uuid::Uuid {
        id.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Full UUID with hyphens for log readability
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({})", self.short())
    }
}
