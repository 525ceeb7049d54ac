//! Opaque identifier newtypes for resources and lock tokens.
//!
//! Both are distinct newtype wrappers over `String`, providing type safety
//! so a [`ResourceId`] cannot be accidentally used where a [`LockToken`] is
//! expected. The inner value is opaque to callers; fresh ids and tokens are
//! minted from uuid v4 by the persister, never by application code.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Globally unique identifier for a persisted resource.
///
/// Assigned exactly once, at first successful save, and never changed. A
/// resource with no id has never been persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Mints a fresh id.
    pub fn generate() -> Self {
        ResourceId(Uuid::new_v4().to_string())
    }

    /// Wraps an existing id string (for rehydrating stored records).
    pub fn new(id: impl Into<String>) -> Self {
        ResourceId(id.into())
    }

    /// The opaque string form of the id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> Self {
        id.0
    }
}

/// Opaque version marker for optimistic concurrency control.
///
/// Produced by the persister on every successful save of a lock-enabled
/// resource. Callers supply the token unchanged on the next update to prove
/// they observed the latest version; a mismatch is a stale-object failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockToken(String);

impl LockToken {
    /// Mints a fresh token.
    pub fn generate() -> Self {
        LockToken(Uuid::new_v4().to_string())
    }

    /// Wraps an existing token string (for rehydrating stored records).
    pub fn new(token: impl Into<String>) -> Self {
        LockToken(token.into())
    }

    /// The opaque string form of the token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
