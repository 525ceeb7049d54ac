//! Storage error types for trove-storage.
//!
//! [`StorageError`] covers all anticipated failure modes in the storage
//! layer: lookups that miss, optimistic-lock conflicts, adapter resolution,
//! serialization, and database faults. Lock and not-found errors are
//! surfaced to the immediate caller; this layer never retries.

use thiserror::Error;

use trove_core::ResourceId;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No record exists for the given id.
    #[error("resource not found: {0}")]
    NotFound(ResourceId),

    /// An update or delete presented a lock token that does not match the
    /// stored token. The caller is expected to re-read and retry.
    #[error("stale object: {0} was updated by another process")]
    StaleObject(ResourceId),

    /// Resolving a registry key with no registered adapter.
    #[error("no adapter registered under key '{0}'")]
    AdapterNotFound(String),

    /// Deleting or updating a resource that was never saved.
    #[error("resource of variant '{variant}' has no id; it was never persisted")]
    NotPersisted { variant: String },

    /// A stored type tag names a variant absent from the schema registry.
    #[error("unknown resource variant: '{0}'")]
    UnknownVariant(String),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The underlying SQLite database reported an error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Applying schema migrations failed.
    #[error("migration error: {0}")]
    Migration(String),

    /// A stored document violated a structural invariant.
    #[error("integrity error: {reason}")]
    Integrity { reason: String },
}
