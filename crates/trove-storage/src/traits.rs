//! The capability traits every backend must satisfy.
//!
//! Two-capability contract design:
//! - [`Persister`] owns the write side: save/update/delete with
//!   optimistic-lock enforcement.
//! - [`QueryService`] owns the read side: point lookups and ordered
//!   relationship traversal.
//!
//! A [`MetadataAdapter`] binds one persister and one query service to a
//! logical store and is the unit registered in the
//! [`AdapterRegistry`](crate::registry::AdapterRegistry). All backends
//! (MemoryAdapter, SqliteAdapter, external linked-data stores) implement
//! the same traits and are fully swappable to callers.

use trove_core::{Resource, ResourceId};

use crate::error::StorageError;

/// A finite, pull-based sequence of query results.
///
/// Each query snapshots the matching records in a single fetch and maps
/// them to [`Resource`]s lazily as the consumer pulls. Stopping early is
/// cancellation; calling the query again yields a fresh sequence from
/// current store state.
pub type ResourceIter = Box<dyn Iterator<Item = Result<Resource, StorageError>> + Send>;

/// The write-side storage contract.
///
/// Methods take `&self`; backends use interior mutability so an adapter can
/// be shared process-wide through the registry.
pub trait Persister: Send + Sync {
    /// Durably stores a resource and returns it with store-assigned fields
    /// set.
    ///
    /// A resource with no id gets a fresh id, `created_at`, `updated_at`,
    /// and (when its schema enables locking) an initial lock token. A
    /// resource with an id is an update: when locking is enabled the
    /// incoming token must match the stored token, a new token is issued on
    /// success, and a mismatch fails with [`StorageError::StaleObject`]
    /// leaving the store unchanged. `updated_at` is refreshed on every
    /// successful save; `created_at` is set once and never rewritten.
    fn save(&self, resource: Resource) -> Result<Resource, StorageError>;

    /// Batched [`save`](Persister::save) with all-or-nothing semantics:
    /// if any member fails lock validation the whole batch is aborted with
    /// no partial writes observable to callers.
    fn save_all(&self, resources: Vec<Resource>) -> Result<Vec<Resource>, StorageError>;

    /// Removes the stored record. Subsequent lookups by the id report
    /// not-found; ids are not reused. A stale lock token is rejected with
    /// the same [`StorageError::StaleObject`] as an update.
    fn delete(&self, resource: &Resource) -> Result<(), StorageError>;
}

/// The read-side storage contract.
pub trait QueryService: Send + Sync {
    /// Finds a resource by id, failing with [`StorageError::NotFound`] if
    /// no record exists.
    fn find_by_id(&self, id: &ResourceId) -> Result<Resource, StorageError>;

    /// All records in the store, as a lazy sequence.
    fn find_all(&self) -> Result<ResourceIter, StorageError>;

    /// The resources referenced by `resource`'s `member_ids`, in exactly
    /// the order the ids appeared at the owner's last save.
    ///
    /// The recorded position is re-derived from the stored owner record on
    /// every call, never cached. Ids referencing deleted or non-existent
    /// records are silently skipped; duplicate ids yield positional
    /// duplicates; malformed entries are skipped without aborting the
    /// traversal. Implementations fetch all referenced records in a single
    /// bulk query joined against their recorded position, not one round
    /// trip per member. An owner that was never saved yields an empty
    /// sequence.
    fn find_members(&self, resource: &Resource) -> Result<ResourceIter, StorageError>;

    /// The inverse relation: every resource whose `member_ids` contains
    /// this resource's id. Order is unspecified; a parent appears once even
    /// if it lists the member several times.
    fn find_parents(&self, resource: &Resource) -> Result<ResourceIter, StorageError>;
}

/// A bound (persister, query service) pair targeting one logical store.
pub trait MetadataAdapter: Send + Sync {
    /// The write-side capability of this store.
    fn persister(&self) -> &dyn Persister;

    /// The read-side capability of this store.
    fn query_service(&self) -> &dyn QueryService;
}
