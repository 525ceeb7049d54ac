//! Core resource data model for trove.
//!
//! Defines the storage-independent pieces of the persistence layer: opaque
//! identifiers, typed attribute values, per-variant attribute schemas, and
//! the [`Resource`] instance type. Nothing in this crate knows how (or
//! whether) a resource is persisted; backends live in `trove-storage`.

pub mod error;
pub mod id;
pub mod resource;
pub mod schema;
pub mod value;

// Re-export commonly used types
pub use error::CoreError;
pub use id::{LockToken, ResourceId};
pub use resource::{Resource, MEMBER_IDS};
pub use schema::{
    ResourceSchema, SchemaBuilder, SchemaRegistry, SchemaWarning, OPTIMISTIC_LOCK,
};
pub use value::{AttributeKind, AttributeType, Cardinality, Value};
