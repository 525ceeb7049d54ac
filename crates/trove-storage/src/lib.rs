//! Storage backends for trove resources.
//!
//! Provides the [`Persister`] / [`QueryService`] / [`MetadataAdapter`]
//! traits defining the storage contract that all backends implement, plus
//! the [`MemoryAdapter`] and [`SqliteAdapter`] as first-class backends and
//! the [`AdapterRegistry`] for resolving backends by name.
//!
//! # Architecture
//!
//! Backends never see [`trove_core::Resource`] directly: the
//! [`DocumentMapper`] translates every resource to and from a [`Document`],
//! the backend-neutral stored form, and schema information drives the
//! reverse direction so values come back with their declared types. Both
//! backends implement identical semantics, including optimistic locking and
//! ordered-membership queries, so tests written against one hold for the
//! other.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`traits`]: the Persister / QueryService / MetadataAdapter contract
//! - [`document`]: the stored document form and the bidirectional mapper
//! - [`memory`]: MemoryAdapter implementation
//! - [`schema`]: SQL schema and migration setup
//! - [`sqlite`]: SqliteAdapter implementation
//! - [`registry`]: named adapter registry

pub mod document;
pub mod error;
pub mod memory;
pub mod registry;
pub mod schema;
pub mod sqlite;
pub mod traits;

// Re-export key types for ergonomic use.
pub use document::{Document, DocumentMapper};
pub use error::StorageError;
pub use memory::MemoryAdapter;
pub use registry::AdapterRegistry;
pub use sqlite::SqliteAdapter;
pub use traits::{MetadataAdapter, Persister, QueryService, ResourceIter};
