//! Core error types for trove-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering
//! schema-level failure modes. Reserved-attribute redeclaration is *not* an
//! error; it is a [`SchemaWarning`](crate::schema::SchemaWarning) because
//! the schema stays usable after coercion.

use thiserror::Error;

/// Core errors produced by the trove-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Setting an attribute that the resource's schema does not declare.
    #[error("unknown attribute '{name}' on resource variant '{variant}'")]
    UnknownAttribute { variant: String, name: String },

    /// Registering a variant name that already exists in the schema registry.
    #[error("duplicate resource variant: '{name}'")]
    DuplicateVariant { name: String },

    /// Setting more than one value on an attribute declared `Single`.
    #[error("attribute '{name}' is single-valued but {count} values were given")]
    WrongCardinality { name: String, count: usize },
}
