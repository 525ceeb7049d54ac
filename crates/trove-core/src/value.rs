//! Attribute value kinds, cardinality, and runtime values.
//!
//! A schema declares each attribute's [`AttributeKind`] and [`Cardinality`]
//! once, at definition time; instances only ever hold [`Value`]s. Every
//! attribute is physically a sequence (`Vec<Value>`) even when declared
//! `Single`, which keeps the model uniform across backends that store
//! set-shaped values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::ResourceId;

/// Declared value kind of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeKind {
    /// A reference to another resource by id.
    Id,
    /// UTF-8 text.
    String,
    /// 64-bit signed integer.
    Integer,
    /// Boolean flag.
    Boolean,
    /// UTC timestamp.
    DateTime,
}

/// Declared cardinality of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    /// At most one value.
    Single,
    /// An ordered sequence of values.
    Many,
}

/// The resolved type of a declared attribute: kind plus cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeType {
    pub kind: AttributeKind,
    pub cardinality: Cardinality,
}

impl AttributeType {
    pub fn new(kind: AttributeKind, cardinality: Cardinality) -> Self {
        AttributeType { kind, cardinality }
    }

    /// Shorthand for a single-valued attribute of the given kind.
    pub fn single(kind: AttributeKind) -> Self {
        AttributeType::new(kind, Cardinality::Single)
    }

    /// Shorthand for a sequence-valued attribute of the given kind.
    pub fn many(kind: AttributeKind) -> Self {
        AttributeType::new(kind, Cardinality::Many)
    }
}

/// A runtime attribute value.
///
/// Mirrors [`AttributeKind`] variant-for-variant. Serialization to a store's
/// native form is schema-directed (the mapper knows each attribute's declared
/// kind), so `Value` itself carries no serde tagging.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Id(ResourceId),
    String(String),
    Integer(i64),
    Boolean(bool),
    DateTime(DateTime<Utc>),
}

impl Value {
    /// The kind this value inhabits.
    pub fn kind(&self) -> AttributeKind {
        match self {
            Value::Id(_) => AttributeKind::Id,
            Value::String(_) => AttributeKind::String,
            Value::Integer(_) => AttributeKind::Integer,
            Value::Boolean(_) => AttributeKind::Boolean,
            Value::DateTime(_) => AttributeKind::DateTime,
        }
    }

    /// The referenced resource id, if this is an `Id` value.
    pub fn as_id(&self) -> Option<&ResourceId> {
        match self {
            Value::Id(id) => Some(id),
            _ => None,
        }
    }

    /// The string content, if this is a `String` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<ResourceId> for Value {
    fn from(id: ResourceId) -> Self {
        Value::Id(id)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}
