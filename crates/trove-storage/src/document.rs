//! The native JSON-document record and the bidirectional mapper.
//!
//! [`Document`] is the store-facing representation of a resource: scalar
//! columns for the store-assigned fields plus a `metadata` JSON object
//! holding every declared attribute as an array (ordered; the `member_ids`
//! array slot *is* the positional index the membership queries join
//! against). [`DocumentMapper`] translates both ways; deserialization is
//! schema-directed, converting each stored value per the attribute's
//! declared kind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use trove_core::{
    AttributeKind, LockToken, Resource, ResourceId, SchemaRegistry, Value,
};

use crate::error::StorageError;

/// A resource in its native store representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Primary key, assigned at first save.
    pub id: String,
    /// Variant type tag for round-tripping through a schemaless store.
    pub internal_resource: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Present only for lock-enabled variants.
    pub lock_token: Option<String>,
    /// JSON object: attribute name -> array of values, in declaration order.
    pub metadata: serde_json::Value,
}

impl Document {
    /// The member id strings recorded in `metadata`, each with its array
    /// position. Non-string slots are kept as `None` so positions stay
    /// aligned; callers skip them.
    pub fn member_id_slots(&self) -> Vec<Option<&str>> {
        match self.metadata.get(trove_core::MEMBER_IDS) {
            Some(serde_json::Value::Array(entries)) => {
                entries.iter().map(serde_json::Value::as_str).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// Deterministic two-way mapping between [`Resource`] and [`Document`].
///
/// Round-trip law: `from_document(to_document(r))` is attribute-for-
/// attribute and order-for-order equal to `r`, except for fields the store
/// itself assigns.
#[derive(Debug, Clone)]
pub struct DocumentMapper {
    schemas: SchemaRegistry,
}

impl DocumentMapper {
    pub fn new(schemas: SchemaRegistry) -> Self {
        DocumentMapper { schemas }
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    /// Serializes a resource into its native record.
    ///
    /// The resource must already carry its store-assigned fields; persisters
    /// stamp those before mapping.
    pub fn to_document(&self, resource: &Resource) -> Result<Document, StorageError> {
        let id = resource
            .id()
            .ok_or_else(|| StorageError::NotPersisted {
                variant: resource.internal_resource().to_string(),
            })?
            .as_str()
            .to_string();
        let (created_at, updated_at) = match (resource.created_at(), resource.updated_at()) {
            (Some(created), Some(updated)) => (created, updated),
            _ => {
                return Err(StorageError::Integrity {
                    reason: format!("resource {} is missing store-assigned timestamps", resource),
                })
            }
        };

        let mut metadata = serde_json::Map::new();
        for (name, values) in resource.attributes() {
            let entries: Vec<serde_json::Value> = values.iter().map(json_from_value).collect();
            metadata.insert(name.to_string(), serde_json::Value::Array(entries));
        }

        Ok(Document {
            id,
            internal_resource: resource.internal_resource().to_string(),
            created_at,
            updated_at,
            lock_token: resource.lock_token().map(|t| t.as_str().to_string()),
            metadata: serde_json::Value::Object(metadata),
        })
    }

    /// Reconstructs a resource from its native record.
    ///
    /// The declared variant is resolved through the schema registry, so the
    /// result is an instance of that variant, not a generic shell. Metadata
    /// keys the schema does not declare are dropped; values that do not fit
    /// the declared kind are skipped. Both degrade locally without failing
    /// the read.
    pub fn from_document(&self, document: &Document) -> Result<Resource, StorageError> {
        let schema = self
            .schemas
            .get(&document.internal_resource)
            .ok_or_else(|| StorageError::UnknownVariant(document.internal_resource.clone()))?;

        let mut resource = Resource::new(schema.clone());
        resource.assign_id(ResourceId::new(document.id.clone()));
        resource.set_created_at(document.created_at);
        resource.set_updated_at(document.updated_at);
        if schema.optimistic_locking_enabled() {
            resource.set_lock_token(document.lock_token.clone().map(LockToken::new));
        }

        let metadata = match &document.metadata {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(StorageError::Integrity {
                    reason: format!(
                        "document {} has non-object metadata: {}",
                        document.id, other
                    ),
                })
            }
        };

        for (name, stored) in metadata {
            let Some(ty) = schema.attribute_type(name) else {
                tracing::debug!(
                    variant = %document.internal_resource,
                    attribute = %name,
                    "dropping attribute not declared by the schema"
                );
                continue;
            };
            let entries: Vec<Value> = match stored {
                serde_json::Value::Array(entries) => entries
                    .iter()
                    .filter_map(|entry| value_from_json(ty.kind, entry))
                    .collect(),
                // Tolerate a scalar written by a foreign producer.
                scalar => value_from_json(ty.kind, scalar).into_iter().collect(),
            };
            resource
                .set(name, entries)
                .map_err(|e| StorageError::Integrity {
                    reason: format!("document {}: {}", document.id, e),
                })?;
        }

        Ok(resource)
    }
}

/// JSON encoding of a single attribute value.
fn json_from_value(value: &Value) -> serde_json::Value {
    match value {
        Value::Id(id) => json!(id.as_str()),
        Value::String(s) => json!(s),
        Value::Integer(n) => json!(n),
        Value::Boolean(b) => json!(b),
        Value::DateTime(at) => json!(at.to_rfc3339()),
    }
}

/// Schema-directed decoding of a single attribute value. Returns `None`
/// when the stored value does not inhabit the declared kind.
fn value_from_json(kind: AttributeKind, stored: &serde_json::Value) -> Option<Value> {
    match (kind, stored) {
        (AttributeKind::Id, serde_json::Value::String(s)) => {
            Some(Value::Id(ResourceId::new(s.clone())))
        }
        (AttributeKind::String, serde_json::Value::String(s)) => {
            Some(Value::String(s.clone()))
        }
        (AttributeKind::Integer, serde_json::Value::Number(n)) => {
            n.as_i64().map(Value::Integer)
        }
        (AttributeKind::Boolean, serde_json::Value::Bool(b)) => Some(Value::Boolean(*b)),
        (AttributeKind::DateTime, serde_json::Value::String(s)) => {
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|at| Value::DateTime(at.with_timezone(&Utc)))
        }
        _ => {
            tracing::debug!(?kind, %stored, "skipping value that does not fit its declared kind");
            None
        }
    }
}
