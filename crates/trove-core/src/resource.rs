//! The [`Resource`] instance type.
//!
//! A resource is a schema-bound bag of attribute values plus the
//! store-managed fields: id, timestamps, and (when the schema enables
//! locking) the optimistic lock token. Instances are created in memory with
//! no id; a persister assigns id, timestamps, and token at first save.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::error::CoreError;
use crate::id::{LockToken, ResourceId};
use crate::schema::{is_reserved, ResourceSchema};
use crate::value::{Cardinality, Value};

/// The distinguished ordered-reference attribute.
///
/// When declared by a schema, `member_ids` holds an ordered sequence of
/// [`ResourceId`]s whose order is significant and survives a save/load
/// round trip bit-for-bit.
pub const MEMBER_IDS: &str = "member_ids";

/// A resource instance.
///
/// Attribute values are always sequences, even for attributes declared
/// single-valued; the schema's cardinality is enforced at [`Resource::set`].
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    schema: Arc<ResourceSchema>,
    id: Option<ResourceId>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    lock_token: Option<LockToken>,
    attributes: IndexMap<String, Vec<Value>>,
}

impl Resource {
    /// Creates a new unpersisted instance of the given variant.
    pub fn new(schema: Arc<ResourceSchema>) -> Self {
        Resource {
            schema,
            id: None,
            created_at: None,
            updated_at: None,
            lock_token: None,
            attributes: IndexMap::new(),
        }
    }

    /// The schema this instance conforms to.
    pub fn schema(&self) -> &Arc<ResourceSchema> {
        &self.schema
    }

    /// The variant type tag, round-tripped through schemaless stores.
    pub fn internal_resource(&self) -> &str {
        self.schema.variant_name()
    }

    /// The persisted id, if any.
    pub fn id(&self) -> Option<&ResourceId> {
        self.id.as_ref()
    }

    /// True once the resource has been saved (id assigned).
    pub fn persisted(&self) -> bool {
        self.id.is_some()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// The current optimistic lock token. Read-only to callers; produced by
    /// the persister and supplied unchanged on the next update.
    pub fn lock_token(&self) -> Option<&LockToken> {
        self.lock_token.as_ref()
    }

    /// Whether this instance's schema declared optimistic locking.
    pub fn optimistic_locking_enabled(&self) -> bool {
        self.schema.optimistic_locking_enabled()
    }

    // -------------------------------------------------------------------
    // Store-managed field assignment (persister API)
    // -------------------------------------------------------------------

    /// Assigns the id. Ids are assigned exactly once; if an id is already
    /// present this is a no-op.
    pub fn assign_id(&mut self, id: ResourceId) {
        if self.id.is_none() {
            self.id = Some(id);
        }
    }

    /// Sets `created_at`. Persisters call this once, at first save.
    pub fn set_created_at(&mut self, at: DateTime<Utc>) {
        self.created_at = Some(at);
    }

    /// Sets `updated_at`. Persisters refresh this on every successful save.
    pub fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = Some(at);
    }

    /// Replaces the lock token. Persisters rotate the token on every
    /// successful save of a lock-enabled resource.
    pub fn set_lock_token(&mut self, token: Option<LockToken>) {
        self.lock_token = token;
    }

    // -------------------------------------------------------------------
    // Attribute access
    // -------------------------------------------------------------------

    /// Sets an attribute's values.
    ///
    /// Fails if the attribute is not declared by the schema, names a
    /// reserved field (those are store-managed), or violates the declared
    /// cardinality.
    pub fn set(&mut self, name: &str, values: Vec<Value>) -> Result<(), CoreError> {
        if is_reserved(name) || !self.schema.has_attribute(name) {
            return Err(CoreError::UnknownAttribute {
                variant: self.schema.variant_name().to_string(),
                name: name.to_string(),
            });
        }
        // attribute_type is Some here: has_attribute just confirmed it.
        if let Some(ty) = self.schema.attribute_type(name) {
            if ty.cardinality == Cardinality::Single && values.len() > 1 {
                return Err(CoreError::WrongCardinality {
                    name: name.to_string(),
                    count: values.len(),
                });
            }
        }
        self.attributes.insert(name.to_string(), values);
        Ok(())
    }

    /// The values of an attribute, or an empty slice when unset.
    pub fn get(&self, name: &str) -> &[Value] {
        self.attributes.get(name).map_or(&[], Vec::as_slice)
    }

    /// The first value of an attribute, if any.
    pub fn first(&self, name: &str) -> Option<&Value> {
        self.get(name).first()
    }

    /// Declared attributes and their values, in insertion order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.attributes
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    // -------------------------------------------------------------------
    // Ordered membership
    // -------------------------------------------------------------------

    /// The ordered member references, in declaration order.
    ///
    /// Entries that are not id values are skipped rather than failing the
    /// whole read; a malformed link must not break the rest of the list.
    pub fn member_ids(&self) -> Vec<ResourceId> {
        self.get(MEMBER_IDS)
            .iter()
            .filter_map(|value| match value.as_id() {
                Some(id) => Some(id.clone()),
                None => {
                    tracing::debug!(
                        variant = %self.internal_resource(),
                        "skipping non-id member_ids entry: {:?}",
                        value
                    );
                    None
                }
            })
            .collect()
    }

    /// Replaces the ordered member references.
    pub fn set_member_ids(&mut self, ids: Vec<ResourceId>) -> Result<(), CoreError> {
        self.set(MEMBER_IDS, ids.into_iter().map(Value::Id).collect())
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{}: {}", self.internal_resource(), id),
            None => write!(f, "{}: (unsaved)", self.internal_resource()),
        }
    }
}
