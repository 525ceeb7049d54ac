//! Per-variant attribute schemas and the schema registry.
//!
//! A [`ResourceSchema`] is the typed attribute registry for one resource
//! variant: an ordered map from attribute name to declared kind and
//! cardinality, resolved once at schema-definition time. Every schema
//! carries the reserved fields (`id`, `internal_resource`, `created_at`,
//! `updated_at`, and `optimistic_lock_token` when locking is enabled);
//! declaring an attribute under a reserved name keeps the reserved type and
//! surfaces a non-fatal [`SchemaWarning`] instead of failing.
//!
//! The [`SchemaRegistry`] maps variant names back to their schemas so a
//! mapper can reconstruct the declared variant from a stored type tag.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::CoreError;
use crate::value::{AttributeKind, AttributeType, Cardinality};

/// Reserved attribute name for the optimistic lock token.
pub const OPTIMISTIC_LOCK: &str = "optimistic_lock_token";

/// Reserved field names present on every schema, in declaration order.
const RESERVED: [(&str, AttributeType); 4] = [
    (
        "id",
        AttributeType {
            kind: AttributeKind::Id,
            cardinality: Cardinality::Single,
        },
    ),
    (
        "internal_resource",
        AttributeType {
            kind: AttributeKind::String,
            cardinality: Cardinality::Single,
        },
    ),
    (
        "created_at",
        AttributeType {
            kind: AttributeKind::DateTime,
            cardinality: Cardinality::Single,
        },
    ),
    (
        "updated_at",
        AttributeType {
            kind: AttributeKind::DateTime,
            cardinality: Cardinality::Single,
        },
    ),
];

/// Returns true if `name` is reserved and cannot be redeclared.
pub fn is_reserved(name: &str) -> bool {
    name == OPTIMISTIC_LOCK || RESERVED.iter().any(|(n, _)| *n == name)
}

/// Non-fatal diagnostic raised while building a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaWarning {
    /// A declaration collided with a reserved attribute name; the reserved
    /// type was kept.
    ReservedAttribute { name: String },
}

impl fmt::Display for SchemaWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaWarning::ReservedAttribute { name } => {
                write!(f, "'{}' is a reserved attribute; keeping the reserved type", name)
            }
        }
    }
}

/// The typed attribute schema for one resource variant.
///
/// Immutable after [`SchemaBuilder::finish`]; instances hold only values
/// and never redefine types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSchema {
    variant_name: String,
    attributes: IndexMap<String, AttributeType>,
    optimistic_locking: bool,
}

impl ResourceSchema {
    /// Starts a new schema for `variant_name`, seeded with the reserved
    /// fields.
    pub fn build(variant_name: impl Into<String>) -> SchemaBuilder {
        let mut attributes = IndexMap::new();
        for (name, ty) in RESERVED {
            attributes.insert(name.to_string(), ty);
        }
        SchemaBuilder {
            schema: ResourceSchema {
                variant_name: variant_name.into(),
                attributes,
                optimistic_locking: false,
            },
            warnings: Vec::new(),
        }
    }

    /// Starts a schema for `variant_name` that inherits every field of
    /// `parent`. Parent fields come first; child declarations append.
    pub fn extend(parent: &ResourceSchema, variant_name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            schema: ResourceSchema {
                variant_name: variant_name.into(),
                attributes: parent.attributes.clone(),
                optimistic_locking: parent.optimistic_locking,
            },
            warnings: Vec::new(),
        }
    }

    /// The variant's type tag, stored as `internal_resource`.
    pub fn variant_name(&self) -> &str {
        &self.variant_name
    }

    /// All attribute names in declaration order: reserved fields first, then
    /// declared fields (parent before child for extended schemas). No
    /// duplicates.
    pub fn fields(&self) -> Vec<&str> {
        self.attributes.keys().map(String::as_str).collect()
    }

    /// True iff `name` is a reserved or declared attribute of this schema.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// The resolved type of an attribute, reserved ones included.
    pub fn attribute_type(&self, name: &str) -> Option<AttributeType> {
        self.attributes.get(name).copied()
    }

    /// Declared (non-reserved) attributes in declaration order.
    pub fn declared(&self) -> impl Iterator<Item = (&str, AttributeType)> {
        self.attributes
            .iter()
            .filter(|(name, _)| !is_reserved(name))
            .map(|(name, ty)| (name.as_str(), *ty))
    }

    /// Whether this schema declared optimistic locking.
    pub fn optimistic_locking_enabled(&self) -> bool {
        self.optimistic_locking
    }
}

/// Builder for [`ResourceSchema`], collecting warnings as declarations are
/// made.
#[derive(Debug)]
pub struct SchemaBuilder {
    schema: ResourceSchema,
    warnings: Vec<SchemaWarning>,
}

impl SchemaBuilder {
    /// Declares an attribute.
    ///
    /// Declaring a reserved name does not change the reserved type: the
    /// declaration is coerced back, a [`SchemaWarning::ReservedAttribute`]
    /// is recorded, and a `tracing` warning is emitted.
    pub fn attribute(
        mut self,
        name: impl Into<String>,
        kind: AttributeKind,
        cardinality: Cardinality,
    ) -> Self {
        let name = name.into();
        if is_reserved(&name) {
            tracing::warn!(
                variant = %self.schema.variant_name,
                attribute = %name,
                "'{}' is a reserved attribute; keeping the reserved type",
                name
            );
            self.warnings
                .push(SchemaWarning::ReservedAttribute { name });
            return self;
        }
        self.schema
            .attributes
            .insert(name, AttributeType::new(kind, cardinality));
        self
    }

    /// Enables optimistic locking for this variant, adding the reserved
    /// lock-token field.
    pub fn enable_optimistic_locking(mut self) -> Self {
        if !self.schema.optimistic_locking {
            self.schema.optimistic_locking = true;
            self.schema.attributes.insert(
                OPTIMISTIC_LOCK.to_string(),
                AttributeType::single(AttributeKind::String),
            );
        }
        self
    }

    /// Finalizes the schema, returning it with any warnings raised during
    /// declaration.
    pub fn finish(self) -> (Arc<ResourceSchema>, Vec<SchemaWarning>) {
        (Arc::new(self.schema), self.warnings)
    }
}

/// Registry mapping variant names to schemas.
///
/// Used by mappers to reconstruct the declared variant of a stored record
/// from its `internal_resource` type tag.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: IndexMap<String, Arc<ResourceSchema>>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schema under its variant name.
    ///
    /// Returns [`CoreError::DuplicateVariant`] if the name is taken.
    pub fn register(&mut self, schema: Arc<ResourceSchema>) -> Result<(), CoreError> {
        let name = schema.variant_name().to_string();
        if self.schemas.contains_key(&name) {
            return Err(CoreError::DuplicateVariant { name });
        }
        self.schemas.insert(name, schema);
        Ok(())
    }

    /// Looks up a schema by variant name.
    pub fn get(&self, variant_name: &str) -> Option<Arc<ResourceSchema>> {
        self.schemas.get(variant_name).cloned()
    }

    /// Registered variant names, in registration order.
    pub fn variant_names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_returns_reserved_then_declared() {
        let (schema, warnings) = ResourceSchema::build("Book")
            .attribute("title", AttributeKind::String, Cardinality::Many)
            .finish();
        assert!(warnings.is_empty());
        assert_eq!(
            schema.fields(),
            vec!["id", "internal_resource", "created_at", "updated_at", "title"]
        );
    }

    #[test]
    fn fields_count_is_declared_plus_four_reserved() {
        let (schema, _) = ResourceSchema::build("Thing")
            .attribute("a", AttributeKind::String, Cardinality::Many)
            .attribute("b", AttributeKind::Integer, Cardinality::Single)
            .attribute("c", AttributeKind::Boolean, Cardinality::Single)
            .finish();
        assert_eq!(schema.fields().len(), 3 + 4);
    }

    #[test]
    fn has_attribute_covers_reserved_and_declared() {
        let (schema, _) = ResourceSchema::build("Book")
            .attribute("title", AttributeKind::String, Cardinality::Many)
            .finish();
        assert!(schema.has_attribute("title"));
        assert!(schema.has_attribute("id"));
        assert!(!schema.has_attribute("not"));
    }

    #[test]
    fn reserved_redeclaration_warns_and_keeps_reserved_type() {
        let (schema, warnings) = ResourceSchema::build("Book")
            .attribute("id", AttributeKind::String, Cardinality::Many)
            .finish();
        assert_eq!(
            warnings,
            vec![SchemaWarning::ReservedAttribute {
                name: "id".to_string()
            }]
        );
        // The reserved identifier type survives, not the caller's type.
        assert_eq!(
            schema.attribute_type("id"),
            Some(AttributeType::single(AttributeKind::Id))
        );
    }

    #[test]
    fn extended_schema_keeps_parent_fields_first() {
        let (parent, _) = ResourceSchema::build("Resource")
            .attribute("title", AttributeKind::String, Cardinality::Many)
            .finish();
        let (child, _) = ResourceSchema::extend(&parent, "MyResource")
            .attribute("subtitle", AttributeKind::String, Cardinality::Single)
            .finish();
        assert_eq!(
            child.fields(),
            vec![
                "id",
                "internal_resource",
                "created_at",
                "updated_at",
                "title",
                "subtitle"
            ]
        );
        assert_eq!(child.variant_name(), "MyResource");
    }

    #[test]
    fn extended_schema_inherits_without_duplicates() {
        let (parent, _) = ResourceSchema::build("Resource")
            .attribute("title", AttributeKind::String, Cardinality::Many)
            .finish();
        let (child, _) = ResourceSchema::extend(&parent, "MyResource").finish();
        assert_eq!(child.fields(), parent.fields());
    }

    #[test]
    fn optimistic_locking_adds_the_lock_field() {
        let (schema, _) = ResourceSchema::build("Locked")
            .enable_optimistic_locking()
            .attribute("title", AttributeKind::String, Cardinality::Many)
            .finish();
        assert!(schema.optimistic_locking_enabled());
        assert!(schema.has_attribute(OPTIMISTIC_LOCK));
    }

    #[test]
    fn locking_disabled_by_default() {
        let (schema, _) = ResourceSchema::build("Unlocked")
            .attribute("title", AttributeKind::String, Cardinality::Many)
            .finish();
        assert!(!schema.optimistic_locking_enabled());
        assert!(!schema.has_attribute(OPTIMISTIC_LOCK));
    }

    #[test]
    fn lock_token_cannot_be_declared_directly() {
        let (schema, warnings) = ResourceSchema::build("Sneaky")
            .attribute(OPTIMISTIC_LOCK, AttributeKind::Integer, Cardinality::Many)
            .finish();
        assert_eq!(warnings.len(), 1);
        // Not enabled, and the field was not added by the declaration.
        assert!(!schema.optimistic_locking_enabled());
        assert!(!schema.has_attribute(OPTIMISTIC_LOCK));
    }

    #[test]
    fn declared_skips_reserved_fields() {
        let (schema, _) = ResourceSchema::build("Book")
            .attribute("title", AttributeKind::String, Cardinality::Many)
            .attribute("pages", AttributeKind::Integer, Cardinality::Single)
            .finish();
        let declared: Vec<&str> = schema.declared().map(|(n, _)| n).collect();
        assert_eq!(declared, vec!["title", "pages"]);
    }

    #[test]
    fn registry_register_and_get() {
        let (schema, _) = ResourceSchema::build("Book").finish();
        let mut registry = SchemaRegistry::new();
        registry.register(schema.clone()).unwrap();
        assert_eq!(registry.get("Book").unwrap().variant_name(), "Book");
        assert!(registry.get("Missing").is_none());
    }

    #[test]
    fn registry_rejects_duplicate_variants() {
        let (schema, _) = ResourceSchema::build("Book").finish();
        let mut registry = SchemaRegistry::new();
        registry.register(schema.clone()).unwrap();
        let result = registry.register(schema);
        assert!(matches!(
            result,
            Err(CoreError::DuplicateVariant { name }) if name == "Book"
        ));
    }
}
