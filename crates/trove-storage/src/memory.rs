//! In-memory implementation of the adapter contract.
//!
//! [`MemoryAdapter`] is a first-class backend for tests, ephemeral
//! sessions, and anywhere persistence isn't needed. It stores [`Document`]s
//! in a HashMap behind an `RwLock`, sharing the mapper with the SQLite
//! backend so both exercise identical document semantics.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use trove_core::{LockToken, Resource, ResourceId, SchemaRegistry};

use crate::document::{Document, DocumentMapper};
use crate::error::StorageError;
use crate::traits::{MetadataAdapter, Persister, QueryService, ResourceIter};

/// In-memory backend implementing [`Persister`], [`QueryService`], and
/// [`MetadataAdapter`].
#[derive(Debug)]
pub struct MemoryAdapter {
    mapper: DocumentMapper,
    store: RwLock<HashMap<String, Document>>,
}

impl MemoryAdapter {
    /// Creates an empty store for the given schema registry.
    pub fn new(schemas: SchemaRegistry) -> Self {
        MemoryAdapter {
            mapper: DocumentMapper::new(schemas),
            store: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Document>> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Document>> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stamps store-assigned fields and writes the document into `map`.
    ///
    /// Shared by `save` and `save_all`; lock validation happens here so a
    /// conflict surfaces before the insert.
    fn save_into(
        &self,
        map: &mut HashMap<String, Document>,
        mut resource: Resource,
    ) -> Result<Resource, StorageError> {
        let now = Utc::now();
        match resource.id().cloned() {
            None => {
                resource.assign_id(ResourceId::generate());
                resource.set_created_at(now);
            }
            Some(id) => match map.get(id.as_str()) {
                Some(stored) => {
                    if resource.optimistic_locking_enabled() {
                        let incoming = resource.lock_token().map(|t| t.as_str().to_string());
                        if incoming != stored.lock_token {
                            return Err(StorageError::StaleObject(id));
                        }
                    }
                    // created_at is set once; the stored value wins.
                    resource.set_created_at(stored.created_at);
                }
                // A caller-supplied id with no stored row re-creates the row.
                None => resource.set_created_at(now),
            },
        }
        resource.set_updated_at(now);
        if resource.optimistic_locking_enabled() {
            resource.set_lock_token(Some(LockToken::generate()));
        }

        let document = self.mapper.to_document(&resource)?;
        map.insert(document.id.clone(), document);
        Ok(resource)
    }

    /// Wraps a snapshot of documents into a lazy result sequence.
    fn lazy(&self, documents: Vec<Document>) -> ResourceIter {
        let mapper = self.mapper.clone();
        Box::new(
            documents
                .into_iter()
                .map(move |document| mapper.from_document(&document)),
        )
    }
}

impl Persister for MemoryAdapter {
    fn save(&self, resource: Resource) -> Result<Resource, StorageError> {
        let mut map = self.write();
        self.save_into(&mut map, resource)
    }

    fn save_all(&self, resources: Vec<Resource>) -> Result<Vec<Resource>, StorageError> {
        // All-or-nothing: apply against a staged copy, swap in on success.
        let mut map = self.write();
        let mut staged = map.clone();
        let mut saved = Vec::with_capacity(resources.len());
        for resource in resources {
            saved.push(self.save_into(&mut staged, resource)?);
        }
        *map = staged;
        Ok(saved)
    }

    fn delete(&self, resource: &Resource) -> Result<(), StorageError> {
        let id = resource.id().ok_or_else(|| StorageError::NotPersisted {
            variant: resource.internal_resource().to_string(),
        })?;
        let mut map = self.write();
        let stored = map
            .get(id.as_str())
            .ok_or_else(|| StorageError::NotFound(id.clone()))?;
        if resource.optimistic_locking_enabled() {
            let incoming = resource.lock_token().map(|t| t.as_str().to_string());
            if incoming != stored.lock_token {
                return Err(StorageError::StaleObject(id.clone()));
            }
        }
        map.remove(id.as_str());
        Ok(())
    }
}

impl QueryService for MemoryAdapter {
    fn find_by_id(&self, id: &ResourceId) -> Result<Resource, StorageError> {
        let map = self.read();
        let document = map
            .get(id.as_str())
            .ok_or_else(|| StorageError::NotFound(id.clone()))?;
        self.mapper.from_document(document)
    }

    fn find_all(&self) -> Result<ResourceIter, StorageError> {
        let documents: Vec<Document> = self.read().values().cloned().collect();
        Ok(self.lazy(documents))
    }

    fn find_members(&self, resource: &Resource) -> Result<ResourceIter, StorageError> {
        let Some(owner_id) = resource.id() else {
            return Ok(self.lazy(Vec::new()));
        };
        let map = self.read();
        let Some(owner) = map.get(owner_id.as_str()) else {
            return Ok(self.lazy(Vec::new()));
        };
        // Walk the recorded slots in ascending position; missing targets and
        // malformed slots drop out, duplicates stay duplicated.
        let members: Vec<Document> = owner
            .member_id_slots()
            .into_iter()
            .flatten()
            .filter_map(|member_id| map.get(member_id).cloned())
            .collect();
        Ok(self.lazy(members))
    }

    fn find_parents(&self, resource: &Resource) -> Result<ResourceIter, StorageError> {
        let Some(id) = resource.id() else {
            return Ok(self.lazy(Vec::new()));
        };
        let map = self.read();
        let parents: Vec<Document> = map
            .values()
            .filter(|candidate| {
                candidate
                    .member_id_slots()
                    .iter()
                    .any(|slot| *slot == Some(id.as_str()))
            })
            .cloned()
            .collect();
        Ok(self.lazy(parents))
    }
}

impl MetadataAdapter for MemoryAdapter {
    fn persister(&self) -> &dyn Persister {
        self
    }

    fn query_service(&self) -> &dyn QueryService {
        self
    }
}
