//! SQLite implementation of the adapter contract.
//!
//! [`SqliteAdapter`] persists resources as rows of a single JSON-document
//! table: scalar columns for the store-assigned fields, attributes in a
//! `metadata` TEXT column. Ordered membership is reconstructed in one SQL
//! statement by joining `json_each` over the owner's `member_ids` array —
//! `json_each`'s `key` is the array position — against the resources
//! table, ordered by that position. Every write runs in a transaction.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use trove_core::{LockToken, Resource, ResourceId, SchemaRegistry};

use crate::document::{Document, DocumentMapper};
use crate::error::StorageError;
use crate::traits::{MetadataAdapter, Persister, QueryService, ResourceIter};

/// The resource columns every read selects, in [`row_to_document`] order.
const RESOURCE_COLUMNS: &str =
    "id, internal_resource, created_at, updated_at, lock_token, metadata";

/// SQLite-backed implementation of [`Persister`], [`QueryService`], and
/// [`MetadataAdapter`].
///
/// The connection sits behind a `Mutex` so one adapter can be shared
/// process-wide through the registry.
pub struct SqliteAdapter {
    conn: Mutex<Connection>,
    mapper: DocumentMapper,
}

/// One fetched row, still in its raw TEXT form.
type RawRow = (String, String, String, String, Option<String>, String);

impl SqliteAdapter {
    /// Opens (or creates) a SQLite database at `path`.
    pub fn new(path: &str, schemas: SchemaRegistry) -> Result<Self, StorageError> {
        let conn = crate::schema::open_database(path)?;
        Ok(SqliteAdapter {
            conn: Mutex::new(conn),
            mapper: DocumentMapper::new(schemas),
        })
    }

    /// Opens an in-memory SQLite database (for testing).
    pub fn in_memory(schemas: SchemaRegistry) -> Result<Self, StorageError> {
        let conn = crate::schema::open_in_memory()?;
        Ok(SqliteAdapter {
            conn: Mutex::new(conn),
            mapper: DocumentMapper::new(schemas),
        })
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
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

    /// Stamps store-assigned fields and writes one row.
    ///
    /// Shared by `save` and `save_all`; `conn` is the open transaction so a
    /// batch commits or rolls back as a unit. The update path is a
    /// compare-and-set on the lock token: `UPDATE ... WHERE id = ? AND
    /// lock_token = ?`, with zero affected rows on an existing record
    /// meaning the caller's token is stale.
    fn save_in(
        conn: &Connection,
        mapper: &DocumentMapper,
        mut resource: Resource,
    ) -> Result<Resource, StorageError> {
        let now = Utc::now();
        let locking = resource.optimistic_locking_enabled();

        let existing: Option<String> = match resource.id() {
            Some(id) => conn
                .query_row(
                    "SELECT created_at FROM resources WHERE id = ?1",
                    params![id.as_str()],
                    |row| row.get(0),
                )
                .optional()?,
            None => None,
        };

        let incoming_token = resource.lock_token().map(|t| t.as_str().to_string());
        match (resource.id().cloned(), existing) {
            (Some(id), Some(stored_created_at)) => {
                if locking && incoming_token.is_none() {
                    return Err(StorageError::StaleObject(id));
                }
                resource.set_created_at(parse_timestamp(&stored_created_at, id.as_str())?);
                resource.set_updated_at(now);
                if locking {
                    resource.set_lock_token(Some(LockToken::generate()));
                }
                let document = mapper.to_document(&resource)?;
                let metadata = serde_json::to_string(&document.metadata)?;
                let rows = if locking {
                    conn.execute(
                        "UPDATE resources SET internal_resource = ?2, updated_at = ?3, lock_token = ?4, metadata = ?5 WHERE id = ?1 AND lock_token = ?6",
                        params![
                            document.id,
                            document.internal_resource,
                            document.updated_at.to_rfc3339(),
                            document.lock_token,
                            metadata,
                            incoming_token,
                        ],
                    )?
                } else {
                    conn.execute(
                        "UPDATE resources SET internal_resource = ?2, updated_at = ?3, lock_token = ?4, metadata = ?5 WHERE id = ?1",
                        params![
                            document.id,
                            document.internal_resource,
                            document.updated_at.to_rfc3339(),
                            document.lock_token,
                            metadata,
                        ],
                    )?
                };
                if rows == 0 {
                    return Err(StorageError::StaleObject(id));
                }
            }
            (id, None) => {
                // First save, or a caller-supplied id whose row is gone:
                // create the row, setting created_at exactly once.
                if id.is_none() {
                    resource.assign_id(ResourceId::generate());
                }
                resource.set_created_at(now);
                resource.set_updated_at(now);
                if locking {
                    resource.set_lock_token(Some(LockToken::generate()));
                }
                let document = mapper.to_document(&resource)?;
                let metadata = serde_json::to_string(&document.metadata)?;
                conn.execute(
                    "INSERT INTO resources (id, internal_resource, created_at, updated_at, lock_token, metadata) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        document.id,
                        document.internal_resource,
                        document.created_at.to_rfc3339(),
                        document.updated_at.to_rfc3339(),
                        document.lock_token,
                        metadata,
                    ],
                )?;
            }
            // `existing` is only queried when the resource has an id.
            (None, Some(_)) => unreachable!(),
        }
        Ok(resource)
    }
}

/// Rehydrates a fetched row into a [`Document`].
fn row_to_document(raw: RawRow) -> Result<Document, StorageError> {
    let (id, internal_resource, created_at, updated_at, lock_token, metadata) = raw;
    let metadata = serde_json::from_str(&metadata)?;
    Ok(Document {
        created_at: parse_timestamp(&created_at, &id)?,
        updated_at: parse_timestamp(&updated_at, &id)?,
        id,
        internal_resource,
        lock_token,
        metadata,
    })
}

fn parse_timestamp(stored: &str, id: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(stored)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| StorageError::Integrity {
            reason: format!("resource {}: bad stored timestamp '{}': {}", id, stored, e),
        })
}

/// The rusqlite row-mapping closure shared by every resource select.
fn raw_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

impl Persister for SqliteAdapter {
    fn save(&self, resource: Resource) -> Result<Resource, StorageError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let saved = Self::save_in(&tx, &self.mapper, resource)?;
        tx.commit()?;
        Ok(saved)
    }

    fn save_all(&self, resources: Vec<Resource>) -> Result<Vec<Resource>, StorageError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut saved = Vec::with_capacity(resources.len());
        for resource in resources {
            // An error drops the transaction, rolling back the whole batch.
            saved.push(Self::save_in(&tx, &self.mapper, resource)?);
        }
        tx.commit()?;
        Ok(saved)
    }

    fn delete(&self, resource: &Resource) -> Result<(), StorageError> {
        let id = resource.id().ok_or_else(|| StorageError::NotPersisted {
            variant: resource.internal_resource().to_string(),
        })?;
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM resources WHERE id = ?1)",
            params![id.as_str()],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(StorageError::NotFound(id.clone()));
        }

        let rows = if resource.optimistic_locking_enabled() {
            let incoming = resource.lock_token().map(|t| t.as_str().to_string());
            tx.execute(
                "DELETE FROM resources WHERE id = ?1 AND lock_token = ?2",
                params![id.as_str(), incoming],
            )?
        } else {
            tx.execute("DELETE FROM resources WHERE id = ?1", params![id.as_str()])?
        };
        if rows == 0 {
            return Err(StorageError::StaleObject(id.clone()));
        }
        tx.commit()?;
        Ok(())
    }
}

impl QueryService for SqliteAdapter {
    fn find_by_id(&self, id: &ResourceId) -> Result<Resource, StorageError> {
        let conn = self.conn();
        let raw: Option<RawRow> = conn
            .query_row(
                &format!("SELECT {RESOURCE_COLUMNS} FROM resources WHERE id = ?1"),
                params![id.as_str()],
                raw_row,
            )
            .optional()?;
        match raw {
            Some(raw) => self.mapper.from_document(&row_to_document(raw)?),
            None => Err(StorageError::NotFound(id.clone())),
        }
    }

    fn find_all(&self) -> Result<ResourceIter, StorageError> {
        let documents = {
            let conn = self.conn();
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {RESOURCE_COLUMNS} FROM resources ORDER BY id"
            ))?;
            let rows = stmt.query_map([], raw_row)?;
            let mut documents = Vec::new();
            for row in rows {
                documents.push(row_to_document(row?)?);
            }
            documents
        };
        Ok(self.lazy(documents))
    }

    fn find_members(&self, resource: &Resource) -> Result<ResourceIter, StorageError> {
        let Some(owner_id) = resource.id() else {
            return Ok(self.lazy(Vec::new()));
        };
        // One statement: unnest the owner's member_ids array with its slot
        // index, join each slot to its row, and reassemble by ascending
        // position. Missing targets and non-string slots drop out of the
        // join; duplicate slots each produce a row.
        let documents = {
            let conn = self.conn();
            let mut stmt = conn.prepare_cached(
                "SELECT m.id, m.internal_resource, m.created_at, m.updated_at, m.lock_token, m.metadata
                 FROM resources a, json_each(a.metadata, '$.member_ids') e
                 JOIN resources m ON m.id = e.value
                 WHERE a.id = ?1
                 ORDER BY e.key",
            )?;
            let rows = stmt.query_map(params![owner_id.as_str()], raw_row)?;
            let mut documents = Vec::new();
            for row in rows {
                documents.push(row_to_document(row?)?);
            }
            documents
        };
        Ok(self.lazy(documents))
    }

    fn find_parents(&self, resource: &Resource) -> Result<ResourceIter, StorageError> {
        let Some(id) = resource.id() else {
            return Ok(self.lazy(Vec::new()));
        };
        let documents = {
            let conn = self.conn();
            let mut stmt = conn.prepare_cached(
                "SELECT DISTINCT p.id, p.internal_resource, p.created_at, p.updated_at, p.lock_token, p.metadata
                 FROM resources p, json_each(p.metadata, '$.member_ids') e
                 WHERE e.value = ?1",
            )?;
            let rows = stmt.query_map(params![id.as_str()], raw_row)?;
            let mut documents = Vec::new();
            for row in rows {
                documents.push(row_to_document(row?)?);
            }
            documents
        };
        Ok(self.lazy(documents))
    }
}

impl MetadataAdapter for SqliteAdapter {
    fn persister(&self) -> &dyn Persister {
        self
    }

    fn query_service(&self) -> &dyn QueryService {
        self
    }
}
