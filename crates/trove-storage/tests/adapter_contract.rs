//! Cross-backend contract tests.
//!
//! Every behavior here is written once against the [`MetadataAdapter`]
//! trait and run against both backends, so the in-memory and SQLite
//! adapters cannot drift apart. Each test covers one observable promise of
//! the contract:
//! - save assigns ids and timestamps exactly once
//! - stale lock tokens are rejected and leave the store untouched
//! - `save_all` commits or rolls back as a unit
//! - membership comes back in recorded positional order, with missing
//!   targets skipped and duplicates preserved
//! - round trips preserve declared attribute order and types

use std::sync::Arc;

use trove_core::{
    AttributeKind, Cardinality, Resource, ResourceId, ResourceSchema, SchemaRegistry, Value,
    MEMBER_IDS,
};
use trove_storage::{MemoryAdapter, MetadataAdapter, SqliteAdapter, StorageError};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

fn schemas() -> SchemaRegistry {
    let (page, _) = ResourceSchema::build("Page")
        .attribute("title", AttributeKind::String, Cardinality::Many)
        .attribute("page_number", AttributeKind::Integer, Cardinality::Single)
        .finish();
    let (work, _) = ResourceSchema::build("Work")
        .enable_optimistic_locking()
        .attribute("title", AttributeKind::String, Cardinality::Many)
        .attribute(MEMBER_IDS, AttributeKind::Id, Cardinality::Many)
        .finish();
    let mut registry = SchemaRegistry::new();
    registry.register(page).unwrap();
    registry.register(work).unwrap();
    registry
}

fn backends() -> Vec<(&'static str, Arc<dyn MetadataAdapter>)> {
    vec![
        ("memory", Arc::new(MemoryAdapter::new(schemas()))),
        (
            "sqlite",
            Arc::new(SqliteAdapter::in_memory(schemas()).unwrap()),
        ),
    ]
}

fn new_page(title: &str) -> Resource {
    let schema = schemas().get("Page").unwrap();
    let mut page = Resource::new(schema);
    page.set("title", vec![Value::from(title)]).unwrap();
    page
}

fn new_work() -> Resource {
    Resource::new(schemas().get("Work").unwrap())
}

fn id_of(resource: &Resource) -> ResourceId {
    resource.id().cloned().unwrap()
}

/// Runs one contract check against every backend, labeling failures with
/// the backend name.
fn for_each_backend(check: impl Fn(&dyn MetadataAdapter, &str)) {
    for (name, adapter) in backends() {
        check(adapter.as_ref(), name);
    }
}

// ---------------------------------------------------------------------------
// Persister contract
// ---------------------------------------------------------------------------

#[test]
fn save_assigns_id_and_timestamps() {
    for_each_backend(|adapter, backend| {
        let saved = adapter.persister().save(new_page("one")).unwrap();
        assert!(saved.persisted(), "{backend}: id not assigned");
        assert!(saved.created_at().is_some(), "{backend}: created_at unset");
        assert!(saved.updated_at().is_some(), "{backend}: updated_at unset");
    });
}

#[test]
fn resave_keeps_created_at_and_advances_updated_at() {
    for_each_backend(|adapter, backend| {
        let first = adapter.persister().save(new_page("one")).unwrap();
        let second = adapter.persister().save(first.clone()).unwrap();
        assert_eq!(second.id(), first.id(), "{backend}: id changed on resave");
        assert_eq!(
            second.created_at(),
            first.created_at(),
            "{backend}: created_at rewritten"
        );
        assert!(
            second.updated_at() >= first.updated_at(),
            "{backend}: updated_at went backwards"
        );
    });
}

#[test]
fn caller_supplied_id_is_kept() {
    for_each_backend(|adapter, backend| {
        let mut page = new_page("one");
        page.assign_id(ResourceId::new("chosen-id"));
        let saved = adapter.persister().save(page).unwrap();
        assert_eq!(saved.id().unwrap().as_str(), "chosen-id", "{backend}");
        let found = adapter
            .query_service()
            .find_by_id(&ResourceId::new("chosen-id"))
            .unwrap();
        assert_eq!(found.first("title"), Some(&Value::from("one")), "{backend}");
    });
}

#[test]
fn lock_token_rotates_on_every_save() {
    for_each_backend(|adapter, backend| {
        let first = adapter.persister().save(new_work()).unwrap();
        let token = first.lock_token().cloned();
        assert!(token.is_some(), "{backend}: no token minted");
        let second = adapter.persister().save(first).unwrap();
        assert_ne!(
            second.lock_token().cloned(),
            token,
            "{backend}: token not rotated"
        );
    });
}

#[test]
fn stale_save_is_rejected_and_store_unchanged() {
    for_each_backend(|adapter, backend| {
        let mut stale = adapter.persister().save(new_work()).unwrap();
        stale.set("title", vec![Value::from("current")]).unwrap();
        let current = adapter.persister().save(stale.clone()).unwrap();

        stale.set("title", vec![Value::from("stale")]).unwrap();
        assert!(
            matches!(
                adapter.persister().save(stale),
                Err(StorageError::StaleObject(_))
            ),
            "{backend}: stale save accepted"
        );

        let stored = adapter
            .query_service()
            .find_by_id(current.id().unwrap())
            .unwrap();
        assert_eq!(
            stored.first("title"),
            Some(&Value::from("current")),
            "{backend}: stale save mutated the store"
        );
    });
}

#[test]
fn unlocked_schema_allows_blind_resave() {
    for_each_backend(|adapter, backend| {
        let saved = adapter.persister().save(new_page("one")).unwrap();
        let mut stale = saved.clone();
        adapter.persister().save(saved).unwrap();
        stale.set("title", vec![Value::from("latest")]).unwrap();
        // Last write wins without locking.
        let resaved = adapter.persister().save(stale).unwrap();
        assert_eq!(
            resaved.first("title"),
            Some(&Value::from("latest")),
            "{backend}"
        );
    });
}

#[test]
fn save_all_is_all_or_nothing() {
    for_each_backend(|adapter, backend| {
        let stale = adapter.persister().save(new_work()).unwrap();
        adapter.persister().save(stale.clone()).unwrap();

        let result = adapter.persister().save_all(vec![new_page("fresh"), stale]);
        assert!(
            matches!(result, Err(StorageError::StaleObject(_))),
            "{backend}: conflicting batch accepted"
        );
        let total = adapter.query_service().find_all().unwrap().count();
        assert_eq!(total, 1, "{backend}: partial batch persisted");
    });
}

#[test]
fn delete_requires_persistence_and_current_token() {
    for_each_backend(|adapter, backend| {
        assert!(
            matches!(
                adapter.persister().delete(&new_page("unsaved")),
                Err(StorageError::NotPersisted { .. })
            ),
            "{backend}: deleted an unsaved resource"
        );

        let stale = adapter.persister().save(new_work()).unwrap();
        adapter.persister().save(stale.clone()).unwrap();
        assert!(
            matches!(
                adapter.persister().delete(&stale),
                Err(StorageError::StaleObject(_))
            ),
            "{backend}: stale delete accepted"
        );
    });
}

#[test]
fn delete_then_find_reports_not_found() {
    for_each_backend(|adapter, backend| {
        let saved = adapter.persister().save(new_page("one")).unwrap();
        let id = id_of(&saved);
        adapter.persister().delete(&saved).unwrap();
        assert!(
            matches!(
                adapter.query_service().find_by_id(&id),
                Err(StorageError::NotFound(missing)) if missing == id
            ),
            "{backend}"
        );
    });
}

// ---------------------------------------------------------------------------
// QueryService contract
// ---------------------------------------------------------------------------

#[test]
fn roundtrip_preserves_attribute_order_and_types() {
    for_each_backend(|adapter, backend| {
        let mut page = new_page("one");
        page.set("page_number", vec![Value::Integer(7)]).unwrap();
        let saved = adapter.persister().save(page).unwrap();

        let found = adapter
            .query_service()
            .find_by_id(saved.id().unwrap())
            .unwrap();
        assert_eq!(found, saved, "{backend}: roundtrip changed the resource");
        let names: Vec<_> = found.attributes().map(|(name, _)| name.to_string()).collect();
        assert_eq!(names, vec!["title", "page_number"], "{backend}");
    });
}

#[test]
fn find_all_snapshots_and_restarts() {
    for_each_backend(|adapter, backend| {
        adapter.persister().save(new_page("one")).unwrap();
        let first = adapter.query_service().find_all().unwrap();
        adapter.persister().save(new_page("two")).unwrap();
        // The earlier sequence is a snapshot; a fresh call sees both.
        assert_eq!(first.count(), 1, "{backend}");
        assert_eq!(adapter.query_service().find_all().unwrap().count(), 2, "{backend}");
    });
}

#[test]
fn members_come_back_in_recorded_order() {
    for_each_backend(|adapter, backend| {
        let a = adapter.persister().save(new_page("a")).unwrap();
        let b = adapter.persister().save(new_page("b")).unwrap();
        let c = adapter.persister().save(new_page("c")).unwrap();

        let mut owner = new_work();
        owner
            .set_member_ids(vec![id_of(&c), id_of(&a), id_of(&b)])
            .unwrap();
        let owner = adapter.persister().save(owner).unwrap();

        let ids: Vec<_> = adapter
            .query_service()
            .find_members(&owner)
            .unwrap()
            .map(|m| id_of(&m.unwrap()))
            .collect();
        assert_eq!(ids, vec![id_of(&c), id_of(&a), id_of(&b)], "{backend}");
    });
}

#[test]
fn membership_skips_missing_and_keeps_duplicates() {
    for_each_backend(|adapter, backend| {
        let a = adapter.persister().save(new_page("a")).unwrap();
        let b = adapter.persister().save(new_page("b")).unwrap();

        let mut owner = new_work();
        owner
            .set_member_ids(vec![
                id_of(&a),
                ResourceId::new("no-such-resource"),
                id_of(&b),
                id_of(&a),
            ])
            .unwrap();
        let owner = adapter.persister().save(owner).unwrap();

        let ids: Vec<_> = adapter
            .query_service()
            .find_members(&owner)
            .unwrap()
            .map(|m| id_of(&m.unwrap()))
            .collect();
        assert_eq!(ids, vec![id_of(&a), id_of(&b), id_of(&a)], "{backend}");
    });
}

#[test]
fn membership_reflects_the_stored_record() {
    for_each_backend(|adapter, backend| {
        let a = adapter.persister().save(new_page("a")).unwrap();
        let b = adapter.persister().save(new_page("b")).unwrap();

        let mut owner = new_work();
        owner.set_member_ids(vec![id_of(&a)]).unwrap();
        let mut owner = adapter.persister().save(owner).unwrap();

        // Unsaved edits to the instance do not change query results.
        owner.set_member_ids(vec![id_of(&b)]).unwrap();
        let ids: Vec<_> = adapter
            .query_service()
            .find_members(&owner)
            .unwrap()
            .map(|m| id_of(&m.unwrap()))
            .collect();
        assert_eq!(ids, vec![id_of(&a)], "{backend}");
    });
}

#[test]
fn unsaved_owner_has_no_members_or_parents() {
    for_each_backend(|adapter, backend| {
        let unsaved = new_work();
        assert_eq!(
            adapter.query_service().find_members(&unsaved).unwrap().count(),
            0,
            "{backend}"
        );
        assert_eq!(
            adapter.query_service().find_parents(&unsaved).unwrap().count(),
            0,
            "{backend}"
        );
    });
}

#[test]
fn parents_are_deduplicated() {
    for_each_backend(|adapter, backend| {
        let child = adapter.persister().save(new_page("child")).unwrap();

        let mut twice = new_work();
        twice
            .set_member_ids(vec![id_of(&child), id_of(&child)])
            .unwrap();
        let twice = adapter.persister().save(twice).unwrap();

        let mut once = new_work();
        once.set_member_ids(vec![id_of(&child)]).unwrap();
        let once = adapter.persister().save(once).unwrap();

        let mut parents: Vec<_> = adapter
            .query_service()
            .find_parents(&child)
            .unwrap()
            .map(|p| id_of(&p.unwrap()))
            .collect();
        parents.sort();
        let mut expected = vec![id_of(&twice), id_of(&once)];
        expected.sort();
        assert_eq!(parents, expected, "{backend}");
    });
}
