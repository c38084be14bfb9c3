//! Black-box conformance suite for store backends.
//!
//! A backend is correct only if [`run_object_store_suite`] or
//! [`run_document_store_suite`] passes against a fresh, empty instance:
//!
//! ```ignore
//! #[tokio::test]
//! async fn my_store_conforms() {
//!     sakuin_store::conformance::run_object_store_suite(&MyStore::connect().await).await;
//! }
//! ```
//!
//! Checks panic with a descriptive message on the first violation.

use bytes::Bytes;
use sakuin_merge::MergeError;
use sakuin_types::{Document, StatInfo};
use serde_json::json;

use crate::error::StoreError;
use crate::traits::{DocumentStore, ObjectStore};

/// Run every object store check against `store`.
pub async fn run_object_store_suite<S: ObjectStore + ?Sized>(store: &S) {
    for id in ["", "never-written"] {
        absent_object_get_is_not_found(store, id).await;
        absent_object_update_is_not_found(store, id).await;
        absent_object_delete_is_not_found(store, id).await;
        absent_object_stat_reports_absence(store, id).await;
    }
    put_then_get_returns_exact_bytes(store).await;
    put_replaces_existing_object(store).await;
    update_replaces_existing_object(store).await;
    delete_removes_object(store).await;
}

/// Run every document store check against `store`.
pub async fn run_document_store_suite<S: DocumentStore + ?Sized>(store: &S) {
    for id in ["", "never-written"] {
        absent_document_get_is_not_found(store, id).await;
        absent_document_delete_is_not_found(store, id).await;
        absent_document_stat_reports_absence(store, id).await;
    }
    upsert_inserts_absent_document(store).await;
    upsert_merges_disjoint_fields(store).await;
    upsert_merges_nested_documents(store).await;
    upsert_incoming_value_wins(store).await;
    upsert_type_conflict_leaves_document_unchanged(store).await;
    delete_removes_document(store).await;
}

fn doc(value: serde_json::Value) -> Document {
    match Document::try_from(value) {
        Ok(document) => document,
        Err(e) => panic!("conformance fixture is not a document: {e}"),
    }
}

// ---------------------------------------------------------------------------
// Object store checks
// ---------------------------------------------------------------------------

async fn absent_object_get_is_not_found<S: ObjectStore + ?Sized>(store: &S, id: &str) {
    match store.get(id).await {
        Err(StoreError::ObjectNotFound(got)) => assert_eq!(got, id, "not-found must carry the id"),
        other => panic!("get on absent object {id:?}: expected ObjectNotFound, got {other:?}"),
    }
}

async fn absent_object_update_is_not_found<S: ObjectStore + ?Sized>(store: &S, id: &str) {
    match store.update(id, Bytes::new()).await {
        Err(StoreError::ObjectNotFound(got)) => assert_eq!(got, id, "not-found must carry the id"),
        other => panic!("update on absent object {id:?}: expected ObjectNotFound, got {other:?}"),
    }
    assert!(
        !store.stat(id).await.expect("stat").exists,
        "update on absent object {id:?} must not create it"
    );
}

async fn absent_object_delete_is_not_found<S: ObjectStore + ?Sized>(store: &S, id: &str) {
    match store.delete(id).await {
        Err(StoreError::ObjectNotFound(got)) => assert_eq!(got, id, "not-found must carry the id"),
        other => panic!("delete on absent object {id:?}: expected ObjectNotFound, got {other:?}"),
    }
}

async fn absent_object_stat_reports_absence<S: ObjectStore + ?Sized>(store: &S, id: &str) {
    match store.stat(id).await {
        Ok(stat) => assert_eq!(stat, StatInfo::absent(), "stat on absent object {id:?}"),
        Err(e) => panic!("stat on absent object {id:?} must not fail: {e}"),
    }
}

async fn put_then_get_returns_exact_bytes<S: ObjectStore + ?Sized>(store: &S) {
    let payloads: [&'static [u8]; 3] = [b"", b"plain text payload", &[0x00, 0xff, 0x80, 0x7f, 0x00]];
    for (i, payload) in payloads.into_iter().enumerate() {
        let id = format!("roundtrip-{i}");
        store.put(&id, Bytes::from_static(payload)).await.expect("put");
        let got = store.get(&id).await.expect("get after put");
        assert_eq!(&got[..], payload, "get must return exactly the bytes put under {id:?}");
        let stat = store.stat(&id).await.expect("stat after put");
        assert_eq!(stat, StatInfo::present(payload.len() as u64), "stat after put {id:?}");
    }
}

async fn put_replaces_existing_object<S: ObjectStore + ?Sized>(store: &S) {
    let id = "put-replaces";
    store.put(id, Bytes::from_static(b"first version")).await.expect("first put");
    store.put(id, Bytes::from_static(b"second")).await.expect("second put must succeed");
    let got = store.get(id).await.expect("get");
    assert_eq!(&got[..], b"second", "put must replace the existing object");
}

async fn update_replaces_existing_object<S: ObjectStore + ?Sized>(store: &S) {
    let id = "update-replaces";
    store.put(id, Bytes::from_static(b"original")).await.expect("put");
    store.update(id, Bytes::from_static(b"new")).await.expect("update existing");
    let got = store.get(id).await.expect("get");
    assert_eq!(&got[..], b"new", "update must replace the object contents");
    assert_eq!(store.stat(id).await.expect("stat"), StatInfo::present(3));
}

async fn delete_removes_object<S: ObjectStore + ?Sized>(store: &S) {
    let id = "delete-removes";
    store.put(id, Bytes::from_static(b"doomed")).await.expect("put");
    store.delete(id).await.expect("delete existing");
    assert_eq!(store.stat(id).await.expect("stat"), StatInfo::absent());
    assert!(
        matches!(store.get(id).await, Err(StoreError::ObjectNotFound(_))),
        "get after delete must be not-found"
    );
}

// ---------------------------------------------------------------------------
// Document store checks
// ---------------------------------------------------------------------------

async fn absent_document_get_is_not_found<S: DocumentStore + ?Sized>(store: &S, id: &str) {
    match store.get(id).await {
        Err(StoreError::DocumentNotFound(got)) => {
            assert_eq!(got, id, "not-found must carry the id")
        }
        other => panic!("get on absent document {id:?}: expected DocumentNotFound, got {other:?}"),
    }
}

async fn absent_document_delete_is_not_found<S: DocumentStore + ?Sized>(store: &S, id: &str) {
    match store.delete(id).await {
        Err(StoreError::DocumentNotFound(got)) => {
            assert_eq!(got, id, "not-found must carry the id")
        }
        other => {
            panic!("delete on absent document {id:?}: expected DocumentNotFound, got {other:?}")
        }
    }
}

async fn absent_document_stat_reports_absence<S: DocumentStore + ?Sized>(store: &S, id: &str) {
    match store.stat(id).await {
        Ok(stat) => assert_eq!(stat, StatInfo::absent(), "stat on absent document {id:?}"),
        Err(e) => panic!("stat on absent document {id:?} must not fail: {e}"),
    }
}

async fn upsert_inserts_absent_document<S: DocumentStore + ?Sized>(store: &S) {
    let id = "upsert-inserts";
    let document = doc(json!({ "name": "report", "pages": 12, "owner": { "team": "core" } }));
    store.upsert(id, document.clone()).await.expect("upsert");
    assert_eq!(store.get(id).await.expect("get"), document);
    assert_eq!(store.stat(id).await.expect("stat"), StatInfo::present(3));
}

async fn upsert_merges_disjoint_fields<S: DocumentStore + ?Sized>(store: &S) {
    let id = "upsert-disjoint";
    store.upsert(id, doc(json!({ "a": 1 }))).await.expect("first upsert");
    store.upsert(id, doc(json!({ "b": 2 }))).await.expect("second upsert");
    assert_eq!(store.get(id).await.expect("get"), doc(json!({ "a": 1, "b": 2 })));
}

async fn upsert_merges_nested_documents<S: DocumentStore + ?Sized>(store: &S) {
    let id = "upsert-nested";
    store.upsert(id, doc(json!({ "a": { "y": 2 } }))).await.expect("first upsert");
    store.upsert(id, doc(json!({ "a": { "x": 1 } }))).await.expect("second upsert");
    assert_eq!(
        store.get(id).await.expect("get"),
        doc(json!({ "a": { "x": 1, "y": 2 } }))
    );
}

async fn upsert_incoming_value_wins<S: DocumentStore + ?Sized>(store: &S) {
    let id = "upsert-overwrites-scalar";
    store.upsert(id, doc(json!({ "status": "draft", "keep": true }))).await.expect("first upsert");
    store.upsert(id, doc(json!({ "status": "final" }))).await.expect("second upsert");
    assert_eq!(
        store.get(id).await.expect("get"),
        doc(json!({ "status": "final", "keep": true }))
    );
}

async fn upsert_type_conflict_leaves_document_unchanged<S: DocumentStore + ?Sized>(store: &S) {
    let id = "upsert-conflict";
    let original = doc(json!({ "a": { "y": 2 } }));
    store.upsert(id, original.clone()).await.expect("first upsert");

    match store.upsert(id, doc(json!({ "a": 5, "b": 1 }))).await {
        Err(StoreError::Merge(MergeError::TypeConflict { field, .. })) => {
            assert_eq!(field, "a", "conflict must name the field")
        }
        other => panic!("conflicting upsert: expected a merge type conflict, got {other:?}"),
    }
    assert_eq!(
        store.get(id).await.expect("get"),
        original,
        "a failed upsert must not modify the stored document"
    );
}

async fn delete_removes_document<S: DocumentStore + ?Sized>(store: &S) {
    let id = "delete-removes";
    store.upsert(id, doc(json!({ "a": 1 }))).await.expect("upsert");
    store.delete(id).await.expect("delete existing");
    assert_eq!(store.stat(id).await.expect("stat"), StatInfo::absent());
    assert!(
        matches!(store.get(id).await, Err(StoreError::DocumentNotFound(_))),
        "get after delete must be not-found"
    );
}
