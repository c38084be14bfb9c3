use async_trait::async_trait;
use bytes::Bytes;
use sakuin_types::{Document, StatInfo};

use crate::error::StoreResult;

/// Store of opaque objects keyed by id.
///
/// All implementations must satisfy these invariants:
/// - `get`, `update`, and `delete` on an absent id return
///   [`StoreError::ObjectNotFound`](crate::StoreError::ObjectNotFound)
///   carrying that id.
/// - `stat` never fails because the id is absent.
/// - `put` unconditionally replaces whatever is stored under the id.
///
/// Callers cancel an operation by dropping its future. Implementations must
/// leave the store consistent if that happens at any await point.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Probe for an object. `size` is its length in bytes.
    async fn stat(&self, id: &str) -> StoreResult<StatInfo>;

    /// Read an object.
    async fn get(&self, id: &str) -> StoreResult<Bytes>;

    /// Store an object, replacing any existing one.
    async fn put(&self, id: &str, object: Bytes) -> StoreResult<()>;

    /// Replace the contents of an existing object.
    async fn update(&self, id: &str, object: Bytes) -> StoreResult<()>;

    /// Remove an object.
    async fn delete(&self, id: &str) -> StoreResult<()>;
}

/// Store of metadata documents keyed by id.
///
/// All implementations must satisfy these invariants:
/// - `get` and `delete` on an absent id return
///   [`StoreError::DocumentNotFound`](crate::StoreError::DocumentNotFound)
///   carrying that id.
/// - `stat` never fails because the id is absent.
/// - `upsert` merges into an existing document, with the incoming document
///   as merge destination, and inserts otherwise. A merge conflict leaves the
///   stored document unchanged.
///
/// There is no whole-document replace: `upsert` is the only write path.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Probe for a document. `size` is its number of top-level fields.
    async fn stat(&self, id: &str) -> StoreResult<StatInfo>;

    /// Read a document.
    async fn get(&self, id: &str) -> StoreResult<Document>;

    /// Merge-or-insert a document.
    async fn upsert(&self, id: &str, document: Document) -> StoreResult<()>;

    /// Remove a document.
    async fn delete(&self, id: &str) -> StoreResult<()>;
}

/// Combine an incoming document with the stored one, as `upsert` requires.
///
/// The incoming document is the merge destination, so its plain values win
/// over stored ones while stored keys it lacks are kept. Backends call this
/// under their own write lock.
pub fn merge_for_upsert(incoming: Document, stored: Document) -> StoreResult<Document> {
    let mut merged = incoming;
    sakuin_merge::merge(&mut merged, stored)?;
    Ok(merged)
}
