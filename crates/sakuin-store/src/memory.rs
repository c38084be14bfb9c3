use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use bytes::Bytes;
use sakuin_types::{Document, StatInfo};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::{merge_for_upsert, DocumentStore, ObjectStore};

fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Backend(format!("lock poisoned: {e}"))
}

/// In-memory, HashMap-based object store.
///
/// Intended for tests and embedding. All objects live behind one `RwLock`,
/// so each store instance is a single mutual-exclusion domain.
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<String, Bytes>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Seed an object, for test setup.
    pub fn with_object(self, id: impl Into<String>, object: impl Into<Bytes>) -> Self {
        if let Ok(mut map) = self.objects.write() {
            map.insert(id.into(), object.into());
        }
        self
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, HashMap<String, Bytes>>> {
        self.objects.read().map_err(poisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, HashMap<String, Bytes>>> {
        self.objects.write().map_err(poisoned)
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &self.len())
            .finish()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn stat(&self, id: &str) -> StoreResult<StatInfo> {
        let map = self.read()?;
        Ok(map
            .get(id)
            .map(|obj| StatInfo::present(obj.len() as u64))
            .unwrap_or_else(StatInfo::absent))
    }

    async fn get(&self, id: &str) -> StoreResult<Bytes> {
        let map = self.read()?;
        map.get(id)
            .cloned()
            .ok_or_else(|| StoreError::ObjectNotFound(id.to_owned()))
    }

    async fn put(&self, id: &str, object: Bytes) -> StoreResult<()> {
        let size = object.len();
        self.write()?.insert(id.to_owned(), object);
        debug!(id, size, "stored object in memory");
        Ok(())
    }

    async fn update(&self, id: &str, object: Bytes) -> StoreResult<()> {
        let mut map = self.write()?;
        let slot = map
            .get_mut(id)
            .ok_or_else(|| StoreError::ObjectNotFound(id.to_owned()))?;
        *slot = object;
        debug!(id, "updated object in memory");
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        self.write()?
            .remove(id)
            .map(|_| debug!(id, "deleted object from memory"))
            .ok_or_else(|| StoreError::ObjectNotFound(id.to_owned()))
    }
}

/// In-memory, HashMap-based document store.
///
/// Upserts hold the write lock across the read-merge-write sequence, so
/// concurrent upserts to the same id never lose fields.
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<String, Document>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
        }
    }

    /// Seed a document verbatim (no merge), for test setup.
    pub fn with_document(self, id: impl Into<String>, document: Document) -> Self {
        if let Ok(mut map) = self.documents.write() {
            map.insert(id.into(), document);
        }
        self
    }

    /// Number of documents currently stored.
    pub fn len(&self) -> usize {
        self.documents.read().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, HashMap<String, Document>>> {
        self.documents.read().map_err(poisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, HashMap<String, Document>>> {
        self.documents.write().map_err(poisoned)
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDocumentStore")
            .field("document_count", &self.len())
            .finish()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn stat(&self, id: &str) -> StoreResult<StatInfo> {
        let map = self.read()?;
        Ok(map
            .get(id)
            .map(|doc| StatInfo::present(doc.len() as u64))
            .unwrap_or_else(StatInfo::absent))
    }

    async fn get(&self, id: &str) -> StoreResult<Document> {
        let map = self.read()?;
        map.get(id)
            .cloned()
            .ok_or_else(|| StoreError::DocumentNotFound(id.to_owned()))
    }

    async fn upsert(&self, id: &str, document: Document) -> StoreResult<()> {
        let mut map = self.write()?;
        let merged = match map.get(id) {
            Some(stored) => merge_for_upsert(document, stored.clone())?,
            None => document,
        };
        map.insert(id.to_owned(), merged);
        debug!(id, "upserted document in memory");
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        self.write()?
            .remove(id)
            .map(|_| debug!(id, "deleted document from memory"))
            .ok_or_else(|| StoreError::DocumentNotFound(id.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance;
    use serde_json::json;
    use std::sync::Arc;

    fn doc(value: serde_json::Value) -> Document {
        Document::try_from(value).unwrap()
    }

    #[tokio::test]
    async fn object_store_conforms() {
        conformance::run_object_store_suite(&InMemoryObjectStore::new()).await;
    }

    #[tokio::test]
    async fn document_store_conforms() {
        conformance::run_document_store_suite(&InMemoryDocumentStore::new()).await;
    }

    #[tokio::test]
    async fn seeded_object_is_readable() {
        let store = InMemoryObjectStore::new().with_object("seed", &b"payload"[..]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("seed").await.unwrap(), Bytes::from_static(b"payload"));
    }

    #[tokio::test]
    async fn seeded_document_skips_merge() {
        let store = InMemoryDocumentStore::new().with_document("seed", doc(json!({ "a": 1 })));
        assert_eq!(store.stat("seed").await.unwrap(), StatInfo::present(1));
        assert!(!store.is_empty());
    }

    #[tokio::test]
    async fn concurrent_upserts_keep_every_field() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    let mut document = Document::new();
                    document.insert(format!("field-{i}"), i as i64);
                    store.upsert("shared", document).await.unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.expect("task should not panic");
        }

        let stored = store.get("shared").await.unwrap();
        assert_eq!(stored.len(), 16);
    }

    #[test]
    fn debug_format() {
        let store = InMemoryObjectStore::new().with_object("x", &b"1"[..]);
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryObjectStore"));
        assert!(debug.contains("object_count"));
    }
}
