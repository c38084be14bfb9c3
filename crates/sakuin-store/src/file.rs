//! File-backed object and document stores.
//!
//! Each entry is one file directly under the store's root directory, named
//! after the hex encoding of its id so arbitrary ids map to safe file names.
//!
//! Writes are atomic: data goes to a temporary file in the same directory
//! and is then renamed over the target. Mutating operations are serialized
//! per store by an async mutex; reads take no lock.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use sakuin_types::{Document, StatInfo};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::{merge_for_upsert, DocumentStore, ObjectStore};

async fn write_atomic(path: &Path, data: &[u8]) -> StoreResult<()> {
    // A stray temp file left by a dropped future is overwritten by the next write.
    let tmp_path = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, data).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

/// Read a file, mapping a missing file to `Ok(None)`.
async fn read_optional(path: &Path) -> StoreResult<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::Io(e)),
    }
}

/// Remove a file, returning `false` if it did not exist.
async fn remove_optional(path: &Path) -> StoreResult<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StoreError::Io(e)),
    }
}

/// Object store keeping one file per object.
#[derive(Debug)]
pub struct FileObjectStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileObjectStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("obj-{}", hex::encode(id)))
    }
}

#[async_trait]
impl ObjectStore for FileObjectStore {
    async fn stat(&self, id: &str) -> StoreResult<StatInfo> {
        match tokio::fs::metadata(self.object_path(id)).await {
            Ok(meta) => Ok(StatInfo::present(meta.len())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(StatInfo::absent()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn get(&self, id: &str) -> StoreResult<Bytes> {
        read_optional(&self.object_path(id))
            .await?
            .map(Bytes::from)
            .ok_or_else(|| StoreError::ObjectNotFound(id.to_owned()))
    }

    async fn put(&self, id: &str, object: Bytes) -> StoreResult<()> {
        let path = self.object_path(id);
        let _guard = self.write_lock.lock().await;
        write_atomic(&path, &object).await?;
        debug!(id, path = %path.display(), size = object.len(), "stored object to file");
        Ok(())
    }

    async fn update(&self, id: &str, object: Bytes) -> StoreResult<()> {
        let path = self.object_path(id);
        let _guard = self.write_lock.lock().await;
        if !tokio::fs::try_exists(&path).await? {
            return Err(StoreError::ObjectNotFound(id.to_owned()));
        }
        write_atomic(&path, &object).await?;
        debug!(id, size = object.len(), "updated object file");
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        if !remove_optional(&self.object_path(id)).await? {
            return Err(StoreError::ObjectNotFound(id.to_owned()));
        }
        debug!(id, "deleted object file");
        Ok(())
    }
}

/// Document store keeping one JSON file per document.
#[derive(Debug)]
pub struct FileDocumentStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileDocumentStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("doc-{}.json", hex::encode(id)))
    }

    async fn load(&self, id: &str) -> StoreResult<Option<Document>> {
        let Some(raw) = read_optional(&self.document_path(id)).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| StoreError::Serialization(format!("document {id}: {e}")))
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn stat(&self, id: &str) -> StoreResult<StatInfo> {
        Ok(self
            .load(id)
            .await?
            .map(|doc| StatInfo::present(doc.len() as u64))
            .unwrap_or_else(StatInfo::absent))
    }

    async fn get(&self, id: &str) -> StoreResult<Document> {
        self.load(id)
            .await?
            .ok_or_else(|| StoreError::DocumentNotFound(id.to_owned()))
    }

    async fn upsert(&self, id: &str, document: Document) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let merged = match self.load(id).await? {
            Some(stored) => merge_for_upsert(document, stored)?,
            None => document,
        };
        let raw = serde_json::to_vec(&merged)
            .map_err(|e| StoreError::Serialization(format!("document {id}: {e}")))?;
        write_atomic(&self.document_path(id), &raw).await?;
        debug!(id, fields = merged.len(), "upserted document file");
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        if !remove_optional(&self.document_path(id)).await? {
            return Err(StoreError::DocumentNotFound(id.to_owned()));
        }
        debug!(id, "deleted document file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance;
    use tempfile::TempDir;

    #[tokio::test]
    async fn object_store_conforms() {
        let dir = TempDir::new().unwrap();
        let store = FileObjectStore::open(dir.path()).unwrap();
        conformance::run_object_store_suite(&store).await;
    }

    #[tokio::test]
    async fn document_store_conforms() {
        let dir = TempDir::new().unwrap();
        let store = FileDocumentStore::open(dir.path()).unwrap();
        conformance::run_document_store_suite(&store).await;
    }

    #[tokio::test]
    async fn objects_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileObjectStore::open(dir.path()).unwrap();
            store.put("persisted", Bytes::from_static(b"data")).await.unwrap();
        }
        let store = FileObjectStore::open(dir.path()).unwrap();
        assert_eq!(store.get("persisted").await.unwrap(), Bytes::from_static(b"data"));
    }

    #[tokio::test]
    async fn ids_with_path_separators_stay_inside_root() {
        let dir = TempDir::new().unwrap();
        let store = FileObjectStore::open(dir.path()).unwrap();
        store.put("../escape/attempt", Bytes::from_static(b"x")).await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert!(store.stat("../escape/attempt").await.unwrap().exists);
    }

    #[tokio::test]
    async fn corrupt_document_is_a_serialization_error() {
        let dir = TempDir::new().unwrap();
        let store = FileDocumentStore::open(dir.path()).unwrap();
        std::fs::write(store.document_path("bad"), b"{ not json").unwrap();

        let err = store.get("bad").await.unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }

    #[test]
    fn open_creates_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("nested").join("objects");
        let store = FileObjectStore::open(&root).unwrap();
        assert!(store.root().is_dir());
    }
}
