//! The indexing orchestrator.
//!
//! [`Indexer`] keeps an object store and a document store in step. Every
//! operation fans out to both stores concurrently; the stores are never
//! locked together, so a failure on one side after the other applied is
//! either undone (create) or reported as [`IndexError::PartialWrite`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use rand::RngCore;
use sakuin_store::{DocumentStore, ObjectStore};
use sakuin_types::Document;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Span};

use crate::allocator::IdAllocator;
use crate::error::{Half, IndexError, IndexResult};
use crate::fanout::{guarded, Deadline, FanOut, Failure};

/// Collaborators for an [`Indexer`].
pub struct IndexerConfig {
    pub object_store: Arc<dyn ObjectStore>,
    pub document_store: Arc<dyn DocumentStore>,
    /// Randomness for identifier generation. Defaults to the OS source.
    pub rand_source: Option<Box<dyn RngCore + Send>>,
    /// Upper bound on each operation. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl IndexerConfig {
    pub fn new(object_store: Arc<dyn ObjectStore>, document_store: Arc<dyn DocumentStore>) -> Self {
        Self {
            object_store,
            document_store,
            rand_source: None,
            timeout: None,
        }
    }

    pub fn with_rand_source(mut self, rng: impl RngCore + Send + 'static) -> Self {
        self.rand_source = Some(Box::new(rng));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateRequest {
    pub object: Bytes,
    pub metadata: Option<Document>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateResponse {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadResponse {
    pub id: String,
    pub object: Bytes,
    pub metadata: Document,
}

/// Replace the object and/or merge into the metadata of an existing entry.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    pub id: String,
    pub object: Option<Bytes>,
    pub metadata: Option<Document>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateResponse {
    pub applied: Vec<Half>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteResponse {
    pub removed: Vec<Half>,
}

/// Shared handles to both stores, cloned into each spawned branch.
#[derive(Clone)]
struct Stores {
    objects: Arc<dyn ObjectStore>,
    documents: Arc<dyn DocumentStore>,
}

impl Stores {
    async fn put_object(self, id: String, object: Bytes) -> IndexResult<()> {
        Ok(self.objects.put(&id, object).await?)
    }

    async fn upsert_document(self, id: String, metadata: Document) -> IndexResult<()> {
        Ok(self.documents.upsert(&id, metadata).await?)
    }

    async fn update_object(self, id: String, object: Bytes) -> IndexResult<()> {
        Ok(self.objects.update(&id, object).await?)
    }

    /// Merge into an existing document. Never creates one.
    async fn update_document(self, id: String, metadata: Document) -> IndexResult<()> {
        if !self.documents.stat(&id).await?.exists {
            return Err(IndexError::DocumentNotFound(id));
        }
        Ok(self.documents.upsert(&id, metadata).await?)
    }

    async fn get_object(self, id: String) -> IndexResult<Fetched> {
        Ok(Fetched::Object(self.objects.get(&id).await?))
    }

    async fn get_document(self, id: String) -> IndexResult<Fetched> {
        Ok(Fetched::Document(self.documents.get(&id).await?))
    }

    /// Remove one half. Returns `false` if it was already absent.
    async fn remove(self, half: Half, id: String) -> IndexResult<bool> {
        let result = match half {
            Half::Object => self.objects.delete(&id).await,
            Half::Document => self.documents.delete(&id).await,
        };
        match result {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

enum Fetched {
    Object(Bytes),
    Document(Document),
}

/// Coordinates writes and reads of index entries across both stores.
pub struct Indexer {
    stores: Stores,
    allocator: IdAllocator,
    timeout: Option<Duration>,
}

impl Indexer {
    pub fn new(config: IndexerConfig) -> Self {
        let allocator = match config.rand_source {
            Some(rng) => IdAllocator::new(rng),
            None => IdAllocator::from_os_rng(),
        };
        Self {
            stores: Stores {
                objects: config.object_store,
                documents: config.document_store,
            },
            allocator,
            timeout: config.timeout,
        }
    }

    pub fn object_store(&self) -> &Arc<dyn ObjectStore> {
        &self.stores.objects
    }

    pub fn document_store(&self) -> &Arc<dyn DocumentStore> {
        &self.stores.documents
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn deadline(&self) -> Option<Deadline> {
        self.timeout.map(Deadline::after)
    }

    /// Store a new entry under a freshly allocated identifier.
    ///
    /// Succeeds only if every supplied half is written. On failure the
    /// halves that were written are removed again; if that removal fails
    /// too, the result is [`IndexError::PartialWrite`] naming what remains.
    ///
    /// Allocation only checks the object store. If a document without an
    /// object already sits under the new identifier, the metadata is merged
    /// into it, and a failed create removes that whole document.
    #[tracing::instrument(
        skip_all,
        fields(id = tracing::field::Empty, size = request.object.len())
    )]
    pub async fn create(
        &self,
        request: CreateRequest,
        cancel: &CancellationToken,
    ) -> IndexResult<CreateResponse> {
        if cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }
        let deadline = self.deadline();
        let reservation = self
            .allocator
            .allocate_within(self.stores.objects.as_ref(), cancel, deadline)
            .await?;
        let id = reservation.id().to_owned();
        Span::current().record("id", id.as_str());

        let mut fan = FanOut::new(cancel);
        fan.spawn(
            Half::Object,
            self.stores.clone().put_object(id.clone(), request.object),
        );
        if let Some(metadata) = request.metadata {
            fan.spawn(
                Half::Document,
                self.stores.clone().upsert_document(id.clone(), metadata),
            );
        }

        let result = match fan.join(deadline).await {
            Ok(_) => {
                info!(id = %id, "indexed entry");
                Ok(CreateResponse { id })
            }
            Err(failure) => Err(self.compensate(&id, failure).await),
        };
        drop(reservation);
        result
    }

    /// Remove the halves a failed create managed to write.
    ///
    /// Runs on its own task so it completes even if the caller goes away.
    async fn compensate(&self, id: &str, failure: Failure<()>) -> IndexError {
        let applied = failure.applied_halves();
        if applied.is_empty() {
            return failure.error;
        }
        warn!(id, ?applied, error = %failure.error, "create failed, removing written halves");

        let stores = self.stores.clone();
        let owned_id = id.to_owned();
        let to_undo = applied.clone();
        let undo = tokio::spawn(async move {
            let mut left = Vec::new();
            for half in to_undo {
                if let Err(e) = stores.clone().remove(half, owned_id.clone()).await {
                    error!(id = %owned_id, %half, error = %e, "failed to remove half");
                    left.push(half);
                }
            }
            left
        });

        let left = match undo.await {
            Ok(left) => left,
            Err(join_err) => {
                error!(id, error = %join_err, "compensation task failed");
                applied
            }
        };
        if left.is_empty() {
            return failure.error;
        }
        IndexError::PartialWrite {
            id: id.to_owned(),
            applied: left,
            source: Box::new(failure.error),
        }
    }

    /// Fetch both halves of an entry. Fails if either is missing.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn read(&self, id: &str, cancel: &CancellationToken) -> IndexResult<ReadResponse> {
        if cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }
        let mut fan = FanOut::new(cancel);
        fan.spawn(Half::Object, self.stores.clone().get_object(id.to_owned()));
        fan.spawn(
            Half::Document,
            self.stores.clone().get_document(id.to_owned()),
        );

        let fetched = fan
            .join(self.deadline())
            .await
            .map_err(|failure| failure.error)?;

        let mut object = None;
        let mut metadata = None;
        for (_, value) in fetched {
            match value {
                Fetched::Object(bytes) => object = Some(bytes),
                Fetched::Document(document) => metadata = Some(document),
            }
        }
        let (Some(object), Some(metadata)) = (object, metadata) else {
            return Err(IndexError::Internal(format!(
                "read of {id} completed without both halves"
            )));
        };
        debug!(size = object.len(), fields = metadata.len(), "read entry");
        Ok(ReadResponse {
            id: id.to_owned(),
            object,
            metadata,
        })
    }

    /// Fetch only the object half of an entry.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn read_object(&self, id: &str, cancel: &CancellationToken) -> IndexResult<Bytes> {
        guarded(cancel, self.deadline(), async {
            self.stores.objects.get(id).await.map_err(IndexError::from)
        })
        .await
    }

    /// Fetch only the metadata half of an entry.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn read_metadata(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> IndexResult<Document> {
        guarded(cancel, self.deadline(), async {
            self.stores.documents.get(id).await.map_err(IndexError::from)
        })
        .await
    }

    /// Update the supplied halves of an existing entry.
    ///
    /// The object is replaced; the metadata is merged into the stored
    /// document, which must already exist. Nothing is rolled back: if one
    /// half fails after the other was written, the result is
    /// [`IndexError::PartialWrite`].
    #[tracing::instrument(
        skip_all,
        fields(
            id = %request.id,
            object = request.object.is_some(),
            metadata = request.metadata.is_some()
        )
    )]
    pub async fn update(
        &self,
        request: UpdateRequest,
        cancel: &CancellationToken,
    ) -> IndexResult<UpdateResponse> {
        if cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }
        let UpdateRequest {
            id,
            object,
            metadata,
        } = request;
        if object.is_none() && metadata.is_none() {
            debug!("nothing to update");
            return Ok(UpdateResponse {
                applied: Vec::new(),
            });
        }

        let mut fan = FanOut::new(cancel);
        if let Some(object) = object {
            fan.spawn(
                Half::Object,
                self.stores.clone().update_object(id.clone(), object),
            );
        }
        if let Some(metadata) = metadata {
            fan.spawn(
                Half::Document,
                self.stores.clone().update_document(id.clone(), metadata),
            );
        }

        match fan.join(self.deadline()).await {
            Ok(done) => {
                let applied: Vec<Half> = done.into_iter().map(|(half, ())| half).collect();
                info!(?applied, "updated entry");
                Ok(UpdateResponse { applied })
            }
            Err(failure) => Err(partial_write(id, failure.applied_halves(), failure.error)),
        }
    }

    /// Remove both halves of an entry.
    ///
    /// A missing half is tolerated; if neither half exists the entry is
    /// reported as [`IndexError::ObjectNotFound`].
    #[tracing::instrument(skip(self, cancel))]
    pub async fn delete(&self, id: &str, cancel: &CancellationToken) -> IndexResult<DeleteResponse> {
        if cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }
        let mut fan = FanOut::new(cancel);
        for half in [Half::Object, Half::Document] {
            fan.spawn(half, self.stores.clone().remove(half, id.to_owned()));
        }

        let existed = |done: Vec<(Half, bool)>| -> Vec<Half> {
            done.into_iter()
                .filter_map(|(half, existed)| existed.then_some(half))
                .collect()
        };
        match fan.join(self.deadline()).await {
            Ok(done) => {
                let mut removed = existed(done);
                if removed.is_empty() {
                    return Err(IndexError::ObjectNotFound(id.to_owned()));
                }
                removed.sort();
                info!(?removed, "deleted entry");
                Ok(DeleteResponse { removed })
            }
            Err(failure) => Err(partial_write(
                id.to_owned(),
                existed(failure.applied),
                failure.error,
            )),
        }
    }
}

/// Wrap `error` as a partial write when any half was applied.
fn partial_write(id: String, applied: Vec<Half>, error: IndexError) -> IndexError {
    if applied.is_empty() {
        return error;
    }
    warn!(id = %id, ?applied, error = %error, "entry left partially written");
    IndexError::PartialWrite {
        id,
        applied,
        source: Box::new(error),
    }
}

impl fmt::Debug for Indexer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Indexer")
            .field("allocator", &self.allocator)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
