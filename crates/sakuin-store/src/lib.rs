//! Storage contract for sakuin index entries.
//!
//! An index entry is split across two independent stores: an
//! [`ObjectStore`] holding opaque bytes and a [`DocumentStore`] holding
//! metadata documents. Both are keyed by the same string id and are never
//! coordinated with each other.
//!
//! # Storage Backends
//!
//! - [`InMemoryObjectStore`] / [`InMemoryDocumentStore`] -- `HashMap`-based
//!   reference backends for tests and embedding
//! - [`FileObjectStore`] / [`FileDocumentStore`] -- one file per entry under a
//!   root directory
//!
//! # Conformance
//!
//! Every backend must pass the black-box suite in `conformance` (enabled in
//! tests and with the `conformance` feature) before it is considered correct.
//! The rules it checks:
//!
//! 1. `get`, `update`, and `delete` on an absent id fail with a not-found
//!    error carrying that id.
//! 2. `stat` on an absent id reports `{exists: false, size: 0}` and succeeds.
//! 3. `put` always succeeds and replaces any existing object.
//! 4. `upsert` merges into an existing document and inserts otherwise.

#[cfg(any(test, feature = "conformance"))]
pub mod conformance;
pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use file::{FileDocumentStore, FileObjectStore};
pub use memory::{InMemoryDocumentStore, InMemoryObjectStore};
pub use traits::{merge_for_upsert, DocumentStore, ObjectStore};
