//! Dual-store indexing for sakuin.
//!
//! An index entry pairs an object (raw bytes) with a metadata document under
//! one generated identifier. The two halves live in independent stores; the
//! [`Indexer`] coordinates them, fanning each operation out to both stores
//! concurrently and reporting which halves were applied when one side fails.

pub mod allocator;
pub mod error;
mod fanout;
pub mod indexer;

pub use allocator::{IdAllocator, Reservation};
pub use error::{Half, IndexError, IndexResult};
pub use indexer::{
    CreateRequest, CreateResponse, DeleteResponse, Indexer, IndexerConfig, ReadResponse,
    UpdateRequest, UpdateResponse,
};
