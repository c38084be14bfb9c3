//! Foundation types for sakuin.
//!
//! Every index entry pairs an opaque object with a metadata [`Document`]. This
//! crate defines the document model shared by the store contract, the merger,
//! and the orchestrator.
//!
//! # Key Types
//!
//! - [`Document`] -- String-keyed metadata mapping, possibly nested
//! - [`Value`] -- A scalar, a byte blob, a list, or a nested document
//! - [`StatInfo`] -- Lightweight existence probe result

pub mod document;
pub mod error;
pub mod stat;

pub use document::{Document, Value};
pub use error::TypeError;
pub use stat::StatInfo;
