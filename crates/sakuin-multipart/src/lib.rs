//! Multipart body decoding for sakuin.
//!
//! An index request body is a `multipart/form-data` form carrying up to two
//! named parts: `metadata` (one JSON value) and `object` (raw bytes). The
//! decoder extracts both in a single pass over the body stream and leaves
//! policy (which halves are required) to the caller.

pub mod decoder;
pub mod error;

pub use decoder::{read_parts, Parts, METADATA_FIELD, OBJECT_FIELD};
pub use error::{DecodeError, DecodeResult};
