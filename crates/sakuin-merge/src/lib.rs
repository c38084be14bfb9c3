//! Document merging for sakuin.
//!
//! Every metadata write goes through [`merge`]: there is no "replace whole
//! document" operation. Merging is additive and never removes a key from the
//! destination.

pub mod error;
pub mod merge;

pub use error::{MergeError, MergeResult};
pub use merge::merge;
