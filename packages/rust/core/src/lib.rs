//! Batch orchestration for the stacshift transformation stage.
//!
//! This crate drives the per-entry transform chain over whole change-set
//! events: key transformation between harvested and published layouts,
//! the transform orchestrator, and the batch handler with its
//! retry-vs-permanent failure classification.

pub mod batch;
pub mod keys;
pub mod orchestrator;

pub use batch::{AckDecision, BatchOutcome, handle_event};
pub use keys::{catalog_path, reformat_key, transform_key};
pub use orchestrator::{Transformer, resolve_target_location};
