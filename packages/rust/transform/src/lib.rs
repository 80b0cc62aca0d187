//! Per-entry document transforms for republishing harvested catalog
//! entries: JSON patching, workflow collection synthesis, link graph
//! rewriting with license resolution, and render annotation.
//!
//! Each transform mutates the entry in place and is composed per entry by
//! the orchestration layer; none of them touch more than one entry.

pub mod license;
pub mod links;
pub mod patch;
pub mod render;
pub mod tree;
pub mod workflow;

pub use license::{LicenseIndex, LicenseResolver};
pub use links::{LinkPolicy, policy_for, rewrite_document};
pub use patch::apply_collection_patch;
pub use render::annotate_renders;
pub use workflow::synthesize_workflow;
