//! Shared types, error model, and configuration for stacshift.
//!
//! This crate is the foundation depended on by all other stacshift crates.
//! It provides:
//! - [`StacshiftError`] — the unified error type and its retry classification
//! - Domain types ([`ChangeSetEvent`], [`FailureReport`], [`Link`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, FetchConfig, LicenseConfig, OutputConfig, PatchStoreConfig, RenderConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from,
    validate_output_root,
};
pub use error::{ErrorClass, Result, StacshiftError};
pub use types::{ChangeSetEvent, FailedKeys, FailureReport, Link};
