//! Application configuration for stacshift.
//!
//! User config lives at `~/.stacshift/stacshift.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StacshiftError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "stacshift.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".stacshift";

// ---------------------------------------------------------------------------
// Config structs (matching stacshift.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Publication output settings.
    #[serde(default)]
    pub output: OutputConfig,

    /// License index and mirroring settings.
    #[serde(default)]
    pub licenses: LicenseConfig,

    /// Collection patch store settings.
    #[serde(default)]
    pub patches: PatchStoreConfig,

    /// Render annotation settings.
    #[serde(default)]
    pub render: RenderConfig,

    /// External document fetch tuning.
    #[serde(default)]
    pub fetch: FetchConfig,
}

/// `[output]` section — where transformed documents are republished.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root URL for the hub catalogue, e.g. `https://hub.example`.
    #[serde(default = "default_output_root")]
    pub root: String,

    /// Destination bucket for transformed documents.
    #[serde(default = "default_output_bucket")]
    pub bucket: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: default_output_root(),
            bucket: default_output_bucket(),
        }
    }
}

fn default_output_root() -> String {
    "https://hub.example".into()
}
fn default_output_bucket() -> String {
    "transformed".into()
}

/// `[licenses]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseConfig {
    /// Hosted zone serving canonical license documents.
    #[serde(default = "default_hosted_zone")]
    pub hosted_zone: String,

    /// Bucket holding canonical license documents and mirrored copies.
    #[serde(default = "default_license_bucket")]
    pub bucket: String,

    /// Prefix under which canonical license documents are enumerable.
    #[serde(default = "default_canonical_prefix")]
    pub canonical_prefix: String,

    /// Prefix for workspace-keyed mirrored license documents.
    #[serde(default = "default_mirror_prefix")]
    pub mirror_prefix: String,
}

impl Default for LicenseConfig {
    fn default() -> Self {
        Self {
            hosted_zone: default_hosted_zone(),
            bucket: default_license_bucket(),
            canonical_prefix: default_canonical_prefix(),
            mirror_prefix: default_mirror_prefix(),
        }
    }
}

fn default_hosted_zone() -> String {
    "https://hub.example".into()
}
fn default_license_bucket() -> String {
    "licenses".into()
}
fn default_canonical_prefix() -> String {
    "licences/spdx".into()
}
fn default_mirror_prefix() -> String {
    "licences/mirrored".into()
}

/// `[patches]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchStoreConfig {
    /// Bucket holding collection patch documents.
    #[serde(default = "default_patch_bucket")]
    pub bucket: String,

    /// Key prefix for patch lookups.
    #[serde(default = "default_patch_prefix")]
    pub prefix: String,
}

impl Default for PatchStoreConfig {
    fn default() -> Self {
        Self {
            bucket: default_patch_bucket(),
            prefix: default_patch_prefix(),
        }
    }
}

fn default_patch_bucket() -> String {
    "patches".into()
}
fn default_patch_prefix() -> String {
    "collection-patches".into()
}

/// `[render]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Collection ids that receive render metadata.
    #[serde(default = "default_renderable_collections")]
    pub collections: Vec<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            collections: default_renderable_collections(),
        }
    }
}

fn default_renderable_collections() -> Vec<String> {
    vec!["sentinel2_ard".into()]
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Per-request timeout in seconds.
    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,

    /// Total attempts before a URL is declared unreachable.
    #[serde(default = "default_fetch_attempts")]
    pub attempts: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout_secs(),
            attempts: default_fetch_attempts(),
        }
    }
}

fn default_fetch_timeout_secs() -> u64 {
    5
}
fn default_fetch_attempts() -> u32 {
    3
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.stacshift/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| StacshiftError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.stacshift/stacshift.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| StacshiftError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| StacshiftError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| StacshiftError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| StacshiftError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| StacshiftError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the configured output root parses as an absolute URL.
pub fn validate_output_root(config: &AppConfig) -> Result<()> {
    match url::Url::parse(&config.output.root) {
        Ok(parsed) if parsed.host_str().is_some() => Ok(()),
        _ => Err(StacshiftError::config(format!(
            "output root '{}' is not an absolute URL",
            config.output.root
        ))),
    }
}
