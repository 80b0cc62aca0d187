//! Dataset-specific JSON patching of collection documents.
//!
//! Operators drop RFC 6902 patch documents into the patch store to correct
//! or enrich individual collections without touching the harvest source.
//! Patch lookup is keyed by the `{catalog}/collections/{collection}`
//! convention of the entry's catalog path. A missing patch is the normal
//! case; a patch that fails to apply is logged and the entry keeps its
//! pre-patch content.

use json_patch::Patch;
use serde_json::Value;
use tracing::{debug, warn};

use stacshift_shared::{PatchStoreConfig, Result, StacshiftError};
use stacshift_store::ObjectStore;

/// Apply the stored patch for this collection, if one exists.
///
/// No-op for non-Collection documents and for catalog paths outside the
/// `{catalog}/collections/{collection}` convention. Only transient store
/// trouble is an error; everything else resolves to "document unchanged".
pub async fn apply_collection_patch(
    doc: &mut Value,
    cat_path: &str,
    config: &PatchStoreConfig,
    store: &dyn ObjectStore,
) -> Result<()> {
    if doc.get("type").and_then(Value::as_str) != Some("Collection") {
        return Ok(());
    }
    let Some(key) = patch_key(cat_path, &config.prefix) else {
        return Ok(());
    };

    let body = match store.get(&config.bucket, &key).await {
        Ok(body) => body,
        Err(StacshiftError::NotFound { .. }) => {
            debug!(key, "no patch for collection");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let patch: Patch = match serde_json::from_slice(&body) {
        Ok(patch) => patch,
        Err(e) => {
            warn!(key, error = %e, "patch document is not a valid JSON patch, skipping");
            return Ok(());
        }
    };

    // Apply against a scratch copy so a mid-sequence failure cannot leave
    // the entry half-patched.
    let mut patched = doc.clone();
    match json_patch::patch(&mut patched, &patch) {
        Ok(()) => {
            debug!(key, operations = patch.0.len(), "applied collection patch");
            *doc = patched;
        }
        Err(e) => {
            warn!(key, error = %e, "patch failed to apply, keeping original document");
        }
    }
    Ok(())
}

/// Derive the patch-store key from a catalog path.
///
/// `supported-datasets/ceda/collections/sentinel2_ard.json` maps to
/// `{prefix}/supported-datasets/ceda/sentinel2_ard.json`. Paths that do not
/// split cleanly into catalog and collection (no `/collections/` boundary,
/// or trailing item segments) have no patch key.
pub fn patch_key(cat_path: &str, prefix: &str) -> Option<String> {
    let trimmed = cat_path.strip_suffix(".json").unwrap_or(cat_path);
    let (catalog, collection) = trimmed.split_once("/collections/")?;
    if catalog.is_empty() || collection.is_empty() || collection.contains('/') {
        return None;
    }
    Some(format!(
        "{}/{catalog}/{collection}.json",
        prefix.trim_matches('/')
    ))
}
