//! Per-entry transform composition.
//!
//! One entry flows through: patch application, catalog-root id correction,
//! workflow synthesis, link graph rewriting, license resolution, render
//! annotation, serialization. Workflow synthesis must precede link
//! rewriting so the placeholder self link it plants gets rewritten onto
//! the output root. Payloads that are not JSON documents bypass every
//! JSON-aware step and pass through byte-identical.

use bytes::Bytes;
use serde_json::Value;
use tracing::debug;

use stacshift_fetch::Fetcher;
use stacshift_shared::{AppConfig, ChangeSetEvent, Result, StacshiftError};
use stacshift_store::ObjectStore;
use stacshift_transform::{
    LicenseIndex, LicenseResolver, annotate_renders, apply_collection_patch, rewrite_document,
    synthesize_workflow,
};

/// Composes the transform chain for single entries.
pub struct Transformer<'a> {
    config: &'a AppConfig,
    store: &'a dyn ObjectStore,
    fetcher: &'a Fetcher,
    license_index: LicenseIndex,
    /// Absolute URL the `target` catalog path resolves to under the
    /// output root.
    target_location: String,
}

impl<'a> Transformer<'a> {
    /// Build a transformer for one change-set event's `target`.
    pub fn new(
        config: &'a AppConfig,
        store: &'a dyn ObjectStore,
        fetcher: &'a Fetcher,
        license_index: LicenseIndex,
        target: &str,
    ) -> Result<Self> {
        let target_location = resolve_target_location(&config.output.root, target)?;
        Ok(Self {
            config,
            store,
            fetcher,
            license_index,
            target_location,
        })
    }

    /// Absolute published location for this event's target path.
    pub fn target_location(&self) -> &str {
        &self.target_location
    }

    /// Run the full transform chain over one entry body.
    ///
    /// `key` is the inbound object key; `cat_path` is its catalog path
    /// with the `/collections/` convention still intact, which keys the
    /// patch lookup.
    pub async fn transform_entry(
        &self,
        body: Bytes,
        key: &str,
        cat_path: &str,
        event: &ChangeSetEvent,
    ) -> Result<Bytes> {
        let mut doc: Value = match serde_json::from_slice(&body) {
            Ok(doc) => doc,
            Err(_) => {
                // Harvests include non-JSON artifacts (plain CWL scripts,
                // readmes); they republish byte-identical.
                debug!(key, "payload is not a JSON document, passing through");
                return Ok(body);
            }
        };

        apply_collection_patch(&mut doc, cat_path, &self.config.patches, self.store).await?;
        update_root_catalog_id(&mut doc, &event.target);
        synthesize_workflow(&mut doc, key, &event.source, self.fetcher).await?;
        rewrite_document(
            &mut doc,
            key,
            &event.source,
            &self.target_location,
            &self.config.output.root,
        )?;

        let resolver = LicenseResolver::new(
            &self.config.licenses,
            self.store,
            self.fetcher,
            self.license_index.clone(),
        );
        resolver
            .ensure_license_links(&mut doc, event.workspace.as_deref())
            .await;

        annotate_renders(&mut doc, &self.config.render.collections);

        serde_json::to_vec(&doc)
            .map(Bytes::from)
            .map_err(|e| StacshiftError::malformed(format!("serializing {key}: {e}")))
    }
}

/// Resolve the event `target` against the configured output root.
pub fn resolve_target_location(output_root: &str, target: &str) -> Result<String> {
    let root = url::Url::parse(output_root).map_err(|e| {
        StacshiftError::config(format!("output root '{output_root}' is not a URL: {e}"))
    })?;
    let joined = root.join(target).map_err(|e| {
        StacshiftError::validation(format!("target '{target}' does not resolve: {e}"))
    })?;
    Ok(joined.to_string())
}

/// Overwrite a root catalog's id with the last segment of the target path.
///
/// Applies only to `Catalog` documents that are the root of their own tree,
/// detected by their `root` link pointing at their own `self` href.
fn update_root_catalog_id(doc: &mut Value, target: &str) {
    let Some(map) = doc.as_object_mut() else {
        return;
    };
    if map.get("type").and_then(Value::as_str) != Some("Catalog") {
        return;
    }

    let href_of = |map: &serde_json::Map<String, Value>, rel: &str| -> Option<String> {
        map.get("links")?
            .as_array()?
            .iter()
            .find(|l| l.get("rel").and_then(Value::as_str) == Some(rel))
            .and_then(|l| l.get("href").and_then(Value::as_str))
            .map(str::to_owned)
    };

    let (Some(root), Some(own)) = (href_of(map, "root"), href_of(map, "self")) else {
        return;
    };
    if root != own {
        return;
    }

    if let Some(id) = target.trim_end_matches('/').rsplit('/').next() {
        if !id.is_empty() {
            map.insert("id".into(), Value::String(id.to_string()));
        }
    }
}
