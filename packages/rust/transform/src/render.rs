//! Render-extension annotation for visualizable collections.
//!
//! A small allow-list of collection families has a known default
//! visualization. Members get the render extension schema added to
//! `stac_extensions` and a fixed `renders` table describing band
//! selection, rescaling, and tiling for map previews.

use serde_json::{Value, json};

/// Render extension schema URL added to annotated collections.
const RENDER_EXTENSION_SCHEMA: &str = "https://stac-extensions.github.io/render/v1.0.0/schema.json";

/// Annotate a collection with default render metadata in place.
///
/// No-op unless the document is a `Collection` whose id is in the
/// configured allow-list. Pure, idempotent.
pub fn annotate_renders(doc: &mut Value, renderable_collections: &[String]) {
    let Some(map) = doc.as_object_mut() else {
        return;
    };

    if map.get("type").and_then(Value::as_str) != Some("Collection") {
        return;
    }
    let Some(id) = map.get("id").and_then(Value::as_str) else {
        return;
    };
    if !renderable_collections.iter().any(|c| c == id) {
        return;
    }

    let extensions = match map.get_mut("stac_extensions") {
        Some(Value::Array(extensions)) => extensions,
        _ => {
            map.insert("stac_extensions".into(), json!([]));
            match map.get_mut("stac_extensions") {
                Some(Value::Array(extensions)) => extensions,
                _ => return,
            }
        }
    };
    if !extensions.iter().any(|e| e == RENDER_EXTENSION_SCHEMA) {
        extensions.push(json!(RENDER_EXTENSION_SCHEMA));
    }

    map.insert("renders".into(), default_renders());
}

/// Default visualization table for the ARD collection family: true-color
/// composite from the optimized GeoTIFF asset.
fn default_renders() -> Value {
    json!({
        "rgb": {
            "title": "RGB",
            "assets": ["cog"],
            "bidx": [1, 2, 3],
            "rescale": [[0, 100], [0, 100], [0, 100]],
            "resampling": "nearest",
            "tilematrixsets": {
                "WebMercatorQuad": [0, 30]
            }
        }
    })
}
