//! Object-key transformation between harvested and published layouts.
//!
//! Harvested keys carry the harvester's own prefixes and the STAC API
//! path convention (`/collections/`, `/items/`); published keys are flat
//! catalog paths with a `.json` suffix. URLs inside documents keep their
//! API-style paths — only storage keys are reformatted.

/// Prefix the git-based harvester stamps onto keys it emits.
const HARVEST_PREFIX: &str = "git-harvester/";

/// Catalog path of a harvested key: harvester prefix stripped when
/// present, otherwise the event's `source` root swapped for `target`.
///
/// The API path convention (`/collections/`, `/items/`) is still intact
/// here; patch lookup depends on the `/collections/` boundary.
pub fn catalog_path(key: &str, source: &str, target: &str) -> String {
    let updated = key.replacen(HARVEST_PREFIX, "", 1);
    if updated == key {
        key.replacen(source, target, 1)
    } else {
        updated
    }
}

/// Map a harvested key to its published key: [`catalog_path`] normalized
/// via [`reformat_key`].
pub fn transform_key(key: &str, source: &str, target: &str) -> String {
    reformat_key(&catalog_path(key, source, target))
}

/// Normalize a key for the published layout: API path segments removed,
/// relative-path markers stripped, trailing slash dropped, `.json`
/// suffix enforced.
pub fn reformat_key(key: &str) -> String {
    let mut flattened = key.replace("/collections", "").replace("/items", "");
    // Only whole `./` segments are relative-path markers; a segment that
    // merely ends in `.` is part of the name.
    while let Some(rest) = flattened.strip_prefix("./") {
        flattened = rest.to_string();
    }
    while flattened.contains("/./") {
        flattened = flattened.replace("/./", "/");
    }
    let trimmed = flattened.trim_end_matches('/');
    if trimmed.ends_with(".json") {
        trimmed.to_string()
    } else {
        format!("{trimmed}.json")
    }
}
