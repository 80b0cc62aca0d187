//! Link graph rewriting for republished catalog entries.
//!
//! Every harvested document carries links rooted at the origin catalog.
//! Republishing under the hub's output root means every `links` array at
//! any depth must be rewritten: catalog-structure links move to the new
//! root, genuinely external links pass through verbatim, and links that
//! only made sense against the origin's API surface are dropped.

use serde_json::Value;
use tracing::{info, warn};
use url::Url;

use stacshift_shared::{Result, StacshiftError};

use crate::tree::visit_links_arrays;

/// Relation types whose hrefs are rewritten onto the output root.
const REWRITE_RELATIONS: &[&str] = &[
    "child",
    "collection",
    "item",
    "items",
    "parent",
    "root",
    "self",
];

/// Relation types pointing at external, non-catalog resources; kept verbatim.
const KEEP_RELATIONS: &[&str] = &[
    "about",
    "author",
    "cite-as",
    "copyright",
    "external",
    "license",
    "lrdd",
    "service",
    "service-desc",
    "service-doc",
    "service-meta",
    "thumbnail",
    "via",
];

/// Policy class for a link relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPolicy {
    /// Href is rewritten onto the output root.
    Rewrite,
    /// Link passes through unchanged.
    Keep,
    /// Link is omitted from the result (origin API surface: `search`,
    /// `conformance`, `queryables`, ...).
    Drop,
}

/// Look up the policy class for a relation type.
pub fn policy_for(rel: &str) -> LinkPolicy {
    if REWRITE_RELATIONS.contains(&rel) {
        LinkPolicy::Rewrite
    } else if KEEP_RELATIONS.contains(&rel) {
        LinkPolicy::Keep
    } else {
        LinkPolicy::Drop
    }
}

// ---------------------------------------------------------------------------
// Document entry point
// ---------------------------------------------------------------------------

/// Rewrite the entire link graph of a document in place.
///
/// Ensures `self` and `root` links exist before the rewrite pass so a
/// synthesized self link (built from `source` + the original key) is itself
/// rewritten onto the output root. Returns `Validation` when the computed
/// self URL is not a well-formed absolute URL, leaving the document's links
/// untouched.
pub fn rewrite_document(
    doc: &mut Value,
    file_name: &str,
    source: &str,
    target_location: &str,
    output_root: &str,
) -> Result<()> {
    let Some(map) = doc.as_object_mut() else {
        return Ok(());
    };

    // Origin API metadata is meaningless once republished.
    map.remove("conformsTo");

    let self_link = match find_self_href(map) {
        Some(href) => href,
        None => {
            info!(file_name, "no self link present, adding temporary link");
            // Built from source so the rewrite pass below replaces it.
            let temporary = format!("{source}{file_name}");
            add_link_if_missing(map, "self", &temporary);
            temporary
        }
    };

    let output_self = self_link.replacen(source, target_location, 1);
    validate_self_url(&output_self).map_err(|e| {
        warn!(
            file_name,
            self_link, source, target_location, "self link does not rewrite to a valid URL"
        );
        e
    })?;

    add_link_if_missing(map, "root", output_root);
    add_link_if_missing(map, "self", &output_self);

    let ctx = RewriteContext {
        source,
        target_location,
        output_root,
        output_self: &output_self,
    };
    visit_links_arrays(doc, &mut |links| rewrite_links_array(links, &ctx));

    Ok(())
}

struct RewriteContext<'a> {
    source: &'a str,
    target_location: &'a str,
    output_root: &'a str,
    output_self: &'a str,
}

/// Apply the rewrite/keep/drop policy to one `links` array in place.
fn rewrite_links_array(links: &mut Vec<Value>, ctx: &RewriteContext<'_>) {
    let mut rewritten = Vec::with_capacity(links.len());

    for mut link in links.drain(..) {
        let (Some(href), Some(rel)) = (
            link.get("href").and_then(Value::as_str).map(str::to_owned),
            link.get("rel").and_then(Value::as_str).map(str::to_owned),
        ) else {
            // A link without rel and href cannot be classified or republished.
            continue;
        };

        // Already an output-root link: keep unchanged so reprocessing a
        // transformed document is a no-op.
        if href.starts_with(ctx.output_root) {
            rewritten.push(link);
            continue;
        }

        match policy_for(&rel) {
            LinkPolicy::Rewrite => {
                if let Some(swapped) = swap_prefix(&href, ctx.source, ctx.target_location) {
                    link["href"] = Value::String(swapped);
                } else if rel == "parent" {
                    // STAC convention: a catalog's parent is two path
                    // segments up from the entry's own self link.
                    link["href"] = Value::String(ancestor_two_up(ctx.output_self));
                } else if href.starts_with(ctx.output_root.trim_matches('/')) {
                    // Output-root link modulo slashes; leave as-is.
                } else if let Some(resolved) = resolve_relative(&href, ctx.output_self) {
                    link["href"] = Value::String(resolved);
                } else {
                    // Absolute href with an unrecognized root; it cannot be
                    // trusted to resolve once republished.
                    continue;
                }
                rewritten.push(link);
            }
            LinkPolicy::Keep => rewritten.push(link),
            LinkPolicy::Drop => {}
        }
    }

    *links = rewritten;
}

// ---------------------------------------------------------------------------
// Href arithmetic
// ---------------------------------------------------------------------------

/// Swap the `source` prefix for `target` without duplicating or dropping a
/// path separator. Returns `None` when `href` is not rooted under `source`.
fn swap_prefix(href: &str, source: &str, target: &str) -> Option<String> {
    let rest = href.strip_prefix(source)?;
    if rest.is_empty() {
        return Some(target.to_string());
    }
    Some(match (target.ends_with('/'), rest.starts_with('/')) {
        (true, true) => format!("{}{}", target, &rest[1..]),
        (false, false) => format!("{target}/{rest}"),
        _ => format!("{target}{rest}"),
    })
}

/// Drop the last two path segments of a URL.
fn ancestor_two_up(url: &str) -> String {
    let mut remainder = url;
    for _ in 0..2 {
        if let Some(idx) = remainder.rfind('/') {
            remainder = &remainder[..idx];
        }
    }
    remainder.to_string()
}

/// Resolve a relative href against the self URL. `Url::join` resolves
/// against the base's containing directory, which is the behavior wanted
/// here.
///
/// Returns `None` for absolute or protocol-relative hrefs; those are not
/// relative links and must not be resolved.
fn resolve_relative(href: &str, output_self: &str) -> Option<String> {
    match Url::parse(href) {
        Ok(_) => None,
        Err(url::ParseError::RelativeUrlWithoutBase) if !href.starts_with("//") => {
            let base = Url::parse(output_self).ok()?;
            base.join(href).ok().map(|u| u.to_string())
        }
        Err(_) => None,
    }
}

/// Check that a computed self URL is a well-formed absolute URL with a
/// scheme, a host, and no empty path segments (one trailing slash allowed).
fn validate_self_url(url: &str) -> Result<()> {
    let parsed = Url::parse(url)
        .map_err(|e| StacshiftError::validation(format!("self link '{url}': {e}")))?;

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(StacshiftError::validation(format!(
            "self link '{url}' has no host"
        )));
    }

    if let Some(segments) = parsed.path_segments() {
        let segments: Vec<_> = segments.collect();
        let interior_empty = segments
            .iter()
            .enumerate()
            .any(|(i, s)| s.is_empty() && i + 1 != segments.len());
        if interior_empty {
            return Err(StacshiftError::validation(format!(
                "self link '{url}' contains empty path segments"
            )));
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Link presence helpers
// ---------------------------------------------------------------------------

/// Href of the first top-level `self` link, if any.
fn find_self_href(map: &serde_json::Map<String, Value>) -> Option<String> {
    map.get("links")?
        .as_array()?
        .iter()
        .find(|l| l.get("rel").and_then(Value::as_str) == Some("self"))
        .and_then(|l| l.get("href").and_then(Value::as_str))
        .map(str::to_owned)
}

/// Ensure a link with the given rel exists in the top-level `links` array,
/// creating the array when absent.
fn add_link_if_missing(map: &mut serde_json::Map<String, Value>, rel: &str, href: &str) {
    let new_link = serde_json::json!({"rel": rel, "href": href});

    match map.get_mut("links") {
        Some(Value::Array(links)) => {
            let exists = links
                .iter()
                .any(|l| l.get("rel").and_then(Value::as_str) == Some(rel));
            if !exists {
                links.push(new_link);
            }
        }
        _ => {
            map.insert("links".into(), Value::Array(vec![new_link]));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SOURCE: &str = "https://example.link.for.test/";
    const OUTPUT_ROOT: &str = "https://output.root.test";
    const TARGET_LOCATION: &str = "https://output.root.test/target_directory/";

    fn item_with_links() -> Value {
        json!({
            "type": "Feature",
            "id": "example_stac_feature",
            "links": [
                {"rel": "self", "href": "https://example.link.for.test/collections/example_collection/items/example_stac_feature"},
                {"rel": "root", "href": "https://example.link.for.test/"},
                {"rel": "parent", "href": "https://example.link.for.test/collections/example_collection"},
                {"rel": "collection", "href": "https://example.link.for.test/collections/example_collection"}
            ]
        })
    }

    #[test]
    fn rewrites_source_rooted_links() {
        let mut doc = item_with_links();
        rewrite_document(
            &mut doc,
            "test.json",
            SOURCE,
            TARGET_LOCATION,
            OUTPUT_ROOT,
        )
        .expect("rewrite");

        let links = doc["links"].as_array().unwrap();
        assert_eq!(
            links[0]["href"],
            "https://output.root.test/target_directory/collections/example_collection/items/example_stac_feature"
        );
        assert_eq!(links[1]["href"], "https://output.root.test/target_directory/");
        assert_eq!(
            links[2]["href"],
            "https://output.root.test/target_directory/collections/example_collection"
        );
        assert_eq!(
            links[3]["href"],
            "https://output.root.test/target_directory/collections/example_collection"
        );
    }

    #[test]
    fn rewriting_is_idempotent() {
        let mut doc = item_with_links();
        rewrite_document(&mut doc, "test.json", SOURCE, TARGET_LOCATION, OUTPUT_ROOT)
            .expect("first rewrite");
        let first = doc.clone();

        rewrite_document(&mut doc, "test.json", SOURCE, TARGET_LOCATION, OUTPUT_ROOT)
            .expect("second rewrite");
        assert_eq!(doc, first);
    }

    #[test]
    fn adds_missing_self_and_root_links() {
        let mut doc = json!({"type": "Catalog", "id": "cat"});
        rewrite_document(
            &mut doc,
            "catalogs/cat.json",
            SOURCE,
            TARGET_LOCATION,
            OUTPUT_ROOT,
        )
        .expect("rewrite");

        let links = doc["links"].as_array().unwrap();
        let self_href = links
            .iter()
            .find(|l| l["rel"] == "self")
            .and_then(|l| l["href"].as_str())
            .unwrap();
        let root_href = links
            .iter()
            .find(|l| l["rel"] == "root")
            .and_then(|l| l["href"].as_str())
            .unwrap();

        assert_eq!(
            self_href,
            "https://output.root.test/target_directory/catalogs/cat.json"
        );
        assert_eq!(root_href, OUTPUT_ROOT);
        assert!(Url::parse(self_href).is_ok());
        assert!(Url::parse(root_href).is_ok());
    }

    #[test]
    fn drops_unrecognized_absolute_rewrite_links_but_keeps_external() {
        let mut doc = json!({
            "links": [
                {"rel": "self", "href": "https://example.link.for.test/collections/c/items/i"},
                {"rel": "child", "href": "https://somewhere.else.test/collections/other"},
                {"rel": "about", "href": "https://somewhere.else.test/collections/other"}
            ]
        });
        rewrite_document(&mut doc, "test.json", SOURCE, TARGET_LOCATION, OUTPUT_ROOT)
            .expect("rewrite");

        let links = doc["links"].as_array().unwrap();
        assert!(
            !links
                .iter()
                .any(|l| l["rel"] == "child" && l["href"] == "https://somewhere.else.test/collections/other")
        );
        assert!(
            links
                .iter()
                .any(|l| l["rel"] == "about" && l["href"] == "https://somewhere.else.test/collections/other")
        );
    }

    #[test]
    fn drops_origin_api_relations() {
        let mut doc = json!({
            "links": [
                {"rel": "self", "href": "https://example.link.for.test/collections/c"},
                {"rel": "search", "href": "https://example.link.for.test/search"},
                {"rel": "conformance", "href": "https://example.link.for.test/conformance"},
                {"rel": "queryables", "href": "https://example.link.for.test/queryables"}
            ]
        });
        rewrite_document(&mut doc, "test.json", SOURCE, TARGET_LOCATION, OUTPUT_ROOT)
            .expect("rewrite");

        let links = doc["links"].as_array().unwrap();
        let rels: Vec<_> = links.iter().map(|l| l["rel"].as_str().unwrap()).collect();
        assert!(!rels.contains(&"search"));
        assert!(!rels.contains(&"conformance"));
        assert!(!rels.contains(&"queryables"));
    }

    #[test]
    fn resolves_relative_links_against_self() {
        let mut doc = json!({
            "links": [
                {"rel": "self", "href": "https://example.link.for.test/collections/c/items/i"},
                {"rel": "child", "href": "nested/child"}
            ]
        });
        rewrite_document(&mut doc, "test.json", SOURCE, TARGET_LOCATION, OUTPUT_ROOT)
            .expect("rewrite");

        let links = doc["links"].as_array().unwrap();
        let child = links.iter().find(|l| l["rel"] == "child").unwrap();
        assert_eq!(
            child["href"],
            "https://output.root.test/target_directory/collections/c/items/nested/child"
        );
    }

    #[test]
    fn parent_link_is_two_segments_up_from_self() {
        let mut doc = json!({
            "links": [
                {"rel": "self", "href": "https://example.link.for.test/collections/c/items/i"},
                {"rel": "parent", "href": "https://unrelated.origin.test/whatever"}
            ]
        });
        rewrite_document(&mut doc, "test.json", SOURCE, TARGET_LOCATION, OUTPUT_ROOT)
            .expect("rewrite");

        let links = doc["links"].as_array().unwrap();
        let parent = links.iter().find(|l| l["rel"] == "parent").unwrap();
        assert_eq!(
            parent["href"],
            "https://output.root.test/target_directory/collections/c"
        );
    }

    #[test]
    fn rewrites_nested_links_arrays_in_place() {
        let mut doc = json!({
            "links": [
                {"rel": "self", "href": "https://example.link.for.test/collections/c"}
            ],
            "features": [{
                "links": [
                    {"rel": "self", "href": "https://example.link.for.test/collections/c/items/i"},
                    {"rel": "search", "href": "https://example.link.for.test/search"}
                ]
            }]
        });
        rewrite_document(&mut doc, "test.json", SOURCE, TARGET_LOCATION, OUTPUT_ROOT)
            .expect("rewrite");

        let nested = doc["features"][0]["links"].as_array().unwrap();
        assert_eq!(nested.len(), 1);
        assert_eq!(
            nested[0]["href"],
            "https://output.root.test/target_directory/collections/c/items/i"
        );
        // The top-level array keeps its own links; nothing was flattened.
        assert!(doc["links"].as_array().unwrap().len() >= 1);
    }

    #[test]
    fn invalid_self_rewrite_is_a_validation_error() {
        let mut doc = json!({
            "links": [{"rel": "self", "href": "not-even-close"}]
        });
        let err = rewrite_document(&mut doc, "test.json", SOURCE, "/relative/", OUTPUT_ROOT)
            .unwrap_err();
        assert!(matches!(err, StacshiftError::Validation { .. }));
        // Links were left untouched.
        assert_eq!(doc["links"][0]["href"], "not-even-close");
    }

    #[test]
    fn removes_conforms_to() {
        let mut doc = json!({
            "conformsTo": ["https://api.stacspec.org/v1.0.0/core"],
            "links": [{"rel": "self", "href": "https://example.link.for.test/collections/c"}]
        });
        rewrite_document(&mut doc, "test.json", SOURCE, TARGET_LOCATION, OUTPUT_ROOT)
            .expect("rewrite");
        assert!(doc.get("conformsTo").is_none());
    }

    #[test]
    fn swap_prefix_is_boundary_safe() {
        assert_eq!(
            swap_prefix("https://src/a/b", "https://src/", "https://tgt/").as_deref(),
            Some("https://tgt/a/b")
        );
        assert_eq!(
            swap_prefix("https://src/a", "https://src", "https://tgt").as_deref(),
            Some("https://tgt/a")
        );
        assert_eq!(
            swap_prefix("https://src/", "https://src/", "https://tgt/x/").as_deref(),
            Some("https://tgt/x/")
        );
        assert_eq!(swap_prefix("https://other/a", "https://src/", "https://tgt/"), None);
    }

    #[test]
    fn policy_table_lookup() {
        assert_eq!(policy_for("self"), LinkPolicy::Rewrite);
        assert_eq!(policy_for("license"), LinkPolicy::Keep);
        assert_eq!(policy_for("search"), LinkPolicy::Drop);
        assert_eq!(policy_for("queryables"), LinkPolicy::Drop);
    }

    #[test]
    fn validate_self_url_rejects_empty_segments() {
        assert!(validate_self_url("https://host/a/b").is_ok());
        assert!(validate_self_url("https://host/a/b/").is_ok());
        assert!(validate_self_url("https://host/a//b").is_err());
        assert!(validate_self_url("nohost").is_err());
    }
}
