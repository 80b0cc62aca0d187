//! Depth-first traversal over STAC document trees.
//!
//! STAC documents may embed child objects (nested item collections, search
//! results) that carry their own `links` arrays, so link rewriting has to
//! visit every `links` array at any depth, not just the top-level one.
//! Traversal depth is bounded by `serde_json`'s parse-time recursion limit,
//! so a document that made it through parsing cannot blow the stack here.

use serde_json::Value;

/// Visit every `links` array in the document, depth first.
///
/// The visitor receives each array by mutable reference and may rewrite,
/// filter, or extend it in place. Arrays are visited parent-first; the
/// traversal then descends into the (possibly rewritten) array elements so
/// nested documents inside link objects are still covered.
pub fn visit_links_arrays(node: &mut Value, visit: &mut dyn FnMut(&mut Vec<Value>)) {
    match node {
        Value::Array(items) => {
            for item in items {
                visit_links_arrays(item, visit);
            }
        }
        Value::Object(map) => {
            if let Some(Value::Array(links)) = map.get_mut("links") {
                visit(links);
            }
            for (_, child) in map.iter_mut() {
                visit_links_arrays(child, visit);
            }
        }
        _ => {}
    }
}
