//! STAC Collection synthesis for workflow entries.
//!
//! A workflow entry arrives as a (possibly bare) document whose
//! `assets.cwl_script.href` points at an externally hosted CWL definition.
//! The authoritative metadata lives in that definition's `Workflow` graph
//! node, so synthesis fetches it, scrapes the node, and completes every
//! absent or falsy STAC Collection field from it, falling back to fixed
//! defaults. Fields the entry already carries are never overwritten.

use serde_json::{Map, Value, json};
use tracing::{info, warn};
use uuid::Uuid;

use stacshift_fetch::Fetcher;
use stacshift_shared::{Result, StacshiftError};

/// Namespace tag prefixed onto identifiers derived from workflow nodes.
const WORKFLOW_ID_PREFIX: &str = "workflow__";

/// STAC version stamped onto synthesized collections.
const STAC_VERSION: &str = "1.0.0";

/// Sentinel for required fields with no derivable value (license,
/// providers, an undocumented workflow's description).
const NOT_APPLICABLE: &str = "N/A";

/// Top-level key order of a published STAC Collection. Reordering keeps
/// only these keys, so synthesis also sheds scratch fields.
const COLLECTION_FIELD_ORDER: &[&str] = &[
    "type",
    "stac_version",
    "stac_extensions",
    "id",
    "title",
    "description",
    "keywords",
    "license",
    "providers",
    "extent",
    "summaries",
    "links",
    "assets",
];

/// Metadata scraped from the `Workflow` node of a CWL definition.
#[derive(Debug, Default, Clone)]
struct ScrapedWorkflow {
    id: Option<String>,
    doc: Option<String>,
    inputs: Option<Value>,
    outputs: Option<Value>,
}

/// Complete a workflow entry into a full STAC Collection in place.
///
/// No-op for documents without `assets.cwl_script.href`. A definition that
/// cannot be fetched degrades to default-only completion; a definition that
/// fetches but does not parse, or parses without a `Workflow` node, is
/// malformed input and fails the entry.
pub async fn synthesize_workflow(
    doc: &mut Value,
    file_name: &str,
    source: &str,
    fetcher: &Fetcher,
) -> Result<()> {
    let Some(cwl_href) = doc
        .pointer("/assets/cwl_script/href")
        .and_then(Value::as_str)
        .map(str::to_owned)
    else {
        return Ok(());
    };

    let scraped = match fetcher.fetch_text(&cwl_href).await {
        Ok(body) => Some(scrape_workflow_node(&body)?),
        Err(e) => {
            warn!(
                cwl_href,
                error = %e,
                "workflow definition unreachable, completing from defaults only"
            );
            None
        }
    };

    let Some(map) = doc.as_object_mut() else {
        return Err(StacshiftError::malformed(
            "workflow entry is not a JSON object",
        ));
    };

    complete_collection(map, scraped.as_ref());
    force_self_link(map, &format!("{source}{file_name}"));
    reorder_collection_fields(map);

    info!(file_name, cwl_href, "synthesized workflow collection");
    Ok(())
}

/// Parse a CWL definition and scrape its `Workflow` node.
///
/// Accepts both packed documents (`$graph` array of process nodes) and a
/// bare document whose top level is itself the workflow.
fn scrape_workflow_node(body: &str) -> Result<ScrapedWorkflow> {
    let parsed: Value = serde_yaml::from_str(body)
        .map_err(|e| StacshiftError::malformed(format!("workflow definition: {e}")))?;

    let node = find_workflow_node(&parsed).ok_or_else(|| {
        warn!("workflow definition has no node with class Workflow");
        StacshiftError::malformed("workflow definition has no Workflow node")
    })?;

    Ok(ScrapedWorkflow {
        // Packed CWL prefixes node identifiers with '#'.
        id: node
            .get("id")
            .and_then(Value::as_str)
            .map(|id| id.trim_start_matches('#').to_string())
            .filter(|id| !id.is_empty()),
        doc: node
            .get("doc")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .filter(|d| !d.is_empty()),
        inputs: node.get("inputs").cloned(),
        outputs: node.get("outputs").cloned(),
    })
}

fn find_workflow_node(parsed: &Value) -> Option<&Value> {
    let is_workflow =
        |node: &Value| node.get("class").and_then(Value::as_str) == Some("Workflow");

    match parsed.get("$graph").and_then(Value::as_array) {
        Some(graph) => graph.iter().find(|n| is_workflow(n)),
        None => is_workflow(parsed).then_some(parsed),
    }
}

// ---------------------------------------------------------------------------
// Field completion
// ---------------------------------------------------------------------------

/// Fill every absent-or-falsy Collection field, preferring scraped metadata
/// over fixed defaults.
fn complete_collection(map: &mut Map<String, Value>, scraped: Option<&ScrapedWorkflow>) {
    fill(map, "type", || json!("Collection"));
    fill(map, "stac_version", || json!(STAC_VERSION));
    fill(map, "stac_extensions", || json!([]));

    // Identifier derivation: the workflow node's own id wins, then the
    // entry's title stands in, then a fresh unique id.
    if is_falsy(map.get("id")) {
        let id = match scraped.and_then(|s| s.id.as_deref()) {
            Some(node_id) => format!("{WORKFLOW_ID_PREFIX}{node_id}"),
            None => match map.get("title").and_then(Value::as_str).filter(|t| !t.is_empty()) {
                Some(title) => title.to_string(),
                None => format!("{WORKFLOW_ID_PREFIX}{}", Uuid::new_v4()),
            },
        };
        map.insert("id".into(), json!(id));
    }
    if is_falsy(map.get("title")) {
        let id = map.get("id").cloned().unwrap_or(Value::Null);
        map.insert("title".into(), id);
    }

    if is_falsy(map.get("description")) {
        let description = scraped
            .and_then(|s| s.doc.as_deref())
            .unwrap_or(NOT_APPLICABLE);
        map.insert("description".into(), json!(description));
    }

    fill(map, "keywords", || json!(["workflow"]));
    fill(map, "license", || json!(NOT_APPLICABLE));
    fill(map, "providers", || json!(NOT_APPLICABLE));
    fill_extent(map);
    fill_summaries(map, scraped);
    fill(map, "links", || json!([]));
}

/// Insert the default when the key is absent or falsy.
fn fill(map: &mut Map<String, Value>, key: &str, default: impl FnOnce() -> Value) {
    if is_falsy(map.get(key)) {
        map.insert(key.to_string(), default());
    }
}

/// Whole-Earth bbox and unbounded time interval, filled per sub-level so a
/// partially supplied extent keeps its populated siblings.
fn fill_extent(map: &mut Map<String, Value>) {
    fill(map, "extent", || json!({}));
    let Some(Value::Object(extent)) = map.get_mut("extent") else {
        return;
    };

    fill(extent, "spatial", || json!({}));
    if let Some(Value::Object(spatial)) = extent.get_mut("spatial") {
        fill(spatial, "bbox", || json!([[-180.0, -90.0, 180.0, 90.0]]));
    }

    fill(extent, "temporal", || json!({}));
    if let Some(Value::Object(temporal)) = extent.get_mut("temporal") {
        fill(temporal, "interval", || json!([[null, null]]));
    }
}

/// Summaries carry the workflow's input/output definitions verbatim, even
/// when those are empty mappings.
fn fill_summaries(map: &mut Map<String, Value>, scraped: Option<&ScrapedWorkflow>) {
    fill(map, "summaries", || json!({}));
    let Some(Value::Object(summaries)) = map.get_mut("summaries") else {
        return;
    };

    if let Some(scraped) = scraped {
        if summaries.get("inputs").is_none() {
            if let Some(inputs) = &scraped.inputs {
                summaries.insert("inputs".into(), inputs.clone());
            }
        }
        if summaries.get("outputs").is_none() {
            if let Some(outputs) = &scraped.outputs {
                summaries.insert("outputs".into(), outputs.clone());
            }
        }
    }
}

/// Point the `self` link at `source + file_name` so the link rewriting
/// stage computes the published location from a consistent base.
fn force_self_link(map: &mut Map<String, Value>, placeholder_href: &str) {
    let Some(Value::Array(links)) = map.get_mut("links") else {
        return;
    };

    match links
        .iter_mut()
        .find(|l| l.get("rel").and_then(Value::as_str) == Some("self"))
    {
        Some(link) => {
            link["href"] = json!(placeholder_href);
        }
        None => links.push(json!({"rel": "self", "href": placeholder_href})),
    }
}

/// Rewrite the map into canonical Collection field order, dropping keys
/// outside the published schema.
fn reorder_collection_fields(map: &mut Map<String, Value>) {
    let mut ordered = Map::new();
    for key in COLLECTION_FIELD_ORDER {
        if let Some(value) = map.remove(*key) {
            ordered.insert((*key).to_string(), value);
        }
    }
    *map = ordered;
}

/// Falsy in the completion sense: null, false, zero, or an empty
/// string/array/object.
fn is_falsy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Bool(b)) => !b,
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        Some(Value::Object(o)) => o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stacshift_shared::FetchConfig;

    const SOURCE: &str = "https://example.link.for.test/";

    fn test_fetcher() -> Fetcher {
        Fetcher::new(&FetchConfig {
            timeout_secs: 2,
            attempts: 1,
        })
        .unwrap()
    }

    const PACKED_CWL: &str = r#"
cwlVersion: v1.0
$graph:
  - class: Workflow
    id: demo
    doc: Demonstration workflow
    inputs: {}
    outputs: {}
  - class: CommandLineTool
    id: step1
"#;

    async fn serve_cwl(body: &str) -> wiremock::MockServer {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/workflow.cwl"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;
        server
    }

    fn bare_entry(cwl_url: &str) -> Value {
        json!({"assets": {"cwl_script": {"href": cwl_url}}})
    }

    #[tokio::test]
    async fn completes_bare_entry_from_scraped_node() {
        let server = serve_cwl(PACKED_CWL).await;
        let mut doc = bare_entry(&format!("{}/workflow.cwl", server.uri()));

        synthesize_workflow(&mut doc, "workflows/demo.json", SOURCE, &test_fetcher())
            .await
            .unwrap();

        assert_eq!(doc["id"], "workflow__demo");
        assert_eq!(doc["type"], "Collection");
        assert_eq!(doc["stac_version"], STAC_VERSION);
        assert_eq!(doc["title"], "workflow__demo");
        assert_eq!(doc["description"], "Demonstration workflow");
        assert_eq!(doc["keywords"], json!(["workflow"]));
        assert_eq!(doc["license"], "N/A");
        assert_eq!(doc["providers"], "N/A");
        assert!(!doc["extent"]["spatial"]["bbox"].as_array().unwrap().is_empty());
        assert_eq!(doc["extent"]["temporal"]["interval"], json!([[null, null]]));
        assert_eq!(doc["summaries"]["inputs"], json!({}));
        assert_eq!(doc["summaries"]["outputs"], json!({}));
    }

    #[tokio::test]
    async fn existing_fields_are_not_overwritten() {
        let server = serve_cwl(PACKED_CWL).await;
        let mut doc = bare_entry(&format!("{}/workflow.cwl", server.uri()));
        doc["id"] = json!("my-workflow");
        doc["description"] = json!("Hand-written description");
        doc["extent"] = json!({"spatial": {"bbox": [[0.0, 0.0, 10.0, 10.0]]}});

        synthesize_workflow(&mut doc, "workflows/demo.json", SOURCE, &test_fetcher())
            .await
            .unwrap();

        assert_eq!(doc["id"], "my-workflow");
        assert_eq!(doc["description"], "Hand-written description");
        // Populated spatial kept, missing temporal sibling filled.
        assert_eq!(doc["extent"]["spatial"]["bbox"], json!([[0.0, 0.0, 10.0, 10.0]]));
        assert_eq!(doc["extent"]["temporal"]["interval"], json!([[null, null]]));
    }

    #[tokio::test]
    async fn title_stands_in_for_missing_node_id() {
        let cwl = r#"
cwlVersion: v1.0
$graph:
  - class: Workflow
    inputs: {}
    outputs: {}
"#;
        let server = serve_cwl(cwl).await;
        let mut doc = bare_entry(&format!("{}/workflow.cwl", server.uri()));
        doc["title"] = json!("Flood Mapper");

        synthesize_workflow(&mut doc, "workflows/flood.json", SOURCE, &test_fetcher())
            .await
            .unwrap();

        assert_eq!(doc["id"], "Flood Mapper");
        assert_eq!(doc["title"], "Flood Mapper");
        // No doc string on the node, so the sentinel stands in.
        assert_eq!(doc["description"], "N/A");
    }

    #[tokio::test]
    async fn self_link_is_forced_to_source_plus_file_name() {
        let server = serve_cwl(PACKED_CWL).await;
        let mut doc = bare_entry(&format!("{}/workflow.cwl", server.uri()));
        doc["links"] = json!([{"rel": "self", "href": "https://stale.example/old"}]);

        synthesize_workflow(&mut doc, "workflows/demo.json", SOURCE, &test_fetcher())
            .await
            .unwrap();

        let links = doc["links"].as_array().unwrap();
        let self_link = links.iter().find(|l| l["rel"] == "self").unwrap();
        assert_eq!(
            self_link["href"],
            "https://example.link.for.test/workflows/demo.json"
        );
    }

    #[tokio::test]
    async fn output_uses_canonical_field_order() {
        let server = serve_cwl(PACKED_CWL).await;
        let mut doc = bare_entry(&format!("{}/workflow.cwl", server.uri()));
        doc["zzz_scratch"] = json!("dropped");

        synthesize_workflow(&mut doc, "workflows/demo.json", SOURCE, &test_fetcher())
            .await
            .unwrap();

        let keys: Vec<_> = doc.as_object().unwrap().keys().cloned().collect();
        assert!(keys.iter().all(|k| COLLECTION_FIELD_ORDER.contains(&k.as_str())));
        assert!(!keys.contains(&"zzz_scratch".to_string()));

        let positions: Vec<_> = keys
            .iter()
            .map(|k| COLLECTION_FIELD_ORDER.iter().position(|c| c == k).unwrap())
            .collect();
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted);
    }

    #[tokio::test]
    async fn unreachable_definition_falls_back_to_defaults() {
        let mut doc = bare_entry("http://127.0.0.1:1/workflow.cwl");

        synthesize_workflow(&mut doc, "workflows/demo.json", SOURCE, &test_fetcher())
            .await
            .unwrap();

        assert_eq!(doc["type"], "Collection");
        assert!(doc["id"].as_str().unwrap().starts_with(WORKFLOW_ID_PREFIX));
        assert_eq!(doc["license"], "N/A");
        assert_eq!(doc["description"], "N/A");
        assert_eq!(doc["providers"], "N/A");
        // No node metadata, so summaries stay an empty container.
        assert_eq!(doc["summaries"], json!({}));
    }

    #[tokio::test]
    async fn unparsable_definition_is_malformed_input() {
        let server = serve_cwl("{not: valid: yaml: [").await;
        let mut doc = bare_entry(&format!("{}/workflow.cwl", server.uri()));

        let err = synthesize_workflow(&mut doc, "workflows/demo.json", SOURCE, &test_fetcher())
            .await
            .unwrap_err();
        assert!(matches!(err, StacshiftError::MalformedInput { .. }));
    }

    #[tokio::test]
    async fn definition_without_workflow_node_is_malformed_input() {
        let cwl = r#"
cwlVersion: v1.0
$graph:
  - class: CommandLineTool
    id: step1
"#;
        let server = serve_cwl(cwl).await;
        let mut doc = bare_entry(&format!("{}/workflow.cwl", server.uri()));

        let err = synthesize_workflow(&mut doc, "workflows/demo.json", SOURCE, &test_fetcher())
            .await
            .unwrap_err();
        assert!(matches!(err, StacshiftError::MalformedInput { .. }));
    }

    #[tokio::test]
    async fn non_workflow_documents_are_untouched() {
        let mut doc = json!({"type": "Feature", "id": "item", "assets": {"thumbnail": {"href": "x"}}});
        let before = doc.clone();

        synthesize_workflow(&mut doc, "items/item.json", SOURCE, &test_fetcher())
            .await
            .unwrap();
        assert_eq!(doc, before);
    }

    #[test]
    fn falsy_values() {
        assert!(is_falsy(None));
        assert!(is_falsy(Some(&json!(null))));
        assert!(is_falsy(Some(&json!(false))));
        assert!(is_falsy(Some(&json!(""))));
        assert!(is_falsy(Some(&json!([]))));
        assert!(is_falsy(Some(&json!({}))));
        assert!(is_falsy(Some(&json!(0))));
        assert!(!is_falsy(Some(&json!("x"))));
        assert!(!is_falsy(Some(&json!([1]))));
    }
}
