//! License link resolution and mirroring.
//!
//! Catalog entries reach the hub with either an SPDX identifier in their
//! `license` field or ad-hoc `license` links pointing at arbitrary hosts.
//! Both get normalized onto the hub's hosted zone: SPDX identifiers gain a
//! canonical text/html link pair, and externally hosted license documents
//! are copied into the license bucket so the published catalog never links
//! to a host that may disappear.
//!
//! Everything here is best effort. A license that cannot be resolved or
//! mirrored leaves the entry as it arrived; it never fails the entry.

use std::collections::HashMap;
use std::sync::LazyLock;

use bytes::Bytes;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use stacshift_fetch::Fetcher;
use stacshift_shared::{LicenseConfig, Link, Result, StacshiftError};
use stacshift_store::ObjectStore;

/// License field values that name a licensing situation rather than a
/// license document; no canonical link pair exists for these.
const NON_SPDX_SENTINELS: &[&str] = &["various", "proprietary"];

// ---------------------------------------------------------------------------
// Canonical license index
// ---------------------------------------------------------------------------

/// Case-insensitive lookup from SPDX identifier to the canonical document
/// stem, built by listing the hosted license bucket once per run.
#[derive(Debug, Default, Clone)]
pub struct LicenseIndex {
    stems: HashMap<String, String>,
}

impl LicenseIndex {
    /// Build the index by listing canonical license documents in the store.
    pub async fn load(store: &dyn ObjectStore, config: &LicenseConfig) -> Result<Self> {
        let keys = store.list(&config.bucket, &config.canonical_prefix).await?;
        let mut stems = HashMap::new();
        for key in keys {
            if let Some(stem) = file_stem(&key) {
                stems.insert(stem.to_lowercase(), stem.to_string());
            }
        }
        debug!(count = stems.len(), "loaded canonical license index");
        Ok(Self { stems })
    }

    /// Canonical stem for an SPDX identifier, matched case-insensitively.
    pub fn lookup(&self, spdx_id: &str) -> Option<&str> {
        self.stems.get(&spdx_id.to_lowercase()).map(String::as_str)
    }

    /// Number of indexed identifiers.
    pub fn len(&self) -> usize {
        self.stems.len()
    }

    /// True when no canonical documents were found.
    pub fn is_empty(&self) -> bool {
        self.stems.is_empty()
    }
}

/// File stem of an object key: last path segment minus its extension.
fn file_stem(key: &str) -> Option<&str> {
    let name = key.rsplit('/').next()?;
    let stem = match name.rfind('.') {
        Some(idx) => &name[..idx],
        None => name,
    };
    (!stem.is_empty()).then_some(stem)
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Adds canonical license links and mirrors external license documents.
pub struct LicenseResolver<'a> {
    config: &'a LicenseConfig,
    store: &'a dyn ObjectStore,
    fetcher: &'a Fetcher,
    index: LicenseIndex,
}

impl<'a> LicenseResolver<'a> {
    pub fn new(
        config: &'a LicenseConfig,
        store: &'a dyn ObjectStore,
        fetcher: &'a Fetcher,
        index: LicenseIndex,
    ) -> Self {
        Self {
            config,
            store,
            fetcher,
            index,
        }
    }

    /// Normalize the license links of a document in place.
    ///
    /// Adds the canonical text/html link pair when the document names an
    /// indexed SPDX identifier, then mirrors any license link still pointing
    /// off the hosted zone. Never fails the document.
    pub async fn ensure_license_links(&self, doc: &mut Value, workspace: Option<&str>) {
        let Some(map) = doc.as_object_mut() else {
            return;
        };

        self.add_canonical_links(map);
        self.mirror_external_links(map, workspace).await;
    }

    /// Append the canonical `.txt` and `.html` links for the document's
    /// SPDX identifier. Links already present (by exact href) are not
    /// duplicated, so reprocessing is a no-op.
    fn add_canonical_links(&self, map: &mut serde_json::Map<String, Value>) {
        let Some(spdx_id) = map.get("license").and_then(Value::as_str) else {
            return;
        };
        if spdx_id.is_empty() || NON_SPDX_SENTINELS.contains(&spdx_id.to_lowercase().as_str()) {
            return;
        }
        let Some(stem) = self.index.lookup(spdx_id) else {
            debug!(spdx_id, "license identifier not in canonical index");
            return;
        };

        let base = format!(
            "{}/{}/{stem}",
            self.config.hosted_zone.trim_end_matches('/'),
            self.config.canonical_prefix.trim_matches('/')
        );
        let candidates = [
            (format!("{base}.txt"), "text/plain"),
            (format!("{base}.html"), "text/html"),
        ];

        let links = match map.get_mut("links") {
            Some(Value::Array(links)) => links,
            _ => {
                map.insert("links".into(), Value::Array(Vec::new()));
                match map.get_mut("links") {
                    Some(Value::Array(links)) => links,
                    _ => return,
                }
            }
        };

        for (href, media_type) in candidates {
            let exists = links
                .iter()
                .any(|l| l.get("href").and_then(Value::as_str) == Some(href.as_str()));
            if !exists {
                let link = Link::with_type("license", href, media_type);
                if let Ok(link) = serde_json::to_value(link) {
                    links.push(link);
                }
            }
        }
    }

    /// Copy externally hosted license documents into the license bucket and
    /// point their links at the hosted copy.
    async fn mirror_external_links(
        &self,
        map: &mut serde_json::Map<String, Value>,
        workspace: Option<&str>,
    ) {
        let Some(Value::Array(links)) = map.get_mut("links") else {
            return;
        };

        let hosted_zone = self.config.hosted_zone.trim_end_matches('/');
        for link in links.iter_mut() {
            if link.get("rel").and_then(Value::as_str) != Some("license") {
                continue;
            }
            let Some(href) = link.get("href").and_then(Value::as_str).map(str::to_owned) else {
                continue;
            };
            if href.starts_with(hosted_zone) || !href.starts_with("http") {
                continue;
            }

            match self.mirror_one(&href, workspace).await {
                Ok(mirrored_href) => {
                    link["href"] = Value::String(mirrored_href);
                }
                Err(e) => {
                    warn!(href, error = %e, "license document not mirrored, link left as-is");
                }
            }
        }
    }

    /// Mirror a single license document, returning the hosted href.
    ///
    /// An existing object under the mirror key wins; only a `NotFound`
    /// probe triggers the fetch-and-upload.
    async fn mirror_one(&self, href: &str, workspace: Option<&str>) -> Result<String> {
        let file_name = href
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                StacshiftError::malformed(format!("license URL '{href}' has no file name"))
            })?;

        let key = format!(
            "{}/{}/{file_name}",
            self.config.mirror_prefix.trim_matches('/'),
            workspace.unwrap_or("shared")
        );
        let mirrored_href = format!(
            "{}/{key}",
            self.config.hosted_zone.trim_end_matches('/')
        );

        match self.store.get(&self.config.bucket, &key).await {
            Ok(_) => {
                debug!(key, "license document already mirrored");
                return Ok(mirrored_href);
            }
            Err(StacshiftError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        let body = self.fetcher.fetch_text(href).await?;
        let body = if looks_like_html(file_name, &body) {
            sanitize_html(&body)
        } else {
            body
        };

        self.store
            .put(&self.config.bucket, &key, Bytes::from(body))
            .await?;
        debug!(href, key, "mirrored license document");
        Ok(mirrored_href)
    }
}

// ---------------------------------------------------------------------------
// HTML sanitization
// ---------------------------------------------------------------------------

fn looks_like_html(file_name: &str, body: &str) -> bool {
    file_name.to_lowercase().ends_with(".html")
        || file_name.to_lowercase().ends_with(".htm")
        || body.trim_start().starts_with('<')
}

static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b.*?</script\s*>").unwrap());
static STYLE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style\b.*?</style\s*>").unwrap());
static IFRAME_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<iframe\b.*?</iframe\s*>").unwrap());
static EVENT_HANDLER_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\son\w+\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#).unwrap());
static JAVASCRIPT_HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)href\s*=\s*["']?\s*javascript:[^"'\s>]*["']?"#).unwrap());

/// Strip active content from a mirrored HTML license document.
pub fn sanitize_html(input: &str) -> String {
    let output = SCRIPT_BLOCK.replace_all(input, "");
    let output = STYLE_BLOCK.replace_all(&output, "");
    let output = IFRAME_BLOCK.replace_all(&output, "");
    let output = EVENT_HANDLER_ATTR.replace_all(&output, "");
    let output = JAVASCRIPT_HREF.replace_all(&output, r##"href="#""##);
    output.into_owned()
}
