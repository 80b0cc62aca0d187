//! Core domain types for the stacshift transformation stage.

use serde::{Deserialize, Serialize};

/// A single STAC link object.
///
/// Identity is positional: several links may share a `rel` and none of the
/// fields is a unique key. Unknown members are preserved through rewriting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// Relation type (`self`, `root`, `parent`, `license`, ...).
    pub rel: String,
    /// Link target.
    pub href: String,
    /// Media type of the target, when known.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

impl Link {
    /// Build a bare `rel`/`href` link.
    pub fn new(rel: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            rel: rel.into(),
            href: href.into(),
            media_type: None,
        }
    }

    /// Build a link with an explicit media type.
    pub fn with_type(
        rel: impl Into<String>,
        href: impl Into<String>,
        media_type: impl Into<String>,
    ) -> Self {
        Self {
            rel: rel.into(),
            href: href.into(),
            media_type: Some(media_type.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Change-set events
// ---------------------------------------------------------------------------

/// A change-set notification describing harvested catalog entries.
///
/// The same shape travels inbound (from the harvester) and outbound (to
/// downstream consumers); outbound events additionally carry a
/// [`FailureReport`] under `failed_files`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeSetEvent {
    /// Event identifier, passed through unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Workspace the change set belongs to (used to key mirrored licenses).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    /// Bucket holding the harvested objects.
    pub bucket_name: String,
    /// Root the harvested documents were published under.
    pub source: String,
    /// Catalog path the documents are being republished under.
    pub target: String,
    /// Keys added by this change set.
    #[serde(default)]
    pub added_keys: Vec<String>,
    /// Keys updated by this change set.
    #[serde(default)]
    pub updated_keys: Vec<String>,
    /// Keys deleted by this change set.
    #[serde(default)]
    pub deleted_keys: Vec<String>,
    /// Per-key failure accounting (outbound only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_files: Option<FailureReport>,
}

/// Keys that failed processing, split by change kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailedKeys {
    #[serde(default)]
    pub added_keys: Vec<String>,
    #[serde(default)]
    pub updated_keys: Vec<String>,
    #[serde(default)]
    pub deleted_keys: Vec<String>,
}

impl FailedKeys {
    /// True when no key of any kind is recorded.
    pub fn is_empty(&self) -> bool {
        self.added_keys.is_empty() && self.updated_keys.is_empty() && self.deleted_keys.is_empty()
    }
}

/// Failure accounting attached to the outbound event.
///
/// Every inbound key lands in exactly one of the outbound success lists,
/// `temp_failed_keys`, or `perm_failed_keys` — nothing is dropped silently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    /// Keys that hit retryable infrastructure errors.
    pub temp_failed_keys: FailedKeys,
    /// Keys that failed terminally.
    pub perm_failed_keys: FailedKeys,
}

impl FailureReport {
    /// True when nothing failed at all.
    pub fn is_empty(&self) -> bool {
        self.temp_failed_keys.is_empty() && self.perm_failed_keys.is_empty()
    }

    /// True when at least one key needs the message redelivered.
    pub fn needs_redelivery(&self) -> bool {
        !self.temp_failed_keys.is_empty()
    }
}
