//! Change-set batch handling and failure classification.
//!
//! Keys within one event are processed sequentially so later keys can rely
//! on earlier structural changes to the same catalog tree. No per-key
//! failure escapes this layer: each lands in the outbound success lists,
//! `temp_failed_keys`, or `perm_failed_keys`, and the message is negatively
//! acknowledged only when at least one key failed transiently.

use tracing::{debug, info, warn};

use stacshift_fetch::Fetcher;
use stacshift_shared::{
    AppConfig, ChangeSetEvent, ErrorClass, FailureReport, Result, StacshiftError,
};
use stacshift_store::ObjectStore;
use stacshift_transform::LicenseIndex;

use crate::keys::{catalog_path, reformat_key, transform_key};
use crate::orchestrator::Transformer;

/// What to do with the inbound message after processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckDecision {
    /// Acknowledge: every key either succeeded or failed terminally.
    Ack,
    /// Negatively acknowledge so the whole message is redelivered.
    Nack,
}

/// Result of processing one change-set event.
#[derive(Debug)]
pub struct BatchOutcome {
    /// Outbound event for downstream consumers. Success lists carry
    /// published keys; failure lists carry the inbound keys so a
    /// redelivered message matches them again.
    pub event: ChangeSetEvent,
    pub decision: AckDecision,
}

/// Which change list a key came from.
#[derive(Debug, Clone, Copy)]
enum ChangeKind {
    Added,
    Updated,
    Deleted,
}

/// Process every key of one inbound change-set event.
pub async fn handle_event(
    inbound: &ChangeSetEvent,
    config: &AppConfig,
    store: &dyn ObjectStore,
    fetcher: &Fetcher,
    license_index: LicenseIndex,
) -> Result<BatchOutcome> {
    let transformer = Transformer::new(config, store, fetcher, license_index, &inbound.target)?;

    info!(
        source = inbound.source,
        target = inbound.target,
        added = inbound.added_keys.len(),
        updated = inbound.updated_keys.len(),
        deleted = inbound.deleted_keys.len(),
        "processing change-set event"
    );

    let mut outbound = ChangeSetEvent {
        id: inbound.id.clone(),
        workspace: inbound.workspace.clone(),
        bucket_name: inbound.bucket_name.clone(),
        source: inbound.source.clone(),
        target: inbound.target.clone(),
        ..Default::default()
    };
    let mut report = FailureReport::default();

    for (kind, keys) in [
        (ChangeKind::Added, &inbound.added_keys),
        (ChangeKind::Updated, &inbound.updated_keys),
    ] {
        for key in keys {
            let cat_path = catalog_path(key, &inbound.source, &inbound.target);
            let published_key = reformat_key(&cat_path);
            match process_upsert(&transformer, store, config, inbound, key, &cat_path, &published_key)
                .await
            {
                Ok(()) => {
                    debug!(key, published_key, "key succeeded");
                    success_list(&mut outbound, kind).push(published_key);
                }
                Err(e) => record_failure(&mut report, kind, key, &e),
            }
        }
    }

    for key in &inbound.deleted_keys {
        let published_key = transform_key(key, &inbound.source, &inbound.target);
        match store.delete(&config.output.bucket, &published_key).await {
            Ok(()) => {
                debug!(key, published_key, "key deleted");
                outbound.deleted_keys.push(published_key);
            }
            Err(e) => record_failure(&mut report, ChangeKind::Deleted, key, &e),
        }
    }

    let decision = if report.needs_redelivery() {
        AckDecision::Nack
    } else {
        AckDecision::Ack
    };
    info!(
        succeeded = outbound.added_keys.len() + outbound.updated_keys.len()
            + outbound.deleted_keys.len(),
        temp_failed = !report.temp_failed_keys.is_empty(),
        perm_failed = !report.perm_failed_keys.is_empty(),
        ?decision,
        "change-set event complete"
    );
    outbound.failed_files = Some(report);

    Ok(BatchOutcome {
        event: outbound,
        decision,
    })
}

/// Fetch, transform, and republish one added/updated key.
async fn process_upsert(
    transformer: &Transformer<'_>,
    store: &dyn ObjectStore,
    config: &AppConfig,
    inbound: &ChangeSetEvent,
    key: &str,
    cat_path: &str,
    published_key: &str,
) -> Result<()> {
    let body = store.get(&inbound.bucket_name, key).await?;
    let transformed = transformer
        .transform_entry(body, key, cat_path, inbound)
        .await?;
    store
        .put(&config.output.bucket, published_key, transformed)
        .await
}

fn success_list<'a>(event: &'a mut ChangeSetEvent, kind: ChangeKind) -> &'a mut Vec<String> {
    match kind {
        ChangeKind::Added => &mut event.added_keys,
        ChangeKind::Updated => &mut event.updated_keys,
        ChangeKind::Deleted => &mut event.deleted_keys,
    }
}

/// Classify a per-key failure into the report, keeping the inbound key.
fn record_failure(report: &mut FailureReport, kind: ChangeKind, key: &str, error: &StacshiftError) {
    let failed = match error.classify() {
        ErrorClass::Retry => {
            warn!(key, %error, "key failed transiently, message will be redelivered");
            &mut report.temp_failed_keys
        }
        ErrorClass::Permanent => {
            warn!(key, %error, "key failed permanently");
            &mut report.perm_failed_keys
        }
    };
    let list = match kind {
        ChangeKind::Added => &mut failed.added_keys,
        ChangeKind::Updated => &mut failed.updated_keys,
        ChangeKind::Deleted => &mut failed.deleted_keys,
    };
    list.push(key.to_string());
}
