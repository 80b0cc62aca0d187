//! Object storage abstraction for harvested catalog entries.
//!
//! The transformation pipeline only needs four operations — get, put,
//! delete, and list — so the trait stays that small. Backends map their
//! own failure modes onto the shared error taxonomy: a missing object is
//! [`StacshiftError::NotFound`], anything infrastructural is
//! [`StacshiftError::TransientStore`] so the batch handler can request
//! redelivery.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use stacshift_shared::{Result, StacshiftError};

/// Storage seam between the pipeline and wherever harvested objects live.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read an entire object. Returns `NotFound` if the key has no object.
    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes>;

    /// Write an object, replacing any existing content.
    async fn put(&self, bucket: &str, key: &str, body: Bytes) -> Result<()>;

    /// Delete an object. Deleting a missing key succeeds (idempotent).
    async fn delete(&self, bucket: &str, key: &str) -> Result<()>;

    /// List keys under a prefix, in unspecified order.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>>;
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

/// In-memory object store for tests.
///
/// Thread-safe via `RwLock`. Keys can be poisoned to simulate transient
/// infrastructure failures on read.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<BTreeMap<(String, String), Bytes>>,
    poisoned: RwLock<Vec<(String, String)>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an object synchronously (test setup convenience).
    pub fn insert(&self, bucket: &str, key: &str, body: impl Into<Bytes>) {
        self.objects
            .write()
            .expect("memory store lock")
            .insert((bucket.to_string(), key.to_string()), body.into());
    }

    /// Make subsequent `get` calls for this key fail with a transient error.
    pub fn poison(&self, bucket: &str, key: &str) {
        self.poisoned
            .write()
            .expect("memory store lock")
            .push((bucket.to_string(), key.to_string()));
    }

    /// True when the store holds an object at this key.
    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.objects
            .read()
            .expect("memory store lock")
            .contains_key(&(bucket.to_string(), key.to_string()))
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let lookup = (bucket.to_string(), key.to_string());
        if self
            .poisoned
            .read()
            .expect("memory store lock")
            .contains(&lookup)
        {
            return Err(StacshiftError::TransientStore(format!(
                "simulated outage reading {bucket}/{key}"
            )));
        }
        self.objects
            .read()
            .expect("memory store lock")
            .get(&lookup)
            .cloned()
            .ok_or_else(|| StacshiftError::not_found(format!("{bucket}/{key}")))
    }

    async fn put(&self, bucket: &str, key: &str, body: Bytes) -> Result<()> {
        self.objects
            .write()
            .expect("memory store lock")
            .insert((bucket.to_string(), key.to_string()), body);
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        self.objects
            .write()
            .expect("memory store lock")
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .objects
            .read()
            .expect("memory store lock")
            .keys()
            .filter(|(b, k)| b == bucket && k.starts_with(prefix))
            .map(|(_, k)| k.clone())
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Local filesystem backend
// ---------------------------------------------------------------------------

/// Filesystem-backed object store.
///
/// Buckets are directories under a root; keys are relative paths. Used by
/// the CLI so a full transformation run works without cloud credentials.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Create a store rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key)
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let path = self.object_path(bucket, key);
        match tokio::fs::read(&path).await {
            Ok(body) => Ok(Bytes::from(body)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StacshiftError::not_found(format!("{bucket}/{key}")))
            }
            Err(e) => Err(StacshiftError::TransientStore(format!(
                "read {}: {e}",
                path.display()
            ))),
        }
    }

    async fn put(&self, bucket: &str, key: &str, body: Bytes) -> Result<()> {
        let path = self.object_path(bucket, key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StacshiftError::io(parent, e))?;
        }
        tokio::fs::write(&path, &body)
            .await
            .map_err(|e| StacshiftError::io(&path, e))?;
        debug!(bucket, key, bytes = body.len(), "stored object");
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        let path = self.object_path(bucket, key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StacshiftError::io(&path, e)),
        }
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let bucket_root = self.root.join(bucket);
        if !bucket_root.is_dir() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        let mut pending = vec![bucket_root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| StacshiftError::io(&dir, e))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StacshiftError::io(&dir, e))?
            {
                let path = entry.path();
                if path.is_dir() {
                    pending.push(path);
                } else if let Some(key) = relative_key(&bucket_root, &path) {
                    if key.starts_with(prefix) {
                        keys.push(key);
                    }
                }
            }
        }
        Ok(keys)
    }
}

/// Render an object key from a path below the bucket root.
fn relative_key(bucket_root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(bucket_root).ok()?;
    let key = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    (!key.is_empty()).then_some(key)
}
