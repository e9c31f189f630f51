//! Persistence backends
//!
//! Two [`Persistence`] implementations:
//! - [`MemoryStore`]: process-local map, for tests and embedding
//! - [`JsonFileStore`]: one `<key>.json` file per key under a directory
//!
//! File writes go to a temporary sibling first and are renamed into place, so
//! a crash mid-write leaves the previous snapshot intact.

use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use swot_core::{Persistence, PersistenceError};

/// In-memory blob store
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: DashMap<String, String>,
}

impl MemoryStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Whether nothing is stored
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Whether `key` holds a blob
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.blobs.contains_key(key)
    }
}

#[async_trait]
impl Persistence for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.blobs.get(key).map(|blob| blob.value().clone()))
    }

    async fn save(&self, key: &str, blob: String) -> Result<(), PersistenceError> {
        self.blobs.insert(key.to_string(), blob);
        Ok(())
    }
}

/// Directory of JSON files, one per key
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    /// Store rooted at `root`; the directory is created on first save
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File backing `key`
    ///
    /// # Errors
    /// `PersistenceError::InvalidKey` if `key` is empty or would escape the root
    pub fn path_for(&self, key: &str) -> Result<PathBuf, PersistenceError> {
        if key.is_empty()
            || key.contains(['/', '\\'])
            || key.contains("..")
            || key.chars().any(char::is_control)
        {
            return Err(PersistenceError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

#[async_trait]
impl Persistence for JsonFileStore {
    async fn load(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(PersistenceError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    async fn save(&self, key: &str, blob: String) -> Result<(), PersistenceError> {
        let path = self.path_for(key)?;
        let io_err = |source: std::io::Error| PersistenceError::Io {
            key: key.to_string(),
            source,
        };

        tokio::fs::create_dir_all(&self.root).await.map_err(io_err)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, blob).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &path).await.map_err(io_err)?;
        tracing::trace!(path = %path.display(), "Blob written");
        Ok(())
    }
}
