use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::ObjectStore;
use tracing::{debug, info};

use crate::error::StorageError;

/// Hierarchical remote store the pipeline stages into and persists to.
///
/// Paths are `/`-separated and absolute within the store namespace.
/// Writes always overwrite; there is no versioning and no append.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Whether a file or directory exists at `path`.
    async fn exists(&self, path: &str) -> Result<bool, StorageError>;

    /// Create `path` and any missing parents.
    async fn make_directories(&self, path: &str) -> Result<(), StorageError>;

    /// Write `data` to `path`, replacing any previous content.
    async fn write(&self, path: &str, data: Bytes) -> Result<(), StorageError>;

    /// Read the full content of the file at `path`.
    async fn read(&self, path: &str) -> Result<Bytes, StorageError>;

    /// Names (not paths) of the direct children of `directory`.
    async fn list(&self, directory: &str) -> Result<Vec<String>, StorageError>;

    /// Delete `path`; returns false when nothing was there.
    async fn delete(&self, path: &str, recursive: bool) -> Result<bool, StorageError>;
}

fn to_object_path(path: &str) -> Path {
    Path::from(path.trim_matches('/'))
}

/// Raw name of a listed path part; `object_store` hands parts back encoded.
fn decode_part(part: &str) -> String {
    urlencoding::decode(part)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| part.to_string())
}

/// [`RemoteStore`] backed by an `object_store` implementation.
///
/// With a local root, directories are real filesystem directories. Without
/// one (in-memory), directories are implicit: a directory exists once
/// something has been written beneath it.
pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
    local: Option<Arc<LocalFileSystem>>,
}

impl ObjectStoreBackend {
    /// Local filesystem store rooted at `root` (created if missing).
    pub fn local(root: &FsPath) -> Result<Self, StorageError> {
        std::fs::create_dir_all(root)?;
        let canonical = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
        let store = Arc::new(
            LocalFileSystem::new_with_prefix(&canonical)
                .map_err(|e| StorageError::Other(format!("local filesystem error: {e}")))?,
        );
        info!("Storage: local backend at {}", canonical.display());
        Ok(Self {
            store: store.clone(),
            local: Some(store),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(InMemory::new()),
            local: None,
        }
    }

    /// Filesystem location of `path`, resolved the same way `put` resolves it.
    fn local_path(&self, path: &str) -> Result<Option<PathBuf>, StorageError> {
        match &self.local {
            Some(local) => Ok(Some(local.path_to_filesystem(&to_object_path(path))?)),
            None => Ok(None),
        }
    }

    async fn has_children(&self, path: &str) -> Result<bool, StorageError> {
        let prefix = to_object_path(path);
        let listing = self.store.list_with_delimiter(Some(&prefix)).await?;
        Ok(!listing.objects.is_empty() || !listing.common_prefixes.is_empty())
    }
}

#[async_trait]
impl RemoteStore for ObjectStoreBackend {
    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        if let Some(local) = self.local_path(path)? {
            return Ok(tokio::fs::try_exists(&local).await?);
        }
        match self.store.head(&to_object_path(path)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => self.has_children(path).await,
            Err(e) => Err(e.into()),
        }
    }

    async fn make_directories(&self, path: &str) -> Result<(), StorageError> {
        match self.local_path(path)? {
            Some(local) => tokio::fs::create_dir_all(&local).await?,
            None => debug!(path, "implicit directory, nothing to create"),
        }
        Ok(())
    }

    async fn write(&self, path: &str, data: Bytes) -> Result<(), StorageError> {
        self.store.put(&to_object_path(path), data.into()).await?;
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Bytes, StorageError> {
        match self.store.get(&to_object_path(path)).await {
            Ok(result) => Ok(result.bytes().await?),
            Err(object_store::Error::NotFound { .. }) => Err(StorageError::NotFound(path.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, directory: &str) -> Result<Vec<String>, StorageError> {
        if let Some(local) = self.local_path(directory)? {
            if !tokio::fs::try_exists(&local).await? {
                return Err(StorageError::NotFound(directory.to_string()));
            }
        }
        let prefix = to_object_path(directory);
        let listing = self.store.list_with_delimiter(Some(&prefix)).await?;

        let names = listing
            .common_prefixes
            .iter()
            .chain(listing.objects.iter().map(|meta| &meta.location))
            .filter_map(|p| p.filename().map(decode_part))
            .collect();
        Ok(names)
    }

    async fn delete(&self, path: &str, recursive: bool) -> Result<bool, StorageError> {
        let object_path = to_object_path(path);
        let local = self.local_path(path)?;
        let is_dir = match &local {
            Some(local) => match tokio::fs::metadata(local).await {
                Ok(meta) => meta.is_dir(),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
                Err(e) => return Err(e.into()),
            },
            None => match self.store.head(&object_path).await {
                Ok(_) => false,
                Err(object_store::Error::NotFound { .. }) => {
                    if !self.has_children(path).await? {
                        return Ok(false);
                    }
                    true
                }
                Err(e) => return Err(e.into()),
            },
        };

        if !is_dir {
            self.store.delete(&object_path).await?;
            return Ok(true);
        }
        if !recursive && self.has_children(path).await? {
            return Err(StorageError::Other(format!(
                "{} is a non-empty directory",
                path
            )));
        }

        let children: Vec<Path> = self
            .store
            .list(Some(&object_path))
            .map_ok(|meta| meta.location)
            .try_collect()
            .await?;
        for child in &children {
            self.store.delete(child).await?;
        }
        if let Some(local) = local {
            tokio::fs::remove_dir_all(&local).await?;
        }
        Ok(true)
    }
}
