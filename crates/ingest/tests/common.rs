#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use landing_storage::{ObjectStoreBackend, RemoteStore, StorageError};

/// Counts writes; can fail the listing of one directory or the write of one path.
pub struct CountingStore {
    inner: Arc<dyn RemoteStore>,
    writes: AtomicUsize,
    broken_dir: Option<String>,
    broken_write: Option<String>,
}

impl CountingStore {
    pub fn new(inner: Arc<dyn RemoteStore>) -> Self {
        Self {
            inner,
            writes: AtomicUsize::new(0),
            broken_dir: None,
            broken_write: None,
        }
    }

    pub fn failing_list(inner: Arc<dyn RemoteStore>, directory: &str) -> Self {
        Self {
            broken_dir: Some(directory.to_string()),
            ..Self::new(inner)
        }
    }

    pub fn failing_write(inner: Arc<dyn RemoteStore>, path: &str) -> Self {
        Self {
            broken_write: Some(path.to_string()),
            ..Self::new(inner)
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteStore for CountingStore {
    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        self.inner.exists(path).await
    }

    async fn make_directories(&self, path: &str) -> Result<(), StorageError> {
        self.inner.make_directories(path).await
    }

    async fn write(&self, path: &str, data: Bytes) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.broken_write.as_deref() == Some(path) {
            return Err(StorageError::Other(format!("writing {path} failed")));
        }
        self.inner.write(path, data).await
    }

    async fn read(&self, path: &str) -> Result<Bytes, StorageError> {
        self.inner.read(path).await
    }

    async fn list(&self, directory: &str) -> Result<Vec<String>, StorageError> {
        if self.broken_dir.as_deref() == Some(directory) {
            return Err(StorageError::Other(format!("listing {directory} failed")));
        }
        self.inner.list(directory).await
    }

    async fn delete(&self, path: &str, recursive: bool) -> Result<bool, StorageError> {
        self.inner.delete(path, recursive).await
    }
}

pub fn memory_store() -> Arc<dyn RemoteStore> {
    Arc::new(ObjectStoreBackend::in_memory())
}

pub async fn seed(store: &Arc<dyn RemoteStore>, path: &str, data: &[u8]) {
    store.write(path, Bytes::from(data.to_vec())).await.unwrap();
}
