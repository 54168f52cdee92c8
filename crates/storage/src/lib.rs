pub mod backend;
pub mod error;
pub mod webhdfs;

use std::sync::Arc;

use landing_core::config::{StorageConfig, StoreBackendKind};

pub use backend::{ObjectStoreBackend, RemoteStore};
pub use error::StorageError;
pub use webhdfs::WebHdfsStore;

/// Build the configured remote store.
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn RemoteStore>, StorageError> {
    let store: Arc<dyn RemoteStore> = match config.backend {
        StoreBackendKind::WebHdfs => Arc::new(WebHdfsStore::new(
            config.webhdfs_url(),
            config.hdfs_user.clone(),
        )?),
        StoreBackendKind::Local => Arc::new(ObjectStoreBackend::local(&config.local_root)?),
    };
    Ok(store)
}
