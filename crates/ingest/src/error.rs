use thiserror::Error;

use landing_docstore::DocStoreError;
use landing_storage::StorageError;

use crate::opendata::OpenDataError;

/// Errors that stop a collection step.
#[derive(Error, Debug)]
pub enum CollectError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("open data error: {0}")]
    OpenData(#[from] OpenDataError),
}

/// Errors that abort the conversion or ingestion of a whole directory.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("document store error: {0}")]
    DocStore(#[from] DocStoreError),
}
