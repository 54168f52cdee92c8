use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocStoreError {
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("BSON conversion error: {0}")]
    Bson(#[from] mongodb::bson::ser::Error),

    #[error("collection {0} is unavailable")]
    Unavailable(String),
}
