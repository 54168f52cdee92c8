pub mod error;
pub mod memory;
pub mod mongo;

use async_trait::async_trait;

pub use error::DocStoreError;
pub use memory::InMemoryDocumentStore;
pub use mongo::MongoDocumentStore;

/// One document: a JSON object.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Named-collection document database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert all `records` into `collection` in one call; returns the count inserted.
    async fn insert_many(&self, collection: &str, records: Vec<Record>) -> Result<usize, DocStoreError>;

    /// First record whose top-level fields equal every entry of `filter`.
    async fn find_one(&self, collection: &str, filter: Record) -> Result<Option<Record>, DocStoreError>;
}
