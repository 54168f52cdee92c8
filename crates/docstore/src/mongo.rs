//! MongoDB-backed [`DocumentStore`].

use async_trait::async_trait;
use mongodb::bson::{self, Bson, Document};
use mongodb::{Client, Database};
use serde_json::Value;
use tracing::{debug, info};

use landing_core::config::MongoConfig;

use crate::error::DocStoreError;
use crate::{DocumentStore, Record};

pub struct MongoDocumentStore {
    database: Database,
}

impl MongoDocumentStore {
    /// Create a client for the configured database. The driver connects
    /// lazily, so an unreachable server surfaces on the first operation.
    pub async fn connect(config: &MongoConfig) -> Result<Self, DocStoreError> {
        let client = Client::with_uri_str(&config.connection_string).await?;
        info!(database = %config.database, "MongoDB client created");
        Ok(Self {
            database: client.database(&config.database),
        })
    }

    fn collection(&self, name: &str) -> mongodb::Collection<Document> {
        self.database.collection::<Document>(name)
    }
}

fn to_document(record: Record) -> Result<Document, DocStoreError> {
    Ok(bson::to_document(&Value::Object(record))?)
}

fn from_document(doc: Document) -> Record {
    match Bson::Document(doc).into_relaxed_extjson() {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn insert_many(&self, collection: &str, records: Vec<Record>) -> Result<usize, DocStoreError> {
        let docs = records
            .into_iter()
            .map(to_document)
            .collect::<Result<Vec<_>, _>>()?;
        if docs.is_empty() {
            return Ok(0);
        }
        let result = self.collection(collection).insert_many(docs).await?;
        debug!(collection, inserted = result.inserted_ids.len(), "insert_many");
        Ok(result.inserted_ids.len())
    }

    async fn find_one(&self, collection: &str, filter: Record) -> Result<Option<Record>, DocStoreError> {
        let filter = to_document(filter)?;
        let found = self.collection(collection).find_one(filter).await?;
        Ok(found.map(from_document))
    }
}
