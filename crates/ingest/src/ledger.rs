//! Ingestion ledger: the queryable record of which staged files are done.
//!
//! Two backends share one interface. Tabular files are done when their
//! columnar artifact exists in the persistent area ([`ArtifactLedger`]);
//! semi-structured files are done when a processing record names them in
//! the metadata collection ([`RecordLedger`]).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use landing_core::join_path;
use landing_docstore::{DocumentStore, Record};
use landing_storage::RemoteStore;

use crate::error::LoadError;
use crate::tabular::replace_extension;

#[async_trait]
pub trait IngestionLedger: Send + Sync {
    /// Whether `filename` (no directory component) was already processed.
    async fn is_processed(&self, filename: &str) -> Result<bool, LoadError>;

    /// Mark `filename` as processed after a successful load.
    async fn record(&self, filename: &str, record_count: usize) -> Result<(), LoadError>;
}

// ── Artifact existence ────────────────────────────────────────

pub struct ArtifactLedger {
    store: Arc<dyn RemoteStore>,
    target_dir: String,
    extension: String,
}

impl ArtifactLedger {
    pub fn new(store: Arc<dyn RemoteStore>, target_dir: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            store,
            target_dir: target_dir.into(),
            extension: extension.into(),
        }
    }

    /// Persistent path of the artifact produced from `filename`.
    pub fn artifact_path(&self, filename: &str) -> String {
        join_path(&self.target_dir, &replace_extension(filename, &self.extension))
    }
}

#[async_trait]
impl IngestionLedger for ArtifactLedger {
    async fn is_processed(&self, filename: &str) -> Result<bool, LoadError> {
        Ok(self.store.exists(&self.artifact_path(filename)).await?)
    }

    async fn record(&self, filename: &str, _record_count: usize) -> Result<(), LoadError> {
        // The artifact write itself is the marker.
        debug!(filename, artifact = %self.artifact_path(filename), "artifact ledger: nothing to record");
        Ok(())
    }
}

// ── Processing records ────────────────────────────────────────

pub struct RecordLedger {
    docs: Arc<dyn DocumentStore>,
    collection: String,
}

impl RecordLedger {
    pub fn new(docs: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            docs,
            collection: collection.into(),
        }
    }

    fn filter(filename: &str) -> Record {
        let mut filter = Record::new();
        filter.insert("filename".into(), Value::String(filename.to_string()));
        filter
    }

    /// `{filename, record_count, processed_at}` with an RFC 3339 timestamp.
    pub fn processing_record(filename: &str, record_count: usize) -> Record {
        let mut record = Self::filter(filename);
        record.insert("record_count".into(), json!(record_count));
        record.insert(
            "processed_at".into(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );
        record
    }
}

#[async_trait]
impl IngestionLedger for RecordLedger {
    async fn is_processed(&self, filename: &str) -> Result<bool, LoadError> {
        let found = self.docs.find_one(&self.collection, Self::filter(filename)).await?;
        Ok(found.is_some())
    }

    async fn record(&self, filename: &str, record_count: usize) -> Result<(), LoadError> {
        let record = Self::processing_record(filename, record_count);
        self.docs.insert_many(&self.collection, vec![record]).await?;
        Ok(())
    }
}
