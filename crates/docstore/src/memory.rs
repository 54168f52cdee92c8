//! Process-local [`DocumentStore`], used for dry runs and tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::DocStoreError;
use crate::{DocumentStore, Record};

#[derive(Default)]
pub struct InMemoryDocumentStore {
    collections: Mutex<HashMap<String, Vec<Record>>>,
    insert_calls: AtomicUsize,
    unavailable: Mutex<HashSet<String>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record in `collection`.
    pub fn records(&self, collection: &str) -> Vec<Record> {
        let collections = self.collections.lock().unwrap_or_else(|e| e.into_inner());
        collections.get(collection).cloned().unwrap_or_default()
    }

    /// Number of `insert_many` calls made so far, across all collections.
    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::Relaxed)
    }

    /// Make every later insert into `collection` fail.
    pub fn fail_inserts_into(&self, collection: &str) {
        let mut unavailable = self.unavailable.lock().unwrap_or_else(|e| e.into_inner());
        unavailable.insert(collection.to_string());
    }
}

fn matches(record: &Record, filter: &Record) -> bool {
    filter
        .iter()
        .all(|(key, expected)| record.get(key) == Some(expected))
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert_many(&self, collection: &str, records: Vec<Record>) -> Result<usize, DocStoreError> {
        self.insert_calls.fetch_add(1, Ordering::Relaxed);
        {
            let unavailable = self.unavailable.lock().unwrap_or_else(|e| e.into_inner());
            if unavailable.contains(collection) {
                return Err(DocStoreError::Unavailable(collection.to_string()));
            }
        }
        let count = records.len();
        let mut collections = self.collections.lock().unwrap_or_else(|e| e.into_inner());
        collections
            .entry(collection.to_string())
            .or_default()
            .extend(records);
        Ok(count)
    }

    async fn find_one(&self, collection: &str, filter: Record) -> Result<Option<Record>, DocStoreError> {
        let collections = self.collections.lock().unwrap_or_else(|e| e.into_inner());
        Ok(collections
            .get(collection)
            .and_then(|records| records.iter().find(|r| matches(r, &filter)))
            .cloned())
    }
}
