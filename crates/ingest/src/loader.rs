//! Converter/Loader: turns staged files into persistent artifacts at most
//! once per filename.
//!
//! Tabular files become Parquet artifacts in the persistent area; staged JSON
//! record lists are inserted into the document store. Which files are done is
//! decided by an [`IngestionLedger`], so the orchestration below never looks
//! at completion markers directly.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{error, info, warn};

use landing_core::config::Config;
use landing_core::{join_path, Layout};
use landing_docstore::DocumentStore;
use landing_storage::{RemoteStore, StorageError};

use crate::collector::ensure_directory;
use crate::error::LoadError;
use crate::ledger::{ArtifactLedger, IngestionLedger, RecordLedger};
use crate::records::{parse_records, JSON_EXTENSION};
use crate::report::{DirectoryReport, FileOutcome, SkipReason};
use crate::tabular::{csv_to_parquet, replace_extension, COLUMNAR_EXTENSION, TABULAR_EXTENSION};

fn has_extension(name: &str, extension: &str) -> bool {
    name.rsplit_once('.')
        .map(|(stem, ext)| !stem.is_empty() && ext == extension)
        .unwrap_or(false)
}

/// Result of one staging directory within a full run.
#[derive(Debug)]
pub struct DirectoryRun {
    pub directory: String,
    pub result: Result<DirectoryReport, LoadError>,
}

/// Everything a [`Loader::process_and_load`] run did, in run order.
#[derive(Debug, Default)]
pub struct LoadSummary {
    pub runs: Vec<DirectoryRun>,
}

impl LoadSummary {
    /// Directories whose processing was aborted, with the error.
    pub fn failed_directories(&self) -> Vec<(&str, &LoadError)> {
        self.runs
            .iter()
            .filter_map(|run| match &run.result {
                Err(e) => Some((run.directory.as_str(), e)),
                Ok(_) => None,
            })
            .collect()
    }

    pub fn reports(&self) -> impl Iterator<Item = &DirectoryReport> {
        self.runs.iter().filter_map(|run| run.result.as_ref().ok())
    }

    /// Files converted or ingested across all directories.
    pub fn processed(&self) -> usize {
        self.reports().map(DirectoryReport::processed).sum()
    }

    pub fn skipped(&self) -> usize {
        self.reports().map(DirectoryReport::skipped).sum()
    }
}

pub struct Loader {
    store: Arc<dyn RemoteStore>,
    docs: Arc<dyn DocumentStore>,
    layout: Layout,
    collection: String,
    metadata_collection: String,
}

impl Loader {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        docs: Arc<dyn DocumentStore>,
        layout: Layout,
        collection: impl Into<String>,
        metadata_collection: impl Into<String>,
    ) -> Self {
        Self {
            store,
            docs,
            layout,
            collection: collection.into(),
            metadata_collection: metadata_collection.into(),
        }
    }

    pub fn from_config(store: Arc<dyn RemoteStore>, docs: Arc<dyn DocumentStore>, config: &Config) -> Self {
        Self::new(
            store,
            docs,
            Layout::from_config(&config.storage),
            config.mongo.collection.clone(),
            config.mongo.metadata_collection.clone(),
        )
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Names in `staging_dir`; a partition that was never staged is empty.
    async fn staged_names(&self, staging_dir: &str) -> Result<Vec<String>, LoadError> {
        match self.store.list(staging_dir).await {
            Ok(names) => Ok(names),
            Err(StorageError::NotFound(_)) => {
                info!(directory = staging_dir, "Nothing staged yet");
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    // ── Tabular ───────────────────────────────────────────────

    /// Convert every staged `.csv` of `staging_dir` into `persistent_dir`,
    /// using artifact existence as the completion marker.
    pub async fn convert_directory(&self, staging_dir: &str, persistent_dir: &str) -> Result<DirectoryReport, LoadError> {
        ensure_directory(self.store.as_ref(), persistent_dir).await?;
        let ledger = ArtifactLedger::new(self.store.clone(), persistent_dir, COLUMNAR_EXTENSION);
        self.convert_directory_with(staging_dir, persistent_dir, &ledger)
            .await
    }

    /// Convert with an explicit ledger.
    ///
    /// Malformed files are skipped. A storage failure aborts the rest of the
    /// directory and is returned.
    pub async fn convert_directory_with(
        &self,
        staging_dir: &str,
        persistent_dir: &str,
        ledger: &dyn IngestionLedger,
    ) -> Result<DirectoryReport, LoadError> {
        let mut report = DirectoryReport::new(staging_dir);

        for name in self.staged_names(staging_dir).await? {
            if !has_extension(&name, TABULAR_EXTENSION) {
                report.skip(name, SkipReason::WrongExtension);
                continue;
            }
            if ledger.is_processed(&name).await? {
                info!(file = %name, "Already converted, skipping");
                report.skip(name, SkipReason::AlreadyProcessed);
                continue;
            }

            let source = join_path(staging_dir, &name);
            let data = self.store.read(&source).await?;
            let table = match csv_to_parquet(&data, &name) {
                Ok(table) => table,
                Err(e) => {
                    warn!(file = %source, error = %e, "Skipping malformed tabular file");
                    report.skip(name, SkipReason::Malformed(e.to_string()));
                    continue;
                }
            };

            let target = join_path(persistent_dir, &replace_extension(&name, COLUMNAR_EXTENSION));
            let rows = table.rows;
            self.store.write(&target, Bytes::from(table.bytes)).await?;
            ledger.record(&name, rows).await?;

            info!(file = %name, target = %target, rows, columns = table.columns, "Converted to Parquet");
            report.push(name, FileOutcome::Converted { rows });
        }

        Ok(report)
    }

    /// Convert the staged tabular and reference partitions, in order.
    pub async fn convert_tabular(&self) -> Vec<DirectoryRun> {
        let mut runs = Vec::new();
        for (staging, persistent) in self.layout.tabular_pairs() {
            let result = self.convert_directory(&staging, &persistent).await;
            log_run(&staging, &result);
            runs.push(DirectoryRun {
                directory: staging,
                result,
            });
        }
        runs
    }

    // ── Semi-structured ───────────────────────────────────────

    /// Insert every valid staged `.json` of `staging_dir` into the document
    /// store, guarded by processing records.
    pub async fn ingest_json_directory(&self, staging_dir: &str) -> Result<DirectoryReport, LoadError> {
        let ledger = RecordLedger::new(self.docs.clone(), self.metadata_collection.clone());
        self.ingest_json_directory_with(staging_dir, &ledger).await
    }

    /// Ingest with an explicit ledger.
    ///
    /// Only a non-empty list of objects is inserted; anything else is skipped
    /// without touching either collection.
    pub async fn ingest_json_directory_with(
        &self,
        staging_dir: &str,
        ledger: &dyn IngestionLedger,
    ) -> Result<DirectoryReport, LoadError> {
        let mut report = DirectoryReport::new(staging_dir);

        for name in self.staged_names(staging_dir).await? {
            if !has_extension(&name, JSON_EXTENSION) {
                report.skip(name, SkipReason::WrongExtension);
                continue;
            }
            if ledger.is_processed(&name).await? {
                info!(file = %name, "Already ingested, skipping");
                report.skip(name, SkipReason::AlreadyProcessed);
                continue;
            }

            let source = join_path(staging_dir, &name);
            let data = self.store.read(&source).await?;
            let records = match parse_records(&data) {
                Ok(records) => records,
                Err(e) => {
                    warn!(file = %source, error = %e, "Skipping invalid JSON file");
                    report.skip(name, SkipReason::Malformed(e.to_string()));
                    continue;
                }
            };

            // Insert and record are separate calls: a crash in between means
            // the file is ingested again on the next run.
            let inserted = self.docs.insert_many(&self.collection, records).await?;
            ledger.record(&name, inserted).await?;

            info!(file = %name, collection = %self.collection, records = inserted, "Ingested into document store");
            report.push(name, FileOutcome::Ingested { records: inserted });
        }

        Ok(report)
    }

    /// Ingest the semi-structured staging partition.
    pub async fn ingest_semi_structured(&self) -> DirectoryRun {
        let staging = self.layout.staging_json();
        let result = self.ingest_json_directory(&staging).await;
        log_run(&staging, &result);
        DirectoryRun {
            directory: staging,
            result,
        }
    }

    // ── Orchestration ─────────────────────────────────────────

    /// Convert every tabular partition, then ingest the semi-structured one.
    ///
    /// A failing directory is logged and recorded; later directories still run
    /// and earlier work is kept. The document-store service must already be up.
    pub async fn process_and_load(&self) -> LoadSummary {
        let mut runs = self.convert_tabular().await;
        runs.push(self.ingest_semi_structured().await);

        let summary = LoadSummary { runs };
        info!(
            processed = summary.processed(),
            skipped = summary.skipped(),
            failed_directories = summary.failed_directories().len(),
            "Load finished"
        );
        summary
    }
}

fn log_run(directory: &str, result: &Result<DirectoryReport, LoadError>) {
    match result {
        Ok(report) => info!(
            directory,
            processed = report.processed(),
            skipped = report.skipped(),
            "Directory done"
        ),
        Err(e) => error!(directory, error = %e, "Directory aborted"),
    }
}
