//! Populates the staging area from local source directories and the
//! open-data catalogue.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{error, info, warn};

use landing_core::config::{Config, OpenDataConfig, SourcesConfig};
use landing_core::{join_path, Layout};
use landing_storage::{RemoteStore, StorageError};

use crate::error::CollectError;
use crate::opendata::{is_denylisted, resource_filename, OpenDataClient};
use crate::records::JSON_EXTENSION;
use crate::report::{CollectReport, SkipReason};
use crate::tabular::TABULAR_EXTENSION;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirStatus {
    Created,
    AlreadyExists,
}

/// Create `path` (and parents) unless it already exists.
///
/// Check-then-create: two concurrent callers may both attempt the creation,
/// which the stores treat as a no-op.
pub async fn ensure_directory(store: &dyn RemoteStore, path: &str) -> Result<DirStatus, StorageError> {
    if store.exists(path).await? {
        info!(path, "Directory already exists");
        return Ok(DirStatus::AlreadyExists);
    }
    store.make_directories(path).await?;
    info!(path, "Directory created");
    Ok(DirStatus::Created)
}

pub struct Collector {
    store: Arc<dyn RemoteStore>,
    layout: Layout,
    sources: SourcesConfig,
    opendata: OpenDataClient,
    denylist: Vec<String>,
}

impl Collector {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        layout: Layout,
        sources: SourcesConfig,
        opendata: &OpenDataConfig,
    ) -> Self {
        Self {
            store,
            layout,
            sources,
            opendata: OpenDataClient::new(opendata.base_url.clone()),
            denylist: opendata.denylist.clone(),
        }
    }

    pub fn from_config(store: Arc<dyn RemoteStore>, config: &Config) -> Self {
        Self::new(
            store,
            Layout::from_config(&config.storage),
            config.sources.clone(),
            &config.opendata,
        )
    }

    /// Ensure the staging root exists. An error here means nothing can be staged.
    pub async fn init(&self) -> Result<(), StorageError> {
        self.ensure_directory(&self.layout.staging_root).await?;
        Ok(())
    }

    pub async fn ensure_directory(&self, path: &str) -> Result<DirStatus, StorageError> {
        ensure_directory(self.store.as_ref(), path).await
    }

    /// Write `data` to `directory/name`, replacing any previous file.
    ///
    /// Failures are logged here; the caller decides whether to go on.
    pub async fn upload_bytes(&self, name: &str, data: Bytes, directory: &str) -> Result<String, StorageError> {
        let path = join_path(directory, name);
        let size = data.len();
        match self.store.write(&path, data).await {
            Ok(()) => {
                info!(file = name, directory, bytes = size, "Uploaded to staging");
                Ok(path)
            }
            Err(e) => {
                error!(file = name, directory, error = %e, "Upload to staging failed");
                Err(e)
            }
        }
    }

    /// Stage every `.csv` and `.json` file of the local source directories.
    ///
    /// Only a failure to create the staging directories is returned as an
    /// error; unreadable sources and failed uploads land in the report.
    pub async fn collect_local_files(&self) -> Result<CollectReport, StorageError> {
        let csv_target = self.layout.staging_csv();
        let json_target = self.layout.staging_json();
        self.ensure_directory(&csv_target).await?;
        self.ensure_directory(&json_target).await?;

        let mut report = CollectReport::default();
        report.merge(
            self.upload_directory(&self.sources.csv_dir, &csv_target, TABULAR_EXTENSION)
                .await,
        );
        report.merge(
            self.upload_directory(&self.sources.json_dir, &json_target, JSON_EXTENSION)
                .await,
        );

        info!(
            uploaded = report.uploaded.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Local collection finished"
        );
        Ok(report)
    }

    async fn upload_directory(&self, local_dir: &Path, target: &str, extension: &str) -> CollectReport {
        let mut report = CollectReport::default();

        if !local_dir.is_dir() {
            error!(dir = %local_dir.display(), "Local source directory is missing");
            report.failed.push((
                local_dir.display().to_string(),
                "not a readable directory".to_string(),
            ));
            return report;
        }

        for entry in walkdir::WalkDir::new(local_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(dir = %local_dir.display(), error = %e, "Skipping unreadable entry");
                    report
                        .failed
                        .push((local_dir.display().to_string(), e.to_string()));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if entry.path().extension().map(|e| e != extension).unwrap_or(true) {
                report.skipped.push((name, SkipReason::WrongExtension));
                continue;
            }

            let data = match tokio::fs::read(entry.path()).await {
                Ok(data) => data,
                Err(e) => {
                    error!(file = %entry.path().display(), error = %e, "Failed to read local file");
                    report.failed.push((name, e.to_string()));
                    continue;
                }
            };
            match self.upload_bytes(&name, Bytes::from(data), target).await {
                Ok(path) => report.uploaded.push(path),
                Err(e) => report.failed.push((name, e.to_string())),
            }
        }
        report
    }

    /// Stage every resource of an open-data dataset.
    ///
    /// A failed resolution is returned as an error; individual resources that
    /// are denylisted, URL-less or answer with a non-200 status are skipped.
    pub async fn collect_from_open_data(&self, dataset_id: &str) -> Result<CollectReport, CollectError> {
        let resources = match self.opendata.resolve(dataset_id).await {
            Ok(resources) => resources,
            Err(e) => {
                error!(dataset_id, error = %e, "Failed to resolve dataset");
                return Err(e.into());
            }
        };

        let target = self.layout.staging_url();
        self.ensure_directory(&target).await?;

        let mut report = CollectReport::default();
        for resource in resources {
            let label = resource
                .name
                .clone()
                .or_else(|| resource.url.clone())
                .unwrap_or_else(|| "<unnamed>".to_string());

            let url = match resource.url.as_deref().map(str::trim) {
                Some(url) if !url.is_empty() => url.to_string(),
                _ => {
                    warn!(dataset_id, resource = %label, "Resource has no url");
                    report.skipped.push((label, SkipReason::EmptyUrl));
                    continue;
                }
            };

            let filename = resource_filename(&url);
            let name_denied = resource
                .name
                .as_deref()
                .map(|n| is_denylisted(n, &self.denylist))
                .unwrap_or(false);
            if is_denylisted(&filename, &self.denylist) || name_denied {
                info!(dataset_id, file = %filename, "Skipping denylisted resource");
                report.skipped.push((filename, SkipReason::Denylisted));
                continue;
            }

            let data = match self.opendata.download(&url).await {
                Ok(data) => data,
                Err(e) => {
                    error!(dataset_id, url = %url, error = %e, "Failed to download resource");
                    match e.status() {
                        Some(status) => report.skipped.push((filename, SkipReason::HttpStatus(status))),
                        None => report.failed.push((filename, e.to_string())),
                    }
                    continue;
                }
            };

            match self.upload_bytes(&filename, data, &target).await {
                Ok(path) => report.uploaded.push(path),
                Err(e) => report.failed.push((filename, e.to_string())),
            }
        }

        info!(
            dataset_id,
            uploaded = report.uploaded.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Open data collection finished"
        );
        Ok(report)
    }
}
