mod cli;
mod logging;
mod precheck;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use landing_core::Config;
use landing_docstore::{DocumentStore, MongoDocumentStore};
use landing_ingest::{CollectError, CollectReport, Collector, Loader};
use landing_storage::open_store;

use crate::cli::{CliArgs, Phase};
use crate::logging::LogSettings;
use crate::precheck::SshServiceCheck;

#[tokio::main]
async fn main() -> Result<()> {
    landing_core::config::load_dotenv();
    let args = CliArgs::parse();

    let settings = LogSettings::from_env()?;
    let _guard = logging::init(&settings)?;

    let config = Config::from_env();
    config.log_summary();

    match args.phase {
        Phase::Collector => run_collector(&config).await,
        Phase::Loader => run_loader(&config).await,
    }
}

async fn run_collector(config: &Config) -> Result<()> {
    let store = open_store(&config.storage).context("failed to build remote store client")?;
    let collector = Collector::from_config(store, config);

    collector
        .init()
        .await
        .context("failed to prepare the staging root")?;

    let mut report = collector
        .collect_local_files()
        .await
        .context("failed to prepare local staging directories")?;

    for dataset_id in &config.opendata.dataset_ids {
        match collector.collect_from_open_data(dataset_id).await {
            Ok(dataset_report) => report.merge(dataset_report),
            Err(e) if is_fatal(&e) => {
                return Err(e)
                    .with_context(|| format!("failed to prepare staging for dataset {dataset_id}"))
            }
            Err(e) => error!(dataset_id = %dataset_id, error = %e, "Open data collection failed"),
        }
    }

    log_collect_report(&report);
    Ok(())
}

/// Store failures stop the collector; a dataset that cannot be resolved is skipped.
fn is_fatal(e: &CollectError) -> bool {
    matches!(e, CollectError::Storage(_))
}

fn log_collect_report(report: &CollectReport) {
    for (name, reason) in &report.skipped {
        info!(item = %name, reason = %reason, "Skipped");
    }
    for (name, e) in &report.failed {
        warn!(item = %name, error = %e, "Not staged");
    }
    info!(
        uploaded = report.uploaded.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "Collector finished"
    );
}

async fn run_loader(config: &Config) -> Result<()> {
    let store = open_store(&config.storage).context("failed to build remote store client")?;

    if let Some(check) = SshServiceCheck::from_config(&config.remote_shell) {
        if let Err(e) = check.run().await {
            error!(error = %e, "Document store service check failed, continuing");
        }
    } else {
        info!("SSH_HOST not set, skipping document store service check");
    }

    let docs: Arc<dyn DocumentStore> = Arc::new(
        MongoDocumentStore::connect(&config.mongo)
            .await
            .context("failed to connect to MongoDB")?,
    );

    let loader = Loader::from_config(store, docs, config);
    let summary = loader.process_and_load().await;

    for (directory, e) in summary.failed_directories() {
        error!(directory, error = %e, "Directory not loaded");
    }
    info!(
        processed = summary.processed(),
        skipped = summary.skipped(),
        "Loader finished"
    );
    Ok(())
}
