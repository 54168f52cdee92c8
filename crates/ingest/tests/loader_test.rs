//! Converter/Loader behavior against in-memory stores.

mod common;

use std::sync::Arc;

use bytes::Bytes;
use landing_core::Layout;
use landing_docstore::{DocumentStore, InMemoryDocumentStore, Record};
use landing_ingest::{FileOutcome, LoadError, Loader, SkipReason};
use landing_storage::{ObjectStoreBackend, RemoteStore};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::json;

use common::{memory_store, seed, CountingStore};

const STAGING_CSV: &str = "/tl/temporal_landing_CSV";
const STAGING_URL: &str = "/tl/temporal_landing_URL";
const STAGING_JSON: &str = "/tl/temporal_landing_JSON";
const PERSISTENT_CSV: &str = "/pl/persistent_landing_CSV";
const PERSISTENT_URL: &str = "/pl/persistent_landing_URL";

const THREE_ROWS: &[u8] = b"district,year,income\nGracia,2017,18.5\nSants,2017,15.25\nCiutat Vella,2017,12\n";

fn loader(store: Arc<dyn RemoteStore>, docs: Arc<dyn DocumentStore>) -> Loader {
    Loader::new(store, docs, Layout::new("/tl", "/pl"), "idealista", "processed_files")
}

fn parquet_rows(data: Bytes) -> usize {
    ParquetRecordBatchReaderBuilder::try_new(data)
        .unwrap()
        .build()
        .unwrap()
        .map(|batch| batch.unwrap().num_rows())
        .sum()
}

fn record(value: serde_json::Value) -> Record {
    value.as_object().unwrap().clone()
}

// ── Tabular ───────────────────────────────────────────────────

#[tokio::test]
async fn converts_new_file_and_leaves_existing_artifact() {
    let inner = memory_store();
    seed(&inner, &format!("{STAGING_CSV}/a.csv"), THREE_ROWS).await;
    seed(&inner, &format!("{STAGING_CSV}/b.csv"), b"x\n1\n").await;
    seed(&inner, &format!("{PERSISTENT_CSV}/b.parquet"), b"previous artifact").await;

    let store = Arc::new(CountingStore::new(inner.clone()));
    let loader = loader(store.clone(), Arc::new(InMemoryDocumentStore::new()));

    let report = loader
        .convert_directory(STAGING_CSV, PERSISTENT_CSV)
        .await
        .unwrap();

    assert_eq!(store.writes(), 1);
    assert_eq!(report.outcome("a.csv"), Some(&FileOutcome::Converted { rows: 3 }));
    assert_eq!(
        report.outcome("b.csv"),
        Some(&FileOutcome::Skipped(SkipReason::AlreadyProcessed))
    );

    let artifact = inner.read(&format!("{PERSISTENT_CSV}/a.parquet")).await.unwrap();
    assert_eq!(parquet_rows(artifact), 3);
    assert_eq!(
        inner.read(&format!("{PERSISTENT_CSV}/b.parquet")).await.unwrap(),
        Bytes::from_static(b"previous artifact")
    );
}

#[tokio::test]
async fn second_conversion_writes_nothing() {
    let inner = memory_store();
    seed(&inner, &format!("{STAGING_CSV}/a.csv"), THREE_ROWS).await;
    let store = Arc::new(CountingStore::new(inner));
    let loader = loader(store.clone(), Arc::new(InMemoryDocumentStore::new()));

    loader.convert_directory(STAGING_CSV, PERSISTENT_CSV).await.unwrap();
    assert_eq!(store.writes(), 1);

    let second = loader.convert_directory(STAGING_CSV, PERSISTENT_CSV).await.unwrap();
    assert_eq!(store.writes(), 1);
    assert_eq!(second.processed(), 0);
}

#[tokio::test]
async fn malformed_csv_is_skipped_without_artifact() {
    let inner = memory_store();
    seed(&inner, &format!("{STAGING_CSV}/bad.csv"), b"a,b\n1,2\n3\n").await;
    seed(&inner, &format!("{STAGING_CSV}/good.csv"), b"a,b\n1,2\n").await;
    seed(&inner, &format!("{STAGING_CSV}/readme.txt"), b"hello").await;
    let loader = loader(inner.clone(), Arc::new(InMemoryDocumentStore::new()));

    let report = loader
        .convert_directory(STAGING_CSV, PERSISTENT_CSV)
        .await
        .unwrap();

    assert!(matches!(
        report.outcome("bad.csv"),
        Some(FileOutcome::Skipped(SkipReason::Malformed(_)))
    ));
    assert_eq!(
        report.outcome("readme.txt"),
        Some(&FileOutcome::Skipped(SkipReason::WrongExtension))
    );
    assert_eq!(report.outcome("good.csv"), Some(&FileOutcome::Converted { rows: 1 }));
    assert!(!inner.exists(&format!("{PERSISTENT_CSV}/bad.parquet")).await.unwrap());
    assert!(inner.exists(&format!("{PERSISTENT_CSV}/good.parquet")).await.unwrap());
}

#[tokio::test]
async fn failed_write_aborts_rest_of_directory() {
    let inner = memory_store();
    for name in ["a.csv", "b.csv", "c.csv"] {
        seed(&inner, &format!("{STAGING_CSV}/{name}"), THREE_ROWS).await;
    }
    let store = Arc::new(CountingStore::failing_write(
        inner.clone(),
        &format!("{PERSISTENT_CSV}/b.parquet"),
    ));
    let loader = loader(store, Arc::new(InMemoryDocumentStore::new()));

    let err = loader
        .convert_directory(STAGING_CSV, PERSISTENT_CSV)
        .await
        .unwrap_err();

    assert!(matches!(err, LoadError::Storage(_)));
    assert!(inner.exists(&format!("{PERSISTENT_CSV}/a.parquet")).await.unwrap());
    assert!(!inner.exists(&format!("{PERSISTENT_CSV}/b.parquet")).await.unwrap());
    assert!(!inner.exists(&format!("{PERSISTENT_CSV}/c.parquet")).await.unwrap());
}

#[tokio::test]
async fn special_characters_in_names_convert_once() {
    let tmp = tempfile::tempdir().unwrap();
    let inner: Arc<dyn RemoteStore> = Arc::new(ObjectStoreBackend::local(tmp.path()).unwrap());
    seed(&inner, &format!("{STAGING_CSV}/renda 2017~v1.csv"), THREE_ROWS).await;
    seed(&inner, &format!("{STAGING_CSV}/renda#2017.csv"), THREE_ROWS).await;
    let store = Arc::new(CountingStore::new(inner.clone()));
    let loader = loader(store.clone(), Arc::new(InMemoryDocumentStore::new()));

    let first = loader
        .convert_directory(STAGING_CSV, PERSISTENT_CSV)
        .await
        .unwrap();
    assert_eq!(
        first.outcome("renda 2017~v1.csv"),
        Some(&FileOutcome::Converted { rows: 3 })
    );
    assert_eq!(first.outcome("renda#2017.csv"), Some(&FileOutcome::Converted { rows: 3 }));
    assert_eq!(store.writes(), 2);
    assert!(inner
        .exists(&format!("{PERSISTENT_CSV}/renda 2017~v1.parquet"))
        .await
        .unwrap());

    let second = loader
        .convert_directory(STAGING_CSV, PERSISTENT_CSV)
        .await
        .unwrap();
    assert_eq!(second.processed(), 0);
    assert_eq!(store.writes(), 2);
}

// ── Semi-structured ───────────────────────────────────────────

#[tokio::test]
async fn json_is_ingested_once() {
    let store = memory_store();
    seed(&store, &format!("{STAGING_JSON}/flats.json"), br#"[{"id":1},{"id":2}]"#).await;
    let docs = Arc::new(InMemoryDocumentStore::new());
    let loader = loader(store, docs.clone());

    let first = loader.ingest_json_directory(STAGING_JSON).await.unwrap();
    assert_eq!(first.outcome("flats.json"), Some(&FileOutcome::Ingested { records: 2 }));
    assert_eq!(docs.records("idealista").len(), 2);
    assert_eq!(docs.records("processed_files").len(), 1);
    let calls_after_first = docs.insert_calls();

    let second = loader.ingest_json_directory(STAGING_JSON).await.unwrap();
    assert_eq!(
        second.outcome("flats.json"),
        Some(&FileOutcome::Skipped(SkipReason::AlreadyProcessed))
    );
    assert_eq!(docs.insert_calls(), calls_after_first);
    assert_eq!(docs.records("idealista").len(), 2);
}

#[tokio::test]
async fn invalid_shapes_are_never_inserted() {
    let store = memory_store();
    seed(&store, &format!("{STAGING_JSON}/object.json"), br#"{"id":1}"#).await;
    seed(&store, &format!("{STAGING_JSON}/empty.json"), b"[]").await;
    seed(&store, &format!("{STAGING_JSON}/scalar.json"), b"7").await;
    seed(&store, &format!("{STAGING_JSON}/broken.json"), b"[{").await;
    let docs = Arc::new(InMemoryDocumentStore::new());
    let loader = loader(store, docs.clone());

    let report = loader.ingest_json_directory(STAGING_JSON).await.unwrap();

    assert_eq!(report.processed(), 0);
    assert_eq!(report.skipped(), 4);
    for name in ["object.json", "empty.json", "scalar.json", "broken.json"] {
        assert!(matches!(
            report.outcome(name),
            Some(FileOutcome::Skipped(SkipReason::Malformed(_)))
        ));
    }
    assert_eq!(docs.insert_calls(), 0);
    assert!(docs.records("processed_files").is_empty());
}

#[tokio::test]
async fn existing_processing_record_blocks_ingestion() {
    let store = memory_store();
    seed(&store, &format!("{STAGING_JSON}/x.json"), br#"[{"id":1}]"#).await;
    let docs = Arc::new(InMemoryDocumentStore::new());
    docs.insert_many(
        "processed_files",
        vec![record(json!({"filename": "x.json", "record_count": 1}))],
    )
    .await
    .unwrap();
    let calls_before = docs.insert_calls();
    let loader = loader(store, docs.clone());

    let report = loader.ingest_json_directory(STAGING_JSON).await.unwrap();

    assert_eq!(
        report.outcome("x.json"),
        Some(&FileOutcome::Skipped(SkipReason::AlreadyProcessed))
    );
    assert_eq!(docs.insert_calls(), calls_before);
    assert!(docs.records("idealista").is_empty());
    assert_eq!(docs.records("processed_files").len(), 1);
}

#[tokio::test]
async fn failed_insert_leaves_no_processing_record() {
    let store = memory_store();
    seed(&store, &format!("{STAGING_JSON}/x.json"), br#"[{"id":1}]"#).await;
    let docs = Arc::new(InMemoryDocumentStore::new());
    docs.fail_inserts_into("idealista");
    let loader = loader(store, docs.clone());

    let err = loader.ingest_json_directory(STAGING_JSON).await.unwrap_err();

    assert!(matches!(err, LoadError::DocStore(_)));
    assert!(docs.records("processed_files").is_empty());
    assert!(docs.records("idealista").is_empty());
}

// ── Orchestration ─────────────────────────────────────────────

#[tokio::test]
async fn failing_directory_does_not_stop_the_run() {
    let inner = memory_store();
    seed(&inner, &format!("{STAGING_CSV}/a.csv"), THREE_ROWS).await;
    seed(&inner, &format!("{STAGING_URL}/renda.csv"), b"barri,renda\nSants,10\n").await;
    seed(&inner, &format!("{STAGING_JSON}/x.json"), br#"[{"id":1}]"#).await;

    let store = Arc::new(CountingStore::failing_list(inner.clone(), STAGING_CSV));
    let docs = Arc::new(InMemoryDocumentStore::new());
    let loader = loader(store, docs.clone());

    let summary = loader.process_and_load().await;

    let directories: Vec<_> = summary.runs.iter().map(|r| r.directory.as_str()).collect();
    assert_eq!(directories, vec![STAGING_CSV, STAGING_URL, STAGING_JSON]);

    let failed = summary.failed_directories();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, STAGING_CSV);

    assert!(!inner.exists(&format!("{PERSISTENT_CSV}/a.parquet")).await.unwrap());
    assert!(inner.exists(&format!("{PERSISTENT_URL}/renda.parquet")).await.unwrap());
    assert_eq!(docs.records("idealista").len(), 1);
    assert_eq!(summary.processed(), 2);
}

#[tokio::test]
async fn unstaged_partition_is_empty_not_failed() {
    let tmp = tempfile::tempdir().unwrap();
    let store: Arc<dyn RemoteStore> = Arc::new(ObjectStoreBackend::local(tmp.path()).unwrap());
    seed(&store, &format!("{STAGING_CSV}/a.csv"), THREE_ROWS).await;
    seed(&store, &format!("{STAGING_JSON}/x.json"), br#"[{"id":1}]"#).await;
    let loader = loader(store.clone(), Arc::new(InMemoryDocumentStore::new()));

    let summary = loader.process_and_load().await;

    assert!(summary.failed_directories().is_empty());
    let url_run = summary
        .runs
        .iter()
        .find(|r| r.directory == STAGING_URL)
        .unwrap();
    assert!(url_run.result.as_ref().unwrap().files.is_empty());
    assert_eq!(summary.processed(), 2);
}
