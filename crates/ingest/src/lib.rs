//! Staging collection and idempotent conversion/loading for the landing zones.

pub mod collector;
pub mod error;
pub mod ledger;
pub mod loader;
pub mod opendata;
pub mod records;
pub mod report;
pub mod tabular;

pub use collector::{ensure_directory, Collector, DirStatus};
pub use error::{CollectError, LoadError};
pub use ledger::{ArtifactLedger, IngestionLedger, RecordLedger};
pub use loader::{DirectoryRun, LoadSummary, Loader};
pub use opendata::{OpenDataClient, OpenDataError, Resource};
pub use records::{parse_records, RecordShapeError};
pub use report::{CollectReport, DirectoryReport, FileOutcome, SkipReason};
pub use tabular::{csv_to_parquet, csv_to_record_batch, replace_extension, ColumnarTable, ConvertError};
