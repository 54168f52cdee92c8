use clap::{Parser, ValueEnum};

/// Phase of the landing pipeline to run.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Stage local files and open-data resources into the temporal landing zone.
    Collector,
    /// Convert staged tables to Parquet and load staged JSON into MongoDB.
    Loader,
}

/// Two-zone data landing pipeline.
///
/// Configuration comes from the environment (and an optional `.env` file).
#[derive(Parser, Debug)]
#[command(name = "landing", about = "Stage raw data and load it into the persistent landing zone")]
pub struct CliArgs {
    #[arg(value_enum)]
    pub phase: Phase,
}
