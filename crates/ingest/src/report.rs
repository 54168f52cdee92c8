//! Typed per-file outcomes, so callers can tell "nothing to do" from "failed".

use std::fmt;

/// Why a file or resource was passed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    WrongExtension,
    AlreadyProcessed,
    Malformed(String),
    Denylisted,
    HttpStatus(u16),
    EmptyUrl,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongExtension => write!(f, "unexpected extension"),
            Self::AlreadyProcessed => write!(f, "already processed"),
            Self::Malformed(reason) => write!(f, "malformed content: {}", reason),
            Self::Denylisted => write!(f, "extension is denylisted"),
            Self::HttpStatus(status) => write!(f, "HTTP {}", status),
            Self::EmptyUrl => write!(f, "resource has no url"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Tabular file written to the persistent area as a columnar artifact.
    Converted { rows: usize },
    /// Semi-structured file inserted into the document store.
    Ingested { records: usize },
    Skipped(SkipReason),
}

/// Outcome of every entry of one staging directory.
#[derive(Debug, Clone, Default)]
pub struct DirectoryReport {
    pub directory: String,
    pub files: Vec<(String, FileOutcome)>,
}

impl DirectoryReport {
    pub fn new(directory: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            files: Vec::new(),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, outcome: FileOutcome) {
        self.files.push((name.into(), outcome));
    }

    pub fn skip(&mut self, name: impl Into<String>, reason: SkipReason) {
        self.push(name, FileOutcome::Skipped(reason));
    }

    /// Files that produced an artifact or an insert.
    pub fn processed(&self) -> usize {
        self.files
            .iter()
            .filter(|(_, o)| !matches!(o, FileOutcome::Skipped(_)))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.files.len() - self.processed()
    }

    pub fn outcome(&self, name: &str) -> Option<&FileOutcome> {
        self.files.iter().find(|(n, _)| n == name).map(|(_, o)| o)
    }
}

/// Outcome of a collection step.
#[derive(Debug, Clone, Default)]
pub struct CollectReport {
    /// Store paths written.
    pub uploaded: Vec<String>,
    pub skipped: Vec<(String, SkipReason)>,
    /// Items that failed to transfer, with the error text.
    pub failed: Vec<(String, String)>,
}

impl CollectReport {
    pub fn merge(&mut self, other: CollectReport) {
        self.uploaded.extend(other.uploaded);
        self.skipped.extend(other.skipped);
        self.failed.extend(other.failed);
    }
}
