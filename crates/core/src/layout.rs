//! Directory layout of the staging (temporal) and persistent landing zones.

use crate::config::StorageConfig;

pub const STAGING_CSV: &str = "temporal_landing_CSV";
pub const STAGING_JSON: &str = "temporal_landing_JSON";
pub const STAGING_URL: &str = "temporal_landing_URL";

pub const PERSISTENT_CSV: &str = "persistent_landing_CSV";
pub const PERSISTENT_URL: &str = "persistent_landing_URL";

/// Join store paths with exactly one `/` between segments.
pub fn join_path(base: &str, name: &str) -> String {
    let name = name.trim_start_matches('/');
    if base.is_empty() {
        return name.to_string();
    }
    if name.is_empty() {
        return base.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), name)
}

/// Resolved staging and persistent directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub staging_root: String,
    pub persistent_root: String,
}

impl Layout {
    pub fn new(staging_root: impl Into<String>, persistent_root: impl Into<String>) -> Self {
        Self {
            staging_root: staging_root.into(),
            persistent_root: persistent_root.into(),
        }
    }

    pub fn from_config(storage: &StorageConfig) -> Self {
        Self::new(storage.staging_root.clone(), storage.persistent_root.clone())
    }

    pub fn staging(&self, partition: &str) -> String {
        join_path(&self.staging_root, partition)
    }

    pub fn persistent(&self, partition: &str) -> String {
        join_path(&self.persistent_root, partition)
    }

    pub fn staging_csv(&self) -> String {
        self.staging(STAGING_CSV)
    }

    pub fn staging_json(&self) -> String {
        self.staging(STAGING_JSON)
    }

    pub fn staging_url(&self) -> String {
        self.staging(STAGING_URL)
    }

    /// Staging → persistent pairs converted to columnar form, in run order.
    pub fn tabular_pairs(&self) -> Vec<(String, String)> {
        vec![
            (self.staging(STAGING_CSV), self.persistent(PERSISTENT_CSV)),
            (self.staging(STAGING_URL), self.persistent(PERSISTENT_URL)),
        ]
    }
}
