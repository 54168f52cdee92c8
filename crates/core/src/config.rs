use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::LandingError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Comma-separated list, blanks dropped.
fn profiled_env_list(profile: &str, key: &str, default: &str) -> Vec<String> {
    profiled_env_or(profile, key, default)
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub storage: StorageConfig,
    pub mongo: MongoConfig,
    pub sources: SourcesConfig,
    pub opendata: OpenDataConfig,
    pub remote_shell: RemoteShellConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `LANDING_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("LANDING_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            storage: StorageConfig::from_env_profiled(p),
            mongo: MongoConfig::from_env_profiled(p),
            sources: SourcesConfig::from_env_profiled(p),
            opendata: OpenDataConfig::from_env_profiled(p),
            remote_shell: RemoteShellConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  storage:     backend={}, staging={}, persistent={}",
            self.storage.backend,
            self.storage.staging_root,
            self.storage.persistent_root
        );
        match self.storage.backend {
            StoreBackendKind::WebHdfs => tracing::info!(
                "  webhdfs:     {}:{} (user: {})",
                self.storage.hdfs_host,
                self.storage.hdfs_port,
                self.storage.hdfs_user
            ),
            StoreBackendKind::Local => tracing::info!(
                "  local store: {}",
                self.storage.local_root.display()
            ),
        }
        tracing::info!(
            "  mongo:       db={}, collection={}, metadata={}",
            self.mongo.database,
            self.mongo.collection,
            self.mongo.metadata_collection
        );
        tracing::info!(
            "  sources:     csv={}, json={}",
            self.sources.csv_dir.display(),
            self.sources.json_dir.display()
        );
        tracing::info!(
            "  opendata:    base={}, datasets={}",
            self.opendata.base_url,
            self.opendata.dataset_ids.len()
        );
        tracing::info!(
            "  ssh:         {}",
            self.remote_shell.host.as_deref().unwrap_or("(disabled)")
        );
    }
}

// ── Storage ───────────────────────────────────────────────────

/// Which remote object store implementation to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackendKind {
    WebHdfs,
    Local,
}

impl std::str::FromStr for StoreBackendKind {
    type Err = LandingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "webhdfs" | "hdfs" => Ok(Self::WebHdfs),
            "local" | "fs" => Ok(Self::Local),
            other => Err(LandingError::Config(format!(
                "unknown STORE_BACKEND '{}': expected webhdfs or local",
                other
            ))),
        }
    }
}

impl std::fmt::Display for StoreBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WebHdfs => write!(f, "webhdfs"),
            Self::Local => write!(f, "local"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StoreBackendKind,
    pub hdfs_host: String,
    pub hdfs_port: u16,
    pub hdfs_user: String,
    /// Root directory for the `local` backend.
    pub local_root: PathBuf,
    /// Staging (temporal landing) root inside the store namespace.
    pub staging_root: String,
    /// Persistent landing root inside the store namespace.
    pub persistent_root: String,
}

impl StorageConfig {
    fn from_env_profiled(p: &str) -> Self {
        let backend = profiled_env_or(p, "STORE_BACKEND", "webhdfs")
            .parse()
            .unwrap_or_else(|e: LandingError| {
                tracing::warn!(error = %e, "falling back to webhdfs backend");
                StoreBackendKind::WebHdfs
            });
        Self {
            backend,
            hdfs_host: profiled_env_or(p, "HDFS_HBASE_HOST", "localhost"),
            hdfs_port: profiled_env_u16(p, "HDFS_PORT", 9870),
            hdfs_user: profiled_env_or(p, "HDFS_USER", "hadoop"),
            local_root: PathBuf::from(profiled_env_or(p, "LOCAL_STORE_ROOT", "data/store")),
            staging_root: profiled_env_or(p, "TEMPORAL_LANDING_DIR_PATH", "/user/bdm/temporal_landing"),
            persistent_root: profiled_env_or(
                p,
                "PERSISTENT_LANDING_DIR_PATH",
                "/user/bdm/persistent_landing",
            ),
        }
    }

    /// Base URL of the WebHDFS namenode endpoint.
    pub fn webhdfs_url(&self) -> String {
        if self.hdfs_host.starts_with("http://") || self.hdfs_host.starts_with("https://") {
            format!("{}:{}", self.hdfs_host.trim_end_matches('/'), self.hdfs_port)
        } else {
            format!("http://{}:{}", self.hdfs_host, self.hdfs_port)
        }
    }
}

// ── MongoDB ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoConfig {
    pub connection_string: String,
    pub database: String,
    /// Collection receiving ingested records.
    pub collection: String,
    /// Collection holding one processing record per ingested file.
    pub metadata_collection: String,
}

impl MongoConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            connection_string: profiled_env_or(p, "MONGO_CONNECTION_STRING", "mongodb://localhost:27017"),
            database: profiled_env_or(p, "MONGO_DB_NAME", "landing"),
            collection: profiled_env_or(p, "MONGO_COLLECTION_NAME", "idealista"),
            metadata_collection: profiled_env_or(p, "MONGO_METADATA_COLLECTION", "processed_files"),
        }
    }
}

// ── Local sources ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    pub csv_dir: PathBuf,
    pub json_dir: PathBuf,
}

impl SourcesConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            csv_dir: PathBuf::from(profiled_env_or(p, "LOCAL_CSV_DIR", "/data/opendatabcn-income/")),
            json_dir: PathBuf::from(profiled_env_or(p, "LOCAL_JSON_DIR", "/data/idealista/")),
        }
    }
}

// ── Open data portal ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenDataConfig {
    /// CKAN API base, ending in `/`.
    pub base_url: String,
    pub dataset_ids: Vec<String>,
    /// Filename suffixes never staged.
    pub denylist: Vec<String>,
}

impl OpenDataConfig {
    fn from_env_profiled(p: &str) -> Self {
        let mut base_url = profiled_env_or(
            p,
            "OPENDATA_BASE_URL",
            "https://opendata-ajuntament.barcelona.cat/data/api/3/",
        );
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            base_url,
            dataset_ids: profiled_env_list(p, "OPENDATA_DATASET_IDS", ""),
            denylist: profiled_env_list(p, "OPENDATA_DENYLIST", ".xml"),
        }
    }
}

// ── Remote shell ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteShellConfig {
    pub host: Option<String>,
    pub user: Option<String>,
    pub port: u16,
    pub key_path: Option<PathBuf>,
    /// Command that leaves the document-store server running.
    pub start_command: String,
}

impl RemoteShellConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_opt(p, "SSH_HOST"),
            user: profiled_env_opt(p, "SSH_USER"),
            port: profiled_env_u16(p, "SSH_PORT", 22),
            key_path: profiled_env_opt(p, "SSH_KEY_PATH").map(PathBuf::from),
            start_command: profiled_env_or(
                p,
                "MONGO_START_COMMAND",
                "pgrep mongod || mongod --fork --logpath /var/log/mongod.log --dbpath /data/db",
            ),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.host.is_some()
    }

    /// `user@host`, or just `host` when no user is set.
    pub fn destination(&self) -> Option<String> {
        let host = self.host.as_deref()?;
        Some(match self.user.as_deref() {
            Some(user) => format!("{}@{}", user, host),
            None => host.to_string(),
        })
    }
}
