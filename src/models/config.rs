//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
///
/// Resolved once at process start and handed by value (or behind an `Arc`)
/// to every component that needs it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Category mirror settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Document store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// License catalog feed settings
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Override selected values from the process environment.
    ///
    /// Used by the Lambda entry point where no config file is bundled.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(root) = lookup("SYNC_REMOTE_ROOT") {
            self.sync.remote_root = root;
        }
        if let Some(categories) = lookup("SYNC_CATEGORIES") {
            self.sync.categories = categories
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(root) = lookup("SYNC_LOCAL_ROOT") {
            self.sync.local_root = PathBuf::from(root);
        }
        if let Some(root) = lookup("STORE_ROOT") {
            self.store.root = PathBuf::from(root);
        }
        if let Some(url) = lookup("CATALOG_URL") {
            self.catalog.url = url;
        }
        if let Some(timeout) = lookup("CATALOG_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                self.catalog.timeout_secs = secs;
            }
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.sync.categories.is_empty() {
            return Err(AppError::validation("sync.categories is empty"));
        }
        for category in &self.sync.categories {
            validate_category(category)?;
        }
        if self.sync.remote_root.trim().is_empty() {
            return Err(AppError::validation("sync.remote_root is empty"));
        }
        if self.store.package_collection.trim().is_empty() {
            return Err(AppError::validation("store.package_collection is empty"));
        }
        if self.store.catalog_collection.trim().is_empty() {
            return Err(AppError::validation("store.catalog_collection is empty"));
        }
        if self.store.package_collection == self.store.catalog_collection {
            return Err(AppError::validation(
                "store.package_collection and store.catalog_collection must differ",
            ));
        }
        url::Url::parse(&self.catalog.url)?;
        if self.catalog.user_agent.trim().is_empty() {
            return Err(AppError::validation("catalog.user_agent is empty"));
        }
        if self.catalog.timeout_secs == 0 {
            return Err(AppError::validation("catalog.timeout_secs must be > 0"));
        }
        Ok(())
    }
}

/// Reject category labels that cannot name a single subtree.
pub fn validate_category(category: &str) -> Result<()> {
    if category.trim().is_empty() {
        return Err(AppError::validation("category label is empty"));
    }
    if category.contains(['/', '\\']) || category == "." || category == ".." {
        return Err(AppError::validation(format!(
            "category label '{category}' must be a single path segment"
        )));
    }
    Ok(())
}

/// Category mirror settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Remote root; the category is joined onto it
    #[serde(default = "defaults::remote_root")]
    pub remote_root: String,

    /// Category labels, one sync job each
    #[serde(default = "defaults::categories")]
    pub categories: Vec<String>,

    /// Local mirror root; the category is joined onto it
    #[serde(default = "defaults::local_root")]
    pub local_root: PathBuf,

    /// Remove local files that no longer exist remotely
    #[serde(default)]
    pub delete_extraneous: bool,

    /// Remote backend settings
    #[serde(default)]
    pub remote: RemoteConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_root: defaults::remote_root(),
            categories: defaults::categories(),
            local_root: defaults::local_root(),
            delete_extraneous: false,
            remote: RemoteConfig::default(),
        }
    }
}

/// Which remote implementation backs the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteBackend {
    /// S3-compatible object store; `remote_root` is `bucket/prefix`
    S3,
    /// Directory tree on the local filesystem
    Local,
}

/// Remote object store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "defaults::backend")]
    pub backend: RemoteBackend,

    /// Send unsigned requests
    #[serde(default = "defaults::anonymous")]
    pub anonymous: bool,

    /// Endpoint override (e.g. the GCS interoperability endpoint)
    #[serde(default = "defaults::endpoint")]
    pub endpoint: Option<String>,

    #[serde(default = "defaults::region")]
    pub region: Option<String>,

    /// Address buckets as `endpoint/bucket` instead of `bucket.endpoint`
    #[serde(default = "defaults::path_style")]
    pub path_style: bool,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            backend: defaults::backend(),
            anonymous: defaults::anonymous(),
            endpoint: defaults::endpoint(),
            region: defaults::region(),
            path_style: defaults::path_style(),
        }
    }
}

/// Document store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding one JSON-lines file per collection
    #[serde(default = "defaults::store_root")]
    pub root: PathBuf,

    /// Collection receiving parsed package license records
    #[serde(default = "defaults::package_collection")]
    pub package_collection: String,

    /// Collection holding the versioned license catalog
    #[serde(default = "defaults::catalog_collection")]
    pub catalog_collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: defaults::store_root(),
            package_collection: defaults::package_collection(),
            catalog_collection: defaults::catalog_collection(),
        }
    }
}

/// License catalog feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "defaults::catalog_url")]
    pub url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl CatalogConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            url: defaults::catalog_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    use super::RemoteBackend;

    // Sync defaults
    pub fn remote_root() -> String {
        "prod-export-license-bucket-1a6c642fc4de57d4/v1/".into()
    }
    pub fn categories() -> Vec<String> {
        vec!["go".into(), "maven".into()]
    }
    pub fn local_root() -> PathBuf {
        PathBuf::from("./temp")
    }

    // Remote defaults
    pub fn backend() -> RemoteBackend {
        RemoteBackend::S3
    }
    pub fn anonymous() -> bool {
        true
    }
    pub fn endpoint() -> Option<String> {
        Some("https://storage.googleapis.com".into())
    }
    pub fn region() -> Option<String> {
        Some("auto".into())
    }
    pub fn path_style() -> bool {
        true
    }

    // Store defaults
    pub fn store_root() -> PathBuf {
        PathBuf::from("storage/db")
    }
    pub fn package_collection() -> String {
        "package_licenses".into()
    }
    pub fn catalog_collection() -> String {
        "licenses".into()
    }

    // Catalog defaults
    pub fn catalog_url() -> String {
        "https://spdx.org/licenses/licenses.json".into()
    }
    pub fn user_agent() -> String {
        "license-sync/0.1".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
