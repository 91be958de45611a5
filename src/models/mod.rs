// src/models/mod.rs

//! Domain models for the ingestion pipelines.

mod catalog;
mod config;
mod license;

// Re-export all public types
pub use catalog::{CatalogDocument, CatalogEntry, CatalogLicense};
pub use config::{
    CatalogConfig, Config, LoggingConfig, RemoteBackend, RemoteConfig, StoreConfig, SyncConfig,
    validate_category,
};
pub use license::LicenseRecord;
