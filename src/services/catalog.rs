// src/services/catalog.rs

//! License catalog fetcher.
//!
//! Downloads the whole license list document and decodes it in one step;
//! a partially decoded catalog is never returned.

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{AppError, Result};
use crate::models::{CatalogConfig, CatalogDocument};
use crate::utils::http;

/// Anything that can produce the current license catalog.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch(&self) -> Result<CatalogDocument>;
}

/// Fetches the catalog over HTTP.
pub struct CatalogFetcher {
    client: Client,
    url: String,
}

impl CatalogFetcher {
    /// Create a fetcher with a client built from the catalog settings.
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        let client = http::create_async_client(config)?;
        Ok(Self::with_client(client, &config.url))
    }

    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl CatalogSource for CatalogFetcher {
    async fn fetch(&self) -> Result<CatalogDocument> {
        log::info!("Fetching license catalog from {}", self.url);
        let body = http::fetch_bytes(&self.client, &self.url).await?;
        let document: CatalogDocument =
            serde_json::from_slice(&body).map_err(AppError::decode)?;

        log::info!(
            "Fetched license list {} ({} licenses, {} bytes)",
            document.license_list_version,
            document.licenses.len(),
            body.len()
        );
        Ok(document)
    }
}
