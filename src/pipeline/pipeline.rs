// src/pipeline/pipeline.rs

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::events::EventSink;
use crate::models::Config;
use crate::services::CatalogFetcher;
use crate::storage::DocumentStore;

use super::refresh::{RefreshReport, run_catalog_refresh};
use super::sync::{SyncContext, run_sync};

/// Which stages a pipeline run executes.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub skip_sync: bool,
    pub skip_catalog: bool,
    /// Categories to sync instead of the configured ones
    pub categories: Option<Vec<String>>,
}

/// Mirror every category, waiting for all of them.
pub async fn run_category_sync_all(
    config: &Config,
    store: Arc<dyn DocumentStore>,
    categories: &[String],
    events: EventSink,
    cancel: CancellationToken,
) {
    let ctx = SyncContext::new(
        config.sync.clone(),
        store,
        config.store.package_collection.clone(),
    )
    .with_events(events)
    .with_cancel(cancel);

    run_sync(&ctx, categories).await;
}

/// Refresh the license catalog from the configured URL.
pub async fn run_catalog(
    config: &Config,
    store: &dyn DocumentStore,
    cancel: &CancellationToken,
) -> Result<RefreshReport> {
    let fetcher = CatalogFetcher::new(&config.catalog)?;
    run_catalog_refresh(&fetcher, store, &config.store.catalog_collection, cancel).await
}

/// Run the full pipeline: category sync, then catalog refresh.
///
/// Category failures never fail the run; a catalog failure is returned after
/// the sync stage has completed.
pub async fn run_pipeline(
    config: &Config,
    store: Arc<dyn DocumentStore>,
    options: &RunOptions,
    events: EventSink,
    cancel: CancellationToken,
) -> Result<Option<RefreshReport>> {
    let total_steps = [!options.skip_sync, !options.skip_catalog]
        .iter()
        .filter(|on| **on)
        .count();
    let mut current_step = 1;

    if !options.skip_sync {
        let categories = options
            .categories
            .as_deref()
            .unwrap_or(&config.sync.categories);
        log::info!(
            "Step {}/{}: Sync - mirroring {} categories",
            current_step,
            total_steps,
            categories.len()
        );
        run_category_sync_all(config, Arc::clone(&store), categories, events, cancel.clone()).await;
        current_step += 1;
    }

    if options.skip_catalog {
        return Ok(None);
    }

    log::info!(
        "Step {}/{}: Catalog - refreshing license list",
        current_step,
        total_steps
    );
    let report = run_catalog(config, store.as_ref(), &cancel).await?;
    Ok(Some(report))
}
