// src/pipeline/refresh.rs

//! Version-gated license catalog refresh.
//!
//! The store holds one `licenseListVersion` at a time. A run fetches the
//! catalog, and only when no entry of the fetched version is stored yet,
//! inserts the new entries and purges every other version.

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::CatalogEntry;
use crate::services::CatalogSource;
use crate::storage::{DocumentStore, Filter, to_documents};

/// Final state of a refresh run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshState {
    /// The fetched version was already stored; nothing was written
    Unchanged,
    /// The fetched version replaced whatever was stored
    Swapped,
}

/// Summary of a refresh run.
#[derive(Debug, Clone)]
pub struct RefreshReport {
    pub state: RefreshState,
    /// Fetched `licenseListVersion`
    pub version: String,
    /// Licenses in the fetched catalog
    pub fetched: usize,
    /// Entries of other versions removed
    pub removed: u64,
}

/// Refresh the catalog collection from `source`.
///
/// Fetch or decode failures abort before the store is touched. Count,
/// insert and delete failures are returned as errors; if the purge fails
/// after the insert, entries of older versions stay in the store and are
/// not revisited by later runs of the same version.
pub async fn run_catalog_refresh(
    source: &dyn CatalogSource,
    store: &dyn DocumentStore,
    collection: &str,
    cancel: &CancellationToken,
) -> Result<RefreshReport> {
    let document = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(AppError::Cancelled),
        fetched = source.fetch() => fetched?,
    };

    let (version, entries) = document.into_entries();
    let fetched = entries.len();
    let current = Filter::eq(CatalogEntry::VERSION_FIELD, version.as_str());

    let existing = store.count_where(collection, &current).await?;
    if existing > 0 {
        log::info!(
            "License list {} already stored ({} entries); nothing to do",
            version,
            existing
        );
        return Ok(RefreshReport {
            state: RefreshState::Unchanged,
            version,
            fetched,
            removed: 0,
        });
    }

    if entries.is_empty() {
        log::error!("License list {} has no licenses - refusing to swap", version);
        return Err(AppError::EmptyCatalog { version });
    }
    if cancel.is_cancelled() {
        return Err(AppError::Cancelled);
    }

    let docs = to_documents(&entries)?;
    let swapped = match store.swap(collection, docs, &current).await {
        Ok(swapped) => swapped,
        Err(e @ AppError::Delete { .. }) => {
            log::warn!(
                "License list {} inserted but older versions remain in {}",
                version,
                collection
            );
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    log::info!(
        "License list {} stored: {} inserted, {} stale entries removed{}",
        version,
        swapped.inserted,
        swapped.deleted,
        if swapped.atomic { "" } else { " (two-step)" }
    );

    Ok(RefreshReport {
        state: RefreshState::Swapped,
        version,
        fetched,
        removed: swapped.deleted,
    })
}
