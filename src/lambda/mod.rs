// src/lambda/mod.rs

//! AWS Lambda handler for the license pipelines.
//!
//! A scheduled invocation:
//! 1. Loads configuration from `CONFIG_PATH` (or defaults) plus environment overrides
//! 2. Mirrors the requested categories into the package collection
//! 3. Refreshes the license catalog
//!
//! Per-category outcomes are collected from the event channel and returned
//! alongside the catalog result.

use std::collections::BTreeMap;
use std::sync::Arc;

use lambda_runtime::{Error as LambdaError, LambdaEvent};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use crate::config::load_lambda_config;
use crate::error::Result;
use crate::events::{EventSink, IngestEvent};
use crate::models::Config;
use crate::pipeline::{RefreshReport, RefreshState, RunOptions, run_pipeline};
use crate::storage::{DocumentStore, LocalStore};

/// Lambda invocation payload.
#[derive(Debug, Default, Deserialize)]
pub struct RunRequest {
    /// Skip the category mirror stage
    #[serde(default)]
    pub skip_sync: bool,

    /// Skip the catalog refresh stage
    #[serde(default)]
    pub skip_catalog: bool,

    /// Categories to sync (optional, syncs the configured ones if not specified)
    #[serde(default)]
    pub categories: Option<Vec<String>>,
}

impl RunRequest {
    fn options(&self) -> RunOptions {
        RunOptions {
            skip_sync: self.skip_sync,
            skip_catalog: self.skip_catalog,
            categories: self.categories.clone(),
        }
    }
}

/// Outcome of one category job.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySummary {
    pub category: String,
    /// Files whose batch was stored
    pub files: usize,
    /// Records stored across those files
    pub records: usize,
    /// Files that could not be fully read or stored
    pub failed_files: usize,
    /// Set when the job itself stopped early
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Lambda response payload.
#[derive(Debug, Default, Serialize)]
pub struct RunResponse {
    /// Whether every requested stage that can fail the run succeeded
    pub success: bool,

    /// Catalog refresh outcome, absent when skipped or failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_state: Option<RefreshState>,

    /// Fetched `licenseListVersion`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_version: Option<String>,

    /// Per-category outcomes
    pub categories: Vec<CategorySummary>,

    /// Error message if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

/// Main Lambda handler function.
#[instrument(skip(event))]
pub async fn handler(
    event: LambdaEvent<RunRequest>,
) -> std::result::Result<RunResponse, LambdaError> {
    let start = std::time::Instant::now();
    let (request, _context) = event.into_parts();

    info!(
        "Starting run: skip_sync={}, skip_catalog={}, categories={:?}",
        request.skip_sync, request.skip_catalog, request.categories
    );

    let mut response = match load_lambda_config() {
        Ok(config) => execute(&config, &request).await,
        Err(e) => RunResponse {
            error: Some(e.to_string()),
            ..Default::default()
        },
    };
    response.execution_time_ms = start.elapsed().as_millis() as u64;

    match &response.error {
        None => info!(
            "Run completed: {} categories, catalog {:?} in {}ms",
            response.categories.len(),
            response.catalog_state,
            response.execution_time_ms
        ),
        Some(e) => error!("Run failed: {}", e),
    }
    Ok(response)
}

/// Run the requested stages against the configured store.
async fn execute(config: &Config, request: &RunRequest) -> RunResponse {
    let store: Arc<dyn DocumentStore> = match LocalStore::open(&config.store.root).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            return RunResponse {
                error: Some(e.to_string()),
                ..Default::default()
            };
        }
    };

    let (events, rx) = EventSink::channel();
    let outcome = run_pipeline(
        config,
        store,
        &request.options(),
        events,
        CancellationToken::new(),
    )
    .await;

    let mut response = RunResponse {
        categories: summarize(drain(rx)),
        ..Default::default()
    };
    record_catalog(&mut response, outcome);
    response
}

fn record_catalog(response: &mut RunResponse, outcome: Result<Option<RefreshReport>>) {
    match outcome {
        Ok(report) => {
            response.success = true;
            if let Some(report) = report {
                response.catalog_state = Some(report.state);
                response.catalog_version = Some(report.version);
            }
        }
        Err(e) => response.error = Some(e.to_string()),
    }
}

fn drain(mut rx: UnboundedReceiver<IngestEvent>) -> Vec<IngestEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Fold sync events into one summary per category, ordered by name.
pub fn summarize(events: impl IntoIterator<Item = IngestEvent>) -> Vec<CategorySummary> {
    let mut summaries: BTreeMap<String, CategorySummary> = BTreeMap::new();

    for event in events {
        let summary = summaries
            .entry(event.category().to_string())
            .or_insert_with(|| CategorySummary {
                category: event.category().to_string(),
                ..Default::default()
            });
        match event {
            IngestEvent::FileIngested { records, .. } => {
                summary.files += 1;
                summary.records += records;
            }
            IngestEvent::ReadFailed { .. } | IngestEvent::InsertFailed { .. } => {
                summary.failed_files += 1;
            }
            IngestEvent::CategoryFailed { error, .. } => summary.error = Some(error),
            IngestEvent::CategoryCompleted { .. } => {}
        }
    }

    summaries.into_values().collect()
}
