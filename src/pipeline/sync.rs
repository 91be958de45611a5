// src/pipeline/sync.rs

//! Category sync pipeline.
//!
//! One job per category mirrors `{remote_root}/{category}` into
//! `{local_root}/{category}` and feeds every transferred file through the
//! ingestion sink. Jobs run as independent tasks; a failing category is
//! logged and reported as an event, never to the other jobs.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::events::{EventSink, IngestEvent};
use crate::mirror::{LocalMirror, SyncStats, join_remote, open_remote, synchronize};
use crate::models::{SyncConfig, validate_category};
use crate::services::IngestionSink;
use crate::storage::DocumentStore;

/// Inputs shared by every category job of one sync run.
#[derive(Clone)]
pub struct SyncContext {
    pub config: Arc<SyncConfig>,
    pub store: Arc<dyn DocumentStore>,
    /// Collection receiving license records
    pub collection: String,
    pub events: EventSink,
    pub cancel: CancellationToken,
}

impl SyncContext {
    pub fn new(
        config: SyncConfig,
        store: Arc<dyn DocumentStore>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            collection: collection.into(),
            events: EventSink::disabled(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Run one sync job per category concurrently and wait for all of them.
///
/// Nothing is aggregated: each category's outcome is only visible through
/// logs and the context's event sink.
pub async fn run_sync(ctx: &SyncContext, categories: &[String]) {
    log::info!(
        "Syncing {} categories from {}",
        categories.len(),
        ctx.config.remote_root
    );

    let handles = categories.iter().map(|category| {
        let ctx = ctx.clone();
        let category = category.clone();
        tokio::spawn(async move { run_category_sync(&ctx, &category).await })
    });
    let results = futures::future::join_all(handles).await;

    for (category, result) in categories.iter().zip(results) {
        if let Err(e) = result {
            ctx.events.emit(IngestEvent::CategoryFailed {
                category: category.clone(),
                error: format!("job aborted: {e}"),
            });
        }
    }
}

/// Sync a single category, reporting the outcome as an event.
pub async fn run_category_sync(ctx: &SyncContext, category: &str) {
    match sync_category(ctx, category).await {
        Ok(stats) => ctx.events.emit(IngestEvent::CategoryCompleted {
            category: category.to_string(),
            transferred: stats.transferred,
            skipped: stats.skipped,
            deleted: stats.deleted,
        }),
        Err(e) => ctx.events.emit(IngestEvent::CategoryFailed {
            category: category.to_string(),
            error: e.to_string(),
        }),
    }
}

async fn sync_category(ctx: &SyncContext, category: &str) -> Result<SyncStats> {
    let fail = |e: AppError| AppError::category(category, e);

    validate_category(category).map_err(fail)?;
    let local_root = ctx.config.local_root.join(category);
    let remote_root = join_remote(&ctx.config.remote_root, category).map_err(fail)?;

    let sink = Arc::new(IngestionSink::new(
        Arc::clone(&ctx.store),
        ctx.collection.clone(),
        category,
        ctx.events.clone(),
    ));
    let local = LocalMirror::new(&local_root, sink).await.map_err(fail)?;
    let remote = open_remote(&ctx.config.remote, &remote_root)
        .await
        .map_err(fail)?;

    log::info!(
        "[{}] syncing {} -> {}",
        category,
        remote.describe(),
        local_root.display()
    );

    synchronize(
        &local,
        remote.as_ref(),
        ctx.config.delete_extraneous,
        &ctx.cancel,
    )
    .await
    .map_err(fail)
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use serde_json::Value;
    use tempfile::TempDir;

    use super::*;
    use crate::models::{RemoteBackend, RemoteConfig};
    use crate::storage::{Filter, MemoryStore};

    /// Memory store whose first `insert_many` fails.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        failed_once: AtomicBool,
    }

    #[async_trait]
    impl DocumentStore for FlakyStore {
        async fn insert_many(&self, collection: &str, docs: Vec<Value>) -> Result<usize> {
            if !self.failed_once.swap(true, Ordering::SeqCst) {
                return Err(AppError::insert(collection, "write concern timeout"));
            }
            self.inner.insert_many(collection, docs).await
        }
        async fn count_where(&self, collection: &str, filter: &Filter) -> Result<u64> {
            self.inner.count_where(collection, filter).await
        }
        async fn delete_where(&self, collection: &str, filter: &Filter) -> Result<u64> {
            self.inner.delete_where(collection, filter).await
        }
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn local_config(remote: &Path, local: &Path, categories: &[&str]) -> SyncConfig {
        SyncConfig {
            remote_root: remote.display().to_string(),
            categories: categories.iter().map(|c| c.to_string()).collect(),
            local_root: local.to_path_buf(),
            delete_extraneous: false,
            remote: RemoteConfig {
                backend: RemoteBackend::Local,
                ..RemoteConfig::default()
            },
        }
    }

    async fn drain(mut rx: tokio::sync::mpsc::UnboundedReceiver<IngestEvent>) -> Vec<IngestEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_categories_ingest_into_store() {
        let remote = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        write(remote.path(), "go/part-0.csv", "github.com/a/b,v1.0.0,MIT\nx,1,unknown\n");
        write(remote.path(), "maven/part-0.csv", "org.a:b,2.0,Apache-2.0\n");
        write(remote.path(), "maven/part-1.csv", "org.c:d,1.1,EPL-2.0\n");

        let store = Arc::new(MemoryStore::new());
        let (events, rx) = EventSink::channel();
        let config = local_config(remote.path(), local.path(), &["go", "maven"]);
        let categories = config.categories.clone();
        let ctx = SyncContext::new(config, store.clone(), "pkg").with_events(events);

        run_sync(&ctx, &categories).await;

        assert_eq!(store.documents("pkg").len(), 3);
        assert!(local.path().join("maven/part-1.csv").exists());

        let events = drain(rx).await;
        let completed = events
            .iter()
            .filter(|e| matches!(e, IngestEvent::CategoryCompleted { .. }))
            .count();
        assert_eq!(completed, 2);
    }

    #[tokio::test]
    async fn test_failed_category_does_not_block_others() {
        let remote = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        write(remote.path(), "go/part-0.csv", "a,1,MIT\nb,2,BSD-2-Clause\n");
        // No "maven" directory remotely: its listing fails.

        let store = Arc::new(MemoryStore::new());
        let (events, rx) = EventSink::channel();
        let config = local_config(remote.path(), local.path(), &["maven", "go"]);
        let categories = config.categories.clone();
        let ctx = SyncContext::new(config, store.clone(), "pkg").with_events(events);

        run_sync(&ctx, &categories).await;

        let names: Vec<Value> = store
            .documents("pkg")
            .into_iter()
            .map(|d| d["name"].clone())
            .collect();
        assert_eq!(names, vec![Value::from("a"), Value::from("b")]);

        let events = drain(rx).await;
        assert!(events.iter().any(|e| matches!(
            e,
            IngestEvent::CategoryFailed { category, .. } if category == "maven"
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            IngestEvent::FileIngested { category, records: 2, .. } if category == "go"
        )));
    }

    #[tokio::test]
    async fn test_insert_failure_does_not_stop_category() {
        let remote = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        write(remote.path(), "go/part-0.csv", "a,1,MIT\n");
        write(remote.path(), "go/part-1.csv", "b,2,ISC\nc,3,MIT\n");

        let store = Arc::new(FlakyStore::default());
        let (events, rx) = EventSink::channel();
        let config = local_config(remote.path(), local.path(), &["go"]);
        let ctx = SyncContext::new(config, store.clone(), "pkg").with_events(events);

        run_sync(&ctx, &["go".to_string()]).await;

        let names: Vec<Value> = store
            .inner
            .documents("pkg")
            .into_iter()
            .map(|d| d["name"].clone())
            .collect();
        assert_eq!(names, vec![Value::from("b"), Value::from("c")]);

        let events = drain(rx).await;
        assert!(events.iter().any(|e| matches!(
            e,
            IngestEvent::InsertFailed { records: 1, .. }
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            IngestEvent::CategoryCompleted { transferred: 2, .. }
        )));
        assert!(!events
            .iter()
            .any(|e| matches!(e, IngestEvent::CategoryFailed { .. })));
    }

    #[tokio::test]
    async fn test_invalid_category_fails_alone() {
        let remote = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        write(remote.path(), "go/a.csv", "a,1,MIT\n");

        let store = Arc::new(MemoryStore::new());
        let (events, rx) = EventSink::channel();
        let config = local_config(remote.path(), local.path(), &["go"]);
        let ctx = SyncContext::new(config, store.clone(), "pkg").with_events(events);

        run_sync(&ctx, &["../escape".to_string(), "go".to_string()]).await;

        assert_eq!(
            store
                .count_where("pkg", &Filter::eq("license", "MIT"))
                .await
                .unwrap(),
            1
        );
        let events = drain(rx).await;
        assert!(events.iter().any(|e| matches!(
            e,
            IngestEvent::CategoryFailed { category, .. } if category == "../escape"
        )));
        assert!(!local.path().parent().unwrap().join("escape").exists());
    }

    #[tokio::test]
    async fn test_cancelled_run_ingests_nothing() {
        let remote = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        write(remote.path(), "go/a.csv", "a,1,MIT\n");

        let store = Arc::new(MemoryStore::new());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let config = local_config(remote.path(), local.path(), &["go"]);
        let ctx = SyncContext::new(config, store.clone(), "pkg").with_cancel(cancel);

        run_sync(&ctx, &["go".to_string()]).await;

        assert!(store.documents("pkg").is_empty());
    }
}
