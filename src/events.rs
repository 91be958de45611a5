// src/events.rs

//! Structured outcome events for the sync pipeline.
//!
//! Sync jobs and the ingestion sink return nothing to their callers. Each
//! outcome is logged where it happens and, when a receiver is attached, also
//! sent as an [`IngestEvent`] so callers can observe results without parsing
//! log text.

use std::path::PathBuf;

use tokio::sync::mpsc;

/// One observable outcome of a sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestEvent {
    /// A synced file was parsed and its batch stored
    FileIngested {
        category: String,
        path: PathBuf,
        records: usize,
    },
    /// Reading a synced file stopped early; the lines read so far are kept
    ReadFailed {
        category: String,
        path: PathBuf,
        error: String,
    },
    /// The batch for a synced file could not be stored
    InsertFailed {
        category: String,
        path: PathBuf,
        records: usize,
        error: String,
    },
    /// A category job finished its synchronize call
    CategoryCompleted {
        category: String,
        transferred: usize,
        skipped: usize,
        deleted: usize,
    },
    /// A category job stopped early
    CategoryFailed { category: String, error: String },
}

impl IngestEvent {
    pub fn category(&self) -> &str {
        match self {
            Self::FileIngested { category, .. }
            | Self::ReadFailed { category, .. }
            | Self::InsertFailed { category, .. }
            | Self::CategoryCompleted { category, .. }
            | Self::CategoryFailed { category, .. } => category,
        }
    }

    fn log(&self) {
        match self {
            Self::FileIngested {
                category,
                path,
                records,
            } => log::info!("[{}] {} records from {}", category, records, path.display()),
            Self::ReadFailed {
                category,
                path,
                error,
            } => log::warn!("[{}] error scanning {}: {}", category, path.display(), error),
            Self::InsertFailed {
                category,
                path,
                records,
                error,
            } => log::error!(
                "[{}] insert of {} records from {} failed: {}",
                category,
                records,
                path.display(),
                error
            ),
            Self::CategoryCompleted {
                category,
                transferred,
                skipped,
                deleted,
            } => log::info!(
                "[{}] sync complete: {} transferred, {} unchanged, {} deleted",
                category,
                transferred,
                skipped,
                deleted
            ),
            Self::CategoryFailed { category, error } => {
                log::error!("[{}] sync failed: {}", category, error)
            }
        }
    }
}

/// Fan-out point for [`IngestEvent`]s: always logs, optionally forwards.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<IngestEvent>>,
}

impl EventSink {
    /// Log-only sink.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Sink forwarding every event to the returned receiver.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<IngestEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn emit(&self, event: IngestEvent) {
        event.log();
        if let Some(tx) = &self.tx {
            // A dropped receiver only means nobody is listening anymore.
            let _ = tx.send(event);
        }
    }
}
