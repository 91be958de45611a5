// src/services/sink.rs

//! Ingestion sink: turns each mirrored export file into one bulk insert.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::events::{EventSink, IngestEvent};
use crate::mirror::FileSink;
use crate::services::transform::transform_line;
use crate::storage::{DocumentStore, to_documents};

/// File-completion callback that parses export lines into the store.
pub struct IngestionSink {
    store: Arc<dyn DocumentStore>,
    collection: String,
    category: String,
    events: EventSink,
}

impl IngestionSink {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        collection: impl Into<String>,
        category: impl Into<String>,
        events: EventSink,
    ) -> Self {
        Self {
            store,
            collection: collection.into(),
            category: category.into(),
            events,
        }
    }
}

/// Drop a trailing `\n` or `\r\n`.
fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[async_trait]
impl FileSink for IngestionSink {
    async fn on_file_complete(&self, path: &Path, reader: &mut (dyn AsyncBufRead + Send + Unpin)) {
        log::debug!("[{}] ingesting {}", self.category, path.display());

        let mut records = Vec::new();
        let mut undecodable = 0usize;
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => match std::str::from_utf8(strip_line_ending(&buf)) {
                    Ok(line) => records.extend(transform_line(line)),
                    Err(_) => undecodable += 1,
                },
                Err(e) => {
                    self.events.emit(IngestEvent::ReadFailed {
                        category: self.category.clone(),
                        path: path.to_path_buf(),
                        error: e.to_string(),
                    });
                    break;
                }
            }
        }
        if undecodable > 0 {
            log::debug!(
                "[{}] skipped {} non-UTF-8 lines in {}",
                self.category,
                undecodable,
                path.display()
            );
        }

        let count = records.len();
        let inserted = match to_documents(&records) {
            Ok(docs) => self.store.insert_many(&self.collection, docs).await,
            Err(e) => Err(e),
        };

        match inserted {
            Ok(_) => self.events.emit(IngestEvent::FileIngested {
                category: self.category.clone(),
                path: path.to_path_buf(),
                records: count,
            }),
            Err(e) => self.events.emit(IngestEvent::InsertFailed {
                category: self.category.clone(),
                path: path.to_path_buf(),
                records: count,
                error: e.to_string(),
            }),
        }
    }
}
