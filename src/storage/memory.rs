//! In-process document store.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::storage::{DocumentStore, Filter};

/// Collection name to documents, held in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Vec<Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a collection's documents in insertion order.
    pub fn documents(&self, collection: &str) -> Vec<Value> {
        self.collections
            .lock()
            .map(|map| map.get(collection).cloned().unwrap_or_default())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_many(&self, collection: &str, docs: Vec<Value>) -> Result<usize> {
        let mut map = self
            .collections
            .lock()
            .map_err(|e| AppError::insert(collection, e))?;
        let inserted = docs.len();
        map.entry(collection.to_string()).or_default().extend(docs);
        Ok(inserted)
    }

    async fn count_where(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let map = self
            .collections
            .lock()
            .map_err(|e| AppError::count(collection, e))?;
        Ok(map
            .get(collection)
            .map_or(0, |docs| docs.iter().filter(|doc| filter.matches(doc)).count()) as u64)
    }

    async fn delete_where(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let mut map = self
            .collections
            .lock()
            .map_err(|e| AppError::delete(collection, e))?;
        let Some(docs) = map.get_mut(collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|doc| !filter.matches(doc));
        Ok((before - docs.len()) as u64)
    }
}
