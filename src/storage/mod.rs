//! Document store abstractions.
//!
//! The pipelines only need a key-free bulk store with three operations:
//! insert many documents, count by filter, delete by filter. Filters are
//! exact matches on a single top-level field.
//!
//! ## Backends
//!
//! ```text
//! LocalStore   {root}/{collection}.jsonl   one JSON document per line
//! MemoryStore  in-process                   tests
//! ```

pub mod local;
pub mod memory;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::{AppError, Result};

// Re-export for convenience
pub use local::LocalStore;
pub use memory::MemoryStore;

/// Single-field exact-match filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals the value
    Eq { field: String, value: Value },
    /// Field differs from the value, or is absent
    Ne { field: String, value: Value },
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Ne {
            field: field.into(),
            value: value.into(),
        }
    }

    /// The filter matching exactly the documents this one rejects.
    pub fn negate(&self) -> Self {
        match self {
            Self::Eq { field, value } => Self::Ne {
                field: field.clone(),
                value: value.clone(),
            },
            Self::Ne { field, value } => Self::Eq {
                field: field.clone(),
                value: value.clone(),
            },
        }
    }

    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Self::Eq { field, value } => doc.get(field) == Some(value),
            Self::Ne { field, value } => doc.get(field) != Some(value),
        }
    }
}

/// Serialize typed records into store documents.
pub fn to_documents<T: Serialize>(items: &[T]) -> Result<Vec<Value>> {
    items
        .iter()
        .map(|item| serde_json::to_value(item).map_err(AppError::from))
        .collect()
}

/// Metadata about a version swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapMetadata {
    /// Documents inserted
    pub inserted: usize,
    /// Documents removed
    pub deleted: u64,
    /// Whether insert and delete were applied as one unit
    pub atomic: bool,
}

/// Trait for document store backends.
///
/// Implementations must accept concurrent `insert_many` calls from
/// independent sync jobs.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Append documents to a collection. An empty batch is a no-op.
    async fn insert_many(&self, collection: &str, docs: Vec<Value>) -> Result<usize>;

    /// Count documents matching the filter.
    async fn count_where(&self, collection: &str, filter: &Filter) -> Result<u64>;

    /// Remove documents matching the filter, returning how many were removed.
    async fn delete_where(&self, collection: &str, filter: &Filter) -> Result<u64>;

    /// Insert `docs`, then drop every document not matching `keep`.
    ///
    /// The default runs the two steps independently: between them both the
    /// old and the new documents are visible, and a failed delete leaves the
    /// old ones in place. Backends that can apply both steps as one unit
    /// override this.
    async fn swap(&self, collection: &str, docs: Vec<Value>, keep: &Filter) -> Result<SwapMetadata> {
        let inserted = self.insert_many(collection, docs).await?;
        let deleted = self.delete_where(collection, &keep.negate()).await?;
        Ok(SwapMetadata {
            inserted,
            deleted,
            atomic: false,
        })
    }
}
