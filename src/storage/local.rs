//! Local filesystem document store.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── package_licenses.jsonl   # one document per line, append-only
//! └── licenses.jsonl           # rewritten on delete / swap
//! ```
//!
//! Inserts append to the collection file. Deletes and swaps rewrite it to a
//! temporary file and rename it into place, so a reader never sees a
//! half-written collection. All operations on one store are serialized.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::storage::{DocumentStore, Filter, SwapMetadata};

/// JSON-lines document store rooted at a directory.
pub struct LocalStore {
    root_dir: PathBuf,
    lock: Mutex<()>,
}

impl LocalStore {
    /// Open (creating if needed) a store rooted at the given directory.
    pub async fn open(root_dir: impl Into<PathBuf>) -> Result<Self> {
        let root_dir = root_dir.into();
        tokio::fs::create_dir_all(&root_dir).await.map_err(|e| {
            AppError::connection(format!(
                "cannot open document store at {}: {e}",
                root_dir.display()
            ))
        })?;

        Ok(Self {
            root_dir,
            lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Get the file path for a collection.
    fn path(&self, collection: &str) -> PathBuf {
        self.root_dir.join(format!("{collection}.jsonl"))
    }

    /// Read every document, returning an empty list if the file doesn't exist.
    async fn read_documents(&self, collection: &str) -> Result<Vec<Value>> {
        let bytes = match tokio::fs::read(self.path(collection)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::Io(e)),
        };

        bytes
            .split(|b| *b == b'\n')
            .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
            .map(|line| serde_json::from_slice(line).map_err(AppError::from))
            .collect()
    }

    fn encode(docs: &[Value]) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        for doc in docs {
            serde_json::to_writer(&mut buf, doc)?;
            buf.push(b'\n');
        }
        Ok(buf)
    }

    /// Append documents to the collection file.
    async fn append_documents(&self, collection: &str, docs: &[Value]) -> Result<()> {
        let buf = Self::encode(docs)?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(collection))
            .await?;
        file.write_all(&buf).await?;
        file.flush().await?;
        Ok(())
    }

    /// Replace the collection file atomically (write to temp, then rename).
    async fn write_documents(&self, collection: &str, docs: &[Value]) -> Result<()> {
        let path = self.path(collection);
        let tmp = path.with_extension("jsonl.tmp");

        let buf = Self::encode(docs)?;
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&buf).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for LocalStore {
    async fn insert_many(&self, collection: &str, docs: Vec<Value>) -> Result<usize> {
        if docs.is_empty() {
            return Ok(0);
        }
        let _guard = self.lock.lock().await;
        self.append_documents(collection, &docs)
            .await
            .map_err(|e| AppError::insert(collection, e))?;
        Ok(docs.len())
    }

    async fn count_where(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let _guard = self.lock.lock().await;
        let docs = self
            .read_documents(collection)
            .await
            .map_err(|e| AppError::count(collection, e))?;
        Ok(docs.iter().filter(|doc| filter.matches(doc)).count() as u64)
    }

    async fn delete_where(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let _guard = self.lock.lock().await;
        let docs = self
            .read_documents(collection)
            .await
            .map_err(|e| AppError::delete(collection, e))?;

        let before = docs.len();
        let kept: Vec<Value> = docs.into_iter().filter(|doc| !filter.matches(doc)).collect();
        let deleted = (before - kept.len()) as u64;
        if deleted == 0 {
            return Ok(0);
        }

        self.write_documents(collection, &kept)
            .await
            .map_err(|e| AppError::delete(collection, e))?;
        Ok(deleted)
    }

    async fn swap(&self, collection: &str, docs: Vec<Value>, keep: &Filter) -> Result<SwapMetadata> {
        let _guard = self.lock.lock().await;
        let existing = self
            .read_documents(collection)
            .await
            .map_err(|e| AppError::insert(collection, e))?;

        let before = existing.len();
        let mut next: Vec<Value> = existing.into_iter().filter(|doc| keep.matches(doc)).collect();
        let deleted = (before - next.len()) as u64;
        let inserted = docs.len();
        next.extend(docs);

        self.write_documents(collection, &next)
            .await
            .map_err(|e| AppError::insert(collection, e))?;

        log::debug!(
            "Swapped {}: {} inserted, {} removed in one rewrite",
            collection,
            inserted,
            deleted
        );

        Ok(SwapMetadata {
            inserted,
            deleted,
            atomic: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_insert_and_count() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::open(tmp.path()).await.unwrap();

        let docs = vec![json!({"v": "a"}), json!({"v": "b"}), json!({"v": "a"})];
        assert_eq!(store.insert_many("c", docs).await.unwrap(), 3);

        assert_eq!(store.count_where("c", &Filter::eq("v", "a")).await.unwrap(), 2);
        assert_eq!(store.count_where("c", &Filter::ne("v", "a")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_count_missing_collection_is_zero() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::open(tmp.path()).await.unwrap();

        assert_eq!(store.count_where("nope", &Filter::eq("v", "a")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_insert_creates_nothing() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::open(tmp.path()).await.unwrap();

        assert_eq!(store.insert_many("c", Vec::new()).await.unwrap(), 0);
        assert!(!store.path("c").exists());
    }

    #[tokio::test]
    async fn test_delete_where_rewrites_file() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::open(tmp.path()).await.unwrap();

        store
            .insert_many("c", vec![json!({"v": "a"}), json!({"v": "b"})])
            .await
            .unwrap();

        assert_eq!(store.delete_where("c", &Filter::ne("v", "b")).await.unwrap(), 1);
        assert_eq!(store.count_where("c", &Filter::eq("v", "a")).await.unwrap(), 0);
        assert_eq!(store.count_where("c", &Filter::eq("v", "b")).await.unwrap(), 1);
        assert!(!store.path("c").with_extension("jsonl.tmp").exists());
    }

    #[tokio::test]
    async fn test_swap_is_atomic() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::open(tmp.path()).await.unwrap();

        store
            .insert_many("c", vec![json!({"v": "old"}), json!({"v": "old"})])
            .await
            .unwrap();

        let meta = store
            .swap("c", vec![json!({"v": "new"})], &Filter::eq("v", "new"))
            .await
            .unwrap();

        assert_eq!(
            meta,
            SwapMetadata {
                inserted: 1,
                deleted: 2,
                atomic: true
            }
        );
        assert_eq!(store.count_where("c", &Filter::ne("v", "new")).await.unwrap(), 0);
        assert_eq!(store.count_where("c", &Filter::eq("v", "new")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_keep_every_line() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(LocalStore::open(tmp.path()).await.unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    let docs = (0..50).map(|n| json!({"job": i, "n": n})).collect();
                    store.insert_many("c", docs).await.unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.count_where("c", &Filter::ne("job", -1)).await.unwrap(), 400);
    }

    #[tokio::test]
    async fn test_open_fails_on_file_root() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();

        let result = LocalStore::open(&file).await;
        assert!(matches!(result, Err(AppError::Connection(_))));
    }
}
