//! Local directory tree as a mirror source.
//!
//! Lets a plain directory (an NFS export, a pre-downloaded dump, a test
//! fixture) stand in for the object store.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::AsyncWrite;

use crate::error::{AppError, Result};
use crate::mirror::{RemoteObject, RemoteSource, walk_files};

/// Directory tree read as a remote.
#[derive(Debug, Clone)]
pub struct LocalDirSource {
    root_dir: PathBuf,
}

impl LocalDirSource {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }
}

#[async_trait]
impl RemoteSource for LocalDirSource {
    fn describe(&self) -> String {
        self.root_dir.display().to_string()
    }

    async fn list(&self) -> Result<Vec<RemoteObject>> {
        let files = walk_files(&self.root_dir).await?;
        files
            .into_iter()
            .map(|(path, meta)| {
                let rel = path.strip_prefix(&self.root_dir).map_err(|e| {
                    AppError::validation(format!("{} outside source root: {e}", path.display()))
                })?;
                let key = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                Ok(RemoteObject {
                    key,
                    size: meta.len(),
                    modified: meta.modified().ok(),
                })
            })
            .collect()
    }

    async fn fetch_to(&self, key: &str, dest: &mut (dyn AsyncWrite + Send + Unpin)) -> Result<u64> {
        let mut file = tokio::fs::File::open(self.root_dir.join(key)).await?;
        Ok(tokio::io::copy(&mut file, dest).await?)
    }
}
