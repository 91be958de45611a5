//! Directory-tree mirroring.
//!
//! [`synchronize`] copies every object under a [`RemoteSource`] into a
//! [`LocalMirror`] and hands each file it writes to the mirror's
//! [`FileSink`] once the file is fully in place.
//!
//! ## Transfer rules
//!
//! - objects whose key ends in `/` are directory markers and are ignored
//! - keys with `.` or `..` segments, or naming a `.partial` file, are skipped
//! - keys resolving to an already seen local path are skipped
//! - a local file with the same size, not older than the remote object, is
//!   left alone
//! - downloads land in `{file}.partial` and are renamed into place
//! - with `delete_extraneous`, local files absent remotely are removed

pub mod local;
#[cfg(feature = "s3")]
pub mod s3;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::{RemoteBackend, RemoteConfig, validate_category};

pub use local::LocalDirSource;
#[cfg(feature = "s3")]
pub use s3::S3Source;

const PARTIAL_SUFFIX: &str = "partial";

/// An object listed under a remote root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    /// Key relative to the remote root, `/`-separated
    pub key: String,
    /// Size in bytes
    pub size: u64,
    /// Last modification time, when the remote reports one
    pub modified: Option<SystemTime>,
}

/// Trait for remote trees the mirror can copy from.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Human-readable location, for logs.
    fn describe(&self) -> String;

    /// List every object under the root.
    async fn list(&self) -> Result<Vec<RemoteObject>>;

    /// Stream one object into `dest`, returning the bytes written.
    async fn fetch_to(&self, key: &str, dest: &mut (dyn AsyncWrite + Send + Unpin)) -> Result<u64>;
}

/// Callback invoked for every file the mirror writes.
#[async_trait]
pub trait FileSink: Send + Sync {
    async fn on_file_complete(&self, path: &Path, reader: &mut (dyn AsyncBufRead + Send + Unpin));
}

/// Local destination of a mirror run.
pub struct LocalMirror {
    root_dir: PathBuf,
    sink: Arc<dyn FileSink>,
}

impl LocalMirror {
    /// Create the mirror root if needed and attach the sink.
    pub async fn new(root_dir: impl Into<PathBuf>, sink: Arc<dyn FileSink>) -> Result<Self> {
        let root_dir = root_dir.into();
        tokio::fs::create_dir_all(&root_dir).await?;
        Ok(Self { root_dir, sink })
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Map a remote key onto a path under the root.
    ///
    /// Returns `None` for directory markers, keys that would leave the root,
    /// and keys that collide with in-flight download files.
    fn path_for(&self, key: &str) -> Option<PathBuf> {
        if key.is_empty() || key.ends_with('/') {
            return None;
        }
        let mut path = self.root_dir.clone();
        for segment in key.split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." || segment.contains('\\') {
                return None;
            }
            path.push(segment);
        }
        let is_partial = path.extension().is_some_and(|ext| ext == PARTIAL_SUFFIX);
        (!is_partial).then_some(path)
    }
}

/// Counters for one synchronize call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncStats {
    pub listed: usize,
    pub transferred: usize,
    pub skipped: usize,
    pub deleted: usize,
}

/// Join a category onto a remote root.
pub fn join_remote(root: &str, category: &str) -> Result<String> {
    validate_category(category)?;
    let base = root.trim_end_matches('/');
    if base.is_empty() {
        return Err(AppError::validation(format!(
            "remote root '{root}' has no path to join onto"
        )));
    }
    Ok(format!("{base}/{category}"))
}

/// Construct the remote handle configured for `root`.
pub async fn open_remote(config: &RemoteConfig, root: &str) -> Result<Box<dyn RemoteSource>> {
    match config.backend {
        RemoteBackend::Local => Ok(Box::new(LocalDirSource::new(root))),
        #[cfg(feature = "s3")]
        RemoteBackend::S3 => Ok(Box::new(S3Source::connect(config, root).await?)),
        #[cfg(not(feature = "s3"))]
        RemoteBackend::S3 => Err(AppError::config(
            "remote backend 's3' requires the `s3` feature",
        )),
    }
}

/// Mirror `remote` into `local`.
///
/// Files are transferred one at a time; each file's sink callback completes
/// before the next transfer starts. The first listing or transfer error
/// aborts the run.
pub async fn synchronize(
    local: &LocalMirror,
    remote: &dyn RemoteSource,
    delete_extraneous: bool,
    cancel: &CancellationToken,
) -> Result<SyncStats> {
    let objects = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(AppError::Cancelled),
        listed = remote.list() => listed?,
    };

    let mut stats = SyncStats {
        listed: objects.len(),
        ..SyncStats::default()
    };
    let mut wanted = HashSet::new();

    for object in &objects {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let Some(path) = local.path_for(&object.key) else {
            if !object.key.ends_with('/') {
                log::warn!("Skipping unsafe key {:?} from {}", object.key, remote.describe());
            }
            continue;
        };
        if !wanted.insert(path.clone()) {
            log::warn!(
                "Skipping {:?} from {}: resolves to an already synced file",
                object.key,
                remote.describe()
            );
            continue;
        }

        if is_unchanged(&path, object).await {
            stats.skipped += 1;
            continue;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = tokio::fs::remove_file(partial_path(&path)).await;
                return Err(AppError::Cancelled);
            }
            transferred = transfer(remote, &object.key, &path) => transferred?,
        };
        stats.transferred += 1;

        let file = tokio::fs::File::open(&path).await?;
        let mut reader = BufReader::new(file);
        local.sink.on_file_complete(&path, &mut reader).await;
    }

    if delete_extraneous {
        for (path, _) in walk_files(local.root()).await? {
            if !wanted.contains(&path) {
                tokio::fs::remove_file(&path).await?;
                log::debug!("Removed extraneous {}", path.display());
                stats.deleted += 1;
            }
        }
    }

    Ok(stats)
}

async fn is_unchanged(path: &Path, object: &RemoteObject) -> bool {
    let Ok(meta) = tokio::fs::metadata(path).await else {
        return false;
    };
    if !meta.is_file() || meta.len() != object.size {
        return false;
    }
    match (object.modified, meta.modified()) {
        (Some(remote), Ok(local)) => local >= remote,
        _ => true,
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Download one object (write to `.partial`, then rename).
async fn transfer(remote: &dyn RemoteSource, key: &str, path: &Path) -> Result<u64> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp = partial_path(path);
    let mut file = tokio::fs::File::create(&tmp).await?;
    let written = match remote.fetch_to(key, &mut file).await {
        Ok(written) => written,
        Err(e) => {
            drop(file);
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }
    };
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp, path).await?;
    log::debug!("Transferred {} ({} bytes)", path.display(), written);
    Ok(written)
}

/// Recursively list regular files under `root` with their metadata.
pub(crate) async fn walk_files(root: &Path) -> Result<Vec<(PathBuf, std::fs::Metadata)>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                files.push((entry.path(), entry.metadata().await?));
            }
        }
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    use super::*;

    /// Records the path and contents of every completed file.
    #[derive(Default)]
    struct RecordingSink {
        files: Mutex<Vec<(PathBuf, String)>>,
    }

    #[async_trait]
    impl FileSink for RecordingSink {
        async fn on_file_complete(
            &self,
            path: &Path,
            reader: &mut (dyn AsyncBufRead + Send + Unpin),
        ) {
            let mut content = String::new();
            reader.read_to_string(&mut content).await.unwrap();
            self.files
                .lock()
                .unwrap()
                .push((path.to_path_buf(), content));
        }
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn test_sync_copies_and_notifies() {
        let remote_dir = TempDir::new().unwrap();
        let local_dir = TempDir::new().unwrap();
        write(remote_dir.path(), "a.csv", "foo,1.0.0,MIT\n");
        write(remote_dir.path(), "nested/b.csv", "bar,2.0.0,Apache-2.0\n");

        let sink = Arc::new(RecordingSink::default());
        let local = LocalMirror::new(local_dir.path(), sink.clone()).await.unwrap();
        let remote = LocalDirSource::new(remote_dir.path());

        let stats = synchronize(&local, &remote, false, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(stats.listed, 2);
        assert_eq!(stats.transferred, 2);
        assert!(local_dir.path().join("nested/b.csv").exists());

        let files = sink.files.lock().unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().any(|(_, c)| c == "foo,1.0.0,MIT\n"));
    }

    #[tokio::test]
    async fn test_unchanged_files_are_skipped() {
        let remote_dir = TempDir::new().unwrap();
        let local_dir = TempDir::new().unwrap();
        write(remote_dir.path(), "a.csv", "foo,1.0.0,MIT\n");

        let sink = Arc::new(RecordingSink::default());
        let local = LocalMirror::new(local_dir.path(), sink.clone()).await.unwrap();
        let remote = LocalDirSource::new(remote_dir.path());
        let cancel = CancellationToken::new();

        synchronize(&local, &remote, false, &cancel).await.unwrap();
        let second = synchronize(&local, &remote, false, &cancel).await.unwrap();

        assert_eq!(second.transferred, 0);
        assert_eq!(second.skipped, 1);
        assert_eq!(sink.files.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_extraneous() {
        let remote_dir = TempDir::new().unwrap();
        let local_dir = TempDir::new().unwrap();
        write(remote_dir.path(), "keep.csv", "x");
        write(local_dir.path(), "stale.csv", "y");

        let sink = Arc::new(RecordingSink::default());
        let local = LocalMirror::new(local_dir.path(), sink).await.unwrap();
        let remote = LocalDirSource::new(remote_dir.path());
        let cancel = CancellationToken::new();

        let stats = synchronize(&local, &remote, false, &cancel).await.unwrap();
        assert_eq!(stats.deleted, 0);
        assert!(local_dir.path().join("stale.csv").exists());

        let stats = synchronize(&local, &remote, true, &cancel).await.unwrap();
        assert_eq!(stats.deleted, 1);
        assert!(!local_dir.path().join("stale.csv").exists());
        assert!(local_dir.path().join("keep.csv").exists());
    }

    #[tokio::test]
    async fn test_missing_remote_root_fails() {
        let local_dir = TempDir::new().unwrap();
        let sink = Arc::new(RecordingSink::default());
        let local = LocalMirror::new(local_dir.path(), sink).await.unwrap();
        let remote = LocalDirSource::new(local_dir.path().join("does-not-exist"));

        let result = synchronize(&local, &remote, false, &CancellationToken::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let remote_dir = TempDir::new().unwrap();
        let local_dir = TempDir::new().unwrap();
        write(remote_dir.path(), "a.csv", "x");

        let sink = Arc::new(RecordingSink::default());
        let local = LocalMirror::new(local_dir.path(), sink.clone()).await.unwrap();
        let remote = LocalDirSource::new(remote_dir.path());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = synchronize(&local, &remote, false, &cancel).await;
        assert!(matches!(result, Err(AppError::Cancelled)));
        assert!(sink.files.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_path_for_rejects_escaping_keys() {
        let local_dir = TempDir::new().unwrap();
        let sink = Arc::new(RecordingSink::default());
        let local = LocalMirror::new(local_dir.path(), sink).await.unwrap();

        assert!(local.path_for("../etc/passwd").is_none());
        assert!(local.path_for("a/./b").is_none());
        assert!(local.path_for("dir/").is_none());
        assert!(local.path_for("go/part-0.csv.partial").is_none());
        assert_eq!(
            local.path_for("a//b.csv"),
            Some(local_dir.path().join("a").join("b.csv"))
        );
    }

    /// Fixed set of in-memory objects.
    struct StaticSource {
        objects: Vec<(&'static str, &'static str)>,
    }

    #[async_trait]
    impl RemoteSource for StaticSource {
        fn describe(&self) -> String {
            "static".to_string()
        }

        async fn list(&self) -> Result<Vec<RemoteObject>> {
            Ok(self
                .objects
                .iter()
                .map(|(key, body)| RemoteObject {
                    key: key.to_string(),
                    size: body.len() as u64,
                    modified: None,
                })
                .collect())
        }

        async fn fetch_to(
            &self,
            key: &str,
            dest: &mut (dyn AsyncWrite + Send + Unpin),
        ) -> Result<u64> {
            let body = self
                .objects
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, body)| *body)
                .ok_or_else(|| AppError::validation(format!("no object {key}")))?;
            dest.write_all(body.as_bytes()).await?;
            Ok(body.len() as u64)
        }
    }

    #[tokio::test]
    async fn test_colliding_keys_transfer_once() {
        let local_dir = TempDir::new().unwrap();
        let sink = Arc::new(RecordingSink::default());
        let local = LocalMirror::new(local_dir.path(), sink.clone()).await.unwrap();
        let remote = StaticSource {
            objects: vec![
                ("a/b.csv", "x,1,MIT\n"),
                ("a//b.csv", "y,2,MIT\n"),
                ("c.csv.partial", "z,3,MIT\n"),
            ],
        };

        let stats = synchronize(&local, &remote, false, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(stats.listed, 3);
        assert_eq!(stats.transferred, 1);
        let files = sink.files.lock().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].1, "x,1,MIT\n");
        assert!(!local_dir.path().join("c.csv.partial").exists());
    }

    #[tokio::test]
    async fn test_same_size_rewrite_is_transferred() {
        let remote_dir = TempDir::new().unwrap();
        let local_dir = TempDir::new().unwrap();
        write(remote_dir.path(), "a.csv", "foo,1,MIT\n");

        let sink = Arc::new(RecordingSink::default());
        let local = LocalMirror::new(local_dir.path(), sink.clone()).await.unwrap();
        let remote = LocalDirSource::new(remote_dir.path());
        let cancel = CancellationToken::new();
        synchronize(&local, &remote, false, &cancel).await.unwrap();

        // Upstream rewrites the file with the same length; the local copy is older.
        write(remote_dir.path(), "a.csv", "bar,1,MIT\n");
        std::fs::File::options()
            .write(true)
            .open(local_dir.path().join("a.csv"))
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(3600))
            .unwrap();

        let stats = synchronize(&local, &remote, false, &cancel).await.unwrap();

        assert_eq!(stats.transferred, 1);
        assert_eq!(
            std::fs::read_to_string(local_dir.path().join("a.csv")).unwrap(),
            "bar,1,MIT\n"
        );
        assert_eq!(sink.files.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_join_remote() {
        assert_eq!(
            join_remote("bucket/v1/", "go").unwrap(),
            "bucket/v1/go".to_string()
        );
        assert_eq!(join_remote("bucket/v1", "maven").unwrap(), "bucket/v1/maven");
        assert!(join_remote("bucket/v1/", "").is_err());
        assert!(join_remote("bucket/v1/", "a/b").is_err());
        assert!(join_remote("/", "go").is_err());
    }

    #[test]
    fn test_partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/tmp/go/a.csv")),
            PathBuf::from("/tmp/go/a.csv.partial")
        );
    }
}
