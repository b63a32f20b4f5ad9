//! Batch uploads with compensating deletion.
//!
//! [`Uploader::upload_many`] stores a batch concurrently and hands back a
//! [`Cleanup`] guard. The caller keeps the guard until everything that
//! depends on the uploads has committed and then calls [`Cleanup::defuse`].
//! Dropping an armed guard deletes the uploaded objects in the background.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::StorageError;
use super::traits::{BlobStore, BoxReader};

/// One object to upload.
pub struct Upload {
    pub key: String,
    pub content_type: String,
    pub body: BoxReader,
}

/// Object key for the `index`-th attachment of an upload batch.
///
/// Layout: `YYYY/MM/DD/<unix>_<id>_<index>.<ext>`.
pub fn attachment_key(now: DateTime<Utc>, id: &str, index: usize, ext: &str) -> String {
    format!(
        "{}/{}_{}_{}.{}",
        now.format("%Y/%m/%d"),
        now.timestamp(),
        id,
        index,
        ext
    )
}

#[derive(Clone)]
pub struct Uploader {
    store: Arc<dyn BlobStore>,
    cleanup_timeout: Duration,
    errors: Option<mpsc::Sender<StorageError>>,
}

impl Uploader {
    pub fn new(store: Arc<dyn BlobStore>, cleanup_timeout: Duration) -> Self {
        Self {
            store,
            cleanup_timeout,
            errors: None,
        }
    }

    /// Report background cleanup failures on `errors`. Reports are dropped
    /// when the channel is full.
    pub fn with_error_sink(mut self, errors: mpsc::Sender<StorageError>) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    /// Upload every item of `uploads` to `bucket` concurrently.
    ///
    /// The first failure cancels the uploads still running. Once all of them
    /// have settled, objects that did get stored are removed in the
    /// background and the failure is returned.
    pub async fn upload_many(
        &self,
        cancel: &CancellationToken,
        bucket: &str,
        uploads: Vec<Upload>,
    ) -> Result<Cleanup, StorageError> {
        let token = cancel.child_token();

        let tasks = uploads.into_iter().map(|upload| {
            let token = token.clone();
            let store = self.store.clone();
            async move {
                let result = tokio::select! {
                    _ = token.cancelled() => Err(StorageError::Cancelled),
                    r = store.put_object(bucket, &upload.key, upload.body, &upload.content_type) => r,
                };
                if result.is_err() {
                    token.cancel();
                }
                (upload.key, result)
            }
        });

        let mut stored = Vec::new();
        let mut failure: Option<StorageError> = None;
        for (key, result) in join_all(tasks).await {
            match result {
                Ok(_) => stored.push(key),
                Err(StorageError::Cancelled) => {
                    failure.get_or_insert(StorageError::Cancelled);
                }
                Err(e) => {
                    if matches!(failure, None | Some(StorageError::Cancelled)) {
                        failure = Some(e);
                    }
                }
            }
        }

        let cleanup = Cleanup {
            store: self.store.clone(),
            bucket: bucket.to_string(),
            keys: stored,
            timeout: self.cleanup_timeout,
            errors: self.errors.clone(),
            armed: true,
        };

        match failure {
            None => Ok(cleanup),
            Some(e) => {
                warn!(bucket, error = %e, "Upload batch failed, removing stored objects");
                drop(cleanup);
                Err(e)
            }
        }
    }
}

/// Guard over a batch of stored objects.
///
/// Unless defused, dropping the guard removes the objects in a background
/// task bounded by the cleanup timeout.
#[must_use = "dropping the guard removes the uploaded objects"]
pub struct Cleanup {
    store: Arc<dyn BlobStore>,
    bucket: String,
    keys: Vec<String>,
    timeout: Duration,
    errors: Option<mpsc::Sender<StorageError>>,
    armed: bool,
}

impl Cleanup {
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Keep the uploaded objects.
    pub fn defuse(mut self) {
        self.armed = false;
    }

    /// Remove the uploaded objects now, returning the background task.
    pub fn run(mut self) -> Option<JoinHandle<()>> {
        self.armed = false;
        self.spawn_removal()
    }

    fn spawn_removal(&mut self) -> Option<JoinHandle<()>> {
        let keys = std::mem::take(&mut self.keys);
        if keys.is_empty() {
            return None;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(bucket = %self.bucket, count = keys.len(), "No runtime to remove orphaned objects");
            return None;
        };

        let store = self.store.clone();
        let bucket = self.bucket.clone();
        let timeout = self.timeout;
        let errors = self.errors.clone();

        Some(runtime.spawn(async move {
            let removal = AssertUnwindSafe(remove_all(store, &bucket, keys)).catch_unwind();
            let failures = match tokio::time::timeout(timeout, removal).await {
                Ok(Ok(failures)) => failures,
                Ok(Err(panic)) => vec![StorageError::Panicked(panic_message(panic.as_ref()))],
                Err(_) => vec![StorageError::Backend(format!(
                    "cleanup of bucket {bucket} timed out after {timeout:?}"
                ))],
            };
            for e in failures {
                warn!(bucket = %bucket, error = %e, "Failed to remove orphaned object");
                if let Some(errors) = &errors {
                    let _ = errors.try_send(e);
                }
            }
        }))
    }
}

impl Drop for Cleanup {
    fn drop(&mut self) {
        if self.armed {
            self.spawn_removal();
        }
    }
}

async fn remove_all(store: Arc<dyn BlobStore>, bucket: &str, keys: Vec<String>) -> Vec<StorageError> {
    let removals = keys.iter().map(|key| store.remove_object(bucket, key));
    let results = join_all(removals).await;
    debug!(bucket, count = keys.len(), "Removed orphaned objects");
    results.into_iter().filter_map(Result::err).collect()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FilesystemBlobStore;
    use async_trait::async_trait;
    use std::io::Cursor;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncRead, ReadBuf};

    struct FailingReader;

    impl AsyncRead for FailingReader {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Err(std::io::Error::other("connection reset")))
        }
    }

    fn upload(key: &str, body: BoxReader) -> Upload {
        Upload {
            key: key.to_string(),
            content_type: "image/png".to_string(),
            body,
        }
    }

    fn bytes(data: &[u8]) -> BoxReader {
        Box::new(Cursor::new(data.to_vec()))
    }

    async fn fs_store() -> (Arc<dyn BlobStore>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemBlobStore::new(dir.path().to_path_buf()).await.unwrap();
        store.make_bucket("media").await.unwrap();
        (Arc::new(store), dir)
    }

    async fn wait_until_missing(store: &Arc<dyn BlobStore>, key: &str) -> bool {
        for _ in 0..100 {
            if matches!(
                store.get("media", key).await,
                Err(StorageError::NotFound { .. })
            ) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[test]
    fn attachment_keys_follow_date_layout() {
        let now = DateTime::from_timestamp(1_704_164_645, 0).unwrap();
        assert_eq!(
            attachment_key(now, "abc", 2, "avif"),
            "2024/01/02/1704164645_abc_2.avif"
        );
    }

    #[tokio::test]
    async fn defused_batch_is_kept() {
        let (store, _dir) = fs_store().await;
        let uploader = Uploader::new(store.clone(), Duration::from_secs(5));
        let cleanup = uploader
            .upload_many(
                &CancellationToken::new(),
                "media",
                vec![upload("a.png", bytes(b"a")), upload("b.png", bytes(b"b"))],
            )
            .await
            .unwrap();
        assert_eq!(cleanup.keys().len(), 2);
        cleanup.defuse();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.get("media", "a.png").await.unwrap(), b"a");
        assert_eq!(store.get("media", "b.png").await.unwrap(), b"b");
    }

    #[tokio::test]
    async fn dropped_guard_removes_objects() {
        let (store, _dir) = fs_store().await;
        let uploader = Uploader::new(store.clone(), Duration::from_secs(5));
        let cleanup = uploader
            .upload_many(&CancellationToken::new(), "media", vec![upload("a.png", bytes(b"a"))])
            .await
            .unwrap();
        drop(cleanup);
        assert!(wait_until_missing(&store, "a.png").await);
    }

    #[tokio::test]
    async fn failed_batch_removes_stored_objects() {
        let (store, _dir) = fs_store().await;
        let uploader = Uploader::new(store.clone(), Duration::from_secs(5));
        let result = uploader
            .upload_many(
                &CancellationToken::new(),
                "media",
                vec![
                    upload("ok.png", bytes(b"fine")),
                    upload("bad.png", Box::new(FailingReader)),
                ],
            )
            .await;
        assert!(matches!(result, Err(StorageError::Io(_))));
        assert!(wait_until_missing(&store, "ok.png").await);
        assert!(wait_until_missing(&store, "bad.png").await);
    }

    #[tokio::test]
    async fn cancelled_batch_reports_cancellation() {
        let (store, _dir) = fs_store().await;
        let uploader = Uploader::new(store, Duration::from_secs(5));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = uploader
            .upload_many(&cancel, "media", vec![upload("a.png", bytes(b"a"))])
            .await;
        assert!(matches!(result, Err(StorageError::Cancelled)));
    }

    struct PanickingStore;

    #[async_trait]
    impl BlobStore for PanickingStore {
        async fn put_object(
            &self,
            _bucket: &str,
            _key: &str,
            _body: BoxReader,
            _content_type: &str,
        ) -> Result<u64, StorageError> {
            Ok(1)
        }

        async fn get_object(&self, bucket: &str, key: &str) -> Result<BoxReader, StorageError> {
            Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
        }

        async fn remove_object(&self, _bucket: &str, _key: &str) -> Result<(), StorageError> {
            panic!("remove exploded");
        }

        async fn make_bucket(&self, _bucket: &str) -> Result<(), StorageError> {
            Ok(())
        }

        async fn bucket_exists(&self, _bucket: &str) -> Result<bool, StorageError> {
            Ok(true)
        }

        async fn set_bucket_policy(&self, _bucket: &str, _policy: &str) -> Result<(), StorageError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn panic_during_cleanup_is_reported() {
        let (tx, mut rx) = mpsc::channel(4);
        let uploader =
            Uploader::new(Arc::new(PanickingStore), Duration::from_secs(5)).with_error_sink(tx);
        let cleanup = uploader
            .upload_many(&CancellationToken::new(), "media", vec![upload("a", bytes(b"a"))])
            .await
            .unwrap();
        cleanup.run().unwrap().await.unwrap();
        match rx.recv().await {
            Some(StorageError::Panicked(msg)) => assert_eq!(msg, "remove exploded"),
            other => panic!("unexpected report: {other:?}"),
        }
    }
}
