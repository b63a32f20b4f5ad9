use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};

use super::error::StorageError;
use super::traits::{BlobStore, BoxReader};

const TMP_DIR: &str = ".tmp";
const POLICY_DIR: &str = ".policies";

/// Filesystem-backed object store.
///
/// Objects live at `{base_path}/{bucket}/{key}`; keys may contain `/`
/// separators which become nested directories. Bucket policies are kept
/// next to the buckets under `{base_path}/.policies/{bucket}.json`.
pub struct FilesystemBlobStore {
    base_path: PathBuf,
}

impl FilesystemBlobStore {
    /// Create a new filesystem object store.
    pub async fn new(base_path: PathBuf) -> Result<Self, StorageError> {
        fs::create_dir_all(base_path.join(TMP_DIR)).await?;
        fs::create_dir_all(base_path.join(POLICY_DIR)).await?;
        Ok(Self { base_path })
    }

    fn bucket_path(&self, bucket: &str) -> Result<PathBuf, StorageError> {
        if bucket.is_empty() || bucket.starts_with('.') || !is_plain_relative(Path::new(bucket)) {
            return Err(StorageError::InvalidKey(bucket.to_string()));
        }
        Ok(self.base_path.join(bucket))
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        let bucket_path = self.bucket_path(bucket)?;
        if key.is_empty() || !is_plain_relative(Path::new(key)) {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(bucket_path.join(key))
    }

    async fn require_bucket(&self, bucket: &str) -> Result<PathBuf, StorageError> {
        let path = self.bucket_path(bucket)?;
        if !fs::try_exists(&path).await? {
            return Err(StorageError::NoSuchBucket(bucket.to_string()));
        }
        Ok(path)
    }
}

fn is_plain_relative(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_)))
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        mut body: BoxReader,
        _content_type: &str,
    ) -> Result<u64, StorageError> {
        self.require_bucket(bucket).await?;
        let object_path = self.object_path(bucket, key)?;

        // The staged file is removed when `staged` drops, including when this
        // future is dropped mid-write.
        let (file, staged) = tempfile::Builder::new()
            .prefix("put-")
            .tempfile_in(self.base_path.join(TMP_DIR))?
            .into_parts();
        let mut temp_file = fs::File::from_std(file);

        let mut buf = vec![0u8; 64 * 1024];
        let mut total_bytes: u64 = 0;
        loop {
            let n = body.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            total_bytes += n as u64;
            temp_file.write_all(&buf[..n]).await?;
        }
        temp_file.flush().await?;
        drop(temp_file);

        if let Some(parent) = object_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        staged.persist(&object_path).map_err(|e| e.error)?;

        Ok(total_bytes)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<BoxReader, StorageError> {
        let object_path = self.object_path(bucket, key)?;
        match fs::File::open(&object_path).await {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        let object_path = self.object_path(bucket, key)?;
        match fs::remove_file(&object_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn make_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        let path = self.bucket_path(bucket)?;
        fs::create_dir_all(path).await?;
        Ok(())
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StorageError> {
        let path = self.bucket_path(bucket)?;
        Ok(fs::try_exists(path).await?)
    }

    async fn set_bucket_policy(&self, bucket: &str, policy: &str) -> Result<(), StorageError> {
        self.require_bucket(bucket).await?;
        let path = self
            .base_path
            .join(POLICY_DIR)
            .join(format!("{bucket}.json"));
        fs::write(path, policy).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_store() -> (FilesystemBlobStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemBlobStore::new(dir.path().join("blobs")).await.unwrap();
        store.make_bucket("media").await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn nested_keys_are_stored_and_read_back() {
        let (store, _dir) = temp_store().await;
        let key = "2024/01/02/1704164645_abc_0.png";
        let written = store.put("media", key, b"png bytes".to_vec(), "image/png").await.unwrap();
        assert_eq!(written, 9);
        assert_eq!(store.get("media", key).await.unwrap(), b"png bytes");
    }

    #[tokio::test]
    async fn missing_bucket_is_reported() {
        let (store, _dir) = temp_store().await;
        let result = store.put("avatars", "a", b"x".to_vec(), "image/png").await;
        assert!(matches!(result, Err(StorageError::NoSuchBucket(_))));
        assert!(!store.bucket_exists("avatars").await.unwrap());
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let (store, _dir) = temp_store().await;
        for key in ["../escape", "/etc/passwd", "a/../../b", ""] {
            let result = store.put("media", key, b"x".to_vec(), "text/plain").await;
            assert!(matches!(result, Err(StorageError::InvalidKey(_))), "{key}");
        }
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let (store, _dir) = temp_store().await;
        store.put("media", "k", b"x".to_vec(), "text/plain").await.unwrap();
        store.remove_object("media", "k").await.unwrap();
        store.remove_object("media", "k").await.unwrap();
        assert!(matches!(
            store.get("media", "k").await,
            Err(StorageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn policy_is_persisted_per_bucket() {
        let (store, dir) = temp_store().await;
        store.set_bucket_policy("media", "{}").await.unwrap();
        let saved = std::fs::read_to_string(dir.path().join("blobs/.policies/media.json")).unwrap();
        assert_eq!(saved, "{}");
    }

    #[tokio::test]
    async fn ensure_public_bucket_creates_once() {
        let (store, dir) = temp_store().await;
        crate::storage::ensure_public_bucket(&store, "avatars").await.unwrap();
        crate::storage::ensure_public_bucket(&store, "avatars").await.unwrap();
        assert!(store.bucket_exists("avatars").await.unwrap());
        assert!(dir.path().join("blobs/.policies/avatars.json").exists());
    }

    fn staged_files(dir: &tempfile::TempDir) -> usize {
        std::fs::read_dir(dir.path().join("blobs").join(TMP_DIR)).unwrap().count()
    }

    struct FailingReader;

    impl tokio::io::AsyncRead for FailingReader {
        fn poll_read(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Err(std::io::Error::other("connection reset")))
        }
    }

    #[tokio::test]
    async fn failed_read_leaves_no_staged_file() {
        let (store, dir) = temp_store().await;
        let body: BoxReader = Box::new(tokio::io::AsyncReadExt::chain(
            std::io::Cursor::new(b"partial".to_vec()),
            FailingReader,
        ));

        let result = store.put_object("media", "k", body, "text/plain").await;

        assert!(matches!(result, Err(StorageError::Io(_))));
        assert_eq!(staged_files(&dir), 0);
        assert!(matches!(store.get("media", "k").await, Err(StorageError::NotFound { .. })));
    }

    #[tokio::test]
    async fn dropped_write_leaves_no_staged_file() {
        let (store, dir) = temp_store().await;
        let (mut writer, reader) = tokio::io::duplex(1024);
        writer.write_all(b"first half").await.unwrap();

        let put = store.put_object("media", "k", Box::new(reader), "text/plain");
        let timed_out = tokio::time::timeout(std::time::Duration::from_millis(50), put).await;

        assert!(timed_out.is_err());
        assert_eq!(staged_files(&dir), 0);
        drop(writer);
    }
}
