use std::io::Cursor;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::error::StorageError;

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// Bucketed object storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store the whole of `body` under `bucket/key`, returning the byte count.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: BoxReader,
        content_type: &str,
    ) -> Result<u64, StorageError>;

    /// Store a byte buffer.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<u64, StorageError> {
        let reader: BoxReader = Box::new(Cursor::new(data));
        self.put_object(bucket, key, reader, content_type).await
    }

    /// Open an object as a streaming async reader.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<BoxReader, StorageError>;

    /// Retrieve all bytes of an object.
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let mut reader = self.get_object(bucket, key).await?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Delete an object. Deleting a missing object is not an error.
    async fn remove_object(&self, bucket: &str, key: &str) -> Result<(), StorageError>;

    async fn make_bucket(&self, bucket: &str) -> Result<(), StorageError>;

    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StorageError>;

    /// Attach a JSON policy document to a bucket.
    async fn set_bucket_policy(&self, bucket: &str, policy: &str) -> Result<(), StorageError>;
}

/// Policy document granting anonymous read access to every object in `bucket`.
pub fn public_read_policy(bucket: &str) -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "AWS": ["*"] },
            "Action": ["s3:GetObject"],
            "Resource": [format!("arn:aws:s3:::{bucket}/*")],
        }],
    })
    .to_string()
}

/// Create `bucket` with a public-read policy unless it already exists.
pub async fn ensure_public_bucket(
    store: &dyn BlobStore,
    bucket: &str,
) -> Result<(), StorageError> {
    if store.bucket_exists(bucket).await? {
        return Ok(());
    }
    store.make_bucket(bucket).await?;
    store
        .set_bucket_policy(bucket, &public_read_policy(bucket))
        .await?;
    tracing::info!(bucket, "Created public-read bucket");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_read_policy_targets_bucket_objects() {
        let policy: serde_json::Value = serde_json::from_str(&public_read_policy("media")).unwrap();
        let statement = &policy["Statement"][0];
        assert_eq!(statement["Effect"], "Allow");
        assert_eq!(statement["Action"][0], "s3:GetObject");
        assert_eq!(statement["Resource"][0], "arn:aws:s3:::media/*");
    }
}
