use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Builder, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use tokio::io::AsyncReadExt;

use super::error::StorageError;
use super::traits::{BlobStore, BoxReader};

/// Connection settings for an S3-compatible object store such as MinIO.
#[derive(Debug, Clone)]
pub struct S3Settings {
    /// `host:port`, or a full URL.
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub secure: bool,
    pub region: String,
}

/// Object store backed by an S3-compatible service.
#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
}

impl S3BlobStore {
    pub fn new(settings: &S3Settings) -> Self {
        let endpoint = if settings.endpoint.contains("://") {
            settings.endpoint.clone()
        } else {
            let scheme = if settings.secure { "https" } else { "http" };
            format!("{scheme}://{}", settings.endpoint)
        };
        let credentials = Credentials::new(
            &settings.access_key,
            &settings.secret_key,
            None,
            None,
            "nakama-static",
        );
        let config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(endpoint)
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();
        Self {
            client: Client::from_conf(config),
        }
    }
}

fn backend<E>(err: E) -> StorageError
where
    E: std::error::Error,
{
    StorageError::Backend(DisplayErrorContext(err).to_string())
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        mut body: BoxReader,
        content_type: &str,
    ) -> Result<u64, StorageError> {
        let mut data = Vec::new();
        body.read_to_end(&mut data).await?;
        let size = data.len() as u64;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .content_length(size as i64)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(backend)?;
        Ok(size)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<BoxReader, StorageError> {
        let output = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(output) => output,
            Err(e) if e.as_service_error().is_some_and(|e| e.is_no_such_key()) => {
                return Err(StorageError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                });
            }
            Err(e) => return Err(backend(e)),
        };
        let bytes = output.body.collect().await.map_err(backend)?.into_bytes();
        Ok(Box::new(std::io::Cursor::new(bytes.to_vec())))
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn make_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        self.client
            .create_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StorageError> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|e| e.is_not_found()) => Ok(false),
            Err(e) => Err(backend(e)),
        }
    }

    async fn set_bucket_policy(&self, bucket: &str, policy: &str) -> Result<(), StorageError> {
        self.client
            .put_bucket_policy()
            .bucket(bucket)
            .policy(policy)
            .send()
            .await
            .map_err(backend)?;
        Ok(())
    }
}
