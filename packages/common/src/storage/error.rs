use thiserror::Error;

/// Errors that can occur during blob storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested object was not found.
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },
    /// The bucket does not exist.
    #[error("bucket not found: {0}")]
    NoSuchBucket(String),
    /// The object key cannot be stored safely.
    #[error("invalid object key: {0}")]
    InvalidKey(String),
    /// An I/O error occurred.
    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The remote object store rejected the request.
    #[error("object store error: {0}")]
    Backend(String),
    /// The operation was abandoned before it finished.
    #[error("upload cancelled")]
    Cancelled,
    /// A background task panicked.
    #[error("storage task panicked: {0}")]
    Panicked(String),
}
