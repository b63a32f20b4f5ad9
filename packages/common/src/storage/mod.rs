mod error;
mod traits;

pub mod filesystem;
#[cfg(feature = "object-storage")]
pub mod s3;
pub mod uploader;

pub use error::StorageError;
pub use filesystem::FilesystemBlobStore;
pub use traits::{BlobStore, BoxReader, ensure_public_bucket, public_read_policy};
pub use uploader::{Cleanup, Upload, Uploader, attachment_key};
