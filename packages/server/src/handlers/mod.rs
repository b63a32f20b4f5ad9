pub mod auth;
pub mod chats;
pub mod comments;
pub mod images;
pub mod notifications;
pub mod posts;
pub mod previews;
pub mod publications;
pub mod streams;
pub mod timeline;
pub mod users;

use axum::extract::DefaultBodyLimit;
use axum::extract::multipart::Field;
use common::storage::BoxReader;

use crate::error::AppError;

/// Largest single image accepted in a multipart upload.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Body limit for routes taking image uploads.
pub fn upload_body_limit(max_files: usize) -> DefaultBodyLimit {
    DefaultBodyLimit::max(max_files.max(1) * MAX_IMAGE_BYTES + 64 * 1024)
}

/// Buffer one multipart file field, enforcing [`MAX_IMAGE_BYTES`].
pub(crate) async fn read_image(mut field: Field<'_>, name: &str) -> Result<BoxReader, AppError> {
    let mut data = Vec::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::invalid_field(name, format!("upload read error: {e}")))?
    {
        if data.len() + chunk.len() > MAX_IMAGE_BYTES {
            return Err(AppError::invalid_field(
                name,
                format!("file exceeds maximum size of {MAX_IMAGE_BYTES} bytes"),
            ));
        }
        data.extend_from_slice(&chunk);
    }
    if data.is_empty() {
        return Err(AppError::invalid_field(name, "file cannot be empty"));
    }
    Ok(Box::new(std::io::Cursor::new(data)))
}
