use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use tokio_util::io::ReaderStream;
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::state::AppState;

/// Stored objects never change once written.
const CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

#[utoipa::path(
    get,
    path = "/img/{bucket}/{key}",
    tag = "Media",
    operation_id = "getImage",
    summary = "Serve a stored image",
    description = "Used as the public URL prefix when no CDN fronts the object store.",
    params(
        ("bucket" = String, Path, description = "Media or avatars bucket"),
        ("key" = String, Path, description = "Object key, may contain slashes"),
    ),
    responses(
        (status = 200, description = "Image bytes"),
        (status = 404, description = "Image not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_image(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let reader = state.service.open_image(&bucket, &key).await?;
    let content_type = mime_guess::from_path(&key).first_or_octet_stream();

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CACHE_CONTROL, CACHE_CONTROL.to_string()),
        ],
        Body::from_stream(ReaderStream::new(reader)),
    )
        .into_response())
}
