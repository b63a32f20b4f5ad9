use axum::Json;
use axum::extract::State;
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::models::preview::{LinkPreview, LinkPreviewsRequest};
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/link_previews",
    tag = "Link Previews",
    operation_id = "linkPreviews",
    summary = "Fetch OpenGraph metadata for links",
    description = "Previews come back in request order. A URL that cannot be fetched or parsed gets a null `preview`.",
    request_body = LinkPreviewsRequest,
    responses(
        (status = 200, description = "One preview per URL", body = Vec<LinkPreview>),
        (status = 422, description = "No URLs or too many (INVALID_ARGUMENT)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(count = payload.urls.len()))]
pub async fn link_previews(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LinkPreviewsRequest>,
) -> Result<Json<Vec<LinkPreview>>, AppError> {
    Ok(Json(state.service.link_previews(payload.urls).await?))
}
