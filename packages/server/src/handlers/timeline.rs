use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::models::shared::{Page, PageArgs};
use crate::models::timeline::TimelineItem;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/",
    tag = "Timeline",
    operation_id = "timeline",
    summary = "The caller's home feed",
    description = "Own posts and posts of followed users, newest first.",
    params(PageArgs),
    responses(
        (status = 200, description = "One page of timeline items", body = Page<TimelineItem>),
        (status = 401, description = "Missing or invalid token (UNAUTHENTICATED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, args), fields(user_id = %auth_user.user_id))]
pub async fn timeline(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(args): Query<PageArgs>,
) -> Result<Json<Page<TimelineItem>>, AppError> {
    Ok(Json(state.service.timeline(&auth_user, &args).await?))
}

#[utoipa::path(
    delete,
    path = "/{item_id}",
    tag = "Timeline",
    operation_id = "deleteTimelineItem",
    summary = "Hide a post from the caller's feed",
    description = "The post itself is untouched.",
    params(("item_id" = String, Path, description = "Timeline item ID")),
    responses(
        (status = 204, description = "Item removed"),
        (status = 401, description = "Missing or invalid token (UNAUTHENTICATED)", body = ErrorBody),
        (status = 404, description = "Item not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn delete_timeline_item(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(item_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .service
        .delete_timeline_item(&auth_user, &item_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
