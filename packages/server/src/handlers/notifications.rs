use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::models::notification::{Notification, UnreadStatus};
use crate::models::shared::{Page, PageArgs};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/",
    tag = "Notifications",
    operation_id = "listNotifications",
    summary = "List the caller's notifications",
    description = "Newest first. Repeated events of the same kind on the same subject are merged into one unread notification listing every actor.",
    params(PageArgs),
    responses(
        (status = 200, description = "One page of notifications", body = Page<Notification>),
        (status = 401, description = "Missing or invalid token (UNAUTHENTICATED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, args), fields(user_id = %auth_user.user_id))]
pub async fn list_notifications(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(args): Query<PageArgs>,
) -> Result<Json<Page<Notification>>, AppError> {
    Ok(Json(state.service.notifications(&auth_user, &args).await?))
}

#[utoipa::path(
    get,
    path = "/has_unread",
    tag = "Notifications",
    operation_id = "hasUnreadNotifications",
    summary = "Whether any notification is unread",
    responses(
        (status = 200, description = "Unread status", body = UnreadStatus),
        (status = 401, description = "Missing or invalid token (UNAUTHENTICATED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn has_unread_notifications(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UnreadStatus>, AppError> {
    let has_unread = state.service.has_unread_notifications(&auth_user).await?;
    Ok(Json(UnreadStatus { has_unread }))
}

#[utoipa::path(
    post,
    path = "/{notification_id}/read",
    tag = "Notifications",
    operation_id = "readNotification",
    summary = "Mark one notification as read",
    params(("notification_id" = String, Path, description = "Notification ID")),
    responses(
        (status = 204, description = "Marked as read"),
        (status = 401, description = "Missing or invalid token (UNAUTHENTICATED)", body = ErrorBody),
        (status = 404, description = "Notification not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn read_notification(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(notification_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .service
        .read_notification(&auth_user, &notification_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/read_all",
    tag = "Notifications",
    operation_id = "readAllNotifications",
    summary = "Mark every notification as read",
    responses(
        (status = 204, description = "All marked as read"),
        (status = 401, description = "Missing or invalid token (UNAUTHENTICATED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn read_all_notifications(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    state.service.read_all_notifications(&auth_user).await?;
    Ok(StatusCode::NO_CONTENT)
}
