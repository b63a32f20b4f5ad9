use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::comment::{Comment, UpdateCommentRequest};
use crate::models::post::ToggleReactionRequest;
use crate::models::shared::ReactionCount;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/{comment_id}",
    tag = "Comments",
    operation_id = "getComment",
    summary = "Get a comment",
    params(("comment_id" = String, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Comment", body = Comment),
        (status = 404, description = "Comment not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, auth_user))]
pub async fn get_comment(
    auth_user: Option<AuthUser>,
    State(state): State<AppState>,
    Path(comment_id): Path<String>,
) -> Result<Json<Comment>, AppError> {
    Ok(Json(
        state
            .service
            .comment(auth_user.as_ref(), &comment_id)
            .await?,
    ))
}

#[utoipa::path(
    patch,
    path = "/{comment_id}",
    tag = "Comments",
    operation_id = "updateComment",
    summary = "Edit a comment",
    description = "Only the author may edit, and only within the edit window after creation.",
    params(("comment_id" = String, Path, description = "Comment ID")),
    request_body = UpdateCommentRequest,
    responses(
        (status = 200, description = "Updated comment", body = Comment),
        (status = 401, description = "Missing or invalid token (UNAUTHENTICATED)", body = ErrorBody),
        (status = 403, description = "Not the author or edit window passed (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Comment not found (NOT_FOUND)", body = ErrorBody),
        (status = 422, description = "Validation error (INVALID_ARGUMENT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = %auth_user.user_id))]
pub async fn update_comment(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(comment_id): Path<String>,
    AppJson(payload): AppJson<UpdateCommentRequest>,
) -> Result<Json<Comment>, AppError> {
    Ok(Json(
        state
            .service
            .update_comment(&auth_user, &comment_id, &payload.content)
            .await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/{comment_id}",
    tag = "Comments",
    operation_id = "deleteComment",
    summary = "Delete a comment",
    params(("comment_id" = String, Path, description = "Comment ID")),
    responses(
        (status = 204, description = "Comment deleted"),
        (status = 401, description = "Missing or invalid token (UNAUTHENTICATED)", body = ErrorBody),
        (status = 403, description = "Not the author (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Comment not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn delete_comment(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(comment_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.service.delete_comment(&auth_user, &comment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/{comment_id}/toggle_reaction",
    tag = "Comments",
    operation_id = "toggleCommentReaction",
    summary = "React to a comment, or take the reaction back",
    params(("comment_id" = String, Path, description = "Comment ID")),
    request_body = ToggleReactionRequest,
    responses(
        (status = 200, description = "Reactions after the toggle", body = Vec<ReactionCount>),
        (status = 401, description = "Missing or invalid token (UNAUTHENTICATED)", body = ErrorBody),
        (status = 404, description = "Comment not found (NOT_FOUND)", body = ErrorBody),
        (status = 422, description = "Not a single emoji (INVALID_ARGUMENT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = %auth_user.user_id))]
pub async fn toggle_comment_reaction(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(comment_id): Path<String>,
    AppJson(payload): AppJson<ToggleReactionRequest>,
) -> Result<Json<Vec<ReactionCount>>, AppError> {
    Ok(Json(
        state
            .service
            .toggle_comment_reaction(&auth_user, &comment_id, &payload.emoji)
            .await?,
    ))
}
