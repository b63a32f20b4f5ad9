use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use tracing::instrument;

use super::read_image;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::models::shared::{Page, PageArgs};
use crate::models::user::{ToggleFollowOutput, User, UserSearchQuery};
use crate::state::AppState;

/// Multipart form of the avatar upload (documentation only).
#[allow(dead_code)]
#[derive(utoipa::ToSchema)]
pub struct AvatarForm {
    #[schema(value_type = String, format = Binary)]
    pub avatar: Vec<u8>,
}

#[utoipa::path(
    get,
    path = "/me",
    tag = "Users",
    operation_id = "me",
    summary = "Current user",
    responses(
        (status = 200, description = "The signed-in user", body = User),
        (status = 401, description = "Missing or invalid token (UNAUTHENTICATED, INVALID_TOKEN, EXPIRED_TOKEN)", body = ErrorBody),
        (status = 404, description = "User no longer exists (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn me(auth_user: AuthUser, State(state): State<AppState>) -> Result<Json<User>, AppError> {
    Ok(Json(state.service.me(&auth_user).await?))
}

#[utoipa::path(
    put,
    path = "/me/avatar",
    tag = "Users",
    operation_id = "updateAvatar",
    summary = "Replace the avatar",
    description = "Accepts one image in the `avatar` field (JPEG, PNG, GIF, WebP or AVIF). The image is re-encoded to AVIF and scaled down to the avatar resolution.",
    request_body(content = AvatarForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Updated user", body = User),
        (status = 401, description = "Missing or invalid token (UNAUTHENTICATED)", body = ErrorBody),
        (status = 422, description = "Missing or unsupported image (INVALID_ARGUMENT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(user_id = %auth_user.user_id))]
pub async fn update_avatar(
    auth_user: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<User>, AppError> {
    let mut avatar = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::invalid(format!("multipart error: {e}")))?
    {
        if field.name() == Some("avatar") {
            avatar = Some(read_image(field, "avatar").await?);
        }
    }
    let avatar = avatar.ok_or_else(|| AppError::invalid_field("avatar", "avatar is required"))?;

    Ok(Json(state.service.update_avatar(&auth_user, avatar).await?))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Users",
    operation_id = "searchUsers",
    summary = "List or search users",
    description = "Users ordered by username. `search` matches a case-insensitive username fragment.",
    params(UserSearchQuery, PageArgs),
    responses(
        (status = 200, description = "One page of users", body = Page<User>),
        (status = 422, description = "Invalid pagination arguments (INVALID_ARGUMENT)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, auth_user, args))]
pub async fn search_users(
    auth_user: Option<AuthUser>,
    State(state): State<AppState>,
    Query(query): Query<UserSearchQuery>,
    Query(args): Query<PageArgs>,
) -> Result<Json<Page<User>>, AppError> {
    let users = state
        .service
        .search_users(auth_user.as_ref(), query.search.as_deref(), &args)
        .await?;
    Ok(Json(users))
}

#[utoipa::path(
    get,
    path = "/{username}",
    tag = "Users",
    operation_id = "getUser",
    summary = "Get a user profile",
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 200, description = "User profile", body = User),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, auth_user))]
pub async fn get_user(
    auth_user: Option<AuthUser>,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<User>, AppError> {
    Ok(Json(
        state
            .service
            .user_by_username(auth_user.as_ref(), &username)
            .await?,
    ))
}

#[utoipa::path(
    get,
    path = "/{username}/followers",
    tag = "Users",
    operation_id = "listFollowers",
    summary = "Users following a user",
    params(("username" = String, Path, description = "Username"), PageArgs),
    responses(
        (status = 200, description = "One page of followers", body = Page<User>),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, auth_user, args))]
pub async fn list_followers(
    auth_user: Option<AuthUser>,
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(args): Query<PageArgs>,
) -> Result<Json<Page<User>>, AppError> {
    Ok(Json(
        state
            .service
            .followers(auth_user.as_ref(), &username, &args)
            .await?,
    ))
}

#[utoipa::path(
    get,
    path = "/{username}/followees",
    tag = "Users",
    operation_id = "listFollowees",
    summary = "Users a user follows",
    params(("username" = String, Path, description = "Username"), PageArgs),
    responses(
        (status = 200, description = "One page of followees", body = Page<User>),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, auth_user, args))]
pub async fn list_followees(
    auth_user: Option<AuthUser>,
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(args): Query<PageArgs>,
) -> Result<Json<Page<User>>, AppError> {
    Ok(Json(
        state
            .service
            .followees(auth_user.as_ref(), &username, &args)
            .await?,
    ))
}

#[utoipa::path(
    post,
    path = "/{username}/toggle_follow",
    tag = "Users",
    operation_id = "toggleFollow",
    summary = "Follow or unfollow a user",
    description = "Follows the user, or unfollows when already following. The followed user is notified on follow.",
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 200, description = "Follow state after the toggle", body = ToggleFollowOutput),
        (status = 401, description = "Missing or invalid token (UNAUTHENTICATED)", body = ErrorBody),
        (status = 422, description = "Cannot follow yourself (INVALID_ARGUMENT)", body = ErrorBody),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn toggle_follow(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<ToggleFollowOutput>, AppError> {
    let target = state
        .service
        .user_by_username(Some(&auth_user), &username)
        .await?;
    Ok(Json(state.service.toggle_follow(&auth_user, &target.id).await?))
}
