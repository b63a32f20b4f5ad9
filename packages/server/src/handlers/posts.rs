use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::instrument;

use super::read_image;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::comment::{Comment, CreateCommentRequest};
use crate::models::post::{
    CreatePost, CreatePostForm, Post, PostFilter, SubscriptionState, ToggleReactionRequest,
    UpdatePostRequest,
};
use crate::models::shared::{Page, PageArgs, ReactionCount};
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/",
    tag = "Posts",
    operation_id = "createPost",
    summary = "Publish a post",
    description = "Multipart form with `content`, optional `is_r18` and up to the configured number of `attachments` images. Content may be empty when at least one image is attached. Followers get the post in their timeline and mentioned users are notified.",
    request_body(content = CreatePostForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Post created", body = Post),
        (status = 401, description = "Missing or invalid token (UNAUTHENTICATED)", body = ErrorBody),
        (status = 422, description = "Validation error or unsupported image (INVALID_ARGUMENT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(user_id = %auth_user.user_id))]
pub async fn create_post(
    auth_user: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let max_attachments = state.config.media.max_attachments;
    let mut input = CreatePost {
        content: String::new(),
        is_r18: false,
        images: Vec::new(),
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::invalid(format!("multipart error: {e}")))?
    {
        match field.name() {
            Some("content") => {
                input.content = field
                    .text()
                    .await
                    .map_err(|e| AppError::invalid_field("content", format!("read error: {e}")))?;
            }
            Some("is_r18") => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| AppError::invalid_field("is_r18", format!("read error: {e}")))?;
                input.is_r18 = raw
                    .trim()
                    .parse()
                    .map_err(|_| AppError::invalid_field("is_r18", "must be true or false"))?;
            }
            Some("attachments") => {
                if input.images.len() >= max_attachments {
                    return Err(AppError::invalid_field(
                        "attachments",
                        format!("at most {max_attachments} attachments allowed"),
                    ));
                }
                input.images.push(read_image(field, "attachments").await?);
            }
            _ => {}
        }
    }

    let post = state.service.create_post(&auth_user, input).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Posts",
    operation_id = "listPosts",
    summary = "List posts",
    description = "Newest first. Filter by author `username` or by `tag`.",
    params(PostFilter, PageArgs),
    responses(
        (status = 200, description = "One page of posts", body = Page<Post>),
        (status = 404, description = "Filtered user not found (NOT_FOUND)", body = ErrorBody),
        (status = 422, description = "Invalid pagination arguments (INVALID_ARGUMENT)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, auth_user, filter, args))]
pub async fn list_posts(
    auth_user: Option<AuthUser>,
    State(state): State<AppState>,
    Query(filter): Query<PostFilter>,
    Query(args): Query<PageArgs>,
) -> Result<Json<Page<Post>>, AppError> {
    Ok(Json(
        state
            .service
            .posts(auth_user.as_ref(), &filter, &args)
            .await?,
    ))
}

#[utoipa::path(
    get,
    path = "/{post_id}",
    tag = "Posts",
    operation_id = "getPost",
    summary = "Get a post",
    params(("post_id" = String, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post", body = Post),
        (status = 404, description = "Post not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, auth_user))]
pub async fn get_post(
    auth_user: Option<AuthUser>,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Result<Json<Post>, AppError> {
    Ok(Json(state.service.post(auth_user.as_ref(), &post_id).await?))
}

#[utoipa::path(
    patch,
    path = "/{post_id}",
    tag = "Posts",
    operation_id = "updatePost",
    summary = "Edit a post",
    description = "Only the author may edit, and only within the edit window after creation.",
    params(("post_id" = String, Path, description = "Post ID")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Updated post", body = Post),
        (status = 401, description = "Missing or invalid token (UNAUTHENTICATED)", body = ErrorBody),
        (status = 403, description = "Not the author or edit window passed (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Post not found (NOT_FOUND)", body = ErrorBody),
        (status = 422, description = "Validation error (INVALID_ARGUMENT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = %auth_user.user_id))]
pub async fn update_post(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    AppJson(payload): AppJson<UpdatePostRequest>,
) -> Result<Json<Post>, AppError> {
    Ok(Json(
        state
            .service
            .update_post(&auth_user, &post_id, payload)
            .await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/{post_id}",
    tag = "Posts",
    operation_id = "deletePost",
    summary = "Delete a post",
    description = "Removes the post with its comments, reactions, and timeline entries. Attached images are deleted afterwards.",
    params(("post_id" = String, Path, description = "Post ID")),
    responses(
        (status = 204, description = "Post deleted"),
        (status = 401, description = "Missing or invalid token (UNAUTHENTICATED)", body = ErrorBody),
        (status = 403, description = "Not the author (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Post not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn delete_post(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.service.delete_post(&auth_user, &post_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/{post_id}/toggle_reaction",
    tag = "Posts",
    operation_id = "togglePostReaction",
    summary = "React to a post, or take the reaction back",
    params(("post_id" = String, Path, description = "Post ID")),
    request_body = ToggleReactionRequest,
    responses(
        (status = 200, description = "Reactions after the toggle", body = Vec<ReactionCount>),
        (status = 401, description = "Missing or invalid token (UNAUTHENTICATED)", body = ErrorBody),
        (status = 404, description = "Post not found (NOT_FOUND)", body = ErrorBody),
        (status = 422, description = "Not a single emoji (INVALID_ARGUMENT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = %auth_user.user_id))]
pub async fn toggle_post_reaction(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    AppJson(payload): AppJson<ToggleReactionRequest>,
) -> Result<Json<Vec<ReactionCount>>, AppError> {
    Ok(Json(
        state
            .service
            .toggle_post_reaction(&auth_user, &post_id, &payload.emoji)
            .await?,
    ))
}

#[utoipa::path(
    post,
    path = "/{post_id}/toggle_subscription",
    tag = "Posts",
    operation_id = "togglePostSubscription",
    summary = "Subscribe to a post's comments, or unsubscribe",
    params(("post_id" = String, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Subscription after the toggle", body = SubscriptionState),
        (status = 401, description = "Missing or invalid token (UNAUTHENTICATED)", body = ErrorBody),
        (status = 404, description = "Post not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn toggle_post_subscription(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Result<Json<SubscriptionState>, AppError> {
    let subscribed = state
        .service
        .toggle_post_subscription(&auth_user, &post_id)
        .await?;
    Ok(Json(SubscriptionState { subscribed }))
}

#[utoipa::path(
    post,
    path = "/{post_id}/comments",
    tag = "Comments",
    operation_id = "createComment",
    summary = "Comment on a post",
    description = "Subscribes the commenter to the post. Other subscribers and mentioned users are notified.",
    params(("post_id" = String, Path, description = "Post ID")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment created", body = Comment),
        (status = 401, description = "Missing or invalid token (UNAUTHENTICATED)", body = ErrorBody),
        (status = 404, description = "Post not found (NOT_FOUND)", body = ErrorBody),
        (status = 422, description = "Validation error (INVALID_ARGUMENT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = %auth_user.user_id))]
pub async fn create_comment(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    AppJson(payload): AppJson<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let comment = state
        .service
        .create_comment(&auth_user, &post_id, &payload.content)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

#[utoipa::path(
    get,
    path = "/{post_id}/comments",
    tag = "Comments",
    operation_id = "listComments",
    summary = "List a post's comments",
    description = "Newest first.",
    params(("post_id" = String, Path, description = "Post ID"), PageArgs),
    responses(
        (status = 200, description = "One page of comments", body = Page<Comment>),
        (status = 404, description = "Post not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, auth_user, args))]
pub async fn list_comments(
    auth_user: Option<AuthUser>,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Query(args): Query<PageArgs>,
) -> Result<Json<Page<Comment>>, AppError> {
    Ok(Json(
        state
            .service
            .comments(auth_user.as_ref(), &post_id, &args)
            .await?,
    ))
}
