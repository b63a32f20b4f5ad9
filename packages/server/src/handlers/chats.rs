use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::chat::{
    Chat, ChatLookupQuery, CreateChatOutput, CreateChatRequest, CreateMessageRequest, Message,
};
use crate::models::notification::UnreadStatus;
use crate::models::shared::{Page, PageArgs};
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/",
    tag = "Chats",
    operation_id = "createChat",
    summary = "Start a chat with another user",
    description = "Creates the chat with its first message. The recipient must accept (by replying) before further messages reach them.",
    request_body = CreateChatRequest,
    responses(
        (status = 201, description = "Chat and first message", body = CreateChatOutput),
        (status = 401, description = "Missing or invalid token (UNAUTHENTICATED)", body = ErrorBody),
        (status = 404, description = "Recipient not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "A chat between both users exists (ALREADY_EXISTS)", body = ErrorBody),
        (status = 422, description = "Validation error or chat with yourself (INVALID_ARGUMENT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = %auth_user.user_id))]
pub async fn create_chat(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateChatRequest>,
) -> Result<impl IntoResponse, AppError> {
    let output = state
        .service
        .create_chat(&auth_user, &payload.user_id, &payload.content)
        .await?;
    Ok((StatusCode::CREATED, Json(output)))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Chats",
    operation_id = "listChats",
    summary = "List the caller's chats",
    description = "Most recently active first.",
    params(PageArgs),
    responses(
        (status = 200, description = "One page of chats", body = Page<Chat>),
        (status = 401, description = "Missing or invalid token (UNAUTHENTICATED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, args), fields(user_id = %auth_user.user_id))]
pub async fn list_chats(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(args): Query<PageArgs>,
) -> Result<Json<Page<Chat>>, AppError> {
    Ok(Json(state.service.chats(&auth_user, &args).await?))
}

#[utoipa::path(
    get,
    path = "/lookup",
    tag = "Chats",
    operation_id = "lookupChat",
    summary = "Find the chat with a given user",
    params(ChatLookupQuery),
    responses(
        (status = 200, description = "Chat", body = Chat),
        (status = 401, description = "Missing or invalid token (UNAUTHENTICATED)", body = ErrorBody),
        (status = 404, description = "No chat with that user (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn lookup_chat(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ChatLookupQuery>,
) -> Result<Json<Chat>, AppError> {
    Ok(Json(state.service.chat_with(&auth_user, &query.user_id).await?))
}

#[utoipa::path(
    get,
    path = "/has_unread",
    tag = "Chats",
    operation_id = "hasUnreadChats",
    summary = "Whether any chat has unseen messages",
    responses(
        (status = 200, description = "Unread status", body = UnreadStatus),
        (status = 401, description = "Missing or invalid token (UNAUTHENTICATED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn has_unread_chats(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UnreadStatus>, AppError> {
    let has_unread = state.service.has_unread_chats(&auth_user).await?;
    Ok(Json(UnreadStatus { has_unread }))
}

#[utoipa::path(
    get,
    path = "/{chat_id}",
    tag = "Chats",
    operation_id = "getChat",
    summary = "Get a chat",
    params(("chat_id" = String, Path, description = "Chat ID")),
    responses(
        (status = 200, description = "Chat", body = Chat),
        (status = 401, description = "Missing or invalid token (UNAUTHENTICATED)", body = ErrorBody),
        (status = 404, description = "Chat not found or not a participant (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn get_chat(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
) -> Result<Json<Chat>, AppError> {
    Ok(Json(state.service.chat(&auth_user, &chat_id).await?))
}

#[utoipa::path(
    post,
    path = "/{chat_id}/messages",
    tag = "Chats",
    operation_id = "createMessage",
    summary = "Send a message",
    params(("chat_id" = String, Path, description = "Chat ID")),
    request_body = CreateMessageRequest,
    responses(
        (status = 201, description = "Message sent", body = Message),
        (status = 401, description = "Missing or invalid token (UNAUTHENTICATED)", body = ErrorBody),
        (status = 403, description = "Chat not accepted yet or left (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Chat not found or not a participant (NOT_FOUND)", body = ErrorBody),
        (status = 422, description = "Validation error (INVALID_ARGUMENT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = %auth_user.user_id))]
pub async fn create_message(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    AppJson(payload): AppJson<CreateMessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let message = state
        .service
        .create_message(&auth_user, &chat_id, &payload.content)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[utoipa::path(
    get,
    path = "/{chat_id}/messages",
    tag = "Chats",
    operation_id = "listMessages",
    summary = "List a chat's messages",
    description = "Newest first. Listing marks the chat as seen by the caller.",
    params(("chat_id" = String, Path, description = "Chat ID"), PageArgs),
    responses(
        (status = 200, description = "One page of messages", body = Page<Message>),
        (status = 401, description = "Missing or invalid token (UNAUTHENTICATED)", body = ErrorBody),
        (status = 404, description = "Chat not found or not a participant (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, args), fields(user_id = %auth_user.user_id))]
pub async fn list_messages(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    Query(args): Query<PageArgs>,
) -> Result<Json<Page<Message>>, AppError> {
    Ok(Json(
        state
            .service
            .messages(&auth_user, &chat_id, &args)
            .await?,
    ))
}
