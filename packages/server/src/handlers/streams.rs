//! Server-sent event streams over the realtime hub.
//!
//! Each event carries one JSON document, the same shape the matching list
//! endpoint returns for an item. Streams end when the client disconnects or
//! the server shuts down. Browsers cannot set headers on `EventSource`, so
//! the token may also be passed as `?access_token=`.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, KeepAliveStream, Sse};
use futures::StreamExt;
use futures::stream::BoxStream;
use tracing::{instrument, warn};

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::hub::Subscription;
use crate::state::AppState;

type EventStream = Sse<KeepAliveStream<BoxStream<'static, Result<Event, Infallible>>>>;

fn into_sse(subscription: Subscription) -> EventStream {
    let events = subscription.filter_map(|payload| async move {
        let value: serde_json::Value = match rmp_serde::from_slice(&payload) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Dropping undecodable event");
                return None;
            }
        };
        match Event::default().json_data(value) {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                warn!(error = %e, "Dropping unserializable event");
                None
            }
        }
    });
    Sse::new(events.boxed()).keep_alive(KeepAlive::default())
}

#[utoipa::path(
    get,
    path = "/stream",
    tag = "Posts",
    operation_id = "streamPosts",
    summary = "Live feed of every new post",
    responses((status = 200, description = "Event stream of posts")),
)]
#[instrument(skip(state))]
pub async fn posts(State(state): State<AppState>) -> EventStream {
    into_sse(state.service.subscribe_posts(&state.shutdown))
}

#[utoipa::path(
    get,
    path = "/stream",
    tag = "Timeline",
    operation_id = "streamTimeline",
    summary = "Live timeline items of the caller",
    responses(
        (status = 200, description = "Event stream of timeline items"),
        (status = 401, description = "Missing or invalid token (UNAUTHENTICATED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn timeline(auth_user: AuthUser, State(state): State<AppState>) -> EventStream {
    into_sse(state.service.subscribe_timeline(&auth_user, &state.shutdown))
}

#[utoipa::path(
    get,
    path = "/stream",
    tag = "Notifications",
    operation_id = "streamNotifications",
    summary = "Live notifications of the caller",
    description = "A merged notification is sent again with its updated actor list.",
    responses(
        (status = 200, description = "Event stream of notifications"),
        (status = 401, description = "Missing or invalid token (UNAUTHENTICATED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn notifications(auth_user: AuthUser, State(state): State<AppState>) -> EventStream {
    into_sse(
        state
            .service
            .subscribe_notifications(&auth_user, &state.shutdown),
    )
}

#[utoipa::path(
    get,
    path = "/{post_id}/comments/stream",
    tag = "Comments",
    operation_id = "streamComments",
    summary = "Live comments of a post",
    params(("post_id" = String, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Event stream of comments"),
        (status = 404, description = "Post not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn comments(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Result<EventStream, AppError> {
    let subscription = state
        .service
        .subscribe_comments(&post_id, &state.shutdown)
        .await?;
    Ok(into_sse(subscription))
}

#[utoipa::path(
    get,
    path = "/{chat_id}/messages/stream",
    tag = "Chats",
    operation_id = "streamMessages",
    summary = "Live messages of a chat",
    params(("chat_id" = String, Path, description = "Chat ID")),
    responses(
        (status = 200, description = "Event stream of messages"),
        (status = 401, description = "Missing or invalid token (UNAUTHENTICATED)", body = ErrorBody),
        (status = 404, description = "Chat not found or not a participant (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn messages(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
) -> Result<EventStream, AppError> {
    let subscription = state
        .service
        .subscribe_messages(&auth_user, &chat_id, &state.shutdown)
        .await?;
    Ok(into_sse(subscription))
}
