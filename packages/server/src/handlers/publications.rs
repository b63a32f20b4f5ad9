use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::publication::{
    Chapter, CreateChapterRequest, CreatePublicationRequest, LatestChapter, Publication,
    UpdateChapterRequest, UpdatePublicationRequest,
};
use crate::models::shared::{Page, PageArgs};
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/",
    tag = "Publications",
    operation_id = "createPublication",
    summary = "Create a publication",
    request_body = CreatePublicationRequest,
    responses(
        (status = 201, description = "Publication created", body = Publication),
        (status = 401, description = "Missing or invalid token (UNAUTHENTICATED)", body = ErrorBody),
        (status = 422, description = "Validation error (INVALID_ARGUMENT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = %auth_user.user_id, kind = %payload.kind))]
pub async fn create_publication(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreatePublicationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let publication = state
        .service
        .create_publication(&auth_user, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(publication)))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Publications",
    operation_id = "listPublications",
    summary = "List publications",
    description = "Newest first.",
    params(PageArgs),
    responses(
        (status = 200, description = "One page of publications", body = Page<Publication>),
        (status = 422, description = "Invalid pagination arguments (INVALID_ARGUMENT)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, args))]
pub async fn list_publications(
    State(state): State<AppState>,
    Query(args): Query<PageArgs>,
) -> Result<Json<Page<Publication>>, AppError> {
    Ok(Json(state.service.publications(&args).await?))
}

#[utoipa::path(
    get,
    path = "/{publication_id}",
    tag = "Publications",
    operation_id = "getPublication",
    summary = "Get a publication",
    params(("publication_id" = String, Path, description = "Publication ID")),
    responses(
        (status = 200, description = "Publication", body = Publication),
        (status = 404, description = "Publication not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_publication(
    State(state): State<AppState>,
    Path(publication_id): Path<String>,
) -> Result<Json<Publication>, AppError> {
    Ok(Json(state.service.publication(&publication_id).await?))
}

#[utoipa::path(
    patch,
    path = "/{publication_id}",
    tag = "Publications",
    operation_id = "updatePublication",
    summary = "Edit a publication",
    params(("publication_id" = String, Path, description = "Publication ID")),
    request_body = UpdatePublicationRequest,
    responses(
        (status = 200, description = "Updated publication", body = Publication),
        (status = 401, description = "Missing or invalid token (UNAUTHENTICATED)", body = ErrorBody),
        (status = 403, description = "Not the owner (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Publication not found (NOT_FOUND)", body = ErrorBody),
        (status = 422, description = "Validation error (INVALID_ARGUMENT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = %auth_user.user_id))]
pub async fn update_publication(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(publication_id): Path<String>,
    AppJson(payload): AppJson<UpdatePublicationRequest>,
) -> Result<Json<Publication>, AppError> {
    Ok(Json(
        state
            .service
            .update_publication(&auth_user, &publication_id, payload)
            .await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/{publication_id}",
    tag = "Publications",
    operation_id = "deletePublication",
    summary = "Delete a publication with its chapters",
    params(("publication_id" = String, Path, description = "Publication ID")),
    responses(
        (status = 204, description = "Publication deleted"),
        (status = 401, description = "Missing or invalid token (UNAUTHENTICATED)", body = ErrorBody),
        (status = 403, description = "Not the owner (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Publication not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn delete_publication(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(publication_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .service
        .delete_publication(&auth_user, &publication_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/{publication_id}/chapters/latest",
    tag = "Publications",
    operation_id = "latestChapterNumber",
    summary = "Highest chapter number",
    params(("publication_id" = String, Path, description = "Publication ID")),
    responses(
        (status = 200, description = "Latest chapter number, null without chapters", body = LatestChapter),
        (status = 404, description = "Publication not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn latest_chapter(
    State(state): State<AppState>,
    Path(publication_id): Path<String>,
) -> Result<Json<LatestChapter>, AppError> {
    let number = state.service.latest_chapter_number(&publication_id).await?;
    Ok(Json(LatestChapter { number }))
}

#[utoipa::path(
    post,
    path = "/{publication_id}/chapters",
    tag = "Publications",
    operation_id = "createChapter",
    summary = "Add a chapter",
    description = "Without `number`, the chapter is appended after the latest one.",
    params(("publication_id" = String, Path, description = "Publication ID")),
    request_body = CreateChapterRequest,
    responses(
        (status = 201, description = "Chapter created", body = Chapter),
        (status = 401, description = "Missing or invalid token (UNAUTHENTICATED)", body = ErrorBody),
        (status = 403, description = "Not the owner (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Publication not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Chapter number taken (ALREADY_EXISTS)", body = ErrorBody),
        (status = 422, description = "Validation error (INVALID_ARGUMENT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = %auth_user.user_id))]
pub async fn create_chapter(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(publication_id): Path<String>,
    AppJson(payload): AppJson<CreateChapterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let chapter = state
        .service
        .create_chapter(&auth_user, &publication_id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(chapter)))
}

#[utoipa::path(
    get,
    path = "/{publication_id}/chapters",
    tag = "Publications",
    operation_id = "listChapters",
    summary = "List chapters in order",
    params(("publication_id" = String, Path, description = "Publication ID")),
    responses(
        (status = 200, description = "Chapters by number", body = Vec<Chapter>),
        (status = 404, description = "Publication not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn list_chapters(
    State(state): State<AppState>,
    Path(publication_id): Path<String>,
) -> Result<Json<Vec<Chapter>>, AppError> {
    Ok(Json(state.service.chapters(&publication_id).await?))
}

#[utoipa::path(
    get,
    path = "/{publication_id}/chapters/{number}",
    tag = "Publications",
    operation_id = "getChapter",
    summary = "Get a chapter",
    params(
        ("publication_id" = String, Path, description = "Publication ID"),
        ("number" = i32, Path, description = "Chapter number"),
    ),
    responses(
        (status = 200, description = "Chapter", body = Chapter),
        (status = 404, description = "Chapter not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_chapter(
    State(state): State<AppState>,
    Path((publication_id, number)): Path<(String, i32)>,
) -> Result<Json<Chapter>, AppError> {
    Ok(Json(state.service.chapter(&publication_id, number).await?))
}

#[utoipa::path(
    patch,
    path = "/{publication_id}/chapters/{number}",
    tag = "Publications",
    operation_id = "updateChapter",
    summary = "Edit a chapter",
    params(
        ("publication_id" = String, Path, description = "Publication ID"),
        ("number" = i32, Path, description = "Chapter number"),
    ),
    request_body = UpdateChapterRequest,
    responses(
        (status = 200, description = "Updated chapter", body = Chapter),
        (status = 401, description = "Missing or invalid token (UNAUTHENTICATED)", body = ErrorBody),
        (status = 403, description = "Not the owner (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Chapter not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "New chapter number taken (ALREADY_EXISTS)", body = ErrorBody),
        (status = 422, description = "Validation error (INVALID_ARGUMENT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = %auth_user.user_id))]
pub async fn update_chapter(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path((publication_id, number)): Path<(String, i32)>,
    AppJson(payload): AppJson<UpdateChapterRequest>,
) -> Result<Json<Chapter>, AppError> {
    Ok(Json(
        state
            .service
            .update_chapter(&auth_user, &publication_id, number, payload)
            .await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/{publication_id}/chapters/{number}",
    tag = "Publications",
    operation_id = "deleteChapter",
    summary = "Delete a chapter",
    params(
        ("publication_id" = String, Path, description = "Publication ID"),
        ("number" = i32, Path, description = "Chapter number"),
    ),
    responses(
        (status = 204, description = "Chapter deleted"),
        (status = 401, description = "Missing or invalid token (UNAUTHENTICATED)", body = ErrorBody),
        (status = 403, description = "Not the owner (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Chapter not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn delete_chapter(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path((publication_id, number)): Path<(String, i32)>,
) -> Result<StatusCode, AppError> {
    state
        .service
        .delete_chapter(&auth_user, &publication_id, number)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
