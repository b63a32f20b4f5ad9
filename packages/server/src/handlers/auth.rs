use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use tracing::instrument;
use url::Url;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::auth::{AuthOutput, DevLoginRequest, SendMagicLinkRequest, VerifyMagicLinkRequest};
use crate::service::check_redirect_uri;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/send_magic_link",
    tag = "Auth",
    operation_id = "sendMagicLink",
    summary = "Email a login link",
    description = "Sends a single-use link to the given address. With `update_email`, the link confirms the address as the new email of the signed-in user instead (requires a token). The redirect URI must be on the service host, one of its subdomains, or an allowed origin.",
    request_body = SendMagicLinkRequest,
    responses(
        (status = 204, description = "Link sent"),
        (status = 401, description = "`update_email` without a session (UNAUTHENTICATED)", body = ErrorBody),
        (status = 422, description = "Invalid email or redirect URI (INVALID_ARGUMENT)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, auth_user, payload))]
pub async fn send_magic_link(
    auth_user: Option<AuthUser>,
    State(state): State<AppState>,
    AppJson(payload): AppJson<SendMagicLinkRequest>,
) -> Result<StatusCode, AppError> {
    state
        .service
        .send_magic_link(auth_user.as_ref(), payload)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/verify_magic_link",
    tag = "Auth",
    operation_id = "verifyMagicLink",
    summary = "Exchange a verification code for a session",
    description = "Consumes the code. An unknown email needs a `username` to create the account; without one the code is kept and 404 is returned.",
    request_body = VerifyMagicLinkRequest,
    responses(
        (status = 200, description = "Session issued", body = AuthOutput),
        (status = 404, description = "Code or user not found, or code expired (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Email or username taken (ALREADY_EXISTS)", body = ErrorBody),
        (status = 422, description = "Validation error (INVALID_ARGUMENT)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload))]
pub async fn verify_magic_link(
    State(state): State<AppState>,
    AppJson(payload): AppJson<VerifyMagicLinkRequest>,
) -> Result<Json<AuthOutput>, AppError> {
    Ok(Json(state.service.verify_magic_link(payload).await?))
}

#[utoipa::path(
    get,
    path = "/verify_magic_link",
    tag = "Auth",
    operation_id = "followMagicLink",
    summary = "Landing endpoint of the emailed link",
    description = "Same as the POST variant. With a `redirect_uri`, answers with a redirect carrying the token in the URL fragment (`#token=...&expires_at=...`).",
    params(VerifyMagicLinkRequest),
    responses(
        (status = 200, description = "Session issued", body = AuthOutput),
        (status = 303, description = "Redirect with the session in the fragment"),
        (status = 404, description = "Code or user not found, or code expired (NOT_FOUND)", body = ErrorBody),
        (status = 422, description = "Validation error (INVALID_ARGUMENT)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, query))]
pub async fn follow_magic_link(
    State(state): State<AppState>,
    Query(query): Query<VerifyMagicLinkRequest>,
) -> Result<Response, AppError> {
    let redirect_uri = query.redirect_uri.clone().filter(|u| !u.trim().is_empty());
    if let Some(uri) = &redirect_uri {
        let config = &state.config;
        if !check_redirect_uri(&config.server.origin, &config.auth.allowed_redirect_origins, uri) {
            return Err(AppError::invalid_field("redirect_uri", "redirect uri not allowed"));
        }
    }

    let output = state.service.verify_magic_link(query).await?;
    match redirect_uri {
        Some(uri) => {
            let mut target = Url::parse(&uri)
                .map_err(|_| AppError::invalid_field("redirect_uri", "redirect uri not allowed"))?;
            let fragment = url::form_urlencoded::Serializer::new(String::new())
                .append_pair("token", &output.token)
                .append_pair("expires_at", &output.expires_at.to_rfc3339())
                .finish();
            target.set_fragment(Some(&fragment));
            Ok(Redirect::to(target.as_str()).into_response())
        }
        None => Ok(Json(output).into_response()),
    }
}

#[utoipa::path(
    post,
    path = "/dev_login",
    tag = "Auth",
    operation_id = "devLogin",
    summary = "Log in without email (development only)",
    description = "Issues a session for an existing user. Answers 404 when dev login is disabled.",
    request_body = DevLoginRequest,
    responses(
        (status = 200, description = "Session issued", body = AuthOutput),
        (status = 404, description = "User not found or dev login disabled (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload))]
pub async fn dev_login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<DevLoginRequest>,
) -> Result<Json<AuthOutput>, AppError> {
    Ok(Json(state.service.dev_login(&payload.email).await?))
}
