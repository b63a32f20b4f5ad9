use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::state::AppState;

/// Query parameter accepted in place of the header, for clients such as
/// `EventSource` that cannot set request headers.
const TOKEN_QUERY_PARAM: &str = "access_token";

/// Authenticated caller, taken from `Authorization: Bearer <token>`.
///
/// Use `AuthUser` to require a session and `Option<AuthUser>` where
/// anonymous callers are allowed. A token that is present but bad is
/// rejected either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
}

impl AuthUser {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

fn raw_token(parts: &Parts) -> Result<Option<String>, AppError> {
    if let Some(header) = parts.headers.get(AUTHORIZATION) {
        let header = header.to_str().map_err(|_| AppError::InvalidToken)?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or(AppError::InvalidToken)?;
        return Ok(Some(token.trim().to_string()));
    }
    let from_query = parts.uri.query().and_then(|q| {
        url::form_urlencoded::parse(q.as_bytes())
            .find(|(k, _)| k == TOKEN_QUERY_PARAM)
            .map(|(_, v)| v.into_owned())
    });
    Ok(from_query)
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = raw_token(parts)?.ok_or(AppError::Unauthenticated)?;
        state.service.authenticate(&token)
    }
}

impl OptionalFromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        match raw_token(parts)? {
            Some(token) => state.service.authenticate(&token).map(Some),
            None => Ok(None),
        }
    }
}
