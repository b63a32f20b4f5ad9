use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::storage::StorageError;
use common::{CursorError, FieldError, FieldErrors};
use sea_orm::DbErr;
use serde::Serialize;

use crate::media::MediaError;
use crate::utils::token::TokenError;

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code. One of: `INVALID_ARGUMENT`, `NOT_FOUND`,
    /// `ALREADY_EXISTS`, `PERMISSION_DENIED`, `UNAUTHENTICATED`,
    /// `INVALID_TOKEN`, `EXPIRED_TOKEN`, `INTERNAL_ERROR`.
    #[schema(example = "INVALID_ARGUMENT")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "content cannot be empty")]
    pub message: String,
    /// Input field the error refers to, when there is exactly one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Every offending field, in the order they were checked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldError>>,
}

/// Application-level error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    InvalidArgument {
        message: String,
        field: Option<String>,
    },
    #[error("invalid input: {0}")]
    Validation(FieldErrors),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    AlreadyExists(String),
    #[error("{0}")]
    PermissionDenied(String),
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("invalid token")]
    InvalidToken,
    #[error("expired token")]
    ExpiredToken,
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
            field: None,
        }
    }

    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
            field: Some(field.to_string()),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidArgument { .. } | Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AlreadyExists(_) => StatusCode::CONFLICT,
            Self::PermissionDenied(_) => StatusCode::FORBIDDEN,
            Self::Unauthenticated | Self::InvalidToken | Self::ExpiredToken => {
                StatusCode::UNAUTHORIZED
            }
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        let status = self.status_code();
        let body = match self {
            AppError::InvalidArgument { message, field } => ErrorBody {
                code: "INVALID_ARGUMENT",
                message,
                field,
                fields: None,
            },
            AppError::Validation(errors) => {
                let message = errors.to_string();
                let mut fields = errors.into_inner();
                let field = (fields.len() == 1).then(|| fields[0].field.clone());
                if field.is_some() {
                    fields.clear();
                }
                ErrorBody {
                    code: "INVALID_ARGUMENT",
                    message,
                    field,
                    fields: (!fields.is_empty()).then_some(fields),
                }
            }
            AppError::NotFound(msg) => plain("NOT_FOUND", msg),
            AppError::AlreadyExists(msg) => plain("ALREADY_EXISTS", msg),
            AppError::PermissionDenied(msg) => plain("PERMISSION_DENIED", msg),
            AppError::Unauthenticated => plain("UNAUTHENTICATED", "Authentication required".into()),
            AppError::InvalidToken => plain("INVALID_TOKEN", "Invalid token".into()),
            AppError::ExpiredToken => plain("EXPIRED_TOKEN", "Token expired".into()),
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                plain("INTERNAL_ERROR", "An unexpected error occurred".into())
            }
        };
        (status, body)
    }
}

fn plain(code: &'static str, message: String) -> ErrorBody {
    ErrorBody {
        code,
        message,
        field: None,
        fields: None,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<FieldErrors> for AppError {
    fn from(errors: FieldErrors) -> Self {
        AppError::Validation(errors)
    }
}

impl From<CursorError> for AppError {
    fn from(err: CursorError) -> Self {
        AppError::invalid(err.to_string())
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid => AppError::InvalidToken,
            TokenError::Expired => AppError::ExpiredToken,
            TokenError::Unauthenticated => AppError::Unauthenticated,
            TokenError::Encode(detail) => AppError::Internal(detail),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { .. } => AppError::NotFound(err.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<MediaError> for AppError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Unsupported(_) | MediaError::Probe(_) => {
                AppError::invalid_field("attachments", err.to_string())
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Validator;

    #[test]
    fn kinds_map_to_status_codes() {
        assert_eq!(AppError::invalid("x").status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(AppError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::AlreadyExists("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::PermissionDenied("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(AppError::Unauthenticated.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::Internal("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn single_field_validation_reports_field() {
        let mut v = Validator::new();
        v.add_error("content", "content cannot be empty");
        let err: AppError = v.into_result().unwrap_err().into();
        let (_, body) = err.status_and_body();
        assert_eq!(body.field.as_deref(), Some("content"));
        assert!(body.fields.is_none());
    }

    #[test]
    fn multi_field_validation_lists_fields() {
        let mut v = Validator::new();
        v.add_error("title", "title cannot be empty");
        v.add_error("description", "description cannot be empty");
        let err: AppError = v.into_result().unwrap_err().into();
        let (status, body) = err.status_and_body();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body.field.is_none());
        assert_eq!(body.fields.map(|f| f.len()), Some(2));
    }

    #[test]
    fn token_errors_keep_their_kind() {
        assert!(matches!(AppError::from(TokenError::Expired), AppError::ExpiredToken));
        assert!(matches!(AppError::from(TokenError::Invalid), AppError::InvalidToken));
        assert!(matches!(
            AppError::from(TokenError::Unauthenticated),
            AppError::Unauthenticated
        ));
    }
}
