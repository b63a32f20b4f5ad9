use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::User;

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SendMagicLinkRequest {
    #[schema(example = "john@example.org")]
    pub email: String,
    /// Absolute URL to land on after verification.
    #[schema(example = "http://localhost:4444/")]
    pub redirect_uri: String,
    /// Confirm a new email address for the signed-in user instead of logging in.
    #[serde(default)]
    pub update_email: bool,
}

#[derive(Debug, Deserialize, utoipa::ToSchema, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VerifyMagicLinkRequest {
    pub email: String,
    pub code: String,
    /// Required the first time an email is used, to create the account.
    pub username: Option<String>,
    /// Where to send the browser with the new session, when verifying
    /// through the emailed link.
    #[serde(default)]
    pub redirect_uri: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct DevLoginRequest {
    pub email: String,
}

/// A freshly issued session.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AuthOutput {
    pub user: User,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}
