use chrono::{DateTime, Utc};
use common::Validator;
use serde::{Deserialize, Serialize};

use super::shared::{UrlPrefixes, UserPreview, WithPrefixes};
use crate::entity::user;

pub const USERNAME_MAX_LEN: usize = 18;
pub const EMAIL_MAX_LEN: usize = 254;

/// A user profile as seen by the viewer.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct User {
    pub id: String,
    /// Only present on the viewer's own profile.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[schema(example = "john_doe")]
    pub username: String,
    pub avatar_url: Option<String>,
    pub followers_count: i32,
    pub following_count: i32,
    /// The viewer is this user.
    pub me: bool,
    /// The viewer follows this user.
    pub following: bool,
    /// The viewer may follow this user.
    pub followeable: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn from_model(model: user::Model, viewer_id: Option<&str>, following: bool) -> Self {
        let me = viewer_id == Some(model.id.as_str());
        Self {
            email: me.then_some(model.email),
            id: model.id,
            username: model.username,
            avatar_url: model.avatar,
            followers_count: model.followers_count,
            following_count: model.following_count,
            me,
            following,
            followeable: viewer_id.is_some() && !me,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl From<user::Model> for UserPreview {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            avatar_url: model.avatar,
        }
    }
}

impl WithPrefixes for User {
    fn apply_prefixes(&mut self, prefixes: &UrlPrefixes) {
        if let Some(key) = self.avatar_url.take() {
            self.avatar_url = Some(prefixes.avatar_url(&key));
        }
    }
}

/// Result of following or unfollowing a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ToggleFollowOutput {
    /// Whether the viewer follows the user after the toggle.
    pub following: bool,
    pub followers_count: i32,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserSearchQuery {
    /// Case-insensitive username fragment.
    pub search: Option<String>,
}

/// Normalize an email address for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// `[A-Za-z][A-Za-z0-9_-]{0,17}`
pub fn is_valid_username(username: &str) -> bool {
    let mut chars = username.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    username.len() <= USERNAME_MAX_LEN
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

pub fn is_valid_email(email: &str) -> bool {
    if email.len() > EMAIL_MAX_LEN || email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

pub fn check_email(v: &mut Validator, email: &str) {
    if email.is_empty() {
        v.add_error("email", "email cannot be empty");
    } else {
        v.check(is_valid_email(email), "email", "invalid email");
    }
}

pub fn check_username(v: &mut Validator, username: &str) {
    if username.is_empty() {
        v.add_error("username", "username cannot be empty");
    } else {
        v.check(
            is_valid_username(username),
            "username",
            "username must start with a letter and contain up to 18 letters, digits, '_' or '-'",
        );
    }
}
