use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::shared::{ReactionCount, UrlPrefixes, UserPreview, WithPrefixes};

pub const COMMENT_CONTENT_MAX_LEN: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Comment {
    pub id: String,
    pub user: UserPreview,
    pub post_id: String,
    pub content: String,
    pub tags: Vec<String>,
    pub reactions: Vec<ReactionCount>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WithPrefixes for Comment {
    fn apply_prefixes(&mut self, prefixes: &UrlPrefixes) {
        self.user.apply_prefixes(prefixes);
    }
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateCommentRequest {
    pub content: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateCommentRequest {
    pub content: String,
}
