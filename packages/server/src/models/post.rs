use chrono::{DateTime, Utc};
use common::Validator;
use common::storage::BoxReader;
use serde::{Deserialize, Serialize};

use super::shared::{ReactionCount, UrlPrefixes, UserPreview, WithPrefixes};
use crate::entity::post::StoredAttachment;

pub const POST_CONTENT_MAX_LEN: usize = 2048;

/// Image attached to a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Attachment {
    /// Public URL; the object key until prefixes are applied.
    pub url: String,
    #[schema(example = "image/avif")]
    pub content_type: String,
    pub file_size: u64,
    pub width: u32,
    pub height: u32,
}

impl From<StoredAttachment> for Attachment {
    fn from(a: StoredAttachment) -> Self {
        Self {
            url: a.path,
            content_type: a.content_type,
            file_size: a.file_size,
            width: a.width,
            height: a.height,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Post {
    pub id: String,
    pub user: UserPreview,
    pub content: String,
    pub is_r18: bool,
    pub attachments: Vec<Attachment>,
    pub tags: Vec<String>,
    pub comments_count: i32,
    pub reactions: Vec<ReactionCount>,
    /// Whether the viewer receives notifications about this post.
    pub subscribed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WithPrefixes for Post {
    fn apply_prefixes(&mut self, prefixes: &UrlPrefixes) {
        self.user.apply_prefixes(prefixes);
        for a in &mut self.attachments {
            a.url = prefixes.media_url(&a.url);
        }
    }
}

/// Input for creating a post. Images are raw uploads that still have to go
/// through the image pipeline.
pub struct CreatePost {
    pub content: String,
    pub is_r18: bool,
    pub images: Vec<BoxReader>,
}

/// Multipart form accepted by the create-post endpoint (documentation only).
#[allow(dead_code)]
#[derive(utoipa::ToSchema)]
pub struct CreatePostForm {
    pub content: String,
    pub is_r18: Option<bool>,
    #[schema(value_type = Vec<String>, format = Binary)]
    pub attachments: Vec<Vec<u8>>,
}

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct UpdatePostRequest {
    pub content: Option<String>,
    pub is_r18: Option<bool>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ToggleReactionRequest {
    #[schema(example = "👍")]
    pub emoji: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SubscriptionState {
    pub subscribed: bool,
}

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PostFilter {
    /// Only posts by this username.
    pub username: Option<String>,
    /// Only posts carrying this tag.
    pub tag: Option<String>,
}

pub fn check_post_content(v: &mut Validator, content: &str, has_attachments: bool) {
    let min = if has_attachments { 0 } else { 1 };
    v.check_len(content, min, POST_CONTENT_MAX_LEN, "content");
}
