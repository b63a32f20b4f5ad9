use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::post::Post;
use super::shared::{UrlPrefixes, WithPrefixes};

/// A post as it appears in the viewer's feed.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TimelineItem {
    pub id: String,
    pub post: Post,
    pub created_at: DateTime<Utc>,
}

impl WithPrefixes for TimelineItem {
    fn apply_prefixes(&mut self, prefixes: &UrlPrefixes) {
        self.post.apply_prefixes(prefixes);
    }
}
