use chrono::{DateTime, Utc};
use common::NotificationKind;
use serde::{Deserialize, Serialize};

use super::shared::{UrlPrefixes, UserPreview, WithPrefixes};

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    pub post_id: Option<String>,
    /// Most recent first.
    pub actors: Vec<UserPreview>,
    pub read_at: Option<DateTime<Utc>>,
    pub issued_at: DateTime<Utc>,
}

impl WithPrefixes for Notification {
    fn apply_prefixes(&mut self, prefixes: &UrlPrefixes) {
        self.actors.apply_prefixes(prefixes);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UnreadStatus {
    pub has_unread: bool,
}
