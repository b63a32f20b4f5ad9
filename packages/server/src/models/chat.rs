use chrono::{DateTime, Utc};
use common::ParticipantStatus;
use serde::{Deserialize, Serialize};

use super::shared::{UrlPrefixes, UserPreview, WithPrefixes};

pub const MESSAGE_CONTENT_MAX_LEN: usize = 1000;

/// A chat as seen by one of its participants.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Chat {
    pub id: String,
    pub other_user: UserPreview,
    /// The viewer's participant status.
    pub status: ParticipantStatus,
    pub has_unread: bool,
    pub last_read_at: Option<DateTime<Utc>>,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl WithPrefixes for Chat {
    fn apply_prefixes(&mut self, prefixes: &UrlPrefixes) {
        self.other_user.apply_prefixes(prefixes);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<crate::entity::message::Model> for Message {
    fn from(m: crate::entity::message::Model) -> Self {
        Self {
            id: m.id,
            chat_id: m.chat_id,
            user_id: m.user_id,
            content: m.content,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateChatRequest {
    /// The other participant.
    pub user_id: String,
    /// First message of the chat.
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CreateChatOutput {
    pub chat: Chat,
    pub message: Message,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateMessageRequest {
    pub content: String,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ChatLookupQuery {
    /// The other participant.
    pub user_id: String,
}
