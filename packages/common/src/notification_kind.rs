#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of inbox notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "follow"))]
    Follow,
    /// Someone commented on a post the recipient is subscribed to.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "comment"))]
    Comment,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "post_mention"))]
    PostMention,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "comment_mention"))]
    CommentMention,
}

/// How a new actor event lands in the recipient's inbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coalesce {
    /// Nothing to record.
    Skip,
    /// Create a new unread notification with the actor as its only actor.
    Insert,
    /// Move the actor to the front of the existing unread notification.
    Fold { refresh_issued_at: bool },
}

impl NotificationKind {
    pub const ALL: &'static [NotificationKind] = &[
        Self::Follow,
        Self::Comment,
        Self::PostMention,
        Self::CommentMention,
    ];

    /// Decide how an event folds into the recipient's notifications.
    ///
    /// `unread_exists` reports an unread notification of this kind for the
    /// same recipient and subject. `actor_seen` reports whether the actor is
    /// already attached to any notification of this kind for the recipient,
    /// read or unread.
    pub fn coalesce(self, unread_exists: bool, actor_seen: bool) -> Coalesce {
        match self {
            Self::Follow if actor_seen => Coalesce::Skip,
            Self::Follow if unread_exists => Coalesce::Fold {
                refresh_issued_at: false,
            },
            Self::Comment | Self::CommentMention if unread_exists => Coalesce::Fold {
                refresh_issued_at: true,
            },
            _ => Coalesce::Insert,
        }
    }

    /// Whether notifications of this kind point at a post.
    pub fn has_subject(self) -> bool {
        !matches!(self, Self::Follow)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Follow => "follow",
            Self::Comment => "comment",
            Self::PostMention => "post_mention",
            Self::CommentMention => "comment_mention",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid notification kind '{0}'")]
pub struct ParseNotificationKindError(String);

impl FromStr for NotificationKind {
    type Err = ParseNotificationKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ParseNotificationKindError(s.to_string()))
    }
}
