use common::ParticipantStatus;
use sea_orm::entity::prelude::*;

/// One side of a chat. Every chat has exactly two rows, and the pair
/// `(user_id, other_user_id)` is unique across all chats.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "participants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    #[sea_orm(indexed)]
    pub chat_id: String,
    pub other_user_id: String,
    pub status: ParticipantStatus,
    pub has_unread: bool,
    pub last_read_at: Option<DateTimeUtc>,
    pub last_activity_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
