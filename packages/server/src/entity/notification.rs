use common::NotificationKind;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Recipient.
    #[sea_orm(indexed)]
    pub user_id: String,
    pub kind: NotificationKind,
    /// Post the notification is about; `None` for follows.
    pub post_id: Option<String>,
    pub read_at: Option<DateTimeUtc>,
    pub issued_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
