use sea_orm::prelude::Expr;
use sea_orm::*;

use super::users::{find_user, follows};
use super::{RelStore, is_unique_violation, preview_or_ghost, previews};
use crate::entity::{chat, message, participant};
use crate::error::AppError;
use crate::models::chat::{Chat, Message};
use crate::models::shared::Page;
use crate::pagination::PageRequest;
use crate::utils::now;
use common::{Cursor, ParticipantStatus};

async fn find_participant<C: ConnectionTrait>(
    db: &C,
    chat_id: &str,
    user_id: &str,
) -> Result<participant::Model, AppError> {
    participant::Entity::find()
        .filter(participant::Column::ChatId.eq(chat_id))
        .filter(participant::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("chat not found"))
}

async fn to_chats<C: ConnectionTrait>(db: &C, rows: Vec<participant::Model>) -> Result<Vec<Chat>, DbErr> {
    let others = previews(db, rows.iter().map(|p| p.other_user_id.clone())).await?;
    Ok(rows
        .into_iter()
        .map(|p| Chat {
            other_user: preview_or_ghost(&others, &p.other_user_id),
            id: p.chat_id,
            status: p.status,
            has_unread: p.has_unread,
            last_read_at: p.last_read_at,
            last_activity_at: p.last_activity_at,
            created_at: p.created_at,
        })
        .collect())
}

async fn to_chat<C: ConnectionTrait>(db: &C, row: participant::Model) -> Result<Chat, AppError> {
    to_chats(db, vec![row])
        .await?
        .pop()
        .ok_or_else(|| AppError::not_found("chat not found"))
}

async fn insert_message<C: ConnectionTrait>(
    db: &C,
    chat_id: &str,
    user_id: &str,
    content: String,
) -> Result<message::Model, DbErr> {
    message::ActiveModel {
        id: Set(common::id::generate()),
        chat_id: Set(chat_id.to_string()),
        user_id: Set(user_id.to_string()),
        content: Set(content),
        created_at: Set(now()),
    }
    .insert(db)
    .await
}

impl RelStore {
    /// The viewer's chat with `other_user_id`, if one exists.
    pub async fn chat_from_participants(&self, viewer: &str, other_user_id: &str) -> Result<Chat, AppError> {
        let row = participant::Entity::find()
            .filter(participant::Column::UserId.eq(viewer))
            .filter(participant::Column::OtherUserId.eq(other_user_id))
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("chat not found"))?;
        to_chat(&self.db, row).await
    }

    pub async fn chat(&self, viewer: &str, chat_id: &str) -> Result<Chat, AppError> {
        let row = find_participant(&self.db, chat_id, viewer).await?;
        to_chat(&self.db, row).await
    }

    /// Open a chat with its first message.
    ///
    /// Both sides start `active` when the users follow each other; otherwise
    /// the creator waits as `pending_sender` until the recipient replies.
    pub async fn create_chat(
        &self,
        viewer: &str,
        other_user_id: &str,
        content: String,
    ) -> Result<(Chat, Message), AppError> {
        if viewer == other_user_id {
            return Err(AppError::invalid_field("user_id", "cannot chat with yourself"));
        }

        let txn = self.db.begin().await?;
        find_user(&txn, other_user_id).await?;

        let exists = participant::Entity::find()
            .filter(participant::Column::UserId.eq(viewer))
            .filter(participant::Column::OtherUserId.eq(other_user_id))
            .one(&txn)
            .await?
            .is_some();
        if exists {
            return Err(AppError::AlreadyExists("chat already exists".into()));
        }

        let mutual = follows(&txn, viewer, other_user_id).await?
            && follows(&txn, other_user_id, viewer).await?;
        let (creator_status, recipient_status) = ParticipantStatus::initial(mutual);

        let now = now();
        let chat_id = common::id::generate();
        chat::ActiveModel {
            id: Set(chat_id.clone()),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let sides = [
            (viewer, other_user_id, creator_status, false, Some(now)),
            (other_user_id, viewer, recipient_status, true, None),
        ];
        let mut creator = None;
        for (user_id, other, status, has_unread, last_read_at) in sides {
            let row = participant::ActiveModel {
                id: Set(common::id::generate()),
                user_id: Set(user_id.to_string()),
                chat_id: Set(chat_id.clone()),
                other_user_id: Set(other.to_string()),
                status: Set(status),
                has_unread: Set(has_unread),
                last_read_at: Set(last_read_at),
                last_activity_at: Set(Some(now)),
                created_at: Set(now),
            }
            .insert(&txn)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::AlreadyExists("chat already exists".into())
                } else {
                    e.into()
                }
            })?;
            creator.get_or_insert(row);
        }

        let message = insert_message(&txn, &chat_id, viewer, content).await?;
        let creator = creator.ok_or_else(|| AppError::Internal("chat participant missing".into()))?;
        let chat = to_chat(&txn, creator).await?;
        txn.commit().await?;
        Ok((chat, message.into()))
    }

    /// The viewer's chats, most recently active first.
    pub async fn chats(&self, viewer: &str, page: &PageRequest) -> Result<Page<Chat>, AppError> {
        let select = participant::Entity::find().filter(participant::Column::UserId.eq(viewer));
        let rows = page
            .apply_timed(select, participant::Column::LastActivityAt, participant::Column::ChatId)?
            .all(&self.db)
            .await?;
        let page = page.finish(rows, |p| {
            Cursor::new(p.chat_id.clone(), p.last_activity_at.unwrap_or(p.created_at))
        });
        let items = to_chats(&self.db, page.items).await?;
        Ok(Page {
            items,
            page_info: page.page_info,
        })
    }

    /// Send a message, applying the participant gate.
    pub async fn create_message(&self, viewer: &str, chat_id: &str, content: String) -> Result<Message, AppError> {
        let txn = self.db.begin().await?;
        let me = find_participant(&txn, chat_id, viewer).await?;

        let effect = me
            .status
            .plan_send()
            .map_err(|reason| AppError::PermissionDenied(reason.into()))?;
        if effect.activate_both {
            participant::Entity::update_many()
                .col_expr(participant::Column::Status, Expr::value(ParticipantStatus::Active.to_value()))
                .filter(participant::Column::ChatId.eq(chat_id))
                .exec(&txn)
                .await?;
        }

        let message = insert_message(&txn, chat_id, viewer, content).await?;

        let activity = Some(message.created_at);
        participant::Entity::update_many()
            .col_expr(participant::Column::LastActivityAt, activity.into())
            .filter(participant::Column::ChatId.eq(chat_id))
            .exec(&txn)
            .await?;
        participant::Entity::update_many()
            .col_expr(participant::Column::HasUnread, true.into())
            .filter(participant::Column::ChatId.eq(chat_id))
            .filter(participant::Column::UserId.ne(viewer))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(message.into())
    }

    /// Messages of a chat, newest first. Marks the chat read for the viewer.
    pub async fn messages(&self, viewer: &str, chat_id: &str, page: &PageRequest) -> Result<Page<Message>, AppError> {
        let txn = self.db.begin().await?;
        let me = find_participant(&txn, chat_id, viewer).await?;

        let select = message::Entity::find().filter(message::Column::ChatId.eq(chat_id));
        let rows = page
            .apply_timed(select, message::Column::CreatedAt, message::Column::Id)?
            .all(&txn)
            .await?;

        let mut active: participant::ActiveModel = me.into();
        active.has_unread = Set(false);
        active.last_read_at = Set(Some(now()));
        active.update(&txn).await?;
        txn.commit().await?;

        Ok(page
            .finish(rows, |m| Cursor::new(m.id.clone(), m.created_at))
            .map(Message::from))
    }

    pub async fn has_unread_chats(&self, viewer: &str) -> Result<bool, AppError> {
        Ok(participant::Entity::find()
            .filter(participant::Column::UserId.eq(viewer))
            .filter(participant::Column::HasUnread.eq(true))
            .one(&self.db)
            .await?
            .is_some())
    }
}
