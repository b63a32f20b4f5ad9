use std::collections::HashMap;

use sea_orm::*;

use super::{RelStore, is_unique_violation, preview_or_ghost, previews};
use crate::entity::{notification, notification_actor};
use crate::error::AppError;
use crate::models::notification::Notification;
use crate::models::shared::Page;
use crate::pagination::PageRequest;
use crate::utils::now;
use common::{Coalesce, Cursor, NotificationKind};

async fn hydrate_notifications<C: ConnectionTrait>(
    db: &C,
    rows: Vec<notification::Model>,
) -> Result<Vec<Notification>, DbErr> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<String> = rows.iter().map(|n| n.id.clone()).collect();
    let actor_rows = notification_actor::Entity::find()
        .filter(notification_actor::Column::NotificationId.is_in(ids))
        .order_by_desc(notification_actor::Column::CreatedAt)
        .order_by_desc(notification_actor::Column::UserId)
        .all(db)
        .await?;
    let users = previews(db, actor_rows.iter().map(|a| a.user_id.clone())).await?;

    let mut actors: HashMap<String, Vec<_>> = HashMap::new();
    for row in actor_rows {
        actors
            .entry(row.notification_id)
            .or_default()
            .push(preview_or_ghost(&users, &row.user_id));
    }

    Ok(rows
        .into_iter()
        .map(|n| Notification {
            actors: actors.remove(&n.id).unwrap_or_default(),
            id: n.id,
            kind: n.kind,
            post_id: n.post_id,
            read_at: n.read_at,
            issued_at: n.issued_at,
        })
        .collect())
}

/// Whether `actor` is attached to any notification of `kind` for `recipient`.
async fn actor_seen<C: ConnectionTrait>(
    db: &C,
    recipient: &str,
    kind: NotificationKind,
    actor: &str,
) -> Result<bool, DbErr> {
    let ids: Vec<String> = notification::Entity::find()
        .filter(notification::Column::UserId.eq(recipient))
        .filter(notification::Column::Kind.eq(kind))
        .select_only()
        .column(notification::Column::Id)
        .into_tuple()
        .all(db)
        .await?;
    if ids.is_empty() {
        return Ok(false);
    }
    Ok(notification_actor::Entity::find()
        .filter(notification_actor::Column::NotificationId.is_in(ids))
        .filter(notification_actor::Column::UserId.eq(actor))
        .one(db)
        .await?
        .is_some())
}

async fn attach_actor<C: ConnectionTrait>(db: &C, notification_id: &str, actor: &str) -> Result<(), DbErr> {
    notification_actor::Entity::delete_by_id((notification_id.to_string(), actor.to_string()))
        .exec(db)
        .await?;
    notification_actor::ActiveModel {
        notification_id: Set(notification_id.to_string()),
        user_id: Set(actor.to_string()),
        created_at: Set(now()),
    }
    .insert(db)
    .await?;
    Ok(())
}

impl RelStore {
    /// Record that `actor` triggered a `kind` event for `recipient`.
    ///
    /// Folds into the recipient's unread notification for the same subject
    /// where the kind allows it. Returns the notification as it now reads, or
    /// `None` when nothing was recorded.
    pub async fn notify(
        &self,
        recipient: &str,
        kind: NotificationKind,
        post_id: Option<&str>,
        actor: &str,
    ) -> Result<Option<Notification>, AppError> {
        if recipient == actor {
            return Ok(None);
        }
        let post_id = post_id.filter(|_| kind.has_subject());

        match self.record_notification(recipient, kind, post_id, actor).await {
            // A concurrent event created the unread notification first; fold
            // into it.
            Err(e) if is_unique_violation(&e) => Ok(self
                .record_notification(recipient, kind, post_id, actor)
                .await?),
            result => Ok(result?),
        }
    }

    async fn record_notification(
        &self,
        recipient: &str,
        kind: NotificationKind,
        post_id: Option<&str>,
        actor: &str,
    ) -> Result<Option<Notification>, DbErr> {
        let txn = self.db.begin().await?;
        let mut unread = notification::Entity::find()
            .filter(notification::Column::UserId.eq(recipient))
            .filter(notification::Column::Kind.eq(kind))
            .filter(notification::Column::ReadAt.is_null());
        unread = match post_id {
            Some(post_id) => unread.filter(notification::Column::PostId.eq(post_id)),
            None => unread.filter(notification::Column::PostId.is_null()),
        };
        let unread = unread.one(&txn).await?;

        let seen = kind == NotificationKind::Follow && actor_seen(&txn, recipient, kind, actor).await?;

        let model = match kind.coalesce(unread.is_some(), seen) {
            Coalesce::Skip => return Ok(None),
            Coalesce::Insert => {
                let model = notification::ActiveModel {
                    id: Set(common::id::generate()),
                    user_id: Set(recipient.to_string()),
                    kind: Set(kind),
                    post_id: Set(post_id.map(str::to_string)),
                    read_at: Set(None),
                    issued_at: Set(now()),
                }
                .insert(&txn)
                .await?;
                attach_actor(&txn, &model.id, actor).await?;
                model
            }
            Coalesce::Fold { refresh_issued_at } => {
                let existing =
                    unread.ok_or_else(|| DbErr::RecordNotFound("unread notification vanished".into()))?;
                attach_actor(&txn, &existing.id, actor).await?;
                if refresh_issued_at {
                    let mut active: notification::ActiveModel = existing.into();
                    active.issued_at = Set(now());
                    active.update(&txn).await?
                } else {
                    existing
                }
            }
        };

        let notification = hydrate_notifications(&txn, vec![model]).await?.pop();
        txn.commit().await?;
        Ok(notification)
    }

    /// The viewer's notifications, newest first.
    pub async fn notifications(&self, viewer: &str, page: &PageRequest) -> Result<Page<Notification>, AppError> {
        let select = notification::Entity::find().filter(notification::Column::UserId.eq(viewer));
        let rows = page
            .apply_by_id(select, notification::Column::Id)
            .all(&self.db)
            .await?;
        let page = page.finish(rows, |n| Cursor::from_id(n.id.clone()));
        let items = hydrate_notifications(&self.db, page.items).await?;
        Ok(Page {
            items,
            page_info: page.page_info,
        })
    }

    /// Mark one of the viewer's notifications read.
    pub async fn read_notification(&self, viewer: &str, id: &str) -> Result<(), AppError> {
        let res = notification::Entity::update_many()
            .col_expr(notification::Column::ReadAt, Some(now()).into())
            .filter(notification::Column::Id.eq(id))
            .filter(notification::Column::UserId.eq(viewer))
            .filter(notification::Column::ReadAt.is_null())
            .exec(&self.db)
            .await?;
        if res.rows_affected == 0 {
            // Already read is fine; someone else's notification is not.
            notification::Entity::find_by_id(id)
                .filter(notification::Column::UserId.eq(viewer))
                .one(&self.db)
                .await?
                .ok_or_else(|| AppError::not_found("notification not found"))?;
        }
        Ok(())
    }

    pub async fn read_all_notifications(&self, viewer: &str) -> Result<(), AppError> {
        notification::Entity::update_many()
            .col_expr(notification::Column::ReadAt, Some(now()).into())
            .filter(notification::Column::UserId.eq(viewer))
            .filter(notification::Column::ReadAt.is_null())
            .exec(&self.db)
            .await?;
        Ok(())
    }

    pub async fn has_unread_notifications(&self, viewer: &str) -> Result<bool, AppError> {
        Ok(notification::Entity::find()
            .filter(notification::Column::UserId.eq(viewer))
            .filter(notification::Column::ReadAt.is_null())
            .one(&self.db)
            .await?
            .is_some())
    }
}
