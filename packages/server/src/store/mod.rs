//! Relational store: every multi-row invariant is maintained inside one
//! transaction here, and the service layer never touches SQL directly.
//!
//! Helpers are generic over [`ConnectionTrait`] so they run the same against
//! the pool or an open transaction. Inside a transaction every statement must
//! go through the transaction handle.

mod chats;
mod codes;
mod comments;
mod notifications;
mod posts;
mod publications;
mod reactions;
mod timeline;
mod users;

use std::collections::HashMap;

use sea_orm::{ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, SqlErr};

use crate::entity::user;
use crate::error::AppError;
use crate::models::shared::UserPreview;

pub use comments::NewComment;
pub use posts::{NewPost, PostChanges, RemovedPost};

/// Edits are accepted for this long after creation.
pub const EDIT_WINDOW: chrono::Duration = chrono::Duration::minutes(15);

#[derive(Clone)]
pub struct RelStore {
    db: DatabaseConnection,
}

impl RelStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

pub(crate) fn unique_violation_message(err: &DbErr) -> Option<String> {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(msg)) => Some(msg),
        _ => None,
    }
}

/// Load user cards for `ids`, keyed by id. Unknown ids are skipped.
pub(crate) async fn previews<C: ConnectionTrait>(
    db: &C,
    ids: impl IntoIterator<Item = String>,
) -> Result<HashMap<String, UserPreview>, DbErr> {
    let mut ids: Vec<String> = ids.into_iter().collect();
    ids.sort();
    ids.dedup();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let users = user::Entity::find()
        .filter(user::Column::Id.is_in(ids))
        .all(db)
        .await?;
    Ok(users
        .into_iter()
        .map(|u| (u.id.clone(), UserPreview::from(u)))
        .collect())
}

/// Card for a user that has disappeared in the meantime.
pub(crate) fn preview_or_ghost(previews: &HashMap<String, UserPreview>, id: &str) -> UserPreview {
    previews.get(id).cloned().unwrap_or_else(|| UserPreview {
        id: id.to_string(),
        username: String::new(),
        avatar_url: None,
    })
}

pub(crate) fn edit_window_open(created_at: chrono::DateTime<chrono::Utc>) -> bool {
    crate::utils::now() - created_at <= EDIT_WINDOW
}

pub(crate) fn owner_check(owner_id: &str, caller_id: &str, what: &str) -> Result<(), AppError> {
    if owner_id != caller_id {
        return Err(AppError::PermissionDenied(format!("you are not the author of this {what}")));
    }
    Ok(())
}
