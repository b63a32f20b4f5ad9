use std::collections::HashSet;

use sea_orm::prelude::Expr;
use sea_orm::sea_query::{Func, LikeExpr, SimpleExpr};
use sea_orm::*;

use super::{RelStore, is_unique_violation, unique_violation_message};
use crate::entity::{follow, user};
use crate::error::AppError;
use crate::models::shared::Page;
use crate::pagination::PageRequest;
use crate::utils::now;
use common::Cursor;

fn lower_username(username: &str) -> SimpleExpr {
    Expr::expr(Func::lower(Expr::col(user::Column::Username))).eq(username.to_lowercase())
}

fn map_user_unique(err: DbErr) -> AppError {
    match unique_violation_message(&err) {
        Some(msg) if msg.contains("username") => AppError::AlreadyExists("username taken".into()),
        Some(_) => AppError::AlreadyExists("email taken".into()),
        None => err.into(),
    }
}

pub(super) async fn find_user<C: ConnectionTrait>(db: &C, id: &str) -> Result<user::Model, AppError> {
    user::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))
}

pub(super) async fn find_user_by_email<C: ConnectionTrait>(
    db: &C,
    email: &str,
) -> Result<Option<user::Model>, DbErr> {
    user::Entity::find()
        .filter(user::Column::Email.eq(email.to_lowercase()))
        .one(db)
        .await
}

pub(super) async fn insert_user<C: ConnectionTrait>(
    db: &C,
    email: &str,
    username: &str,
) -> Result<user::Model, AppError> {
    if find_user_by_email(db, email).await?.is_some() {
        return Err(AppError::AlreadyExists("email taken".into()));
    }
    let taken = user::Entity::find()
        .filter(lower_username(username))
        .one(db)
        .await?
        .is_some();
    if taken {
        return Err(AppError::AlreadyExists("username taken".into()));
    }

    let now = now();
    let model = user::ActiveModel {
        id: Set(common::id::generate()),
        email: Set(email.to_lowercase()),
        username: Set(username.to_string()),
        avatar: Set(None),
        followers_count: Set(0),
        following_count: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    };
    model.insert(db).await.map_err(map_user_unique)
}

pub(super) async fn set_email<C: ConnectionTrait>(
    db: &C,
    user_id: &str,
    email: &str,
) -> Result<user::Model, AppError> {
    let existing = find_user(db, user_id).await?;
    if existing.email == email {
        return Ok(existing);
    }
    if find_user_by_email(db, email).await?.is_some() {
        return Err(AppError::AlreadyExists("email taken".into()));
    }
    let mut active: user::ActiveModel = existing.into();
    active.email = Set(email.to_lowercase());
    active.updated_at = Set(now());
    active.update(db).await.map_err(|e| {
        if is_unique_violation(&e) {
            AppError::AlreadyExists("email taken".into())
        } else {
            e.into()
        }
    })
}

pub(super) async fn follows<C: ConnectionTrait>(
    db: &C,
    follower_id: &str,
    followee_id: &str,
) -> Result<bool, DbErr> {
    Ok(follow::Entity::find_by_id((follower_id.to_string(), followee_id.to_string()))
        .one(db)
        .await?
        .is_some())
}

async fn bump<C: ConnectionTrait>(
    db: &C,
    user_id: &str,
    column: user::Column,
    delta: i32,
) -> Result<(), DbErr> {
    user::Entity::update_many()
        .col_expr(column, Expr::col(column).add(delta))
        .filter(user::Column::Id.eq(user_id))
        .exec(db)
        .await?;
    Ok(())
}

impl RelStore {
    pub async fn user_by_id(&self, id: &str) -> Result<user::Model, AppError> {
        find_user(&self.db, id).await
    }

    pub async fn user_by_email(&self, email: &str) -> Result<user::Model, AppError> {
        find_user_by_email(&self.db, email)
            .await?
            .ok_or_else(|| AppError::not_found("user not found"))
    }

    pub async fn user_by_username(&self, username: &str) -> Result<user::Model, AppError> {
        user::Entity::find()
            .filter(lower_username(username))
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("user not found"))
    }

    /// Store a new avatar key and return the previous one.
    pub async fn update_avatar(
        &self,
        user_id: &str,
        avatar: &str,
    ) -> Result<(user::Model, Option<String>), AppError> {
        let txn = self.db.begin().await?;
        let existing = find_user(&txn, user_id).await?;
        let previous = existing.avatar.clone();
        let mut active: user::ActiveModel = existing.into();
        active.avatar = Set(Some(avatar.to_string()));
        active.updated_at = Set(now());
        let user = active.update(&txn).await?;
        txn.commit().await?;
        Ok((user, previous))
    }

    /// Users whose username contains `search`, walked alphabetically.
    pub async fn search_users(
        &self,
        search: Option<&str>,
        page: &PageRequest,
    ) -> Result<Page<user::Model>, AppError> {
        let mut select = user::Entity::find();
        if let Some(term) = search.map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", escape_like(&term.to_lowercase()));
            select = select.filter(
                Expr::expr(Func::lower(Expr::col(user::Column::Username)))
                    .like(LikeExpr::new(pattern).escape('\\')),
            );
        }
        let rows = page
            .apply_lexicographic(select, user::Column::Username)
            .all(&self.db)
            .await?;
        Ok(page.finish(rows, |u| Cursor::from_id(u.username.clone())))
    }

    pub async fn is_following(&self, follower_id: &str, followee_id: &str) -> Result<bool, AppError> {
        Ok(follows(&self.db, follower_id, followee_id).await?)
    }

    /// Which of `ids` the viewer follows.
    pub async fn followed_among(&self, viewer: &str, ids: &[String]) -> Result<HashSet<String>, AppError> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let followed: Vec<String> = follow::Entity::find()
            .filter(follow::Column::FollowerId.eq(viewer))
            .filter(follow::Column::FolloweeId.is_in(ids.iter().cloned()))
            .select_only()
            .column(follow::Column::FolloweeId)
            .into_tuple()
            .all(&self.db)
            .await?;
        Ok(followed.into_iter().collect())
    }

    /// Follow or unfollow; returns whether the edge exists afterwards and the
    /// followee's follower count.
    pub async fn toggle_follow(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> Result<(bool, i32), AppError> {
        if follower_id == followee_id {
            return Err(AppError::invalid_field("user_id", "cannot follow yourself"));
        }
        let txn = self.db.begin().await?;
        find_user(&txn, followee_id).await?;

        let following = if follows(&txn, follower_id, followee_id).await? {
            follow::Entity::delete_by_id((follower_id.to_string(), followee_id.to_string()))
                .exec(&txn)
                .await?;
            bump(&txn, followee_id, user::Column::FollowersCount, -1).await?;
            bump(&txn, follower_id, user::Column::FollowingCount, -1).await?;
            false
        } else {
            follow::ActiveModel {
                follower_id: Set(follower_id.to_string()),
                followee_id: Set(followee_id.to_string()),
                created_at: Set(now()),
            }
            .insert(&txn)
            .await?;
            bump(&txn, followee_id, user::Column::FollowersCount, 1).await?;
            bump(&txn, follower_id, user::Column::FollowingCount, 1).await?;
            true
        };

        let followers_count = find_user(&txn, followee_id).await?.followers_count;
        txn.commit().await?;
        Ok((following, followers_count))
    }

    /// Users following `user_id`, most recent follow first.
    pub async fn followers(&self, user_id: &str, page: &PageRequest) -> Result<Page<user::Model>, AppError> {
        self.follow_list(user_id, page, true).await
    }

    /// Users `user_id` follows, most recent follow first.
    pub async fn followees(&self, user_id: &str, page: &PageRequest) -> Result<Page<user::Model>, AppError> {
        self.follow_list(user_id, page, false).await
    }

    async fn follow_list(
        &self,
        user_id: &str,
        page: &PageRequest,
        followers: bool,
    ) -> Result<Page<user::Model>, AppError> {
        find_user(&self.db, user_id).await?;
        let (anchor, other) = if followers {
            (follow::Column::FolloweeId, follow::Column::FollowerId)
        } else {
            (follow::Column::FollowerId, follow::Column::FolloweeId)
        };
        let select = follow::Entity::find().filter(anchor.eq(user_id));
        let edges = page
            .apply_timed(select, follow::Column::CreatedAt, other)?
            .all(&self.db)
            .await?;

        let cursor_of = |e: &follow::Model| {
            let id = if followers { &e.follower_id } else { &e.followee_id };
            Cursor::new(id.clone(), e.created_at)
        };
        let edges = page.finish(edges, cursor_of);

        let ids: Vec<String> = edges
            .items
            .iter()
            .map(|e| if followers { e.follower_id.clone() } else { e.followee_id.clone() })
            .collect();
        let mut users = user::Entity::find()
            .filter(user::Column::Id.is_in(ids.clone()))
            .all(&self.db)
            .await?;
        users.sort_by_key(|u| ids.iter().position(|id| *id == u.id));
        Ok(Page {
            items: users,
            page_info: edges.page_info,
        })
    }

    pub async fn follower_ids(&self, user_id: &str) -> Result<Vec<String>, AppError> {
        Ok(follow::Entity::find()
            .filter(follow::Column::FolloweeId.eq(user_id))
            .select_only()
            .column(follow::Column::FollowerId)
            .into_tuple()
            .all(&self.db)
            .await?)
    }

    /// Ids of the users among `usernames` that exist, case-insensitively.
    pub async fn user_ids_by_usernames(&self, usernames: &[String]) -> Result<Vec<String>, AppError> {
        if usernames.is_empty() {
            return Ok(Vec::new());
        }
        let lowered: Vec<String> = usernames.iter().map(|u| u.to_lowercase()).collect();
        Ok(user::Entity::find()
            .filter(Expr::expr(Func::lower(Expr::col(user::Column::Username))).is_in(lowered))
            .select_only()
            .column(user::Column::Id)
            .into_tuple()
            .all(&self.db)
            .await?)
    }
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}
