use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Query as SeaQuery;
use sea_orm::*;

use super::reactions::{ReactionRow, aggregate};
use super::{RelStore, edit_window_open, owner_check, preview_or_ghost, previews};
use crate::entity::post::{Attachments, StoredAttachment};
use crate::entity::{
    comment, comment_reaction, comment_tag, notification, notification_actor, post, post_reaction,
    post_subscription, post_tag, timeline_item,
};
use crate::error::AppError;
use crate::models::post::{Attachment, Post, PostFilter};
use crate::models::shared::{Page, ReactionCount};
use crate::pagination::PageRequest;
use crate::utils::now;
use common::Cursor;

/// A post ready to be persisted. Attachments are already uploaded.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub is_r18: bool,
    pub attachments: Vec<StoredAttachment>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub content: Option<String>,
    pub is_r18: Option<bool>,
}

/// What is left to clean up outside the database after a post is deleted.
#[derive(Debug, Clone)]
pub struct RemovedPost {
    pub attachment_keys: Vec<String>,
}

pub(super) fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.iter()
        .map(|t| t.to_lowercase())
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

pub(super) async fn find_post<C: ConnectionTrait>(db: &C, id: &str) -> Result<post::Model, AppError> {
    post::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("post not found"))
}

async fn replace_tags<C: ConnectionTrait>(db: &C, post_id: &str, tags: &[String]) -> Result<(), DbErr> {
    post_tag::Entity::delete_many()
        .filter(post_tag::Column::PostId.eq(post_id))
        .exec(db)
        .await?;
    let rows: Vec<post_tag::ActiveModel> = normalize_tags(tags)
        .into_iter()
        .map(|tag| post_tag::ActiveModel {
            post_id: Set(post_id.to_string()),
            tag: Set(tag),
        })
        .collect();
    if !rows.is_empty() {
        post_tag::Entity::insert_many(rows).exec_without_returning(db).await?;
    }
    Ok(())
}

/// Subscribe `user_id` to a post, keeping an existing subscription.
pub(super) async fn subscribe<C: ConnectionTrait>(db: &C, user_id: &str, post_id: &str) -> Result<(), DbErr> {
    post_subscription::Entity::insert(post_subscription::ActiveModel {
        user_id: Set(user_id.to_string()),
        post_id: Set(post_id.to_string()),
        created_at: Set(now()),
    })
    .on_conflict_do_nothing()
    .exec_without_returning(db)
    .await?;
    Ok(())
}

/// Attach authors, tags, reactions and the viewer's subscription state.
pub(super) async fn hydrate_posts<C: ConnectionTrait>(
    db: &C,
    viewer: Option<&str>,
    posts: Vec<post::Model>,
) -> Result<Vec<Post>, DbErr> {
    if posts.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<String> = posts.iter().map(|p| p.id.clone()).collect();
    let authors = previews(db, posts.iter().map(|p| p.user_id.clone())).await?;

    let mut tags: HashMap<String, Vec<String>> = HashMap::new();
    let tag_rows = post_tag::Entity::find()
        .filter(post_tag::Column::PostId.is_in(ids.clone()))
        .order_by_asc(post_tag::Column::Tag)
        .all(db)
        .await?;
    for row in tag_rows {
        tags.entry(row.post_id).or_default().push(row.tag);
    }

    let reaction_rows: Vec<ReactionRow> = post_reaction::Entity::find()
        .filter(post_reaction::Column::PostId.is_in(ids.clone()))
        .order_by_asc(post_reaction::Column::CreatedAt)
        .select_only()
        .column(post_reaction::Column::PostId)
        .column(post_reaction::Column::Emoji)
        .column(post_reaction::Column::UserId)
        .into_tuple()
        .all(db)
        .await?;
    let mut reactions = aggregate(reaction_rows, viewer);

    let subscribed: HashSet<String> = match viewer {
        Some(viewer) => post_subscription::Entity::find()
            .filter(post_subscription::Column::UserId.eq(viewer))
            .filter(post_subscription::Column::PostId.is_in(ids))
            .select_only()
            .column(post_subscription::Column::PostId)
            .into_tuple::<String>()
            .all(db)
            .await?
            .into_iter()
            .collect(),
        None => HashSet::new(),
    };

    Ok(posts
        .into_iter()
        .map(|p| Post {
            user: preview_or_ghost(&authors, &p.user_id),
            tags: tags.remove(&p.id).unwrap_or_default(),
            reactions: reactions.remove(&p.id).unwrap_or_default(),
            subscribed: subscribed.contains(&p.id),
            attachments: p.attachments.0.into_iter().map(Attachment::from).collect(),
            id: p.id,
            content: p.content,
            is_r18: p.is_r18,
            comments_count: p.comments_count,
            created_at: p.created_at,
            updated_at: p.updated_at,
        })
        .collect())
}

pub(super) async fn post_reactions<C: ConnectionTrait>(
    db: &C,
    post_id: &str,
    viewer: &str,
) -> Result<Vec<ReactionCount>, DbErr> {
    let rows: Vec<ReactionRow> = post_reaction::Entity::find()
        .filter(post_reaction::Column::PostId.eq(post_id))
        .order_by_asc(post_reaction::Column::CreatedAt)
        .select_only()
        .column(post_reaction::Column::PostId)
        .column(post_reaction::Column::Emoji)
        .column(post_reaction::Column::UserId)
        .into_tuple()
        .all(db)
        .await?;
    Ok(aggregate(rows, Some(viewer)).remove(post_id).unwrap_or_default())
}

impl RelStore {
    /// Insert a post with its tags, subscribe the author and put it on the
    /// author's own timeline.
    pub async fn create_post(&self, new: NewPost) -> Result<post::Model, AppError> {
        let txn = self.db.begin().await?;

        let model = post::ActiveModel {
            id: Set(new.id.clone()),
            user_id: Set(new.user_id.clone()),
            content: Set(new.content),
            is_r18: Set(new.is_r18),
            attachments: Set(Attachments(new.attachments)),
            comments_count: Set(0),
            created_at: Set(new.created_at),
            updated_at: Set(new.created_at),
        }
        .insert(&txn)
        .await?;

        replace_tags(&txn, &new.id, &new.tags).await?;
        subscribe(&txn, &new.user_id, &new.id).await?;
        timeline_item::ActiveModel {
            id: Set(common::id::generate()),
            user_id: Set(new.user_id),
            post_id: Set(new.id),
            created_at: Set(new.created_at),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(model)
    }

    pub async fn post_row(&self, id: &str) -> Result<post::Model, AppError> {
        find_post(&self.db, id).await
    }

    pub async fn post(&self, id: &str, viewer: Option<&str>) -> Result<Post, AppError> {
        let model = find_post(&self.db, id).await?;
        let mut posts = hydrate_posts(&self.db, viewer, vec![model]).await?;
        posts.pop().ok_or_else(|| AppError::not_found("post not found"))
    }

    pub async fn hydrate(&self, viewer: Option<&str>, posts: Vec<post::Model>) -> Result<Vec<Post>, AppError> {
        Ok(hydrate_posts(&self.db, viewer, posts).await?)
    }

    /// Global post list, optionally narrowed to one author or one tag.
    pub async fn posts(
        &self,
        filter: &PostFilter,
        viewer: Option<&str>,
        page: &PageRequest,
    ) -> Result<Page<Post>, AppError> {
        let mut select = post::Entity::find();
        if let Some(username) = filter.username.as_deref() {
            let author = self.user_by_username(username).await?;
            select = select.filter(post::Column::UserId.eq(author.id));
        }
        if let Some(tag) = filter.tag.as_deref() {
            let tag = tag.trim_start_matches('#').to_lowercase();
            select = select.filter(
                post::Column::Id.in_subquery(
                    SeaQuery::select()
                        .column(post_tag::Column::PostId)
                        .from(post_tag::Entity)
                        .and_where(post_tag::Column::Tag.eq(tag))
                        .to_owned(),
                ),
            );
        }
        let rows = page
            .apply_timed(select, post::Column::CreatedAt, post::Column::Id)?
            .all(&self.db)
            .await?;
        let page = page.finish(rows, |p| Cursor::new(p.id.clone(), p.created_at));
        let items = hydrate_posts(&self.db, viewer, page.items).await?;
        Ok(Page {
            items,
            page_info: page.page_info,
        })
    }

    pub async fn post_author(&self, id: &str) -> Result<String, AppError> {
        Ok(find_post(&self.db, id).await?.user_id)
    }

    /// Apply `changes` if `caller` wrote the post and the edit window is open.
    pub async fn update_post(
        &self,
        id: &str,
        caller: &str,
        changes: PostChanges,
    ) -> Result<Post, AppError> {
        let txn = self.db.begin().await?;
        let existing = find_post(&txn, id).await?;
        owner_check(&existing.user_id, caller, "post")?;
        if !edit_window_open(existing.created_at) {
            return Err(AppError::PermissionDenied("post can no longer be edited".into()));
        }

        let mut active: post::ActiveModel = existing.into();
        if let Some(content) = changes.content {
            let tags = common::text::collect_tags(&content);
            replace_tags(&txn, id, &tags).await?;
            active.content = Set(content);
        }
        if let Some(is_r18) = changes.is_r18 {
            active.is_r18 = Set(is_r18);
        }
        active.updated_at = Set(now());
        let model = active.update(&txn).await?;

        let mut posts = hydrate_posts(&txn, Some(caller), vec![model]).await?;
        txn.commit().await?;
        posts.pop().ok_or_else(|| AppError::not_found("post not found"))
    }

    /// Delete a post together with everything hanging off it.
    pub async fn delete_post(&self, id: &str, caller: &str) -> Result<RemovedPost, AppError> {
        let txn = self.db.begin().await?;
        let existing = find_post(&txn, id).await?;
        owner_check(&existing.user_id, caller, "post")?;

        let comment_ids: Vec<String> = comment::Entity::find()
            .filter(comment::Column::PostId.eq(id))
            .select_only()
            .column(comment::Column::Id)
            .into_tuple()
            .all(&txn)
            .await?;
        if !comment_ids.is_empty() {
            comment_tag::Entity::delete_many()
                .filter(comment_tag::Column::CommentId.is_in(comment_ids.clone()))
                .exec(&txn)
                .await?;
            comment_reaction::Entity::delete_many()
                .filter(comment_reaction::Column::CommentId.is_in(comment_ids))
                .exec(&txn)
                .await?;
        }
        comment::Entity::delete_many()
            .filter(comment::Column::PostId.eq(id))
            .exec(&txn)
            .await?;

        let notification_ids: Vec<String> = notification::Entity::find()
            .filter(notification::Column::PostId.eq(id))
            .select_only()
            .column(notification::Column::Id)
            .into_tuple()
            .all(&txn)
            .await?;
        if !notification_ids.is_empty() {
            notification_actor::Entity::delete_many()
                .filter(notification_actor::Column::NotificationId.is_in(notification_ids.clone()))
                .exec(&txn)
                .await?;
            notification::Entity::delete_many()
                .filter(notification::Column::Id.is_in(notification_ids))
                .exec(&txn)
                .await?;
        }

        timeline_item::Entity::delete_many()
            .filter(timeline_item::Column::PostId.eq(id))
            .exec(&txn)
            .await?;
        post_subscription::Entity::delete_many()
            .filter(post_subscription::Column::PostId.eq(id))
            .exec(&txn)
            .await?;
        post_reaction::Entity::delete_many()
            .filter(post_reaction::Column::PostId.eq(id))
            .exec(&txn)
            .await?;
        post_tag::Entity::delete_many()
            .filter(post_tag::Column::PostId.eq(id))
            .exec(&txn)
            .await?;
        post::Entity::delete_by_id(id).exec(&txn).await?;

        txn.commit().await?;
        Ok(RemovedPost {
            attachment_keys: existing.attachments.0.into_iter().map(|a| a.path).collect(),
        })
    }

    /// Add or remove one reaction and return the post's new reaction list.
    pub async fn toggle_post_reaction(
        &self,
        post_id: &str,
        user_id: &str,
        emoji: &str,
    ) -> Result<Vec<ReactionCount>, AppError> {
        let txn = self.db.begin().await?;
        find_post(&txn, post_id).await?;

        let key = (post_id.to_string(), user_id.to_string(), emoji.to_string());
        if post_reaction::Entity::find_by_id(key.clone()).one(&txn).await?.is_some() {
            post_reaction::Entity::delete_by_id(key).exec(&txn).await?;
        } else {
            post_reaction::ActiveModel {
                post_id: Set(key.0),
                user_id: Set(key.1),
                emoji: Set(key.2),
                created_at: Set(now()),
            }
            .insert(&txn)
            .await?;
        }

        let reactions = post_reactions(&txn, post_id, user_id).await?;
        txn.commit().await?;
        Ok(reactions)
    }

    /// Flip the caller's subscription and return the new state.
    pub async fn toggle_post_subscription(&self, post_id: &str, user_id: &str) -> Result<bool, AppError> {
        let txn = self.db.begin().await?;
        find_post(&txn, post_id).await?;

        let key = (user_id.to_string(), post_id.to_string());
        let subscribed = if post_subscription::Entity::find_by_id(key.clone())
            .one(&txn)
            .await?
            .is_some()
        {
            post_subscription::Entity::delete_by_id(key).exec(&txn).await?;
            false
        } else {
            subscribe(&txn, user_id, post_id).await?;
            true
        };

        txn.commit().await?;
        Ok(subscribed)
    }

    pub async fn post_subscribers(&self, post_id: &str) -> Result<Vec<String>, AppError> {
        Ok(post_subscription::Entity::find()
            .filter(post_subscription::Column::PostId.eq(post_id))
            .select_only()
            .column(post_subscription::Column::UserId)
            .into_tuple()
            .all(&self.db)
            .await?)
    }
}
