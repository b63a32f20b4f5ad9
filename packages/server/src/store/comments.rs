use std::collections::HashMap;

use sea_orm::prelude::Expr;
use sea_orm::*;

use super::posts::{find_post, normalize_tags, subscribe};
use super::reactions::{ReactionRow, aggregate};
use super::{RelStore, edit_window_open, owner_check, preview_or_ghost, previews};
use crate::entity::{comment, comment_reaction, comment_tag, post};
use crate::error::AppError;
use crate::models::comment::Comment;
use crate::models::shared::{Page, ReactionCount};
use crate::pagination::PageRequest;
use crate::utils::now;
use common::Cursor;

#[derive(Debug, Clone)]
pub struct NewComment {
    pub user_id: String,
    pub post_id: String,
    pub content: String,
    pub tags: Vec<String>,
}

async fn find_comment<C: ConnectionTrait>(db: &C, id: &str) -> Result<comment::Model, AppError> {
    comment::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("comment not found"))
}

async fn replace_tags<C: ConnectionTrait>(db: &C, comment_id: &str, tags: &[String]) -> Result<(), DbErr> {
    comment_tag::Entity::delete_many()
        .filter(comment_tag::Column::CommentId.eq(comment_id))
        .exec(db)
        .await?;
    let rows: Vec<comment_tag::ActiveModel> = normalize_tags(tags)
        .into_iter()
        .map(|tag| comment_tag::ActiveModel {
            comment_id: Set(comment_id.to_string()),
            tag: Set(tag),
        })
        .collect();
    if !rows.is_empty() {
        comment_tag::Entity::insert_many(rows).exec_without_returning(db).await?;
    }
    Ok(())
}

async fn bump_comments_count<C: ConnectionTrait>(db: &C, post_id: &str, delta: i32) -> Result<(), DbErr> {
    post::Entity::update_many()
        .col_expr(
            post::Column::CommentsCount,
            Expr::col(post::Column::CommentsCount).add(delta),
        )
        .filter(post::Column::Id.eq(post_id))
        .exec(db)
        .await?;
    Ok(())
}

async fn reactions_of<C: ConnectionTrait>(
    db: &C,
    ids: Vec<String>,
    viewer: Option<&str>,
) -> Result<HashMap<String, Vec<ReactionCount>>, DbErr> {
    let rows: Vec<ReactionRow> = comment_reaction::Entity::find()
        .filter(comment_reaction::Column::CommentId.is_in(ids))
        .order_by_asc(comment_reaction::Column::CreatedAt)
        .select_only()
        .column(comment_reaction::Column::CommentId)
        .column(comment_reaction::Column::Emoji)
        .column(comment_reaction::Column::UserId)
        .into_tuple()
        .all(db)
        .await?;
    Ok(aggregate(rows, viewer))
}

async fn hydrate_comments<C: ConnectionTrait>(
    db: &C,
    viewer: Option<&str>,
    comments: Vec<comment::Model>,
) -> Result<Vec<Comment>, DbErr> {
    if comments.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<String> = comments.iter().map(|c| c.id.clone()).collect();
    let authors = previews(db, comments.iter().map(|c| c.user_id.clone())).await?;

    let mut tags: HashMap<String, Vec<String>> = HashMap::new();
    for row in comment_tag::Entity::find()
        .filter(comment_tag::Column::CommentId.is_in(ids.clone()))
        .order_by_asc(comment_tag::Column::Tag)
        .all(db)
        .await?
    {
        tags.entry(row.comment_id).or_default().push(row.tag);
    }
    let mut reactions = reactions_of(db, ids, viewer).await?;

    Ok(comments
        .into_iter()
        .map(|c| Comment {
            user: preview_or_ghost(&authors, &c.user_id),
            tags: tags.remove(&c.id).unwrap_or_default(),
            reactions: reactions.remove(&c.id).unwrap_or_default(),
            id: c.id,
            post_id: c.post_id,
            content: c.content,
            created_at: c.created_at,
            updated_at: c.updated_at,
        })
        .collect())
}

impl RelStore {
    /// Insert a comment, subscribe its author to the post and bump the
    /// post's comment counter.
    pub async fn create_comment(&self, new: NewComment) -> Result<Comment, AppError> {
        let txn = self.db.begin().await?;
        find_post(&txn, &new.post_id).await?;

        let now = now();
        let model = comment::ActiveModel {
            id: Set(common::id::generate()),
            user_id: Set(new.user_id.clone()),
            post_id: Set(new.post_id.clone()),
            content: Set(new.content),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| match e.sql_err() {
            Some(SqlErr::ForeignKeyConstraintViolation(_)) => AppError::not_found("post not found"),
            _ => e.into(),
        })?;

        replace_tags(&txn, &model.id, &new.tags).await?;
        subscribe(&txn, &new.user_id, &new.post_id).await?;
        bump_comments_count(&txn, &new.post_id, 1).await?;

        let mut comments = hydrate_comments(&txn, Some(&new.user_id), vec![model]).await?;
        txn.commit().await?;
        comments.pop().ok_or_else(|| AppError::not_found("comment not found"))
    }

    /// Comments of a post, newest first.
    pub async fn comments(
        &self,
        post_id: &str,
        viewer: Option<&str>,
        page: &PageRequest,
    ) -> Result<Page<Comment>, AppError> {
        find_post(&self.db, post_id).await?;
        let select = comment::Entity::find().filter(comment::Column::PostId.eq(post_id));
        let rows = page
            .apply_timed(select, comment::Column::CreatedAt, comment::Column::Id)?
            .all(&self.db)
            .await?;
        let page = page.finish(rows, |c| Cursor::new(c.id.clone(), c.created_at));
        let items = hydrate_comments(&self.db, viewer, page.items).await?;
        Ok(Page {
            items,
            page_info: page.page_info,
        })
    }

    pub async fn comment(&self, id: &str, viewer: Option<&str>) -> Result<Comment, AppError> {
        let model = find_comment(&self.db, id).await?;
        let mut comments = hydrate_comments(&self.db, viewer, vec![model]).await?;
        comments.pop().ok_or_else(|| AppError::not_found("comment not found"))
    }

    pub async fn comment_author(&self, id: &str) -> Result<String, AppError> {
        Ok(find_comment(&self.db, id).await?.user_id)
    }

    pub async fn update_comment(&self, id: &str, caller: &str, content: String) -> Result<Comment, AppError> {
        let txn = self.db.begin().await?;
        let existing = find_comment(&txn, id).await?;
        owner_check(&existing.user_id, caller, "comment")?;
        if !edit_window_open(existing.created_at) {
            return Err(AppError::PermissionDenied("comment can no longer be edited".into()));
        }

        replace_tags(&txn, id, &common::text::collect_tags(&content)).await?;
        let mut active: comment::ActiveModel = existing.into();
        active.content = Set(content);
        active.updated_at = Set(now());
        let model = active.update(&txn).await?;

        let mut comments = hydrate_comments(&txn, Some(caller), vec![model]).await?;
        txn.commit().await?;
        comments.pop().ok_or_else(|| AppError::not_found("comment not found"))
    }

    pub async fn delete_comment(&self, id: &str, caller: &str) -> Result<(), AppError> {
        let txn = self.db.begin().await?;
        let existing = find_comment(&txn, id).await?;
        owner_check(&existing.user_id, caller, "comment")?;

        comment_tag::Entity::delete_many()
            .filter(comment_tag::Column::CommentId.eq(id))
            .exec(&txn)
            .await?;
        comment_reaction::Entity::delete_many()
            .filter(comment_reaction::Column::CommentId.eq(id))
            .exec(&txn)
            .await?;
        comment::Entity::delete_by_id(id).exec(&txn).await?;
        bump_comments_count(&txn, &existing.post_id, -1).await?;

        txn.commit().await?;
        Ok(())
    }

    pub async fn toggle_comment_reaction(
        &self,
        comment_id: &str,
        user_id: &str,
        emoji: &str,
    ) -> Result<Vec<ReactionCount>, AppError> {
        let txn = self.db.begin().await?;
        find_comment(&txn, comment_id).await?;

        let key = (comment_id.to_string(), user_id.to_string(), emoji.to_string());
        if comment_reaction::Entity::find_by_id(key.clone()).one(&txn).await?.is_some() {
            comment_reaction::Entity::delete_by_id(key).exec(&txn).await?;
        } else {
            comment_reaction::ActiveModel {
                comment_id: Set(key.0),
                user_id: Set(key.1),
                emoji: Set(key.2),
                created_at: Set(now()),
            }
            .insert(&txn)
            .await?;
        }

        let mut reactions = reactions_of(&txn, vec![comment_id.to_string()], Some(user_id)).await?;
        txn.commit().await?;
        Ok(reactions.remove(comment_id).unwrap_or_default())
    }
}
