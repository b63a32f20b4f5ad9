use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::*;

use super::RelStore;
use super::posts::hydrate_posts;
use crate::entity::{post, timeline_item};
use crate::error::AppError;
use crate::models::shared::Page;
use crate::models::timeline::TimelineItem;
use crate::pagination::PageRequest;
use common::Cursor;

impl RelStore {
    /// Put a post on the timelines of `user_ids`; existing rows are kept.
    pub async fn fan_out(
        &self,
        post_id: &str,
        created_at: DateTime<Utc>,
        user_ids: &[String],
    ) -> Result<u64, AppError> {
        if user_ids.is_empty() {
            return Ok(0);
        }
        let rows: Vec<timeline_item::ActiveModel> = user_ids
            .iter()
            .map(|user_id| timeline_item::ActiveModel {
                id: Set(common::id::generate()),
                user_id: Set(user_id.clone()),
                post_id: Set(post_id.to_string()),
                created_at: Set(created_at),
            })
            .collect();
        let res = timeline_item::Entity::insert_many(rows)
            .on_conflict(
                OnConflict::columns([timeline_item::Column::UserId, timeline_item::Column::PostId])
                    .do_nothing()
                    .to_owned(),
            )
            .do_nothing()
            .exec_without_returning(&self.db)
            .await?;
        Ok(match res {
            TryInsertResult::Inserted(n) => n,
            TryInsertResult::Empty | TryInsertResult::Conflicted => 0,
        })
    }

    /// The viewer's feed, newest post first.
    pub async fn timeline(&self, viewer: &str, page: &PageRequest) -> Result<Page<TimelineItem>, AppError> {
        let select = timeline_item::Entity::find().filter(timeline_item::Column::UserId.eq(viewer));
        let rows = page
            .apply_timed(select, timeline_item::Column::CreatedAt, timeline_item::Column::Id)?
            .all(&self.db)
            .await?;
        let page = page.finish(rows, |t| Cursor::new(t.id.clone(), t.created_at));

        let post_ids: Vec<String> = page.items.iter().map(|t| t.post_id.clone()).collect();
        let models = post::Entity::find()
            .filter(post::Column::Id.is_in(post_ids))
            .all(&self.db)
            .await?;
        let mut posts: HashMap<String, _> = hydrate_posts(&self.db, Some(viewer), models)
            .await?
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();

        let items = page
            .items
            .into_iter()
            .filter_map(|t| {
                posts.remove(&t.post_id).map(|post| TimelineItem {
                    id: t.id,
                    post,
                    created_at: t.created_at,
                })
            })
            .collect();
        Ok(Page {
            items,
            page_info: page.page_info,
        })
    }

    pub async fn timeline_item(&self, viewer: &str, post_id: &str) -> Result<TimelineItem, AppError> {
        let row = timeline_item::Entity::find()
            .filter(timeline_item::Column::UserId.eq(viewer))
            .filter(timeline_item::Column::PostId.eq(post_id))
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("timeline item not found"))?;
        let post = self.post(post_id, Some(viewer)).await?;
        Ok(TimelineItem {
            id: row.id,
            post,
            created_at: row.created_at,
        })
    }

    /// Hide one post from the viewer's feed only.
    pub async fn delete_timeline_item(&self, viewer: &str, id: &str) -> Result<(), AppError> {
        let res = timeline_item::Entity::delete_many()
            .filter(timeline_item::Column::Id.eq(id))
            .filter(timeline_item::Column::UserId.eq(viewer))
            .exec(&self.db)
            .await?;
        if res.rows_affected == 0 {
            return Err(AppError::not_found("timeline item not found"));
        }
        Ok(())
    }
}
