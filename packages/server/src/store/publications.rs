use sea_orm::*;

use super::{RelStore, is_unique_violation, owner_check};
use crate::entity::{chapter, publication};
use crate::error::AppError;
use crate::models::publication::{
    Chapter, CreateChapterRequest, CreatePublicationRequest, Publication, UpdateChapterRequest,
    UpdatePublicationRequest,
};
use crate::models::shared::Page;
use crate::pagination::PageRequest;
use crate::utils::now;
use common::Cursor;

async fn find_publication<C: ConnectionTrait>(db: &C, id: &str) -> Result<publication::Model, AppError> {
    publication::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("publication not found"))
}

async fn find_chapter<C: ConnectionTrait>(
    db: &C,
    publication_id: &str,
    number: i32,
) -> Result<chapter::Model, AppError> {
    chapter::Entity::find()
        .filter(chapter::Column::PublicationId.eq(publication_id))
        .filter(chapter::Column::Number.eq(number))
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("chapter not found"))
}

async fn latest_number<C: ConnectionTrait>(db: &C, publication_id: &str) -> Result<Option<i32>, DbErr> {
    chapter::Entity::find()
        .filter(chapter::Column::PublicationId.eq(publication_id))
        .select_only()
        .column(chapter::Column::Number)
        .order_by_desc(chapter::Column::Number)
        .into_tuple()
        .one(db)
        .await
}

fn chapter_taken(err: DbErr) -> AppError {
    if is_unique_violation(&err) {
        AppError::AlreadyExists("chapter number taken".into())
    } else {
        err.into()
    }
}

impl RelStore {
    pub async fn create_publication(
        &self,
        user_id: &str,
        req: CreatePublicationRequest,
    ) -> Result<Publication, AppError> {
        let now = now();
        let model = publication::ActiveModel {
            id: Set(common::id::generate()),
            user_id: Set(user_id.to_string()),
            kind: Set(req.kind),
            title: Set(req.title),
            description: Set(req.description),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await?;
        Ok(model.into())
    }

    pub async fn publications(&self, page: &PageRequest) -> Result<Page<Publication>, AppError> {
        let rows = page
            .apply_timed(
                publication::Entity::find(),
                publication::Column::CreatedAt,
                publication::Column::Id,
            )?
            .all(&self.db)
            .await?;
        Ok(page
            .finish(rows, |p| Cursor::new(p.id.clone(), p.created_at))
            .map(Publication::from))
    }

    pub async fn publication(&self, id: &str) -> Result<Publication, AppError> {
        Ok(find_publication(&self.db, id).await?.into())
    }

    pub async fn update_publication(
        &self,
        id: &str,
        caller: &str,
        req: UpdatePublicationRequest,
    ) -> Result<Publication, AppError> {
        let txn = self.db.begin().await?;
        let existing = find_publication(&txn, id).await?;
        owner_check(&existing.user_id, caller, "publication")?;

        let mut active: publication::ActiveModel = existing.into();
        if let Some(title) = req.title {
            active.title = Set(title);
        }
        if let Some(description) = req.description {
            active.description = Set(description);
        }
        active.updated_at = Set(now());
        let model = active.update(&txn).await?;
        txn.commit().await?;
        Ok(model.into())
    }

    pub async fn delete_publication(&self, id: &str, caller: &str) -> Result<(), AppError> {
        let txn = self.db.begin().await?;
        let existing = find_publication(&txn, id).await?;
        owner_check(&existing.user_id, caller, "publication")?;

        chapter::Entity::delete_many()
            .filter(chapter::Column::PublicationId.eq(id))
            .exec(&txn)
            .await?;
        publication::Entity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;
        Ok(())
    }

    /// Highest chapter number of a publication, if it has chapters.
    pub async fn latest_chapter_number(&self, publication_id: &str) -> Result<Option<i32>, AppError> {
        find_publication(&self.db, publication_id).await?;
        Ok(latest_number(&self.db, publication_id).await?)
    }

    /// Add a chapter; only the publication's author may do so. Without an
    /// explicit number the chapter goes after the latest one.
    pub async fn create_chapter(
        &self,
        publication_id: &str,
        caller: &str,
        req: CreateChapterRequest,
    ) -> Result<Chapter, AppError> {
        let txn = self.db.begin().await?;
        let owner = find_publication(&txn, publication_id).await?;
        owner_check(&owner.user_id, caller, "publication")?;

        let number = match req.number {
            Some(n) => n,
            None => latest_number(&txn, publication_id).await?.unwrap_or(0) + 1,
        };
        let taken = chapter::Entity::find()
            .filter(chapter::Column::PublicationId.eq(publication_id))
            .filter(chapter::Column::Number.eq(number))
            .one(&txn)
            .await?
            .is_some();
        if taken {
            return Err(AppError::AlreadyExists("chapter number taken".into()));
        }

        let now = now();
        let model = chapter::ActiveModel {
            id: Set(common::id::generate()),
            publication_id: Set(publication_id.to_string()),
            number: Set(number),
            title: Set(req.title),
            content: Set(req.content),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(chapter_taken)?;
        txn.commit().await?;
        Ok(model.into())
    }

    /// Chapters in reading order.
    pub async fn chapters(&self, publication_id: &str) -> Result<Vec<Chapter>, AppError> {
        find_publication(&self.db, publication_id).await?;
        let rows = chapter::Entity::find()
            .filter(chapter::Column::PublicationId.eq(publication_id))
            .order_by_asc(chapter::Column::Number)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(Chapter::from).collect())
    }

    pub async fn chapter(&self, publication_id: &str, number: i32) -> Result<Chapter, AppError> {
        Ok(find_chapter(&self.db, publication_id, number).await?.into())
    }

    pub async fn update_chapter(
        &self,
        publication_id: &str,
        number: i32,
        caller: &str,
        req: UpdateChapterRequest,
    ) -> Result<Chapter, AppError> {
        let txn = self.db.begin().await?;
        let owner = find_publication(&txn, publication_id).await?;
        owner_check(&owner.user_id, caller, "publication")?;
        let existing = find_chapter(&txn, publication_id, number).await?;

        let mut active: chapter::ActiveModel = existing.into();
        if let Some(n) = req.number.filter(|n| *n != number) {
            if find_chapter(&txn, publication_id, n).await.is_ok() {
                return Err(AppError::AlreadyExists("chapter number taken".into()));
            }
            active.number = Set(n);
        }
        if let Some(title) = req.title {
            active.title = Set(title);
        }
        if let Some(content) = req.content {
            active.content = Set(content);
        }
        active.updated_at = Set(now());
        let model = active.update(&txn).await.map_err(chapter_taken)?;
        txn.commit().await?;
        Ok(model.into())
    }

    pub async fn delete_chapter(&self, publication_id: &str, number: i32, caller: &str) -> Result<(), AppError> {
        let txn = self.db.begin().await?;
        let owner = find_publication(&txn, publication_id).await?;
        owner_check(&owner.user_id, caller, "publication")?;
        let existing = find_chapter(&txn, publication_id, number).await?;
        chapter::Entity::delete_by_id(existing.id).exec(&txn).await?;
        txn.commit().await?;
        Ok(())
    }
}
