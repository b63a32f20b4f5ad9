use common::text::smart_trim;
use tracing::instrument;

use super::{Service, validate};
use crate::error::AppError;
use crate::extractors::auth::AuthUser;
use crate::models::publication::{
    Chapter, CreateChapterRequest, CreatePublicationRequest, Publication, UpdateChapterRequest,
    UpdatePublicationRequest, check_chapter, check_publication_description, check_publication_title,
};
use crate::models::shared::{Page, PageArgs};

impl Service {
    #[instrument(skip(self, auth, req), fields(user_id = %auth.user_id, kind = %req.kind))]
    pub async fn create_publication(
        &self,
        auth: &AuthUser,
        req: CreatePublicationRequest,
    ) -> Result<Publication, AppError> {
        let req = CreatePublicationRequest {
            kind: req.kind,
            title: smart_trim(&req.title),
            description: smart_trim(&req.description),
        };
        validate(|v| {
            check_publication_title(v, &req.title);
            check_publication_description(v, &req.description);
        })?;
        self.store.create_publication(&auth.user_id, req).await
    }

    pub async fn publications(&self, args: &PageArgs) -> Result<Page<Publication>, AppError> {
        let page = self.page(args)?;
        self.store.publications(&page).await
    }

    pub async fn publication(&self, id: &str) -> Result<Publication, AppError> {
        self.store.publication(id).await
    }

    #[instrument(skip(self, auth, req), fields(user_id = %auth.user_id))]
    pub async fn update_publication(
        &self,
        auth: &AuthUser,
        id: &str,
        req: UpdatePublicationRequest,
    ) -> Result<Publication, AppError> {
        let req = UpdatePublicationRequest {
            title: req.title.as_deref().map(smart_trim),
            description: req.description.as_deref().map(smart_trim),
        };
        validate(|v| {
            if let Some(title) = &req.title {
                check_publication_title(v, title);
            }
            if let Some(description) = &req.description {
                check_publication_description(v, description);
            }
        })?;
        self.store.update_publication(id, &auth.user_id, req).await
    }

    #[instrument(skip(self, auth), fields(user_id = %auth.user_id))]
    pub async fn delete_publication(&self, auth: &AuthUser, id: &str) -> Result<(), AppError> {
        self.store.delete_publication(id, &auth.user_id).await
    }

    pub async fn latest_chapter_number(&self, publication_id: &str) -> Result<Option<i32>, AppError> {
        self.store.latest_chapter_number(publication_id).await
    }

    #[instrument(skip(self, auth, req), fields(user_id = %auth.user_id))]
    pub async fn create_chapter(
        &self,
        auth: &AuthUser,
        publication_id: &str,
        req: CreateChapterRequest,
    ) -> Result<Chapter, AppError> {
        let req = CreateChapterRequest {
            number: req.number,
            title: smart_trim(&req.title),
            content: req.content.trim().to_string(),
        };
        validate(|v| check_chapter(v, req.number, Some(&req.title), Some(&req.content)))?;
        self.store.create_chapter(publication_id, &auth.user_id, req).await
    }

    pub async fn chapters(&self, publication_id: &str) -> Result<Vec<Chapter>, AppError> {
        self.store.chapters(publication_id).await
    }

    pub async fn chapter(&self, publication_id: &str, number: i32) -> Result<Chapter, AppError> {
        self.store.chapter(publication_id, number).await
    }

    #[instrument(skip(self, auth, req), fields(user_id = %auth.user_id))]
    pub async fn update_chapter(
        &self,
        auth: &AuthUser,
        publication_id: &str,
        number: i32,
        req: UpdateChapterRequest,
    ) -> Result<Chapter, AppError> {
        let req = UpdateChapterRequest {
            number: req.number,
            title: req.title.as_deref().map(smart_trim),
            content: req.content.map(|c| c.trim().to_string()),
        };
        validate(|v| check_chapter(v, req.number, req.title.as_deref(), req.content.as_deref()))?;
        self.store
            .update_chapter(publication_id, number, &auth.user_id, req)
            .await
    }

    #[instrument(skip(self, auth), fields(user_id = %auth.user_id))]
    pub async fn delete_chapter(&self, auth: &AuthUser, publication_id: &str, number: i32) -> Result<(), AppError> {
        self.store
            .delete_chapter(publication_id, number, &auth.user_id)
            .await
    }
}
