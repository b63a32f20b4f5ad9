use common::NotificationKind;
use common::storage::{Upload, attachment_key};
use common::text::{collect_tags, is_valid_emoji, smart_trim};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use super::{Service, validate};
use crate::entity::post::StoredAttachment;
use crate::error::AppError;
use crate::extractors::auth::AuthUser;
use crate::models::post::{CreatePost, Post, PostFilter, UpdatePostRequest, check_post_content};
use crate::models::shared::{Page, PageArgs, ReactionCount};
use crate::store::{NewPost, PostChanges};
use crate::utils::now;

impl Service {
    /// Publish a post: normalize and upload its images, persist it, then fan
    /// it out to followers and notify mentioned users in the background.
    #[instrument(skip(self, auth, input), fields(user_id = %auth.user_id, images = input.images.len()))]
    pub async fn create_post(&self, auth: &AuthUser, input: CreatePost) -> Result<Post, AppError> {
        let content = smart_trim(&input.content);
        let max_attachments = self.config.media.max_attachments;
        validate(|v| {
            check_post_content(v, &content, !input.images.is_empty());
            v.check(
                input.images.len() <= max_attachments,
                "attachments",
                format!("at most {max_attachments} attachments allowed"),
            );
        })?;

        let images = self
            .pipeline
            .process(input.images, self.config.media.max_resolution)
            .await?;

        let id = common::id::generate();
        let created_at = now();
        let mut uploads = Vec::with_capacity(images.len());
        let mut attachments = Vec::with_capacity(images.len());
        for (index, image) in images.iter().enumerate() {
            let key = attachment_key(created_at, &id, index, image.extension);
            uploads.push(Upload {
                key: key.clone(),
                content_type: image.content_type.to_string(),
                body: image.reader().await.map_err(|e| AppError::Internal(e.to_string()))?,
            });
            attachments.push(StoredAttachment {
                path: key,
                content_type: image.content_type.to_string(),
                file_size: image.file_size,
                width: image.width,
                height: image.height,
            });
        }
        let cleanup = self
            .uploader
            .upload_many(&CancellationToken::new(), &self.config.storage.media_bucket, uploads)
            .await?;

        let model = self
            .store
            .create_post(NewPost {
                id: id.clone(),
                user_id: auth.user_id.clone(),
                tags: collect_tags(&content),
                content: content.clone(),
                is_r18: input.is_r18,
                attachments,
                created_at,
            })
            .await?;
        cleanup.defuse();
        drop(images);

        let mut hydrated = self.store.hydrate(Some(&auth.user_id), vec![model]).await?;
        let post = self.with_prefixes(
            hydrated
                .pop()
                .ok_or_else(|| AppError::Internal("created post vanished".into()))?,
        );
        info!(post_id = %post.id, "Post created");

        self.background
            .spawn("fan_out_post", self.effects.clone().fan_out_post(post.clone()));
        self.background.spawn(
            "notify_post_mentions",
            self.effects.clone().notify_mentions(
                auth.user_id.clone(),
                content,
                NotificationKind::PostMention,
                id,
            ),
        );
        Ok(post)
    }

    pub async fn posts(
        &self,
        auth: Option<&AuthUser>,
        filter: &PostFilter,
        args: &PageArgs,
    ) -> Result<Page<Post>, AppError> {
        let page = self.page(args)?;
        let posts = self
            .store
            .posts(filter, auth.map(|a| a.user_id.as_str()), &page)
            .await?;
        Ok(self.with_prefixes(posts))
    }

    pub async fn post(&self, auth: Option<&AuthUser>, id: &str) -> Result<Post, AppError> {
        let post = self.store.post(id, auth.map(|a| a.user_id.as_str())).await?;
        Ok(self.with_prefixes(post))
    }

    #[instrument(skip(self, auth, req), fields(user_id = %auth.user_id))]
    pub async fn update_post(&self, auth: &AuthUser, id: &str, req: UpdatePostRequest) -> Result<Post, AppError> {
        let content = req.content.as_deref().map(smart_trim);
        if let Some(content) = &content {
            let existing = self.store.post_row(id).await?;
            let has_attachments = !existing.attachments.0.is_empty();
            validate(|v| check_post_content(v, content, has_attachments))?;
        }
        let post = self
            .store
            .update_post(
                id,
                &auth.user_id,
                PostChanges {
                    content,
                    is_r18: req.is_r18,
                },
            )
            .await?;
        Ok(self.with_prefixes(post))
    }

    /// Delete a post; its images are removed from the media bucket afterwards.
    #[instrument(skip(self, auth), fields(user_id = %auth.user_id))]
    pub async fn delete_post(&self, auth: &AuthUser, id: &str) -> Result<(), AppError> {
        let removed = self.store.delete_post(id, &auth.user_id).await?;
        if !removed.attachment_keys.is_empty() {
            let blobs = self.blobs.clone();
            let bucket = self.config.storage.media_bucket.clone();
            self.background.spawn("remove_post_media", async move {
                for key in removed.attachment_keys {
                    if let Err(e) = blobs.remove_object(&bucket, &key).await {
                        warn!(bucket = %bucket, key = %key, error = %e, "Failed to remove post media");
                    }
                }
                Ok(())
            });
        }
        Ok(())
    }

    /// Add the caller's `emoji` reaction, or take it back, and return the
    /// post's reactions afterwards.
    pub async fn toggle_post_reaction(
        &self,
        auth: &AuthUser,
        post_id: &str,
        emoji: &str,
    ) -> Result<Vec<ReactionCount>, AppError> {
        let emoji = emoji.trim();
        validate(|v| v.check(is_valid_emoji(emoji), "emoji", "invalid emoji"))?;
        self.store
            .toggle_post_reaction(post_id, &auth.user_id, emoji)
            .await
    }

    pub async fn toggle_post_subscription(&self, auth: &AuthUser, post_id: &str) -> Result<bool, AppError> {
        self.store
            .toggle_post_subscription(post_id, &auth.user_id)
            .await
    }
}
