use common::storage::{BoxReader, StorageError};
use tokio_util::sync::CancellationToken;

use super::Service;
use crate::error::AppError;
use crate::extractors::auth::AuthUser;
use crate::hub::{self, Subscription};

impl Service {
    pub fn subscribe_posts(&self, cancel: &CancellationToken) -> Subscription {
        self.hub.subscribe(hub::POSTS_TOPIC, cancel)
    }

    pub fn subscribe_timeline(&self, auth: &AuthUser, cancel: &CancellationToken) -> Subscription {
        self.hub.subscribe(&hub::timeline_topic(&auth.user_id), cancel)
    }

    pub fn subscribe_notifications(&self, auth: &AuthUser, cancel: &CancellationToken) -> Subscription {
        self.hub
            .subscribe(&hub::notifications_topic(&auth.user_id), cancel)
    }

    /// Live comments of an existing post.
    pub async fn subscribe_comments(
        &self,
        post_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Subscription, AppError> {
        self.store.post_row(post_id).await?;
        Ok(self.hub.subscribe(&hub::comments_topic(post_id), cancel))
    }

    /// Live messages of a chat the caller takes part in.
    pub async fn subscribe_messages(
        &self,
        auth: &AuthUser,
        chat_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Subscription, AppError> {
        self.store.chat(&auth.user_id, chat_id).await?;
        Ok(self.hub.subscribe(&hub::messages_topic(chat_id), cancel))
    }

    /// Open a stored image. Only the media and avatar buckets are served.
    pub async fn open_image(&self, bucket: &str, key: &str) -> Result<BoxReader, AppError> {
        let storage = &self.config.storage;
        if bucket != storage.media_bucket && bucket != storage.avatars_bucket {
            return Err(AppError::not_found("image not found"));
        }
        match self.blobs.get_object(bucket, key).await {
            Ok(reader) => Ok(reader),
            Err(StorageError::NotFound { .. } | StorageError::InvalidKey(_)) => {
                Err(AppError::not_found("image not found"))
            }
            Err(e) => Err(e.into()),
        }
    }
}
