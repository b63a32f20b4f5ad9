use common::storage::{BoxReader, Upload};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use super::Service;
use crate::entity::user;
use crate::error::AppError;
use crate::extractors::auth::AuthUser;
use crate::models::shared::{Page, PageArgs};
use crate::models::user::{ToggleFollowOutput, User};

impl Service {
    async fn profile(&self, viewer: Option<&str>, model: user::Model) -> Result<User, AppError> {
        let following = match viewer {
            Some(v) if v != model.id => self.store.is_following(v, &model.id).await?,
            _ => false,
        };
        Ok(self.with_prefixes(User::from_model(model, viewer, following)))
    }

    async fn profiles(&self, viewer: Option<&str>, page: Page<user::Model>) -> Result<Page<User>, AppError> {
        let followed = match viewer {
            Some(v) => {
                let ids: Vec<String> = page.items.iter().map(|u| u.id.clone()).collect();
                self.store.followed_among(v, &ids).await?
            }
            None => Default::default(),
        };
        Ok(self.with_prefixes(page.map(|u| {
            let following = followed.contains(&u.id);
            User::from_model(u, viewer, following)
        })))
    }

    pub async fn me(&self, auth: &AuthUser) -> Result<User, AppError> {
        let model = self.store.user_by_id(&auth.user_id).await?;
        self.profile(Some(&auth.user_id), model).await
    }

    pub async fn user_by_username(&self, auth: Option<&AuthUser>, username: &str) -> Result<User, AppError> {
        let model = self.store.user_by_username(username.trim()).await?;
        self.profile(auth.map(|a| a.user_id.as_str()), model).await
    }

    pub async fn search_users(
        &self,
        auth: Option<&AuthUser>,
        search: Option<&str>,
        args: &PageArgs,
    ) -> Result<Page<User>, AppError> {
        let page = self.page(args)?;
        let users = self.store.search_users(search, &page).await?;
        self.profiles(auth.map(|a| a.user_id.as_str()), users).await
    }

    pub async fn followers(
        &self,
        auth: Option<&AuthUser>,
        username: &str,
        args: &PageArgs,
    ) -> Result<Page<User>, AppError> {
        let page = self.page(args)?;
        let target = self.store.user_by_username(username.trim()).await?;
        let users = self.store.followers(&target.id, &page).await?;
        self.profiles(auth.map(|a| a.user_id.as_str()), users).await
    }

    pub async fn followees(
        &self,
        auth: Option<&AuthUser>,
        username: &str,
        args: &PageArgs,
    ) -> Result<Page<User>, AppError> {
        let page = self.page(args)?;
        let target = self.store.user_by_username(username.trim()).await?;
        let users = self.store.followees(&target.id, &page).await?;
        self.profiles(auth.map(|a| a.user_id.as_str()), users).await
    }

    /// Follow `user_id`, or unfollow when already following.
    #[instrument(skip(self, auth), fields(follower = %auth.user_id))]
    pub async fn toggle_follow(&self, auth: &AuthUser, user_id: &str) -> Result<ToggleFollowOutput, AppError> {
        let (following, followers_count) = self.store.toggle_follow(&auth.user_id, user_id).await?;
        if following {
            let effects = self.effects.clone();
            let (follower, followee) = (auth.user_id.clone(), user_id.to_string());
            self.background
                .spawn("notify_follow", effects.notify_follow(follower, followee));
        }
        Ok(ToggleFollowOutput {
            following,
            followers_count,
        })
    }

    /// Replace the caller's avatar. The previous avatar object is removed
    /// once the new one is committed.
    #[instrument(skip(self, auth, image), fields(user_id = %auth.user_id))]
    pub async fn update_avatar(&self, auth: &AuthUser, image: BoxReader) -> Result<User, AppError> {
        let mut processed = self
            .pipeline
            .process(vec![image], self.config.media.avatar_resolution)
            .await?;
        let image = processed
            .pop()
            .ok_or_else(|| AppError::invalid_field("avatar", "avatar cannot be empty"))?;

        let bucket = &self.config.storage.avatars_bucket;
        let key = format!("{}.{}", common::id::generate(), image.extension);
        let upload = Upload {
            key: key.clone(),
            content_type: image.content_type.to_string(),
            body: image.reader().await.map_err(|e| AppError::Internal(e.to_string()))?,
        };
        let cleanup = self
            .uploader
            .upload_many(&CancellationToken::new(), bucket, vec![upload])
            .await?;

        let (model, previous) = self.store.update_avatar(&auth.user_id, &key).await?;
        cleanup.defuse();
        info!(avatar = %key, "Avatar updated");

        if let Some(previous) = previous {
            let blobs = self.blobs.clone();
            let bucket = bucket.clone();
            self.background.spawn("remove_old_avatar", async move {
                if let Err(e) = blobs.remove_object(&bucket, &previous).await {
                    warn!(bucket = %bucket, key = %previous, error = %e, "Failed to remove old avatar");
                }
                Ok(())
            });
        }

        self.profile(Some(&auth.user_id), model).await
    }
}
