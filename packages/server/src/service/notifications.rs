use tracing::instrument;

use super::Service;
use crate::error::AppError;
use crate::extractors::auth::AuthUser;
use crate::models::notification::Notification;
use crate::models::shared::{Page, PageArgs};

impl Service {
    pub async fn notifications(&self, auth: &AuthUser, args: &PageArgs) -> Result<Page<Notification>, AppError> {
        let page = self.page(args)?;
        let notifications = self.store.notifications(&auth.user_id, &page).await?;
        Ok(self.with_prefixes(notifications))
    }

    #[instrument(skip(self, auth), fields(user_id = %auth.user_id))]
    pub async fn read_notification(&self, auth: &AuthUser, id: &str) -> Result<(), AppError> {
        self.store.read_notification(&auth.user_id, id).await
    }

    #[instrument(skip(self, auth), fields(user_id = %auth.user_id))]
    pub async fn read_all_notifications(&self, auth: &AuthUser) -> Result<(), AppError> {
        self.store.read_all_notifications(&auth.user_id).await
    }

    pub async fn has_unread_notifications(&self, auth: &AuthUser) -> Result<bool, AppError> {
        self.store.has_unread_notifications(&auth.user_id).await
    }
}
