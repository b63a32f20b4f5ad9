use super::Service;
use crate::error::AppError;
use crate::extractors::auth::AuthUser;
use crate::models::shared::{Page, PageArgs};
use crate::models::timeline::TimelineItem;

impl Service {
    /// The caller's feed: their own posts and those of the users they
    /// followed when the posts were published.
    pub async fn timeline(&self, auth: &AuthUser, args: &PageArgs) -> Result<Page<TimelineItem>, AppError> {
        let page = self.page(args)?;
        let items = self.store.timeline(&auth.user_id, &page).await?;
        Ok(self.with_prefixes(items))
    }

    /// Hide one post from the caller's feed only.
    pub async fn delete_timeline_item(&self, auth: &AuthUser, id: &str) -> Result<(), AppError> {
        self.store.delete_timeline_item(&auth.user_id, id).await
    }
}
