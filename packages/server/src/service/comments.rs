use common::NotificationKind;
use common::text::{collect_tags, is_valid_emoji, smart_trim};
use tracing::instrument;

use super::{Service, validate};
use crate::error::AppError;
use crate::extractors::auth::AuthUser;
use crate::models::comment::{COMMENT_CONTENT_MAX_LEN, Comment};
use crate::models::shared::{Page, PageArgs, ReactionCount};
use crate::store::NewComment;

fn checked_content(raw: &str) -> Result<String, AppError> {
    let content = smart_trim(raw);
    validate(|v| v.check_len(&content, 1, COMMENT_CONTENT_MAX_LEN, "content"))?;
    Ok(content)
}

impl Service {
    /// Comment on a post. Subscribers hear about it and mentioned users get
    /// a notification, both in the background.
    #[instrument(skip(self, auth, content), fields(user_id = %auth.user_id))]
    pub async fn create_comment(&self, auth: &AuthUser, post_id: &str, content: &str) -> Result<Comment, AppError> {
        let content = checked_content(content)?;
        let comment = self
            .store
            .create_comment(NewComment {
                user_id: auth.user_id.clone(),
                post_id: post_id.to_string(),
                tags: collect_tags(&content),
                content: content.clone(),
            })
            .await?;
        let comment = self.with_prefixes(comment);

        self.background
            .spawn("comment_created", self.effects.clone().comment_created(comment.clone()));
        self.background.spawn(
            "notify_comment_mentions",
            self.effects.clone().notify_mentions(
                auth.user_id.clone(),
                content,
                NotificationKind::CommentMention,
                post_id.to_string(),
            ),
        );
        Ok(comment)
    }

    pub async fn comments(
        &self,
        auth: Option<&AuthUser>,
        post_id: &str,
        args: &PageArgs,
    ) -> Result<Page<Comment>, AppError> {
        let page = self.page(args)?;
        let comments = self
            .store
            .comments(post_id, auth.map(|a| a.user_id.as_str()), &page)
            .await?;
        Ok(self.with_prefixes(comments))
    }

    pub async fn comment(&self, auth: Option<&AuthUser>, id: &str) -> Result<Comment, AppError> {
        let comment = self.store.comment(id, auth.map(|a| a.user_id.as_str())).await?;
        Ok(self.with_prefixes(comment))
    }

    #[instrument(skip(self, auth, content), fields(user_id = %auth.user_id))]
    pub async fn update_comment(&self, auth: &AuthUser, id: &str, content: &str) -> Result<Comment, AppError> {
        let content = checked_content(content)?;
        let comment = self.store.update_comment(id, &auth.user_id, content).await?;
        Ok(self.with_prefixes(comment))
    }

    #[instrument(skip(self, auth), fields(user_id = %auth.user_id))]
    pub async fn delete_comment(&self, auth: &AuthUser, id: &str) -> Result<(), AppError> {
        self.store.delete_comment(id, &auth.user_id).await
    }

    pub async fn toggle_comment_reaction(
        &self,
        auth: &AuthUser,
        comment_id: &str,
        emoji: &str,
    ) -> Result<Vec<ReactionCount>, AppError> {
        let emoji = emoji.trim();
        validate(|v| v.check(is_valid_emoji(emoji), "emoji", "invalid emoji"))?;
        self.store
            .toggle_comment_reaction(comment_id, &auth.user_id, emoji)
            .await
    }
}
