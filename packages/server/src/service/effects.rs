use std::sync::Arc;

use common::NotificationKind;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::error::AppError;
use crate::hub::{self, Hub};
use crate::models::comment::Comment;
use crate::models::post::Post;
use crate::models::shared::{UrlPrefixes, WithPrefixes};
use crate::store::RelStore;

/// Handles to everything a detached side effect needs. Cheap to clone into a
/// background task.
#[derive(Clone)]
pub(super) struct Effects {
    store: RelStore,
    hub: Arc<Hub>,
    prefixes: Arc<UrlPrefixes>,
}

impl Effects {
    pub fn new(store: RelStore, hub: Arc<Hub>, prefixes: UrlPrefixes) -> Self {
        Self {
            store,
            hub,
            prefixes: Arc::new(prefixes),
        }
    }

    pub fn prefixes(&self) -> &UrlPrefixes {
        &self.prefixes
    }

    pub fn publish<T: Serialize>(&self, topic: &str, value: &T) {
        match self.hub.publish(topic, value) {
            Ok(delivered) => debug!(topic, delivered, "Published event"),
            Err(e) => warn!(topic, error = %e, "Failed to publish event"),
        }
    }

    /// Broadcast a new post, then copy it into every follower's timeline.
    /// `post` must already carry public URLs.
    #[instrument(skip(self, post), fields(post_id = %post.id, author = %post.user.id))]
    pub async fn fan_out_post(self, post: Post) -> Result<(), AppError> {
        self.publish(hub::POSTS_TOPIC, &post);

        let followers = self.store.follower_ids(&post.user.id).await?;
        let inserted = self.store.fan_out(&post.id, post.created_at, &followers).await?;
        debug!(followers = followers.len(), inserted, "Fanned out post");

        let mut viewers = followers;
        viewers.push(post.user.id.clone());
        for viewer in viewers {
            let topic = hub::timeline_topic(&viewer);
            if self.hub.subscriber_count(&topic) == 0 {
                continue;
            }
            let mut item = self.store.timeline_item(&viewer, &post.id).await?;
            item.apply_prefixes(&self.prefixes);
            self.publish(&topic, &item);
        }
        Ok(())
    }

    /// Notify every existing user mentioned in `content`, except the author.
    #[instrument(skip(self, content))]
    pub async fn notify_mentions(
        self,
        author: String,
        content: String,
        kind: NotificationKind,
        post_id: String,
    ) -> Result<(), AppError> {
        let usernames = common::text::collect_mentions(&content);
        let recipients = self.store.user_ids_by_usernames(&usernames).await?;
        for recipient in recipients.iter().filter(|id| **id != author) {
            self.deliver(recipient, kind, Some(&post_id), &author).await?;
        }
        Ok(())
    }

    /// Broadcast a new comment and notify the post's subscribers.
    #[instrument(skip(self, comment), fields(comment_id = %comment.id, post_id = %comment.post_id))]
    pub async fn comment_created(self, comment: Comment) -> Result<(), AppError> {
        self.publish(&hub::comments_topic(&comment.post_id), &comment);

        let author = comment.user.id.as_str();
        let subscribers = self.store.post_subscribers(&comment.post_id).await?;
        for subscriber in subscribers.iter().filter(|id| id.as_str() != author) {
            self.deliver(subscriber, NotificationKind::Comment, Some(&comment.post_id), author)
                .await?;
        }
        Ok(())
    }

    pub async fn notify_follow(self, follower: String, followee: String) -> Result<(), AppError> {
        self.deliver(&followee, NotificationKind::Follow, None, &follower).await
    }

    async fn deliver(
        &self,
        recipient: &str,
        kind: NotificationKind,
        post_id: Option<&str>,
        actor: &str,
    ) -> Result<(), AppError> {
        if let Some(mut notification) = self.store.notify(recipient, kind, post_id, actor).await? {
            notification.apply_prefixes(&self.prefixes);
            self.publish(&hub::notifications_topic(recipient), &notification);
        }
        Ok(())
    }
}
