//! In-process publish/subscribe on named topics.
//!
//! Values are encoded once per publish with MessagePack (field names kept, so
//! payloads are self-describing) and pushed to every subscriber's bounded
//! inbox. A full inbox drops the event for that subscriber only. Events on a
//! topic reach each subscriber in publish order.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use bytes::Bytes;
use dashmap::DashMap;
use futures::Stream;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::debug;

pub const POSTS_TOPIC: &str = "posts";

pub fn timeline_topic(user_id: &str) -> String {
    format!("timeline_item_{user_id}")
}

pub fn comments_topic(post_id: &str) -> String {
    format!("comment_{post_id}")
}

pub fn notifications_topic(user_id: &str) -> String {
    format!("notification_{user_id}")
}

pub fn messages_topic(chat_id: &str) -> String {
    format!("messages_{chat_id}")
}

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("failed to encode event: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
}

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<Bytes>,
}

pub struct Hub {
    topics: DashMap<String, Vec<Subscriber>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl Hub {
    pub fn new(buffer: usize) -> Self {
        Self {
            topics: DashMap::new(),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    /// Encode `value` and offer it to every subscriber of `topic`.
    /// Returns how many subscribers accepted it.
    pub fn publish<T: Serialize>(&self, topic: &str, value: &T) -> Result<usize, HubError> {
        let Some(subscribers) = self.topics.get(topic) else {
            return Ok(0);
        };
        let payload = Bytes::from(rmp_serde::to_vec_named(value)?);

        let mut delivered = 0;
        for sub in subscribers.iter() {
            match sub.tx.try_send(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    debug!(topic, subscriber = sub.id, "Subscriber inbox full, dropping event");
                }
                Err(TrySendError::Closed(_)) => {}
            }
        }
        Ok(delivered)
    }

    /// Subscribe to `topic` until `cancel` fires or the subscription is
    /// dropped; either way the subscriber is removed and the stream ends.
    pub fn subscribe(self: &Arc<Self>, topic: &str, cancel: &CancellationToken) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.topics
            .entry(topic.to_string())
            .or_default()
            .push(Subscriber { id, tx });

        let scope = cancel.child_token();
        let watch = scope.clone();
        let hub = Arc::clone(self);
        let topic = topic.to_string();
        tokio::spawn(async move {
            watch.cancelled().await;
            hub.unsubscribe(&topic, id);
        });

        Subscription {
            rx,
            _scope: scope.drop_guard(),
        }
    }

    fn unsubscribe(&self, topic: &str, id: u64) {
        // Dropping the sender closes the subscriber's channel.
        self.topics.remove_if_mut(topic, |_, subs| {
            subs.retain(|s| s.id != id);
            subs.is_empty()
        });
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, |subs| subs.len())
    }
}

/// Stream of raw MessagePack payloads for one subscription.
pub struct Subscription {
    rx: mpsc::Receiver<Bytes>,
    _scope: DropGuard,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }
}

impl Stream for Subscription {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
