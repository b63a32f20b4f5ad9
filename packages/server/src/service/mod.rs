//! Service orchestrator.
//!
//! Every operation validates its input, authorizes the caller, delegates the
//! state change to [`RelStore`] and then rewrites object keys into public
//! URLs. Side effects that must not hold up the caller (timeline fan-out,
//! notifications, realtime broadcasts) are handed to [`Background`].

mod auth;
mod chats;
mod comments;
mod effects;
mod notifications;
mod posts;
mod previews;
mod publications;
mod subscriptions;
mod timeline;
mod users;

use std::sync::Arc;

use chrono::Duration;
use common::Validator;
use common::storage::{BlobStore, StorageError, Uploader};
use sea_orm::DatabaseConnection;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::hub::Hub;
use crate::mailer::Sender;
use crate::media::ImagePipeline;
use crate::models::shared::{PageArgs, UrlPrefixes, WithPrefixes};
use crate::opengraph::{Monitored, OpenGraphFetcher};
use crate::pagination::PageRequest;
use crate::store::RelStore;
use crate::tasks::Background;
use crate::utils::token::TokenCodec;

pub use auth::check_redirect_uri;
use effects::Effects;

/// Minimum length of the token signing key, in bytes.
pub const MIN_TOKEN_KEY_LEN: usize = 32;

/// Per-subscriber inbox size of the realtime hub.
const HUB_BUFFER: usize = 64;
/// Capacity of the side channels that report background failures.
const ERROR_CHANNEL_CAPACITY: usize = 128;

pub struct Service {
    store: RelStore,
    blobs: Arc<dyn BlobStore>,
    uploader: Uploader,
    sender: Arc<dyn Sender>,
    hub: Arc<Hub>,
    pipeline: ImagePipeline,
    previews: Monitored,
    tokens: TokenCodec,
    config: Arc<AppConfig>,
    background: Background,
    effects: Effects,
}

impl Service {
    /// Wire the service together. Must be called inside a Tokio runtime: the
    /// loops draining the failure side channels are spawned here.
    pub fn new(
        config: AppConfig,
        db: DatabaseConnection,
        blobs: Arc<dyn BlobStore>,
        sender: Arc<dyn Sender>,
    ) -> Result<Self, AppError> {
        if config.auth.token_key.len() < MIN_TOKEN_KEY_LEN {
            return Err(AppError::Internal(format!(
                "auth.token_key must be at least {MIN_TOKEN_KEY_LEN} bytes"
            )));
        }
        let tokens = TokenCodec::new(
            config.auth.token_key.as_bytes(),
            Duration::hours(config.auth.token_ttl_hours),
        );

        let (upload_errors, upload_rx) = mpsc::channel(ERROR_CHANNEL_CAPACITY);
        let uploader = Uploader::new(blobs.clone(), config.storage.cleanup_timeout())
            .with_error_sink(upload_errors);
        tokio::spawn(log_storage_errors(upload_rx));

        let fetcher = OpenGraphFetcher::new(&config.opengraph)
            .map_err(|e| AppError::Internal(format!("failed to build preview fetcher: {e}")))?;
        let (previews, preview_rx) = Monitored::new(Arc::new(fetcher), ERROR_CHANNEL_CAPACITY);
        tokio::spawn(previews::log_preview_errors(preview_rx));

        let store = RelStore::new(db);
        let hub = Arc::new(Hub::new(HUB_BUFFER));
        let prefixes = UrlPrefixes {
            avatar: config.media.avatar_url_prefix.clone(),
            media: config.media.media_url_prefix.clone(),
        };
        let effects = Effects::new(store.clone(), hub.clone(), prefixes);

        Ok(Self {
            pipeline: ImagePipeline::new(&config.media),
            store,
            blobs,
            uploader,
            sender,
            hub,
            previews,
            tokens,
            config: Arc::new(config),
            background: Background::new(),
            effects,
        })
    }

    pub fn config(&self) -> &Arc<AppConfig> {
        &self.config
    }

    pub fn store(&self) -> &RelStore {
        &self.store
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    pub fn background(&self) -> &Background {
        &self.background
    }

    fn prefixes(&self) -> &UrlPrefixes {
        self.effects.prefixes()
    }

    fn page(&self, args: &PageArgs) -> Result<PageRequest, AppError> {
        PageRequest::parse(args, &self.config.pagination)
    }

    fn with_prefixes<T: WithPrefixes>(&self, mut value: T) -> T {
        value.apply_prefixes(self.prefixes());
        value
    }
}

/// Run `check` against a fresh validator and turn collected messages into an
/// error.
fn validate(check: impl FnOnce(&mut Validator)) -> Result<(), AppError> {
    let mut v = Validator::new();
    check(&mut v);
    Ok(v.into_result()?)
}

async fn log_storage_errors(mut rx: mpsc::Receiver<StorageError>) {
    while let Some(e) = rx.recv().await {
        warn!(error = %e, "Orphaned object cleanup failed");
    }
    debug!("Storage error channel closed");
}
