//! OpenGraph link previews with positive and negative caching.
//!
//! Successful fetches are cached for `success_ttl`; failures are cached for
//! `error_ttl` and answered with [`OpenGraphError::Backoff`] without touching
//! the network. Both caches are LRU-bounded and expire entries lazily on
//! lookup.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use lru::LruCache;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, instrument};

use crate::config::OpenGraphConfig;

/// Bodies are cut off after this many bytes.
pub const MAX_BODY_BYTES: usize = 2 << 20;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; nakamabot/1.0; +https://nakama.social)";

#[derive(Debug, thiserror::Error)]
pub enum OpenGraphError {
    /// The URL failed recently; try again later.
    #[error("backoff: previous fetch failed recently")]
    Backoff,
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(u16),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct OpenGraphImage {
    pub url: String,
    pub secure_url: Option<String>,
    #[serde(rename = "type")]
    pub content_type: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub alt: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct OpenGraph {
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub site_name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub images: Vec<OpenGraphImage>,
}

/// Trim and default the scheme to `https`.
pub fn canonicalize(raw: &str) -> Result<String, OpenGraphError> {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();
    let candidate = if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let parsed = url::Url::parse(&candidate).map_err(|e| OpenGraphError::InvalidUrl(e.to_string()))?;
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(OpenGraphError::InvalidUrl(raw.to_string()));
    }
    Ok(candidate)
}

/// Collect `og:*` meta tags. Every `og:image` (or `og:image:url`) opens a new
/// image; other `og:image:*` properties apply to the latest one.
pub fn parse(html: &str) -> OpenGraph {
    let document = Html::parse_document(html);
    let mut og = OpenGraph::default();
    let Ok(selector) = Selector::parse("meta[property]") else {
        return og;
    };

    for element in document.select(&selector) {
        let el = element.value();
        let (Some(property), Some(content)) = (el.attr("property"), el.attr("content")) else {
            continue;
        };
        let Some(name) = property.strip_prefix("og:") else {
            continue;
        };
        let content = content.trim().to_string();
        match name {
            "title" => og.title = Some(content),
            "description" => og.description = Some(content),
            "url" => og.url = Some(content),
            "site_name" => og.site_name = Some(content),
            "type" => og.kind = Some(content),
            "image" | "image:url" => og.images.push(OpenGraphImage {
                url: content,
                ..Default::default()
            }),
            other => {
                let Some(image) = og.images.last_mut() else {
                    continue;
                };
                match other {
                    "image:secure_url" => image.secure_url = Some(content),
                    "image:type" => image.content_type = Some(content),
                    "image:width" => image.width = content.parse().ok(),
                    "image:height" => image.height = content.parse().ok(),
                    "image:alt" => image.alt = Some(content),
                    _ => {}
                }
            }
        }
    }
    og
}

pub struct OpenGraphFetcher {
    client: reqwest::Client,
    success: Mutex<LruCache<String, (Instant, OpenGraph)>>,
    errors: Mutex<LruCache<String, Instant>>,
    success_ttl: Duration,
    error_ttl: Duration,
}

impl OpenGraphFetcher {
    pub fn new(config: &OpenGraphConfig) -> Result<Self, OpenGraphError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let size = NonZeroUsize::new(config.cache_size).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            client,
            success: Mutex::new(LruCache::new(size)),
            errors: Mutex::new(LruCache::new(size)),
            success_ttl: Duration::from_secs(config.success_ttl_secs),
            error_ttl: Duration::from_secs(config.error_ttl_secs),
        })
    }

    /// Override both TTLs.
    pub fn with_ttls(mut self, success: Duration, error: Duration) -> Self {
        self.success_ttl = success;
        self.error_ttl = error;
        self
    }

    fn recently_failed(&self, key: &str) -> bool {
        let mut errors = self.errors.lock().unwrap_or_else(|e| e.into_inner());
        match errors.get(key) {
            Some(expires) if *expires > Instant::now() => true,
            Some(_) => {
                errors.pop(key);
                false
            }
            None => false,
        }
    }

    fn remember_failure(&self, key: String) {
        let expires = Instant::now() + self.error_ttl;
        self.errors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .put(key, expires);
    }

    fn cached(&self, key: &str) -> Option<OpenGraph> {
        let mut success = self.success.lock().unwrap_or_else(|e| e.into_inner());
        match success.get(key) {
            Some((expires, og)) if *expires > Instant::now() => Some(og.clone()),
            Some(_) => {
                success.pop(key);
                None
            }
            None => None,
        }
    }

    #[instrument(skip(self))]
    pub async fn get(&self, raw_url: &str) -> Result<OpenGraph, OpenGraphError> {
        let key = match canonicalize(raw_url) {
            Ok(key) => key,
            Err(e) => {
                let raw = raw_url.trim();
                if self.recently_failed(raw) {
                    return Err(OpenGraphError::Backoff);
                }
                self.remember_failure(raw.to_string());
                return Err(e);
            }
        };
        if self.recently_failed(&key) {
            return Err(OpenGraphError::Backoff);
        }
        if let Some(og) = self.cached(&key) {
            return Ok(og);
        }

        match self.fetch(&key).await {
            Ok(og) => {
                let expires = Instant::now() + self.success_ttl;
                self.success
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .put(key, (expires, og.clone()));
                Ok(og)
            }
            Err(e) => {
                debug!(url = %key, error = %e, "OpenGraph fetch failed");
                self.remember_failure(key);
                Err(e)
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<OpenGraph, OpenGraphError> {
        let mut resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(OpenGraphError::Status(resp.status().as_u16()));
        }

        let mut body = Vec::new();
        while let Some(chunk) = resp.chunk().await? {
            let room = MAX_BODY_BYTES - body.len();
            body.extend_from_slice(&chunk[..chunk.len().min(room)]);
            if body.len() >= MAX_BODY_BYTES {
                break;
            }
        }
        Ok(parse(&String::from_utf8_lossy(&body)))
    }
}

/// Concurrent fan-out over a fetcher that reports failures on a side channel.
#[derive(Clone)]
pub struct Monitored {
    fetcher: Arc<OpenGraphFetcher>,
    errors: mpsc::Sender<(String, OpenGraphError)>,
}

impl Monitored {
    pub fn new(
        fetcher: Arc<OpenGraphFetcher>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<(String, OpenGraphError)>) {
        let (errors, rx) = mpsc::channel(capacity.max(1));
        (Self { fetcher, errors }, rx)
    }

    /// Fetch every URL concurrently. Results keep the input order; failed
    /// entries are `None` and their errors go to the channel if it has room.
    pub async fn get_many(&self, urls: &[String]) -> Vec<Option<OpenGraph>> {
        let fetches = urls.iter().map(|url| async move {
            match self.fetcher.get(url).await {
                Ok(og) => Some(og),
                Err(e) => {
                    let _ = self.errors.try_send((url.clone(), e));
                    None
                }
            }
        });
        futures::future::join_all(fetches).await
    }
}
