use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

use super::{Service, validate};
use crate::error::AppError;
use crate::models::preview::{LinkPreview, MAX_PREVIEW_URLS};
use crate::opengraph::OpenGraphError;

impl Service {
    /// OpenGraph metadata for each URL, in input order. URLs that cannot be
    /// previewed come back without metadata; the reason is only logged.
    #[instrument(skip(self, urls), fields(count = urls.len()))]
    pub async fn link_previews(&self, urls: Vec<String>) -> Result<Vec<LinkPreview>, AppError> {
        validate(|v| {
            v.check(!urls.is_empty(), "urls", "at least one url is required");
            v.check(
                urls.len() <= MAX_PREVIEW_URLS,
                "urls",
                format!("at most {MAX_PREVIEW_URLS} urls allowed"),
            );
        })?;
        let previews = self.previews.get_many(&urls).await;
        Ok(urls
            .into_iter()
            .zip(previews)
            .map(|(url, preview)| LinkPreview { url, preview })
            .collect())
    }
}

pub(super) async fn log_preview_errors(mut rx: mpsc::Receiver<(String, OpenGraphError)>) {
    while let Some((url, e)) = rx.recv().await {
        match e {
            OpenGraphError::Backoff => debug!(url = %url, "Link preview skipped, backing off"),
            e => warn!(url = %url, error = %e, "Link preview failed"),
        }
    }
}
