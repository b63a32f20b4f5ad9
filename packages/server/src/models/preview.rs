use serde::{Deserialize, Serialize};

use crate::opengraph::OpenGraph;

pub const MAX_PREVIEW_URLS: usize = 10;

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct LinkPreviewsRequest {
    #[schema(example = json!(["https://www.rust-lang.org"]))]
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct LinkPreview {
    pub url: String,
    /// Missing when the page could not be fetched.
    pub preview: Option<OpenGraph>,
}
