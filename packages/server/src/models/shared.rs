use serde::{Deserialize, Serialize};

/// Keyset pagination arguments accepted by every list endpoint.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageArgs {
    /// Page size when walking forward (newest first).
    #[param(minimum = 1, maximum = 200)]
    pub first: Option<u64>,
    /// Opaque cursor; return items after it.
    pub after: Option<String>,
    /// Page size when walking backward.
    #[param(minimum = 1, maximum = 200)]
    pub last: Option<u64>,
    /// Opaque cursor; return items before it.
    pub before: Option<String>,
}

impl PageArgs {
    pub fn first(n: u64) -> Self {
        Self {
            first: Some(n),
            ..Default::default()
        }
    }

    pub fn after(mut self, cursor: impl Into<String>) -> Self {
        self.after = Some(cursor.into());
        self
    }

    pub fn last(n: u64) -> Self {
        Self {
            last: Some(n),
            ..Default::default()
        }
    }

    pub fn before(mut self, cursor: impl Into<String>) -> Self {
        self.before = Some(cursor.into());
        self
    }
}

/// Position of a page inside the full list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

/// One page of a keyset-paginated list.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page_info: PageInfo,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page_info: self.page_info,
        }
    }
}

/// Aggregated reactions of one emoji on a post or comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ReactionCount {
    #[schema(example = "👍")]
    pub emoji: String,
    pub count: u64,
    /// Whether the viewer is among the reactors.
    pub reacted: bool,
}

/// Minimal user card embedded in other resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UserPreview {
    pub id: String,
    pub username: String,
    pub avatar_url: Option<String>,
}

/// Public URL prefixes for stored objects.
#[derive(Debug, Clone)]
pub struct UrlPrefixes {
    pub avatar: String,
    pub media: String,
}

impl UrlPrefixes {
    pub fn avatar_url(&self, key: &str) -> String {
        join_url(&self.avatar, key)
    }

    pub fn media_url(&self, key: &str) -> String {
        join_url(&self.media, key)
    }
}

fn join_url(prefix: &str, key: &str) -> String {
    if prefix.is_empty() || prefix.ends_with('/') {
        format!("{prefix}{key}")
    } else {
        format!("{prefix}/{key}")
    }
}

/// Rewrites stored object keys into public URLs.
pub trait WithPrefixes {
    fn apply_prefixes(&mut self, prefixes: &UrlPrefixes);
}

impl WithPrefixes for UserPreview {
    fn apply_prefixes(&mut self, prefixes: &UrlPrefixes) {
        if let Some(key) = self.avatar_url.take() {
            self.avatar_url = Some(prefixes.avatar_url(&key));
        }
    }
}

impl<T: WithPrefixes> WithPrefixes for Vec<T> {
    fn apply_prefixes(&mut self, prefixes: &UrlPrefixes) {
        for item in self {
            item.apply_prefixes(prefixes);
        }
    }
}

impl<T: WithPrefixes> WithPrefixes for Option<T> {
    fn apply_prefixes(&mut self, prefixes: &UrlPrefixes) {
        if let Some(item) = self {
            item.apply_prefixes(prefixes);
        }
    }
}

impl<T: WithPrefixes> WithPrefixes for Page<T> {
    fn apply_prefixes(&mut self, prefixes: &UrlPrefixes) {
        self.items.apply_prefixes(prefixes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_join_with_single_slash() {
        let prefixes = UrlPrefixes {
            avatar: "https://cdn.example/avatars/".into(),
            media: "https://cdn.example/media".into(),
        };
        assert_eq!(prefixes.avatar_url("k"), "https://cdn.example/avatars/k");
        assert_eq!(
            prefixes.media_url("2024/01/02/x.avif"),
            "https://cdn.example/media/2024/01/02/x.avif"
        );
    }
}
