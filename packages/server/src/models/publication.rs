use chrono::{DateTime, Utc};
use common::{PublicationKind, Validator};
use serde::{Deserialize, Serialize};

use crate::entity::{chapter, publication};

pub const PUBLICATION_TITLE_MAX_LEN: usize = 100;
pub const PUBLICATION_DESCRIPTION_MAX_LEN: usize = 500;
pub const CHAPTER_TITLE_MAX_LEN: usize = 100;
pub const CHAPTER_CONTENT_MAX_LEN: usize = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Publication {
    pub id: String,
    pub user_id: String,
    pub kind: PublicationKind,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<publication::Model> for Publication {
    fn from(m: publication::Model) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            kind: m.kind,
            title: m.title,
            description: m.description,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Chapter {
    pub id: String,
    pub publication_id: String,
    pub number: i32,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<chapter::Model> for Chapter {
    fn from(m: chapter::Model) -> Self {
        Self {
            id: m.id,
            publication_id: m.publication_id,
            number: m.number,
            title: m.title,
            content: m.content,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreatePublicationRequest {
    pub kind: PublicationKind,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct UpdatePublicationRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateChapterRequest {
    /// Defaults to the latest chapter number plus one.
    pub number: Option<i32>,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct UpdateChapterRequest {
    pub number: Option<i32>,
    pub title: Option<String>,
    pub content: Option<String>,
}

/// Highest chapter number of a publication; `None` when it has no chapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct LatestChapter {
    pub number: Option<i32>,
}

pub fn check_publication_title(v: &mut Validator, title: &str) {
    v.check_len(title, 1, PUBLICATION_TITLE_MAX_LEN, "title");
}

pub fn check_publication_description(v: &mut Validator, description: &str) {
    v.check_len(description, 1, PUBLICATION_DESCRIPTION_MAX_LEN, "description");
}

pub fn check_chapter(
    v: &mut Validator,
    number: Option<i32>,
    title: Option<&str>,
    content: Option<&str>,
) {
    if let Some(number) = number {
        v.check(number > 0, "number", "number must be greater than zero");
    }
    if let Some(title) = title {
        v.check_len(title, 0, CHAPTER_TITLE_MAX_LEN, "title");
    }
    if let Some(content) = content {
        v.check_len(content, 1, CHAPTER_CONTENT_MAX_LEN, "content");
    }
}
