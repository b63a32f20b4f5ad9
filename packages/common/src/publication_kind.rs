#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "snake_case")]
pub enum PublicationKind {
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "manga"))]
    Manga,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "novel"))]
    Novel,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "tutorial"))]
    Tutorial,
}

impl PublicationKind {
    pub const ALL: &'static [PublicationKind] = &[Self::Manga, Self::Novel, Self::Tutorial];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manga => "manga",
            Self::Novel => "novel",
            Self::Tutorial => "tutorial",
        }
    }
}

impl fmt::Display for PublicationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid publication kind '{0}', expected one of: manga, novel, tutorial")]
pub struct ParsePublicationKindError(String);

impl FromStr for PublicationKind {
    type Err = ParsePublicationKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParsePublicationKindError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("Manga".parse::<PublicationKind>().unwrap(), PublicationKind::Manga);
        assert_eq!(" novel ".parse::<PublicationKind>().unwrap(), PublicationKind::Novel);
        assert!("comic".parse::<PublicationKind>().is_err());
    }
}
