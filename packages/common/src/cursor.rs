//! Opaque pagination cursors.
//!
//! A cursor binds an entity ID to the sort-key value it was listed under.
//! The text form is URL-safe base64 over a MessagePack array:
//! `[id, seconds, nanos]` for time-ordered lists, `[id]` for lists ordered by
//! the ID alone. Clients must treat it as opaque.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CursorError {
    #[error("invalid cursor")]
    Invalid,
}

/// Decoded pagination cursor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cursor {
    pub id: String,
    pub value: Option<DateTime<Utc>>,
}

impl Cursor {
    /// Cursor for a time-ordered list.
    pub fn new(id: impl Into<String>, value: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            value: Some(value),
        }
    }

    /// Cursor for a list ordered by the identifier alone.
    pub fn from_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            value: None,
        }
    }

    pub fn encode(&self) -> String {
        let bytes = match self.value {
            Some(value) => rmp_serde::to_vec(&(
                &self.id,
                value.timestamp(),
                value.timestamp_subsec_nanos(),
            )),
            None => rmp_serde::to_vec(&(&self.id,)),
        };
        // Encoding a tuple of a string and integers cannot fail.
        URL_SAFE_NO_PAD.encode(bytes.unwrap_or_default())
    }

    pub fn decode(s: &str) -> Result<Self, CursorError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(s.trim())
            .map_err(|_| CursorError::Invalid)?;

        if let Ok((id, secs, nanos)) = rmp_serde::from_slice::<(String, i64, u32)>(&bytes) {
            let value = DateTime::from_timestamp(secs, nanos).ok_or(CursorError::Invalid)?;
            return Ok(Self::new(id, value));
        }

        let (id,) = rmp_serde::from_slice::<(String,)>(&bytes).map_err(|_| CursorError::Invalid)?;
        Ok(Self::from_id(id))
    }
}

impl std::str::FromStr for Cursor {
    type Err = CursorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_cursor_round_trips() {
        let value = "2024-01-02T03:04:05.000Z".parse::<DateTime<Utc>>().unwrap();
        let cursor = Cursor::new("b9nv60e0001", value);
        let decoded = Cursor::decode(&cursor.encode()).unwrap();
        assert_eq!(decoded, cursor);
    }

    #[test]
    fn nanosecond_precision_survives() {
        let value = DateTime::from_timestamp(1_700_000_000, 123_456_789).unwrap();
        let cursor = Cursor::new("x", value);
        assert_eq!(Cursor::decode(&cursor.encode()).unwrap().value, Some(value));
    }

    #[test]
    fn id_only_cursor_round_trips() {
        let cursor = Cursor::from_id("alice");
        let decoded: Cursor = cursor.to_string().parse().unwrap();
        assert_eq!(decoded, cursor);
        assert!(decoded.value.is_none());
    }

    #[test]
    fn encoded_form_is_url_safe() {
        let cursor = Cursor::new("id/with+chars?", Utc::now());
        let text = cursor.encode();
        assert!(
            text.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(Cursor::decode("not a cursor!"), Err(CursorError::Invalid));
        assert_eq!(Cursor::decode(""), Err(CursorError::Invalid));
        assert_eq!(
            Cursor::decode(&URL_SAFE_NO_PAD.encode(b"\x01\x02")),
            Err(CursorError::Invalid)
        );
    }
}
