//! Per-field error accumulation for input validation.

use std::fmt;

use serde::Serialize;

/// Ordered collection of `(field, message)` pairs produced by a [`Validator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct FieldErrors(Vec<FieldError>);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldErrors {
    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<FieldError> {
        self.0
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", e.field, e.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for FieldErrors {}

/// Accumulates field errors; only the first message per field is kept.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, field: &str, message: impl Into<String>) {
        if self.errors.iter().any(|e| e.field == field) {
            return;
        }
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    /// Record `message` for `field` unless `ok` holds.
    pub fn check(&mut self, ok: bool, field: &str, message: impl Into<String>) {
        if !ok {
            self.add_error(field, message);
        }
    }

    /// Check that `value` is between `min` and `max` characters long.
    pub fn check_len(&mut self, value: &str, min: usize, max: usize, field: &str) {
        let count = value.chars().count();
        if count < min {
            if min == 1 {
                self.add_error(field, format!("{field} cannot be empty"));
            } else {
                self.add_error(field, format!("{field} must be at least {min} characters"));
            }
        } else if count > max {
            self.add_error(field, format!("{field} cannot exceed {max} characters"));
        }
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(FieldErrors(self.errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_validator_is_ok() {
        assert!(Validator::new().into_result().is_ok());
    }

    #[test]
    fn first_message_per_field_wins_and_order_is_kept() {
        let mut v = Validator::new();
        v.add_error("title", "too long");
        v.add_error("content", "cannot be empty");
        v.add_error("title", "second");
        let errors = v.into_result().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get("title"), Some("too long"));
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, ["title", "content"]);
        assert_eq!(errors.to_string(), "title: too long; content: cannot be empty");
    }

    #[test]
    fn check_len_counts_characters() {
        let mut v = Validator::new();
        v.check_len("日本語", 1, 3, "title");
        v.check_len("", 1, 3, "content");
        v.check_len("abcd", 1, 3, "name");
        let errors = v.into_result().unwrap_err();
        assert!(errors.get("title").is_none());
        assert_eq!(errors.get("content"), Some("content cannot be empty"));
        assert_eq!(errors.get("name"), Some("name cannot exceed 3 characters"));
    }
}
