//! Request field validation
//!
//! Request DTOs implement [`Validate`] by hand; the HTTP layer turns the
//! collected [`FieldError`]s into a 400 response listing every problem.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;

/// Maximum length of a name field, in characters
pub const MAX_NAME_LENGTH: usize = 100;

/// Maximum length of an email address, in characters
pub const MAX_EMAIL_LENGTH: usize = 254;

/// A single rejected request field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Explicit validation for request payloads
pub trait Validate {
    /// Collect every field problem; empty means valid
    fn validate(&self) -> Vec<FieldError>;

    fn ensure_valid(&self) -> Result<(), AppError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(errors))
        }
    }
}

/// Accumulates field errors while checking a payload
#[derive(Debug, Default)]
pub(crate) struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub(crate) fn required(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.0.push(FieldError::new(field, "is required"));
        }
        self
    }

    pub(crate) fn email(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.0.push(FieldError::new(field, "is required"));
        } else if value.trim().chars().count() > MAX_EMAIL_LENGTH {
            self.0.push(FieldError::new(field, "is too long"));
        } else if !is_valid_email(value) {
            self.0.push(FieldError::new(field, "must be a valid email address"));
        }
        self
    }

    pub(crate) fn name(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.0.push(FieldError::new(field, "is required"));
        } else if value.chars().count() > MAX_NAME_LENGTH {
            self.0.push(FieldError::new(
                field,
                format!("must be at most {MAX_NAME_LENGTH} characters"),
            ));
        }
        self
    }

    pub(crate) fn push(&mut self, field: &str, reason: impl Into<String>) -> &mut Self {
        self.0.push(FieldError::new(field, reason));
        self
    }

    pub(crate) fn finish(&mut self) -> Vec<FieldError> {
        std::mem::take(&mut self.0)
    }
}

/// Structural email check: one `@`, non-empty local part, dotted domain,
/// no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_format() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("  First.Last+tag@sub.example.org "));
        assert!(!is_valid_email("userexample.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@localhost"));
        assert!(!is_valid_email("user@@example.com"));
        assert!(!is_valid_email("us er@example.com"));
        assert!(!is_valid_email("user@example..com"));
    }

    #[test]
    fn test_field_errors_accumulate() {
        let errors = FieldErrors::default()
            .email("email", "nope")
            .required("password", "")
            .name("first_name", &"x".repeat(MAX_NAME_LENGTH + 1))
            .name("last_name", "Ok")
            .finish();

        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["email", "password", "first_name"]);
    }

    #[test]
    fn test_ensure_valid() {
        struct AlwaysBad;
        impl Validate for AlwaysBad {
            fn validate(&self) -> Vec<FieldError> {
                vec![FieldError::new("field", "is wrong")]
            }
        }

        assert!(matches!(
            AlwaysBad.ensure_valid(),
            Err(AppError::Validation(errors)) if errors.len() == 1
        ));
    }
}
