//! API error handling
//!
//! `AppError` is what services and handlers return; `ApiError` is the JSON
//! body callers see. Storage and internal failures are logged here and
//! rendered without any detail.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use emporium_core::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::auth::validation::FieldError;

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new("NOT_FOUND", format!("{resource} not found"))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn unauthorized() -> Self {
        Self::new("UNAUTHORIZED", "Authentication required")
    }

    pub fn internal_error() -> Self {
        Self::new("INTERNAL_ERROR", "Internal server error")
    }
}

/// Application error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    WeakPassword(String),

    #[error("Email already exists")]
    DuplicateEmail,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is inactive")]
    AccountInactive,

    #[error("Invalid or expired reset token")]
    InvalidResetToken,

    #[error("Authentication required")]
    Unauthorized,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::BadRequest(_)
            | AppError::WeakPassword(_)
            | AppError::InvalidResetToken => StatusCode::BAD_REQUEST,
            AppError::DuplicateEmail => StatusCode::CONFLICT,
            AppError::InvalidCredentials | AppError::AccountInactive | AppError::Unauthorized => {
                StatusCode::UNAUTHORIZED
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Caller-safe error body
    pub fn to_api_error(&self) -> ApiError {
        match self {
            AppError::Validation(errors) => {
                let details = serde_json::to_value(errors).unwrap_or(serde_json::Value::Null);
                ApiError::new("VALIDATION_ERROR", "Request validation failed").with_details(details)
            }
            AppError::BadRequest(msg) => ApiError::bad_request(msg.clone()),
            AppError::WeakPassword(reason) => ApiError::new("WEAK_PASSWORD", reason.clone()),
            AppError::DuplicateEmail => ApiError::new("DUPLICATE_EMAIL", self.to_string()),
            AppError::InvalidCredentials => {
                ApiError::new("INVALID_CREDENTIALS", self.to_string())
            }
            AppError::AccountInactive => ApiError::new("ACCOUNT_INACTIVE", self.to_string()),
            AppError::InvalidResetToken => ApiError::new("INVALID_RESET_TOKEN", self.to_string()),
            AppError::Unauthorized => ApiError::unauthorized(),
            AppError::NotFound(resource) => ApiError::not_found(resource),
            AppError::Internal(_) => ApiError::internal_error(),
            AppError::Database(_) => ApiError::new("DATABASE_ERROR", "Database operation failed"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Internal(msg) => tracing::error!(error = %msg, "Internal error"),
            AppError::Database(msg) => tracing::error!(error = %msg, "Database error"),
            _ => {}
        }

        (self.status_code(), Json(self.to_api_error())).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppError::NotFound("User".to_string()),
            StoreError::DuplicateEmail => AppError::DuplicateEmail,
            StoreError::Invalid(msg) => AppError::Internal(format!("Invalid record: {msg}")),
            StoreError::Database(msg) => AppError::Database(msg),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::Validation(vec![]), StatusCode::BAD_REQUEST),
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (AppError::WeakPassword("x".into()), StatusCode::BAD_REQUEST),
            (AppError::DuplicateEmail, StatusCode::CONFLICT),
            (AppError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (AppError::AccountInactive, StatusCode::UNAUTHORIZED),
            (AppError::InvalidResetToken, StatusCode::BAD_REQUEST),
            (AppError::Unauthorized, StatusCode::UNAUTHORIZED),
            (AppError::NotFound("User".into()), StatusCode::NOT_FOUND),
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::Database("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, status) in cases {
            assert_eq!(error.status_code(), status, "{error:?}");
        }
    }

    #[test]
    fn test_internal_details_not_exposed() {
        let body = AppError::Database("connection refused to 10.0.0.5".into()).to_api_error();
        assert!(body.details.is_none());
        assert!(!body.message.contains("10.0.0.5"));

        let body = AppError::Internal("hash failure".into()).to_api_error();
        assert!(body.details.is_none());
        assert_eq!(body.message, "Internal server error");
    }

    #[test]
    fn test_validation_details() {
        let body = AppError::Validation(vec![FieldError::new("email", "is required")]).to_api_error();
        assert_eq!(body.code, "VALIDATION_ERROR");
        assert_eq!(
            body.details,
            Some(serde_json::json!([{ "field": "email", "reason": "is required" }]))
        );
    }

    #[test]
    fn test_store_error_conversion() {
        assert!(matches!(
            AppError::from(StoreError::NotFound),
            AppError::NotFound(resource) if resource == "User"
        ));
        assert!(matches!(
            AppError::from(StoreError::DuplicateEmail),
            AppError::DuplicateEmail
        ));
        assert!(matches!(
            AppError::from(StoreError::Database("boom".into())),
            AppError::Database(_)
        ));
    }
}
