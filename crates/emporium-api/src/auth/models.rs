//! Request and response payloads for the authentication endpoints
//!
//! Plaintext passwords only ever live in these request types. Their `Debug`
//! implementations redact every secret so a stray `?request` in a log line
//! cannot leak credentials.

use chrono::{DateTime, Utc};
use emporium_core::{Role, User};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::validation::{FieldError, FieldErrors, Validate};

const REDACTED: &str = "[REDACTED]";

/// Self-service registration request
#[derive(Clone, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "jane@example.com")]
    pub email: String,
    #[schema(example = "Str0ng!Passw0rd")]
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

impl Validate for RegisterRequest {
    fn validate(&self) -> Vec<FieldError> {
        FieldErrors::default()
            .email("email", &self.email)
            .required("password", &self.password)
            .name("first_name", &self.first_name)
            .name("last_name", &self.last_name)
            .finish()
    }
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("email", &self.email)
            .field("password", &REDACTED)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .finish()
    }
}

/// Registration by an administrator, with an explicit role
#[derive(Clone, Deserialize, ToSchema)]
pub struct AdminRegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    /// One of `admin`, `user`, `moderator`
    #[schema(example = "moderator")]
    pub role: String,
}

impl AdminRegisterRequest {
    /// Parsed role; only meaningful after validation passed
    pub fn parsed_role(&self) -> Option<Role> {
        self.role.parse().ok()
    }
}

impl Validate for AdminRegisterRequest {
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = FieldErrors::default();
        errors
            .email("email", &self.email)
            .required("password", &self.password)
            .name("first_name", &self.first_name)
            .name("last_name", &self.last_name);

        if self.role.trim().is_empty() {
            errors.push("role", "is required");
        } else if self.parsed_role().is_none() {
            errors.push("role", "must be one of: admin, user, moderator");
        }

        errors.finish()
    }
}

impl std::fmt::Debug for AdminRegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminRegisterRequest")
            .field("email", &self.email)
            .field("password", &REDACTED)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("role", &self.role)
            .finish()
    }
}

/// User login request
#[derive(Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> Vec<FieldError> {
        FieldErrors::default()
            .required("email", &self.email)
            .required("password", &self.password)
            .finish()
    }
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &REDACTED)
            .finish()
    }
}

/// Token refresh request
#[derive(Clone, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

impl Validate for RefreshRequest {
    fn validate(&self) -> Vec<FieldError> {
        FieldErrors::default()
            .required("refresh_token", &self.refresh_token)
            .finish()
    }
}

impl std::fmt::Debug for RefreshRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshRequest")
            .field("refresh_token", &REDACTED)
            .finish()
    }
}

/// Profile update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl Validate for UpdateProfileRequest {
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = FieldErrors::default();
        if let Some(first_name) = &self.first_name {
            errors.name("first_name", first_name);
        }
        if let Some(last_name) = &self.last_name {
            errors.name("last_name", last_name);
        }
        errors.finish()
    }
}

/// Password change for the authenticated user
#[derive(Clone, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

impl Validate for ChangePasswordRequest {
    fn validate(&self) -> Vec<FieldError> {
        FieldErrors::default()
            .required("old_password", &self.old_password)
            .required("new_password", &self.new_password)
            .finish()
    }
}

impl std::fmt::Debug for ChangePasswordRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangePasswordRequest")
            .field("old_password", &REDACTED)
            .field("new_password", &REDACTED)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

impl Validate for ForgotPasswordRequest {
    fn validate(&self) -> Vec<FieldError> {
        FieldErrors::default().email("email", &self.email).finish()
    }
}

/// Password reset with a previously issued reset token
#[derive(Clone, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

impl Validate for ResetPasswordRequest {
    fn validate(&self) -> Vec<FieldError> {
        FieldErrors::default()
            .required("token", &self.token)
            .required("new_password", &self.new_password)
            .finish()
    }
}

impl std::fmt::Debug for ResetPasswordRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResetPasswordRequest")
            .field("token", &REDACTED)
            .field("new_password", &REDACTED)
            .finish()
    }
}

/// Account activation toggle
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

/// Authentication response with tokens
#[derive(Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    /// Signed access token
    pub token: String,
    /// Opaque refresh token; only the newest one issued is valid
    pub refresh_token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
    pub user: User,
}

impl std::fmt::Debug for AuthResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthResponse")
            .field("token", &REDACTED)
            .field("refresh_token", &REDACTED)
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("user", &self.user)
            .finish()
    }
}

/// Issued password reset token, handed to a delivery channel
#[derive(Clone)]
pub struct PasswordResetTicket {
    pub user: User,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for PasswordResetTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordResetTicket")
            .field("user_id", &self.user.id)
            .field("token", &REDACTED)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Generic acknowledgement body
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
