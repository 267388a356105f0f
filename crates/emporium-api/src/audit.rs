//! Security audit logging for authentication events
//!
//! Every event is logged at INFO level with the "audit" target, so it can be
//! filtered and routed separately from application logs. The event itself is
//! serialized to JSON for log aggregators.
//!
//! Audit records never contain passwords, password hashes or token values.
//!
//! ```ignore
//! use emporium_api::audit::{audit_log, AuditEvent};
//!
//! audit_log(&AuditEvent::LoginSuccess {
//!     user_id: user.id,
//!     email: user.email.clone(),
//! });
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Security audit events for authentication and authorization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Successful user login
    LoginSuccess { user_id: Uuid, email: String },

    /// Failed login attempt
    LoginFailure { email: String, reason: String },

    /// User logout
    Logout { user_id: Uuid },

    /// Refresh token exchanged for a new session
    TokenRefresh { user_id: Uuid, email: String },

    /// Successful user registration
    RegistrationSuccess {
        user_id: Uuid,
        email: String,
        role: String,
        /// Set when an administrator created the account
        created_by_admin: bool,
    },

    /// Failed registration attempt
    RegistrationFailure { email: String, reason: String },

    /// Password changed by its owner
    PasswordChange { user_id: Uuid },

    /// Password reset token issued
    PasswordResetRequested {
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    },

    /// Password replaced through a reset token
    PasswordReset { user_id: Uuid },

    /// Access denied due to insufficient permissions
    AccessDenied {
        user_id: Option<Uuid>,
        resource: String,
        required_roles: Vec<String>,
    },

    /// Missing, malformed, invalid or expired token used
    InvalidToken { resource: String, reason: String },

    /// Account activated or deactivated by an administrator
    AccountStatusChanged { user_id: Uuid, is_active: bool },

    /// Initial administrator account created at startup
    AdminBootstrapped { user_id: Uuid, email: String },
}

impl AuditEvent {
    /// Short human-readable description used as the log message
    pub fn describe(&self) -> &'static str {
        match self {
            AuditEvent::LoginSuccess { .. } => "Login successful",
            AuditEvent::LoginFailure { .. } => "Login failed",
            AuditEvent::Logout { .. } => "User logout",
            AuditEvent::TokenRefresh { .. } => "Token refresh",
            AuditEvent::RegistrationSuccess { .. } => "Registration successful",
            AuditEvent::RegistrationFailure { .. } => "Registration failed",
            AuditEvent::PasswordChange { .. } => "Password changed",
            AuditEvent::PasswordResetRequested { .. } => "Password reset requested",
            AuditEvent::PasswordReset { .. } => "Password reset",
            AuditEvent::AccessDenied { .. } => "Access denied",
            AuditEvent::InvalidToken { .. } => "Invalid token",
            AuditEvent::AccountStatusChanged { .. } => "Account status changed",
            AuditEvent::AdminBootstrapped { .. } => "Admin account bootstrapped",
        }
    }

    /// User the event is about, when known
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            AuditEvent::LoginSuccess { user_id, .. }
            | AuditEvent::Logout { user_id }
            | AuditEvent::TokenRefresh { user_id, .. }
            | AuditEvent::RegistrationSuccess { user_id, .. }
            | AuditEvent::PasswordChange { user_id }
            | AuditEvent::PasswordResetRequested { user_id, .. }
            | AuditEvent::PasswordReset { user_id }
            | AuditEvent::AccountStatusChanged { user_id, .. }
            | AuditEvent::AdminBootstrapped { user_id, .. } => Some(*user_id),
            AuditEvent::AccessDenied { user_id, .. } => *user_id,
            AuditEvent::LoginFailure { .. }
            | AuditEvent::RegistrationFailure { .. }
            | AuditEvent::InvalidToken { .. } => None,
        }
    }
}

/// Log a security audit event with structured fields
///
/// Example output (JSON formatter):
///
/// ```json
/// {
///   "target": "audit",
///   "timestamp": "2026-01-12T10:30:00Z",
///   "event": "{\"event_type\":\"login_success\",\"user_id\":\"550e8400-...\",\"email\":\"user@example.com\"}",
///   "message": "Login successful"
/// }
/// ```
pub fn audit_log(event: &AuditEvent) {
    let timestamp = Utc::now();

    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));

    match event.user_id() {
        Some(user_id) => info!(
            target: "audit",
            timestamp = %timestamp,
            event = %event_json,
            user_id = %user_id,
            "{}",
            event.describe()
        ),
        None => info!(
            target: "audit",
            timestamp = %timestamp,
            event = %event_json,
            "{}",
            event.describe()
        ),
    }
}
