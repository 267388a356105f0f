//! Emporium Core - Domain models, store port, and shared configuration
//!
//! This crate defines the abstractions the authentication API is built on:
//! - User accounts and the closed role set
//! - The `UserStore` port with in-memory and PostgreSQL adapters
//! - Configuration management

pub mod config;
pub mod store;

pub use config::{
    AdminConfig, AppConfig, ConfigError, DatabaseConfig, Environment, LoggingConfig,
    SecurityConfig, ServerConfig,
};
pub use store::{
    InMemoryUserStore, PgUserStore, StoreError, StoreResult, TokenDigest, TokenOwner, UserStore,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// ============================================================================
// Roles
// ============================================================================

/// User role
///
/// Closed set used both as an account attribute and as the operand of
/// route-level authorization checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
    Moderator,
}

impl Role {
    /// Every role, in declaration order
    pub const ALL: [Role; 3] = [Role::Admin, Role::User, Role::Moderator];

    /// Wire representation of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Moderator => "moderator",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a known role
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

impl std::str::FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            "moderator" => Ok(Role::Moderator),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

// ============================================================================
// Users
// ============================================================================

/// User account
///
/// The password hash is deliberately not part of this type; it stays inside
/// the store and is only reachable through `UserStore::get_password_hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    /// Normalized (trimmed, lowercase) email address
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for inserting a new user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_active: bool,
}

impl NewUser {
    /// Create an active account payload; the email is normalized here
    pub fn new(
        email: impl AsRef<str>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            email: normalize_email(email.as_ref()),
            first_name: first_name.into(),
            last_name: last_name.into(),
            role,
            is_active: true,
        }
    }
}

/// Normalize an email address for storage and lookup.
///
/// Emails are compared case-insensitively: surrounding whitespace is
/// removed and the whole address is lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
