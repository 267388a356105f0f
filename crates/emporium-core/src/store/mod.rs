//! User store port
//!
//! The authentication service only talks to persistence through the
//! [`UserStore`] trait. Two adapters ship with the crate:
//! - [`InMemoryUserStore`] for tests and database-less development
//! - [`PgUserStore`] backed by PostgreSQL via SQLx

mod memory;
mod postgres;

pub use memory::InMemoryUserStore;
pub use postgres::PgUserStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::{NewUser, Role, User};

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("User not found")]
    NotFound,

    #[error("Email already exists")]
    DuplicateEmail,

    #[error("Invalid record: {0}")]
    Invalid(String),

    #[error("Database error: {0}")]
    Database(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Digest of an opaque token together with its expiry
///
/// Stores never see raw refresh or reset tokens, only their digests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDigest {
    pub digest: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenDigest {
    pub fn new(digest: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            digest: digest.into(),
            expires_at,
        }
    }
}

/// User that owns a stored token, with the token's expiry
#[derive(Debug, Clone)]
pub struct TokenOwner {
    pub user: User,
    pub expires_at: DateTime<Utc>,
}

impl TokenOwner {
    /// Check whether the token has expired at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Persistence contract for user accounts
///
/// Implementations must reject duplicate emails (including concurrent
/// creates racing on the same address) with [`StoreError::DuplicateEmail`]
/// and must make every single-record write atomic. Emails handed to the
/// store are already normalized.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user with its password hash
    async fn create(&self, user: NewUser, password_hash: &str) -> StoreResult<User>;

    /// Fetch a user by (normalized) email
    async fn get_by_email(&self, email: &str) -> StoreResult<User>;

    /// Fetch a user by ID
    async fn get_by_id(&self, id: Uuid) -> StoreResult<User>;

    /// Persist profile fields, role and active flag of an existing user
    async fn update(&self, user: &User) -> StoreResult<()>;

    /// Read the stored password hash
    async fn get_password_hash(&self, id: Uuid) -> StoreResult<String>;

    /// Replace the stored password hash
    async fn update_password(&self, id: Uuid, password_hash: &str) -> StoreResult<()>;

    /// Replace (or clear with `None`) the user's single active refresh token
    async fn set_refresh_token(&self, id: Uuid, token: Option<TokenDigest>) -> StoreResult<()>;

    /// Atomically find and clear a refresh token digest, returning its owner
    ///
    /// Of several concurrent calls with the same digest at most one succeeds;
    /// the rest get [`StoreError::NotFound`].
    async fn take_refresh_token(&self, digest: &str) -> StoreResult<TokenOwner>;

    /// Store a password reset token digest, replacing any previous one
    async fn set_reset_token(&self, id: Uuid, token: TokenDigest) -> StoreResult<()>;

    /// Find the owner of a reset token digest without consuming it
    async fn get_by_reset_token(&self, digest: &str) -> StoreResult<TokenOwner>;

    /// Atomically find and clear a reset token digest, returning its owner
    ///
    /// Same single-winner guarantee as [`UserStore::take_refresh_token`].
    async fn take_reset_token(&self, digest: &str) -> StoreResult<TokenOwner>;

    /// Remove the user's reset token
    async fn clear_reset_token(&self, id: Uuid) -> StoreResult<()>;

    /// Count users holding a role
    async fn count_by_role(&self, role: Role) -> StoreResult<u64>;

    /// Connectivity check used by the readiness probe
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Reject password hashes that must never be persisted
pub(crate) fn ensure_password_hash(password_hash: &str) -> StoreResult<()> {
    if password_hash.trim().is_empty() {
        return Err(StoreError::Invalid(
            "password hash must not be empty".to_string(),
        ));
    }
    Ok(())
}
