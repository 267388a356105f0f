use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{
    ensure_password_hash, StoreError, StoreResult, TokenDigest, TokenOwner, UserStore,
};
use crate::{NewUser, Role, User};

#[derive(Debug, Clone)]
struct StoredUser {
    user: User,
    password_hash: String,
    refresh_token: Option<TokenDigest>,
    reset_token: Option<TokenDigest>,
}

/// In-memory user store.
///
/// Intended for tests/dev. Uniqueness is checked and the row inserted under
/// the same write lock, so racing creates of one email cannot both succeed.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<Uuid, StoredUser>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users
    pub fn len(&self) -> usize {
        self.users.read().map(|users| users.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(
        &self,
    ) -> StoreResult<std::sync::RwLockReadGuard<'_, HashMap<Uuid, StoredUser>>> {
        self.users
            .read()
            .map_err(|_| StoreError::Database("lock poisoned".to_string()))
    }

    fn write(
        &self,
    ) -> StoreResult<std::sync::RwLockWriteGuard<'_, HashMap<Uuid, StoredUser>>> {
        self.users
            .write()
            .map_err(|_| StoreError::Database("lock poisoned".to_string()))
    }

    /// Find the row holding `digest` in the chosen token slot and clear it
    /// under one write lock
    fn take_token(
        &self,
        digest: &str,
        slot: fn(&mut StoredUser) -> &mut Option<TokenDigest>,
    ) -> StoreResult<TokenOwner> {
        let mut users = self.write()?;
        users
            .values_mut()
            .find_map(|row| {
                let token = slot(row);
                if token.as_ref()?.digest != digest {
                    return None;
                }
                let taken = token.take()?;
                Some(TokenOwner {
                    user: row.user.clone(),
                    expires_at: taken.expires_at,
                })
            })
            .ok_or(StoreError::NotFound)
    }

    fn with_row<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut StoredUser) -> T,
    ) -> StoreResult<T> {
        let mut users = self.write()?;
        let row = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        Ok(f(row))
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create(&self, user: NewUser, password_hash: &str) -> StoreResult<User> {
        ensure_password_hash(password_hash)?;

        let mut users = self.write()?;
        if users.values().any(|row| row.user.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }

        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
            is_active: user.is_active,
            created_at: now,
            updated_at: now,
        };

        users.insert(
            created.id,
            StoredUser {
                user: created.clone(),
                password_hash: password_hash.to_string(),
                refresh_token: None,
                reset_token: None,
            },
        );

        Ok(created)
    }

    async fn get_by_email(&self, email: &str) -> StoreResult<User> {
        self.read()?
            .values()
            .find(|row| row.user.email == email)
            .map(|row| row.user.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_id(&self, id: Uuid) -> StoreResult<User> {
        self.read()?
            .get(&id)
            .map(|row| row.user.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn update(&self, user: &User) -> StoreResult<()> {
        let mut users = self.write()?;
        if users
            .values()
            .any(|row| row.user.id != user.id && row.user.email == user.email)
        {
            return Err(StoreError::DuplicateEmail);
        }

        let row = users.get_mut(&user.id).ok_or(StoreError::NotFound)?;
        row.user = User {
            created_at: row.user.created_at,
            updated_at: Utc::now(),
            ..user.clone()
        };
        Ok(())
    }

    async fn get_password_hash(&self, id: Uuid) -> StoreResult<String> {
        self.read()?
            .get(&id)
            .map(|row| row.password_hash.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> StoreResult<()> {
        ensure_password_hash(password_hash)?;
        self.with_row(id, |row| {
            row.password_hash = password_hash.to_string();
            row.user.updated_at = Utc::now();
        })
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<TokenDigest>) -> StoreResult<()> {
        self.with_row(id, |row| row.refresh_token = token)
    }

    async fn take_refresh_token(&self, digest: &str) -> StoreResult<TokenOwner> {
        self.take_token(digest, |row| &mut row.refresh_token)
    }

    async fn set_reset_token(&self, id: Uuid, token: TokenDigest) -> StoreResult<()> {
        self.with_row(id, |row| row.reset_token = Some(token))
    }

    async fn get_by_reset_token(&self, digest: &str) -> StoreResult<TokenOwner> {
        self.read()?
            .values()
            .find_map(|row| {
                row.reset_token
                    .as_ref()
                    .filter(|token| token.digest == digest)
                    .map(|token| TokenOwner {
                        user: row.user.clone(),
                        expires_at: token.expires_at,
                    })
            })
            .ok_or(StoreError::NotFound)
    }

    async fn take_reset_token(&self, digest: &str) -> StoreResult<TokenOwner> {
        self.take_token(digest, |row| &mut row.reset_token)
    }

    async fn clear_reset_token(&self, id: Uuid) -> StoreResult<()> {
        self.with_row(id, |row| row.reset_token = None)
    }

    async fn count_by_role(&self, role: Role) -> StoreResult<u64> {
        Ok(self
            .read()?
            .values()
            .filter(|row| row.user.role == role)
            .count() as u64)
    }
}
