//! PostgreSQL user store
//!
//! Users live in a single `users` table. Soft-deleted rows (`deleted_at`
//! set) are invisible to every query and do not hold their email.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use uuid::Uuid;

use super::{
    ensure_password_hash, StoreError, StoreResult, TokenDigest, TokenOwner, UserStore,
};
use crate::{NewUser, Role, User};

/// Idempotent schema statements, executed in order by [`PgUserStore::ensure_schema`]
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        email TEXT NOT NULL,
        password_hash TEXT NOT NULL CHECK (password_hash <> ''),
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        role TEXT NOT NULL CHECK (role IN ('admin', 'user', 'moderator')),
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        refresh_token_digest TEXT,
        refresh_token_expires_at TIMESTAMPTZ,
        reset_token_digest TEXT,
        reset_token_expires_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        deleted_at TIMESTAMPTZ
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email ON users (email) WHERE deleted_at IS NULL",
    "CREATE INDEX IF NOT EXISTS idx_users_deleted_at ON users (deleted_at)",
    "CREATE INDEX IF NOT EXISTS idx_users_refresh_token ON users (refresh_token_digest)",
    "CREATE INDEX IF NOT EXISTS idx_users_reset_token ON users (reset_token_digest)",
];

const USER_COLUMNS: &str =
    "id, email, first_name, last_name, role, is_active, created_at, updated_at";

/// PostgreSQL user store
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    /// Create a new store connection
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Database(format!("PostgreSQL connection failed: {e}")))?;

        Ok(Self { pool })
    }

    /// Create the users table and its indexes if they do not exist
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        tracing::info!("users schema ready");
        Ok(())
    }

    async fn fetch_token_owner(&self, column: &str, digest: &str) -> StoreResult<TokenOwner> {
        let sql = format!(
            "SELECT {USER_COLUMNS}, {column}_expires_at AS expires_at FROM users \
             WHERE {column}_digest = $1 AND deleted_at IS NULL"
        );
        let row: Option<TokenOwnerRow> = sqlx::query_as(&sql)
            .bind(digest)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("fetch_token_owner", e))?;

        token_owner(column, row)
    }

    /// Clear a token digest and return its owner in one statement
    ///
    /// The row lock taken by `FOR UPDATE` makes a concurrent take of the same
    /// digest re-check the predicate and find nothing.
    async fn take_token_owner(&self, column: &str, digest: &str) -> StoreResult<TokenOwner> {
        let sql = format!(
            "UPDATE users SET {column}_digest = NULL, {column}_expires_at = NULL \
             FROM (SELECT id AS taken_id, {column}_expires_at AS taken_expires_at FROM users \
                   WHERE {column}_digest = $1 AND deleted_at IS NULL FOR UPDATE) AS taken \
             WHERE users.id = taken.taken_id \
             RETURNING {USER_COLUMNS}, taken.taken_expires_at AS expires_at"
        );
        let row: Option<TokenOwnerRow> = sqlx::query_as(&sql)
            .bind(digest)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("take_token_owner", e))?;

        token_owner(column, row)
    }

    async fn execute_for_user(
        &self,
        operation: &str,
        query: sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments>,
    ) -> StoreResult<()> {
        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

/// User row from database
#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    first_name: String,
    last_name: String,
    role: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role: Role = row
            .role
            .parse()
            .map_err(|e: crate::UnknownRole| StoreError::Invalid(e.to_string()))?;

        Ok(User {
            id: row.id,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            role,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// User row joined with one of its token expiries
#[derive(Debug, FromRow)]
struct TokenOwnerRow {
    #[sqlx(flatten)]
    user: UserRow,
    expires_at: Option<DateTime<Utc>>,
}

fn token_owner(column: &str, row: Option<TokenOwnerRow>) -> StoreResult<TokenOwner> {
    let row = row.ok_or(StoreError::NotFound)?;
    let expires_at = row
        .expires_at
        .ok_or_else(|| StoreError::Invalid(format!("{column} without expiry")))?;

    Ok(TokenOwner {
        user: User::try_from(row.user)?,
        expires_at,
    })
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, user: NewUser, password_hash: &str) -> StoreResult<User> {
        ensure_password_hash(password_hash)?;

        let row: UserRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO users (id, email, password_hash, first_name, last_name, role, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_user", e))?;

        User::try_from(row)
    }

    async fn get_by_email(&self, email: &str) -> StoreResult<User> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND deleted_at IS NULL"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_user_by_email", e))?;

        row.ok_or(StoreError::NotFound).and_then(User::try_from)
    }

    async fn get_by_id(&self, id: Uuid) -> StoreResult<User> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_user_by_id", e))?;

        row.ok_or(StoreError::NotFound).and_then(User::try_from)
    }

    async fn update(&self, user: &User) -> StoreResult<()> {
        let query = sqlx::query(
            r#"
            UPDATE users SET
                email = $2,
                first_name = $3,
                last_name = $4,
                role = $5,
                is_active = $6,
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.role.as_str())
        .bind(user.is_active);

        self.execute_for_user("update_user", query).await
    }

    async fn get_password_hash(&self, id: Uuid) -> StoreResult<String> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT password_hash FROM users WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_password_hash", e))?;

        row.map(|(hash,)| hash).ok_or(StoreError::NotFound)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> StoreResult<()> {
        ensure_password_hash(password_hash)?;

        let query = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(password_hash);

        self.execute_for_user("update_password", query).await
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<TokenDigest>) -> StoreResult<()> {
        let (digest, expires_at) = match token {
            Some(token) => (Some(token.digest), Some(token.expires_at)),
            None => (None, None),
        };

        let query = sqlx::query(
            "UPDATE users SET refresh_token_digest = $2, refresh_token_expires_at = $3 \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(digest)
        .bind(expires_at);

        self.execute_for_user("set_refresh_token", query).await
    }

    async fn take_refresh_token(&self, digest: &str) -> StoreResult<TokenOwner> {
        self.take_token_owner("refresh_token", digest).await
    }

    async fn set_reset_token(&self, id: Uuid, token: TokenDigest) -> StoreResult<()> {
        let query = sqlx::query(
            "UPDATE users SET reset_token_digest = $2, reset_token_expires_at = $3 \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(token.digest)
        .bind(token.expires_at);

        self.execute_for_user("set_reset_token", query).await
    }

    async fn get_by_reset_token(&self, digest: &str) -> StoreResult<TokenOwner> {
        self.fetch_token_owner("reset_token", digest).await
    }

    async fn take_reset_token(&self, digest: &str) -> StoreResult<TokenOwner> {
        self.take_token_owner("reset_token", digest).await
    }

    async fn clear_reset_token(&self, id: Uuid) -> StoreResult<()> {
        let query = sqlx::query(
            "UPDATE users SET reset_token_digest = NULL, reset_token_expires_at = NULL \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id);

        self.execute_for_user("clear_reset_token", query).await
    }

    async fn count_by_role(&self, role: Role) -> StoreResult<u64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM users WHERE role = $1 AND deleted_at IS NULL",
        )
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_by_role", e))?;

        Ok(count.max(0) as u64)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ping", e))?;
        Ok(())
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    if is_unique_violation(&err) {
        return StoreError::DuplicateEmail;
    }
    StoreError::Database(format!("{operation} failed: {err}"))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}
