//! Authentication service layer
//!
//! Business logic for registration, login, session refresh, profile and
//! password management. Persistence goes through the [`UserStore`] port;
//! this layer never sees SQL.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use emporium_core::{
    normalize_email, AdminConfig, AppConfig, NewUser, Role, StoreError, TokenDigest, User,
    UserStore,
};
use tokio::sync::OnceCell;
use uuid::Uuid;

use super::jwt::{digest_token, generate_access_token, generate_opaque_token, JwtConfig};
use super::models::{
    AdminRegisterRequest, AuthResponse, ChangePasswordRequest, ForgotPasswordRequest,
    LoginRequest, PasswordResetTicket, RefreshRequest, RegisterRequest, ResetPasswordRequest,
    UpdateProfileRequest,
};
use super::password::{validate_password_strength, PasswordConfig, PasswordHasherPool};
use super::validation::{FieldError, Validate};
use crate::audit::{audit_log, AuditEvent};
use crate::error::AppError;

/// Password hashed once and verified against when a login names an unknown
/// email, so both failure paths cost one verification.
const DUMMY_PASSWORD: &str = "emporium-dummy-Passw0rd!";

/// Authentication service settings
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
    /// Refresh token lifetime in days (default: 7)
    pub refresh_ttl_days: u32,
    /// Reset token lifetime in minutes (default: 30)
    pub reset_ttl_mins: u32,
    /// Concurrent hash operations (0 = available parallelism)
    pub hash_concurrency: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt: JwtConfig::default(),
            password: PasswordConfig::default(),
            refresh_ttl_days: 7,
            reset_ttl_mins: 30,
            hash_concurrency: 0,
        }
    }
}

impl AuthConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            jwt: JwtConfig::from_security(&config.security),
            password: PasswordConfig::default(),
            refresh_ttl_days: config.security.refresh_token_ttl_days,
            reset_ttl_mins: config.security.reset_token_ttl_mins,
            hash_concurrency: config.security.hash_concurrency,
        }
    }

    fn refresh_expiry(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, AppError> {
        Duration::try_days(i64::from(self.refresh_ttl_days))
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "Refresh token lifetime out of range: {} days",
                    self.refresh_ttl_days
                ))
            })
    }

    fn reset_expiry(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, AppError> {
        Duration::try_minutes(i64::from(self.reset_ttl_mins))
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "Reset token lifetime out of range: {} minutes",
                    self.reset_ttl_mins
                ))
            })
    }
}

/// Authentication service
pub struct AuthService {
    store: Arc<dyn UserStore>,
    config: AuthConfig,
    hasher: PasswordHasherPool,
    dummy_hash: OnceCell<String>,
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(store: Arc<dyn UserStore>, config: AuthConfig) -> Self {
        let hasher = PasswordHasherPool::new(config.password.clone(), config.hash_concurrency);
        Self {
            store,
            config,
            hasher,
            dummy_hash: OnceCell::new(),
        }
    }

    pub fn jwt_config(&self) -> &JwtConfig {
        &self.config.jwt
    }

    pub fn store(&self) -> &Arc<dyn UserStore> {
        &self.store
    }

    /// Register a new user with the `user` role
    pub async fn register(&self, request: RegisterRequest) -> Result<User, AppError> {
        request.ensure_valid()?;

        let new_user = NewUser::new(
            &request.email,
            request.first_name.trim(),
            request.last_name.trim(),
            Role::User,
        );
        let user = self.create_account(new_user, &request.password).await?;

        audit_log(&AuditEvent::RegistrationSuccess {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role.to_string(),
            created_by_admin: false,
        });
        Ok(user)
    }

    /// Register a user with a caller-chosen role
    ///
    /// The caller's admin privilege is checked by the route's role gate.
    pub async fn admin_register(&self, request: AdminRegisterRequest) -> Result<User, AppError> {
        request.ensure_valid()?;
        let role = request.parsed_role().ok_or_else(|| {
            AppError::Validation(vec![FieldError::new(
                "role",
                "must be one of: admin, user, moderator",
            )])
        })?;

        let new_user = NewUser::new(
            &request.email,
            request.first_name.trim(),
            request.last_name.trim(),
            role,
        );
        let user = self.create_account(new_user, &request.password).await?;

        audit_log(&AuditEvent::RegistrationSuccess {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role.to_string(),
            created_by_admin: true,
        });
        Ok(user)
    }

    /// Login with email and password
    ///
    /// Unknown email and wrong password fail identically. The active flag is
    /// only consulted once the password matched.
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AppError> {
        request.ensure_valid()?;
        let email = normalize_email(&request.email);

        let user = match self.store.get_by_email(&email).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => {
                let dummy = self.dummy_hash().await?;
                self.verify(&request.password, dummy).await?;
                audit_log(&AuditEvent::LoginFailure {
                    email,
                    reason: "unknown email".to_string(),
                });
                return Err(AppError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        let password_hash = self.store.get_password_hash(user.id).await?;
        if !self.verify(&request.password, &password_hash).await? {
            audit_log(&AuditEvent::LoginFailure {
                email,
                reason: "wrong password".to_string(),
            });
            return Err(AppError::InvalidCredentials);
        }

        if !user.is_active {
            audit_log(&AuditEvent::LoginFailure {
                email,
                reason: "account inactive".to_string(),
            });
            return Err(AppError::AccountInactive);
        }

        let response = self.start_session(user).await?;
        audit_log(&AuditEvent::LoginSuccess {
            user_id: response.user.id,
            email: response.user.email.clone(),
        });
        Ok(response)
    }

    /// Exchange a refresh token for a new session, rotating the refresh token
    pub async fn refresh(&self, request: RefreshRequest) -> Result<AuthResponse, AppError> {
        request.ensure_valid()?;

        // Consumed up front: a replayed token loses to whichever request took it
        let owner = match self
            .store
            .take_refresh_token(&digest_token(&request.refresh_token))
            .await
        {
            Ok(owner) => owner,
            Err(StoreError::NotFound) => return Err(AppError::Unauthorized),
            Err(e) => return Err(e.into()),
        };

        if owner.is_expired_at(Utc::now()) {
            return Err(AppError::Unauthorized);
        }
        if !owner.user.is_active {
            return Err(AppError::AccountInactive);
        }

        let response = self.start_session(owner.user).await?;
        audit_log(&AuditEvent::TokenRefresh {
            user_id: response.user.id,
            email: response.user.email.clone(),
        });
        Ok(response)
    }

    /// Revoke the user's refresh token
    ///
    /// Access tokens already issued stay valid until they expire.
    pub async fn logout(&self, user_id: Uuid) -> Result<(), AppError> {
        self.store.set_refresh_token(user_id, None).await?;
        audit_log(&AuditEvent::Logout { user_id });
        Ok(())
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<User, AppError> {
        Ok(self.store.get_by_id(user_id).await?)
    }

    /// Update first and/or last name
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        request: UpdateProfileRequest,
    ) -> Result<User, AppError> {
        request.ensure_valid()?;

        let mut user = self.store.get_by_id(user_id).await?;
        if let Some(first_name) = request.first_name {
            user.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = request.last_name {
            user.last_name = last_name.trim().to_string();
        }

        self.store.update(&user).await?;
        Ok(self.store.get_by_id(user_id).await?)
    }

    /// Change the password after verifying the current one
    ///
    /// Signs the user out of refresh-token sessions.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        request: ChangePasswordRequest,
    ) -> Result<(), AppError> {
        request.ensure_valid()?;

        let current_hash = self.store.get_password_hash(user_id).await?;
        if !self.verify(&request.old_password, &current_hash).await? {
            return Err(AppError::Validation(vec![FieldError::new(
                "old_password",
                "is incorrect",
            )]));
        }

        let new_hash = self.hash_new_password(&request.new_password).await?;
        self.store.update_password(user_id, &new_hash).await?;
        self.store.set_refresh_token(user_id, None).await?;

        audit_log(&AuditEvent::PasswordChange { user_id });
        Ok(())
    }

    /// Issue a reset token for an active account
    ///
    /// Returns `None` for unknown or inactive emails; callers must answer
    /// identically either way.
    pub async fn forgot_password(
        &self,
        request: ForgotPasswordRequest,
    ) -> Result<Option<PasswordResetTicket>, AppError> {
        request.ensure_valid()?;
        let email = normalize_email(&request.email);

        let user = match self.store.get_by_email(&email).await {
            Ok(user) if user.is_active => user,
            Ok(_) | Err(StoreError::NotFound) => {
                tracing::debug!("Password reset requested for unknown or inactive account");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let token = generate_opaque_token();
        let expires_at = self.config.reset_expiry(Utc::now())?;
        self.store
            .set_reset_token(user.id, TokenDigest::new(digest_token(&token), expires_at))
            .await?;

        Ok(Some(PasswordResetTicket {
            user,
            token,
            expires_at,
        }))
    }

    /// Replace the password using a reset token; the token is consumed
    pub async fn reset_password(&self, request: ResetPasswordRequest) -> Result<(), AppError> {
        request.ensure_valid()?;

        let digest = digest_token(&request.token);
        let owner = match self.store.get_by_reset_token(&digest).await {
            Ok(owner) => owner,
            Err(StoreError::NotFound) => return Err(AppError::InvalidResetToken),
            Err(e) => return Err(e.into()),
        };

        if owner.is_expired_at(Utc::now()) {
            self.store.clear_reset_token(owner.user.id).await?;
            return Err(AppError::InvalidResetToken);
        }

        // A weak password leaves the token usable; only the take below spends it
        let new_hash = self.hash_new_password(&request.new_password).await?;

        let owner = match self.store.take_reset_token(&digest).await {
            Ok(owner) if !owner.is_expired_at(Utc::now()) => owner,
            Ok(_) | Err(StoreError::NotFound) => return Err(AppError::InvalidResetToken),
            Err(e) => return Err(e.into()),
        };

        let user_id = owner.user.id;
        self.store.update_password(user_id, &new_hash).await?;
        self.store.set_refresh_token(user_id, None).await?;

        audit_log(&AuditEvent::PasswordReset { user_id });
        Ok(())
    }

    /// Activate or deactivate an account
    pub async fn set_active(&self, user_id: Uuid, is_active: bool) -> Result<User, AppError> {
        let mut user = self.store.get_by_id(user_id).await?;
        user.is_active = is_active;
        self.store.update(&user).await?;

        if !is_active {
            self.store.set_refresh_token(user_id, None).await?;
        }

        audit_log(&AuditEvent::AccountStatusChanged { user_id, is_active });
        Ok(self.store.get_by_id(user_id).await?)
    }

    /// Create the initial administrator if none exists
    ///
    /// Skips (returning `None`) when an admin already exists, when the
    /// bootstrap settings are incomplete, or when the configured password
    /// fails the strength policy.
    pub async fn bootstrap_admin(&self, admin: &AdminConfig) -> Result<Option<User>, AppError> {
        if self.store.count_by_role(Role::Admin).await? > 0 {
            tracing::info!("Admin user already exists, skipping bootstrap");
            return Ok(None);
        }

        let (Some(email), Some(password), Some(first_name), Some(last_name)) = (
            admin.email.as_deref(),
            admin.password.as_deref(),
            admin.first_name.as_deref(),
            admin.last_name.as_deref(),
        ) else {
            tracing::warn!(
                "Admin bootstrap skipped: set ADMIN_EMAIL, ADMIN_PASSWORD, ADMIN_FIRST_NAME and ADMIN_LAST_NAME"
            );
            return Ok(None);
        };

        if let Err(reason) = validate_password_strength(password) {
            tracing::warn!(%reason, "Admin bootstrap skipped: password rejected by policy");
            return Ok(None);
        }

        let hash = self.hasher.hash(password).await.map_err(|e| {
            AppError::Internal(format!("Failed to hash admin password: {e}"))
        })?;
        let user = self
            .store
            .create(NewUser::new(email, first_name, last_name, Role::Admin), &hash)
            .await?;

        tracing::info!(user_id = %user.id, email = %user.email, "Admin user created");
        audit_log(&AuditEvent::AdminBootstrapped {
            user_id: user.id,
            email: user.email.clone(),
        });
        Ok(Some(user))
    }

    async fn create_account(&self, new_user: NewUser, password: &str) -> Result<User, AppError> {
        match self.store.get_by_email(&new_user.email).await {
            Ok(_) => {
                audit_log(&AuditEvent::RegistrationFailure {
                    email: new_user.email,
                    reason: "duplicate email".to_string(),
                });
                return Err(AppError::DuplicateEmail);
            }
            Err(StoreError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        let password_hash = self.hash_new_password(password).await?;

        // A concurrent registration can still win between the lookup and the insert
        let email = new_user.email.clone();
        self.store
            .create(new_user, &password_hash)
            .await
            .map_err(|e| {
                if matches!(e, StoreError::DuplicateEmail) {
                    audit_log(&AuditEvent::RegistrationFailure {
                        email,
                        reason: "duplicate email".to_string(),
                    });
                }
                AppError::from(e)
            })
    }

    /// Policy check then hash
    async fn hash_new_password(&self, password: &str) -> Result<String, AppError> {
        validate_password_strength(password)
            .map_err(|reason| AppError::WeakPassword(reason.to_string()))?;

        self.hasher
            .hash(password)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
    }

    async fn verify(&self, password: &str, hash: &str) -> Result<bool, AppError> {
        self.hasher
            .verify(password, hash)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to verify password: {e}")))
    }

    async fn dummy_hash(&self) -> Result<&str, AppError> {
        self.dummy_hash
            .get_or_try_init(|| async {
                self.hasher
                    .hash(DUMMY_PASSWORD)
                    .await
                    .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
            })
            .await
            .map(String::as_str)
    }

    /// Issue an access token and a fresh refresh token, replacing the old one
    async fn start_session(&self, user: User) -> Result<AuthResponse, AppError> {
        let token = generate_access_token(&self.config.jwt, user.id, &user.email, user.role)
            .map_err(|e| AppError::Internal(format!("Failed to generate access token: {e}")))?;

        let refresh_token = generate_opaque_token();
        let expires_at = self.config.refresh_expiry(Utc::now())?;
        self.store
            .set_refresh_token(
                user.id,
                Some(TokenDigest::new(digest_token(&refresh_token), expires_at)),
            )
            .await?;

        Ok(AuthResponse {
            token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.jwt.access_ttl_secs,
            user,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::validate_access_token;
    use async_trait::async_trait;
    use emporium_core::{InMemoryUserStore, StoreResult, TokenOwner};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PASSWORD: &str = "Valid1Pass!";

    fn test_config() -> AuthConfig {
        AuthConfig {
            jwt: JwtConfig {
                secret: "service-test-secret".to_string(),
                access_ttl_secs: 900,
                issuer: "emporium-test".to_string(),
            },
            password: PasswordConfig::light(),
            refresh_ttl_days: 7,
            reset_ttl_mins: 30,
            hash_concurrency: 2,
        }
    }

    fn service() -> (AuthService, Arc<InMemoryUserStore>) {
        let store = Arc::new(InMemoryUserStore::new());
        (AuthService::new(store.clone(), test_config()), store)
    }

    fn register_request(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
        }
    }

    fn login_request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    /// Store wrapper counting `create` calls
    struct CountingStore {
        inner: InMemoryUserStore,
        creates: AtomicUsize,
    }

    #[async_trait]
    impl UserStore for CountingStore {
        async fn create(&self, user: NewUser, password_hash: &str) -> StoreResult<User> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            self.inner.create(user, password_hash).await
        }
        async fn get_by_email(&self, email: &str) -> StoreResult<User> {
            self.inner.get_by_email(email).await
        }
        async fn get_by_id(&self, id: Uuid) -> StoreResult<User> {
            self.inner.get_by_id(id).await
        }
        async fn update(&self, user: &User) -> StoreResult<()> {
            self.inner.update(user).await
        }
        async fn get_password_hash(&self, id: Uuid) -> StoreResult<String> {
            self.inner.get_password_hash(id).await
        }
        async fn update_password(&self, id: Uuid, password_hash: &str) -> StoreResult<()> {
            self.inner.update_password(id, password_hash).await
        }
        async fn set_refresh_token(&self, id: Uuid, token: Option<TokenDigest>) -> StoreResult<()> {
            self.inner.set_refresh_token(id, token).await
        }
        async fn take_refresh_token(&self, digest: &str) -> StoreResult<TokenOwner> {
            self.inner.take_refresh_token(digest).await
        }
        async fn set_reset_token(&self, id: Uuid, token: TokenDigest) -> StoreResult<()> {
            self.inner.set_reset_token(id, token).await
        }
        async fn get_by_reset_token(&self, digest: &str) -> StoreResult<TokenOwner> {
            self.inner.get_by_reset_token(digest).await
        }
        async fn take_reset_token(&self, digest: &str) -> StoreResult<TokenOwner> {
            self.inner.take_reset_token(digest).await
        }
        async fn clear_reset_token(&self, id: Uuid) -> StoreResult<()> {
            self.inner.clear_reset_token(id).await
        }
        async fn count_by_role(&self, role: Role) -> StoreResult<u64> {
            self.inner.count_by_role(role).await
        }
    }

    #[tokio::test]
    async fn test_register_creates_user_role() {
        let (service, store) = service();

        let user = service
            .register(register_request("  Jane@Example.COM ", PASSWORD))
            .await
            .unwrap();

        assert_eq!(user.email, "jane@example.com");
        assert_eq!(user.role, Role::User);
        assert!(user.is_active);

        let hash = store.get_password_hash(user.id).await.unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert_ne!(hash, PASSWORD);
    }

    #[tokio::test]
    async fn test_register_duplicate_does_not_create() {
        let store = Arc::new(CountingStore {
            inner: InMemoryUserStore::new(),
            creates: AtomicUsize::new(0),
        });
        let service = AuthService::new(store.clone(), test_config());

        service
            .register(register_request("dup@example.com", PASSWORD))
            .await
            .unwrap();
        let result = service
            .register(register_request("DUP@example.com", PASSWORD))
            .await;

        assert!(matches!(result, Err(AppError::DuplicateEmail)));
        assert_eq!(store.creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_register_weak_password() {
        let (service, store) = service();

        let result = service
            .register(register_request("weak@example.com", "alllowercase1!"))
            .await;

        match result {
            Err(AppError::WeakPassword(reason)) => assert!(reason.contains("uppercase")),
            other => panic!("expected weak password, got {other:?}"),
        }
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_register_validation() {
        let (service, _) = service();
        let result = service.register(register_request("nope", PASSWORD)).await;
        assert!(matches!(result, Err(AppError::Validation(errors)) if errors[0].field == "email"));
    }

    #[tokio::test]
    async fn test_concurrent_registration_single_winner() {
        let (service, store) = service();
        let service = Arc::new(service);

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move {
                    service
                        .register(register_request("race@example.com", PASSWORD))
                        .await
                })
            })
            .collect();

        let mut created = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => created += 1,
                Err(AppError::DuplicateEmail) => {}
                Err(e) => panic!("unexpected error: {e:?}"),
            }
        }

        assert_eq!(created, 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_admin_register_with_role() {
        let (service, _) = service();

        let user = service
            .admin_register(AdminRegisterRequest {
                email: "mod@example.com".to_string(),
                password: PASSWORD.to_string(),
                first_name: "Mo".to_string(),
                last_name: "Derator".to_string(),
                role: "moderator".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(user.role, Role::Moderator);

        let result = service
            .admin_register(AdminRegisterRequest {
                email: "root@example.com".to_string(),
                password: PASSWORD.to_string(),
                first_name: "Root".to_string(),
                last_name: "User".to_string(),
                role: "superuser".to_string(),
            })
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_login_success() {
        let (service, _) = service();
        let user = service
            .register(register_request("login@example.com", PASSWORD))
            .await
            .unwrap();

        let response = service
            .login(login_request("LOGIN@example.com", PASSWORD))
            .await
            .unwrap();

        assert_eq!(response.user.id, user.id);
        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.expires_in, 900);

        let claims = validate_access_token(service.jwt_config(), &response.token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, Role::User);
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let (service, _) = service();
        service
            .register(register_request("known@example.com", PASSWORD))
            .await
            .unwrap();

        let unknown = service
            .login(login_request("unknown@example.com", PASSWORD))
            .await
            .unwrap_err();
        let wrong = service
            .login(login_request("known@example.com", "Wrong1Pass!"))
            .await
            .unwrap_err();

        assert!(matches!(unknown, AppError::InvalidCredentials));
        assert!(matches!(wrong, AppError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn test_login_inactive_account() {
        let (service, _) = service();
        let user = service
            .register(register_request("inactive@example.com", PASSWORD))
            .await
            .unwrap();
        service.set_active(user.id, false).await.unwrap();

        let result = service
            .login(login_request("inactive@example.com", PASSWORD))
            .await;
        assert!(matches!(result, Err(AppError::AccountInactive)));

        // Wrong password on an inactive account does not reveal its status
        let result = service
            .login(login_request("inactive@example.com", "Wrong1Pass!"))
            .await;
        assert!(matches!(result, Err(AppError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_refresh_rotates_token() {
        let (service, _) = service();
        service
            .register(register_request("refresh@example.com", PASSWORD))
            .await
            .unwrap();
        let first = service
            .login(login_request("refresh@example.com", PASSWORD))
            .await
            .unwrap();

        let second = service
            .refresh(RefreshRequest {
                refresh_token: first.refresh_token.clone(),
            })
            .await
            .unwrap();
        assert_ne!(first.refresh_token, second.refresh_token);

        let reused = service
            .refresh(RefreshRequest {
                refresh_token: first.refresh_token,
            })
            .await;
        assert!(matches!(reused, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_refresh_expired_token() {
        let (service, store) = service();
        let user = service
            .register(register_request("stale@example.com", PASSWORD))
            .await
            .unwrap();

        let token = generate_opaque_token();
        store
            .set_refresh_token(
                user.id,
                Some(TokenDigest::new(
                    digest_token(&token),
                    Utc::now() - Duration::seconds(1),
                )),
            )
            .await
            .unwrap();

        let result = service
            .refresh(RefreshRequest {
                refresh_token: token,
            })
            .await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_logout_revokes_refresh_token() {
        let (service, _) = service();
        service
            .register(register_request("logout@example.com", PASSWORD))
            .await
            .unwrap();
        let session = service
            .login(login_request("logout@example.com", PASSWORD))
            .await
            .unwrap();

        service.logout(session.user.id).await.unwrap();

        let result = service
            .refresh(RefreshRequest {
                refresh_token: session.refresh_token,
            })
            .await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_profile_read_and_update() {
        let (service, _) = service();
        let user = service
            .register(register_request("profile@example.com", PASSWORD))
            .await
            .unwrap();

        let updated = service
            .update_profile(
                user.id,
                UpdateProfileRequest {
                    first_name: Some(" Janet ".to_string()),
                    last_name: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.first_name, "Janet");
        assert_eq!(updated.last_name, "Doe");

        assert_eq!(service.get_profile(user.id).await.unwrap(), updated);
        assert!(matches!(
            service.get_profile(Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_change_password() {
        let (service, _) = service();
        let user = service
            .register(register_request("change@example.com", PASSWORD))
            .await
            .unwrap();

        let wrong_old = service
            .change_password(
                user.id,
                ChangePasswordRequest {
                    old_password: "Wrong1Pass!".to_string(),
                    new_password: "Newer1Pass!".to_string(),
                },
            )
            .await;
        assert!(
            matches!(wrong_old, Err(AppError::Validation(errors)) if errors[0].field == "old_password")
        );

        let weak_new = service
            .change_password(
                user.id,
                ChangePasswordRequest {
                    old_password: PASSWORD.to_string(),
                    new_password: "weak".to_string(),
                },
            )
            .await;
        assert!(matches!(weak_new, Err(AppError::WeakPassword(_))));

        service
            .change_password(
                user.id,
                ChangePasswordRequest {
                    old_password: PASSWORD.to_string(),
                    new_password: "Newer1Pass!".to_string(),
                },
            )
            .await
            .unwrap();

        assert!(service
            .login(login_request("change@example.com", PASSWORD))
            .await
            .is_err());
        assert!(service
            .login(login_request("change@example.com", "Newer1Pass!"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_forgot_password_unknown_email() {
        let (service, _) = service();
        let ticket = service
            .forgot_password(ForgotPasswordRequest {
                email: "ghost@example.com".to_string(),
            })
            .await
            .unwrap();
        assert!(ticket.is_none());
    }

    #[tokio::test]
    async fn test_reset_password_single_use() {
        let (service, _) = service();
        service
            .register(register_request("reset@example.com", PASSWORD))
            .await
            .unwrap();

        let ticket = service
            .forgot_password(ForgotPasswordRequest {
                email: "Reset@Example.com".to_string(),
            })
            .await
            .unwrap()
            .unwrap();

        let weak = service
            .reset_password(ResetPasswordRequest {
                token: ticket.token.clone(),
                new_password: "short".to_string(),
            })
            .await;
        assert!(matches!(weak, Err(AppError::WeakPassword(_))));

        service
            .reset_password(ResetPasswordRequest {
                token: ticket.token.clone(),
                new_password: "Reset1Pass!".to_string(),
            })
            .await
            .unwrap();

        let reused = service
            .reset_password(ResetPasswordRequest {
                token: ticket.token,
                new_password: "Again1Pass!".to_string(),
            })
            .await;
        assert!(matches!(reused, Err(AppError::InvalidResetToken)));

        assert!(service
            .login(login_request("reset@example.com", "Reset1Pass!"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_reset_single_winner() {
        let (service, _) = service();
        let service = Arc::new(service);
        service
            .register(register_request("race-reset@example.com", PASSWORD))
            .await
            .unwrap();
        let ticket = service
            .forgot_password(ForgotPasswordRequest {
                email: "race-reset@example.com".to_string(),
            })
            .await
            .unwrap()
            .unwrap();

        let tasks: Vec<_> = (0..4)
            .map(|i| {
                let service = service.clone();
                let token = ticket.token.clone();
                tokio::spawn(async move {
                    let new_password = format!("Reset{i}Pass!");
                    service
                        .reset_password(ResetPasswordRequest {
                            token,
                            new_password: new_password.clone(),
                        })
                        .await
                        .map(|()| new_password)
                })
            })
            .collect();

        let mut winners = Vec::new();
        for task in tasks {
            match task.await.unwrap() {
                Ok(password) => winners.push(password),
                Err(AppError::InvalidResetToken) => {}
                Err(e) => panic!("unexpected error: {e:?}"),
            }
        }

        assert_eq!(winners.len(), 1);
        assert!(service
            .login(login_request("race-reset@example.com", &winners[0]))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_refresh_single_winner() {
        let (service, _) = service();
        let service = Arc::new(service);
        service
            .register(register_request("race-refresh@example.com", PASSWORD))
            .await
            .unwrap();
        let session = service
            .login(login_request("race-refresh@example.com", PASSWORD))
            .await
            .unwrap();

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let service = service.clone();
                let refresh_token = session.refresh_token.clone();
                tokio::spawn(async move { service.refresh(RefreshRequest { refresh_token }).await })
            })
            .collect();

        let mut refreshed = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => refreshed += 1,
                Err(AppError::Unauthorized) => {}
                Err(e) => panic!("unexpected error: {e:?}"),
            }
        }

        assert_eq!(refreshed, 1);
    }

    #[tokio::test]
    async fn test_unrepresentable_refresh_lifetime_is_internal_error() {
        let store = Arc::new(InMemoryUserStore::new());
        let service = AuthService::new(
            store,
            AuthConfig {
                refresh_ttl_days: u32::MAX,
                ..test_config()
            },
        );
        service
            .register(register_request("far-future@example.com", PASSWORD))
            .await
            .unwrap();

        let result = service
            .login(login_request("far-future@example.com", PASSWORD))
            .await;
        assert!(matches!(result, Err(AppError::Internal(_))));
    }

    #[tokio::test]
    async fn test_reset_password_expired_token() {
        let (service, store) = service();
        let user = service
            .register(register_request("expired@example.com", PASSWORD))
            .await
            .unwrap();

        let token = generate_opaque_token();
        store
            .set_reset_token(
                user.id,
                TokenDigest::new(digest_token(&token), Utc::now() - Duration::minutes(1)),
            )
            .await
            .unwrap();

        let result = service
            .reset_password(ResetPasswordRequest {
                token,
                new_password: "Reset1Pass!".to_string(),
            })
            .await;
        assert!(matches!(result, Err(AppError::InvalidResetToken)));
    }

    #[tokio::test]
    async fn test_bootstrap_admin_is_idempotent() {
        let (service, store) = service();
        let admin = AdminConfig {
            email: Some("Admin@Example.com".to_string()),
            password: Some("Adm1n!Passw0rd".to_string()),
            first_name: Some("Ada".to_string()),
            last_name: Some("Admin".to_string()),
        };

        let created = service.bootstrap_admin(&admin).await.unwrap().unwrap();
        assert_eq!(created.role, Role::Admin);
        assert_eq!(created.email, "admin@example.com");

        assert!(service.bootstrap_admin(&admin).await.unwrap().is_none());
        assert_eq!(store.count_by_role(Role::Admin).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_bootstrap_admin_skips_incomplete_or_weak() {
        let (service, store) = service();

        let incomplete = AdminConfig {
            email: Some("admin@example.com".to_string()),
            ..AdminConfig::default()
        };
        assert!(service.bootstrap_admin(&incomplete).await.unwrap().is_none());

        let weak = AdminConfig {
            email: Some("admin@example.com".to_string()),
            password: Some("password".to_string()),
            first_name: Some("Ada".to_string()),
            last_name: Some("Admin".to_string()),
        };
        assert!(service.bootstrap_admin(&weak).await.unwrap().is_none());
        assert!(store.is_empty());
    }
}
