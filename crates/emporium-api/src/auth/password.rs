/// Password policy, hashing and verification using Argon2id
///
/// Hashing follows OWASP recommendations:
/// - Algorithm: Argon2id (memory-hard, resistant to GPU attacks)
/// - Memory: 64 MB
/// - Iterations: 3
/// - Parallelism: 4 lanes
/// - Salt: 16 bytes random
/// - Output: 32 bytes hash
use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params,
};
use thiserror::Error;
use tokio::sync::Semaphore;

/// Minimum password length, counted in characters
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Symbols accepted as the "special character" class
pub const SPECIAL_CHARACTERS: &str = "!@#$%^&*()_+-=[]{};':\"\\|,.<>/?~`";

/// Password hashing errors
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashingFailed(String),

    #[error("Password hashing task failed: {0}")]
    TaskFailed(String),
}

/// Reasons a password is rejected by the strength policy
///
/// Checks run in declaration order and the first failure is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PasswordPolicyError {
    #[error("Password must be at least 8 characters long")]
    TooShort,

    #[error("Password must contain at least one uppercase letter")]
    MissingUppercase,

    #[error("Password must contain at least one lowercase letter")]
    MissingLowercase,

    #[error("Password must contain at least one number")]
    MissingDigit,

    #[error("Password must contain at least one special character")]
    MissingSpecial,
}

/// Password hashing configuration
///
/// These parameters are tuned for security while maintaining acceptable performance.
/// Increasing memory or iterations improves security but slows down hashing.
#[derive(Debug, Clone)]
pub struct PasswordConfig {
    /// Memory cost in KB (default: 65536 = 64 MB)
    pub memory_cost: u32,
    /// Time cost (iterations, default: 3)
    pub time_cost: u32,
    /// Parallelism (lanes, default: 4)
    pub parallelism: u32,
    /// Output length in bytes (default: 32)
    pub output_len: Option<usize>,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_cost: 65536, // 64 MB
            time_cost: 3,
            parallelism: 4,
            output_len: Some(32),
        }
    }
}

impl PasswordConfig {
    /// Cheap parameters for tests; never use in production
    pub fn light() -> Self {
        Self {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
            output_len: Some(32),
        }
    }

    fn to_params(&self) -> Result<Params, PasswordError> {
        Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            self.output_len,
        )
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))
    }
}

/// Validate password strength
///
/// Precedence: length, uppercase, lowercase, digit, special character.
///
/// # Example
///
/// ```no_run
/// use emporium_api::auth::password::{validate_password_strength, PasswordPolicyError};
///
/// assert!(validate_password_strength("Valid1Pass!").is_ok());
/// assert_eq!(
///     validate_password_strength("short1!"),
///     Err(PasswordPolicyError::TooShort)
/// );
/// ```
pub fn validate_password_strength(password: &str) -> Result<(), PasswordPolicyError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PasswordPolicyError::TooShort);
    }

    if !password.chars().any(char::is_uppercase) {
        return Err(PasswordPolicyError::MissingUppercase);
    }

    if !password.chars().any(char::is_lowercase) {
        return Err(PasswordPolicyError::MissingLowercase);
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(PasswordPolicyError::MissingDigit);
    }

    if !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
        return Err(PasswordPolicyError::MissingSpecial);
    }

    Ok(())
}

/// Hash a plaintext password using Argon2id
///
/// # Returns
///
/// * `Ok(String)` - PHC string format hash (includes algorithm, parameters, salt, and hash)
/// * `Err(PasswordError)` - If the parameters are invalid or hashing fails
///
/// The hash embeds its salt and cost parameters, so no separate storage is needed.
pub fn hash_password(password: &str, config: &PasswordConfig) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let params = config.to_params()?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

    Ok(password_hash.to_string())
}

/// Verify a plaintext password against a stored hash
///
/// Cost parameters are read from the PHC string itself. A malformed hash
/// is logged and treated as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash is malformed");
            return false;
        }
    };

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => true,
        Err(argon2::password_hash::Error::Password) => false,
        Err(e) => {
            tracing::warn!(error = %e, "Password verification failed");
            false
        }
    }
}

/// Bounded pool for CPU-heavy hashing work
///
/// Hashing and verification run on the blocking thread pool; the semaphore
/// caps how many run at once so request tasks keep their worker threads.
#[derive(Debug, Clone)]
pub struct PasswordHasherPool {
    config: Arc<PasswordConfig>,
    permits: Arc<Semaphore>,
}

impl PasswordHasherPool {
    /// Create a pool; `max_concurrent == 0` uses the available parallelism
    pub fn new(config: PasswordConfig, max_concurrent: usize) -> Self {
        let permits = if max_concurrent == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            max_concurrent
        };

        Self {
            config: Arc::new(config),
            permits: Arc::new(Semaphore::new(permits)),
        }
    }

    /// Hash a password with the pool's configuration
    pub async fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let config = self.config.clone();
        let password = password.to_owned();
        self.run(move || hash_password(&password, &config)).await?
    }

    /// Verify a password against a PHC hash
    pub async fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let password = password.to_owned();
        let hash = hash.to_owned();
        self.run(move || verify_password(&password, &hash)).await
    }

    async fn run<T, F>(&self, work: F) -> Result<T, PasswordError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| PasswordError::TaskFailed(e.to_string()))?;

        tokio::task::spawn_blocking(work)
            .await
            .map_err(|e| PasswordError::TaskFailed(e.to_string()))
    }
}
