//! Emporium Configuration Management
//!
//! Handles configuration from environment variables and config files
//! with sensible defaults for development.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Deployment environment
    pub environment: Environment,

    /// Server configuration
    pub server: ServerConfig,

    /// Database connection
    pub database: DatabaseConfig,

    /// Token and hashing settings
    pub security: SecurityConfig,

    /// Initial administrator account
    pub admin: AdminConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_override()
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Apply environment variables on top of the current values
    pub fn with_env_override(self) -> Result<Self, ConfigError> {
        self.with_vars(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable source
    pub fn with_vars<F>(mut self, var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(env) = var("APP_ENV") {
            self.environment = env.parse()?;
        }

        // Server
        if let Some(host) = var("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("APP_PORT") {
            self.server.port = parse_value("APP_PORT", port)?;
        }
        if let Some(origins) = var("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // PostgreSQL
        if let Some(url) = var("DATABASE_URL") {
            self.database.postgres_url = Some(url).filter(|u| !u.trim().is_empty());
        }
        if let Some(size) = var("DB_POOL_SIZE") {
            self.database.pool_size = parse_value("DB_POOL_SIZE", size)?;
        }
        if let Some(flag) = var("AUTO_MIGRATE") {
            self.database.auto_migrate = parse_bool("AUTO_MIGRATE", flag)?;
        }

        // Tokens
        if let Some(secret) = var("JWT_SECRET") {
            self.security.jwt_secret = secret;
        }
        if let Some(issuer) = var("JWT_ISSUER") {
            self.security.jwt_issuer = issuer;
        }
        if let Some(ttl) = var("JWT_EXPIRES_IN") {
            self.security.access_token_ttl_secs =
                parse_duration_secs(&ttl).ok_or(ConfigError::InvalidValue {
                    key: "JWT_EXPIRES_IN".to_string(),
                    value: ttl,
                })?;
        }
        if let Some(days) = var("JWT_REFRESH_EXPIRATION_DAYS") {
            self.security.refresh_token_ttl_days =
                parse_value("JWT_REFRESH_EXPIRATION_DAYS", days)?;
        }
        if let Some(mins) = var("RESET_TOKEN_TTL_MINS") {
            self.security.reset_token_ttl_mins = parse_value("RESET_TOKEN_TTL_MINS", mins)?;
        }
        if let Some(permits) = var("HASH_CONCURRENCY") {
            self.security.hash_concurrency = parse_value("HASH_CONCURRENCY", permits)?;
        }

        // Admin bootstrap
        if let Some(email) = var("ADMIN_EMAIL") {
            self.admin.email = non_empty(email);
        }
        if let Some(password) = var("ADMIN_PASSWORD") {
            self.admin.password = non_empty(password);
        }
        if let Some(first) = var("ADMIN_FIRST_NAME") {
            self.admin.first_name = non_empty(first);
        }
        if let Some(last) = var("ADMIN_LAST_NAME") {
            self.admin.last_name = non_empty(last);
        }

        // Logging
        if let Some(level) = var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = var("LOG_JSON") {
            self.logging.json_format = parse_bool("LOG_JSON", json)?;
        }

        Ok(self)
    }

    /// Check the configuration for the current environment.
    ///
    /// Production requires a database, a non-default JWT secret and complete
    /// admin bootstrap credentials; TLS must not be disabled on the database
    /// URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                key: "APP_PORT".to_string(),
                value: "0".to_string(),
            });
        }
        if self.security.jwt_secret.is_empty() {
            return Err(ConfigError::MissingRequired("JWT_SECRET".to_string()));
        }
        let security = &self.security;
        if !(1..=SecurityConfig::MAX_ACCESS_TTL_SECS).contains(&security.access_token_ttl_secs) {
            return Err(ConfigError::InvalidValue {
                key: "JWT_EXPIRES_IN".to_string(),
                value: security.access_token_ttl_secs.to_string(),
            });
        }
        if !(1..=SecurityConfig::MAX_REFRESH_TTL_DAYS).contains(&security.refresh_token_ttl_days) {
            return Err(ConfigError::InvalidValue {
                key: "JWT_REFRESH_EXPIRATION_DAYS".to_string(),
                value: security.refresh_token_ttl_days.to_string(),
            });
        }
        if !(1..=SecurityConfig::MAX_RESET_TTL_MINS).contains(&security.reset_token_ttl_mins) {
            return Err(ConfigError::InvalidValue {
                key: "RESET_TOKEN_TTL_MINS".to_string(),
                value: security.reset_token_ttl_mins.to_string(),
            });
        }
        if let Some(email) = &self.admin.email {
            if !looks_like_email(email) {
                return Err(ConfigError::InvalidValue {
                    key: "ADMIN_EMAIL".to_string(),
                    value: email.clone(),
                });
            }
        }

        if self.environment != Environment::Production {
            return Ok(());
        }

        let url = self
            .database
            .postgres_url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingRequired("DATABASE_URL".to_string()))?;
        if url.contains("sslmode=disable") {
            return Err(ConfigError::InvalidValue {
                key: "DATABASE_URL".to_string(),
                value: "sslmode=disable is not allowed in production".to_string(),
            });
        }
        if self.security.jwt_secret == SecurityConfig::DEV_SECRET {
            return Err(ConfigError::MissingRequired("JWT_SECRET".to_string()));
        }
        if self.admin.email.is_none() {
            return Err(ConfigError::MissingRequired("ADMIN_EMAIL".to_string()));
        }
        if self.admin.password.is_none() {
            return Err(ConfigError::MissingRequired("ADMIN_PASSWORD".to_string()));
        }
        if self.admin.first_name.is_none() {
            return Err(ConfigError::MissingRequired("ADMIN_FIRST_NAME".to_string()));
        }
        if self.admin.last_name.is_none() {
            return Err(ConfigError::MissingRequired("ADMIN_LAST_NAME".to_string()));
        }

        Ok(())
    }
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(ConfigError::InvalidValue {
                key: "APP_ENV".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Allowed origins for CORS (empty allows any)
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 30,
            cors_origins: vec![],
        }
    }
}

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL; the in-memory store is used when unset
    pub postgres_url: Option<String>,

    /// PostgreSQL connection pool size
    pub pool_size: u32,

    /// Create the users table and indexes on startup
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            postgres_url: None,
            pool_size: 10,
            auto_migrate: true,
        }
    }
}

/// Token and password hashing settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// HMAC secret for access tokens
    pub jwt_secret: String,

    /// Issuer tag placed in and required from every access token
    pub jwt_issuer: String,

    /// Access token lifetime in seconds
    pub access_token_ttl_secs: u64,

    /// Refresh token lifetime in days
    pub refresh_token_ttl_days: u32,

    /// Password reset token lifetime in minutes
    pub reset_token_ttl_mins: u32,

    /// Maximum concurrent password hash operations (0 = available parallelism)
    pub hash_concurrency: usize,
}

impl SecurityConfig {
    /// Development-only secret, rejected in production
    pub const DEV_SECRET: &'static str = "dev-secret-change-me";

    /// Longest accepted access token lifetime (30 days)
    pub const MAX_ACCESS_TTL_SECS: u64 = 30 * 24 * 60 * 60;

    /// Longest accepted refresh token lifetime (10 years)
    pub const MAX_REFRESH_TTL_DAYS: u32 = 3650;

    /// Longest accepted reset token lifetime (1 day)
    pub const MAX_RESET_TTL_MINS: u32 = 24 * 60;
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            jwt_secret: Self::DEV_SECRET.to_string(),
            jwt_issuer: "emporium-api".to_string(),
            access_token_ttl_secs: 24 * 60 * 60,
            refresh_token_ttl_days: 7,
            reset_token_ttl_mins: 30,
            hash_concurrency: 0,
        }
    }
}

impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_issuer", &self.jwt_issuer)
            .field("access_token_ttl_secs", &self.access_token_ttl_secs)
            .field("refresh_token_ttl_days", &self.refresh_token_ttl_days)
            .field("reset_token_ttl_mins", &self.reset_token_ttl_mins)
            .field("hash_concurrency", &self.hash_concurrency)
            .finish()
    }
}

/// Initial administrator credentials
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl AdminConfig {
    /// Whether every bootstrap field is configured
    pub fn is_complete(&self) -> bool {
        self.email.is_some()
            && self.password.is_some()
            && self.first_name.is_some()
            && self.last_name.is_some()
    }
}

impl std::fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminConfig")
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .finish()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,

    /// Include file/line in logs
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

/// Parse a duration such as `24h`, `30m`, `3600s` or bare seconds
pub fn parse_duration_secs(value: &str) -> Option<u64> {
    let value = value.trim();
    let (digits, unit) = match value.char_indices().last()? {
        (idx, c) if c.is_ascii_alphabetic() => (&value[..idx], c.to_ascii_lowercase()),
        _ => (value, 's'),
    };
    let amount: u64 = digits.trim().parse().ok()?;

    let multiplier = match unit {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        'd' => 24 * 60 * 60,
        _ => return None,
    };
    amount.checked_mul(multiplier)
}

fn parse_value<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

fn parse_bool(key: &str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        }),
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn looks_like_email(email: &str) -> bool {
    match email.trim().split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}
