//! Token issuing and validation
//!
//! Access tokens are HS256-signed JWTs carrying the user's identity and role.
//! Refresh and password reset tokens are opaque random strings; only their
//! SHA-256 digests are ever persisted.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use emporium_core::{Role, SecurityConfig};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

/// Size of opaque refresh/reset tokens in bytes (256 bits)
pub const OPAQUE_TOKEN_BYTES: usize = 32;

/// JWT Claims structure containing user information
///
/// These claims are embedded in the access token and extracted during validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - user ID
    pub sub: Uuid,
    /// User's email address
    pub email: String,
    /// User's role
    pub role: Role,
    /// Issued at timestamp (Unix epoch seconds)
    pub iat: i64,
    /// Expiration timestamp (Unix epoch seconds)
    pub exp: i64,
    /// Token issuer
    pub iss: String,
    /// Unique token identifier
    pub jti: Uuid,
}

/// JWT token generation and validation errors
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode JWT: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid token format")]
    Malformed,

    #[error("Invalid token signature")]
    SignatureInvalid,

    #[error("Token has expired")]
    Expired,

    #[error("Access token lifetime out of range: {0}s")]
    LifetimeOutOfRange(u64),
}

/// JWT Configuration
///
/// Built once at startup and shared; never re-read from the environment per request.
#[derive(Clone)]
pub struct JwtConfig {
    /// Secret key for HMAC signing
    pub secret: String,
    /// Access token lifetime in seconds (default: 86400 = 24 hours)
    pub access_ttl_secs: u64,
    /// Token issuer identifier
    pub issuer: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self::from_security(&SecurityConfig::default())
    }
}

impl JwtConfig {
    pub fn from_security(security: &SecurityConfig) -> Self {
        Self {
            secret: security.jwt_secret.clone(),
            access_ttl_secs: security.access_token_ttl_secs,
            issuer: security.jwt_issuer.clone(),
        }
    }

    /// Configured access token lifetime, `None` when it does not fit a `Duration`
    pub fn access_ttl(&self) -> Option<Duration> {
        i64::try_from(self.access_ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
    }
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"[REDACTED]")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("issuer", &self.issuer)
            .finish()
    }
}

/// Issue an access token with an explicit lifetime
///
/// `ttl` may be negative, which yields an already expired token.
pub fn issue_access_token(
    config: &JwtConfig,
    user_id: Uuid,
    email: &str,
    role: Role,
    ttl: Duration,
) -> Result<String, JwtError> {
    let now = Utc::now().timestamp();

    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        role,
        iat: now,
        exp: now.saturating_add(ttl.num_seconds()),
        iss: config.issuer.clone(),
        jti: Uuid::new_v4(),
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )?;

    Ok(token)
}

/// Issue an access token with the configured lifetime
///
/// # Example
///
/// ```no_run
/// use emporium_api::auth::jwt::{generate_access_token, validate_access_token, JwtConfig};
/// use emporium_core::Role;
/// use uuid::Uuid;
///
/// let config = JwtConfig::default();
/// let token = generate_access_token(&config, Uuid::new_v4(), "john@example.com", Role::User)
///     .expect("Failed to generate token");
/// let claims = validate_access_token(&config, &token).expect("Invalid token");
/// assert_eq!(claims.role, Role::User);
/// ```
pub fn generate_access_token(
    config: &JwtConfig,
    user_id: Uuid,
    email: &str,
    role: Role,
) -> Result<String, JwtError> {
    let ttl = config
        .access_ttl()
        .ok_or(JwtError::LifetimeOutOfRange(config.access_ttl_secs))?;
    issue_access_token(config, user_id, email, role, ttl)
}

/// Validate an access token and extract its claims
///
/// The signature is checked before expiry, so a tampered token is reported
/// as `SignatureInvalid` even if it has also expired. No clock leeway is
/// granted: a token is expired once `exp <= now`.
pub fn validate_access_token(config: &JwtConfig, token: &str) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);
    validation.leeway = 0;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::SignatureInvalid,
        _ => JwtError::Malformed,
    })?;

    if token_data.claims.exp <= Utc::now().timestamp() {
        return Err(JwtError::Expired);
    }

    Ok(token_data.claims)
}

/// Generate a 256-bit random token, base64url encoded without padding
pub fn generate_opaque_token() -> String {
    let mut bytes = [0u8; OPAQUE_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 digest of an opaque token, hex encoded
pub fn digest_token(token: &str) -> String {
    Sha256::digest(token.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret".to_string(),
            access_ttl_secs: 3600,
            issuer: "emporium-test".to_string(),
        }
    }

    fn tamper_signature(token: &str) -> String {
        let (head, signature) = token.rsplit_once('.').unwrap();
        let mut chars: Vec<char> = signature.chars().collect();
        chars[0] = if chars[0] == 'A' { 'B' } else { 'A' };
        format!("{head}.{}", chars.into_iter().collect::<String>())
    }

    #[test]
    fn test_generate_and_validate_token() {
        let config = config();
        let user_id = Uuid::new_v4();

        let token = generate_access_token(&config, user_id, "test@example.com", Role::Moderator)
            .expect("Failed to generate token");
        let claims = validate_access_token(&config, &token).expect("Failed to validate token");

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email, "test@example.com");
        assert_eq!(claims.role, Role::Moderator);
        assert_eq!(claims.iss, "emporium-test");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_unrepresentable_lifetime_is_an_error() {
        let config = JwtConfig {
            access_ttl_secs: 100_000_000_000_000_000,
            ..config()
        };
        assert!(config.access_ttl().is_none());

        let result = generate_access_token(&config, Uuid::new_v4(), "a@example.com", Role::User);
        assert!(matches!(
            result,
            Err(JwtError::LifetimeOutOfRange(100_000_000_000_000_000))
        ));
    }

    #[test]
    fn test_default_lifetime_is_one_day() {
        assert_eq!(JwtConfig::default().access_ttl_secs, 86_400);
        assert_eq!(JwtConfig::default().issuer, "emporium-api");
    }

    #[test]
    fn test_tampered_signature() {
        let config = config();
        let token = generate_access_token(&config, Uuid::new_v4(), "t@example.com", Role::User)
            .unwrap();

        let result = validate_access_token(&config, &tamper_signature(&token));
        assert!(matches!(result, Err(JwtError::SignatureInvalid)));
    }

    #[test]
    fn test_wrong_secret() {
        let config1 = config();
        let config2 = JwtConfig {
            secret: "other-secret".to_string(),
            ..config()
        };

        let token =
            generate_access_token(&config1, Uuid::new_v4(), "t@example.com", Role::User).unwrap();

        let result = validate_access_token(&config2, &token);
        assert!(matches!(result, Err(JwtError::SignatureInvalid)));
    }

    #[test]
    fn test_expired_token() {
        let config = config();
        let token = issue_access_token(
            &config,
            Uuid::new_v4(),
            "t@example.com",
            Role::User,
            Duration::seconds(-1),
        )
        .unwrap();

        let result = validate_access_token(&config, &token);
        assert!(matches!(result, Err(JwtError::Expired)));
    }

    #[test]
    fn test_zero_ttl_is_expired() {
        let config = config();
        let token = issue_access_token(
            &config,
            Uuid::new_v4(),
            "t@example.com",
            Role::User,
            Duration::zero(),
        )
        .unwrap();

        assert!(matches!(
            validate_access_token(&config, &token),
            Err(JwtError::Expired)
        ));
    }

    #[test]
    fn test_expired_and_tampered_reports_signature() {
        let config = config();
        let token = issue_access_token(
            &config,
            Uuid::new_v4(),
            "t@example.com",
            Role::User,
            Duration::hours(-1),
        )
        .unwrap();

        let result = validate_access_token(&config, &tamper_signature(&token));
        assert!(matches!(result, Err(JwtError::SignatureInvalid)));
    }

    #[test]
    fn test_wrong_issuer_is_malformed() {
        let token = generate_access_token(
            &JwtConfig {
                issuer: "someone-else".to_string(),
                ..config()
            },
            Uuid::new_v4(),
            "t@example.com",
            Role::Admin,
        )
        .unwrap();

        assert!(matches!(
            validate_access_token(&config(), &token),
            Err(JwtError::Malformed)
        ));
    }

    #[test]
    fn test_malformed_tokens() {
        let config = config();
        for token in ["", "invalid", "invalid.token.here", "a.b"] {
            assert!(
                matches!(validate_access_token(&config, token), Err(JwtError::Malformed)),
                "{token:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_opaque_tokens() {
        let first = generate_opaque_token();
        let second = generate_opaque_token();

        assert_ne!(first, second);
        // 32 bytes -> 43 base64url characters without padding
        assert_eq!(first.len(), 43);
        assert!(first
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_digest_token() {
        let digest = digest_token("abc");
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(digest_token("abc"), digest);
        assert_ne!(digest_token("abd"), digest);
    }

    #[test]
    fn test_debug_hides_secret() {
        assert!(!format!("{:?}", config()).contains("test-secret"));
    }
}
