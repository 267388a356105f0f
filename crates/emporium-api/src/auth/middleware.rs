/// Authentication and role-gate middleware for protecting routes
///
/// `auth_middleware` extracts and validates the bearer token from the
/// Authorization header and adds the caller's identity to request extensions.
/// The role gates then check that identity against an allowed role set.
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use emporium_core::Role;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::jwt::{validate_access_token, Claims, JwtError};
use crate::audit::{audit_log, AuditEvent};
use crate::error::ApiError;
use crate::state::AppState;

/// Authenticated caller extracted from a valid access token
///
/// Added to request extensions by [`auth_middleware`]; handlers read it with
/// `Extension<AuthenticatedUser>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

impl AuthenticatedUser {
    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }
}

impl From<Claims> for AuthenticatedUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            role: claims.role,
        }
    }
}

/// Authentication middleware errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingAuthHeader,

    #[error("Invalid Authorization header format")]
    InvalidAuthHeader,

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] JwtError),

    #[error("Insufficient permissions")]
    InsufficientPermissions,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AuthError::MissingAuthHeader => (
                StatusCode::UNAUTHORIZED,
                ApiError::new("UNAUTHORIZED", "Missing Authorization header"),
            ),
            AuthError::InvalidAuthHeader => (
                StatusCode::UNAUTHORIZED,
                ApiError::new("UNAUTHORIZED", "Invalid Authorization header format"),
            ),
            AuthError::InvalidToken(_) => (
                StatusCode::UNAUTHORIZED,
                ApiError::new("INVALID_TOKEN", "Invalid or expired token"),
            ),
            AuthError::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                ApiError::new("FORBIDDEN", "Insufficient permissions"),
            ),
        };

        (status, Json(body)).into_response()
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header
///
/// The header must consist of exactly the `Bearer` scheme, one space and a
/// non-empty token.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    match value.split_once(' ') {
        Some(("Bearer", token)) if !token.is_empty() && !token.contains(char::is_whitespace) => {
            Ok(token)
        }
        _ => Err(AuthError::InvalidAuthHeader),
    }
}

/// Authentication middleware that requires a valid access token
///
/// This middleware:
/// 1. Extracts the Authorization header
/// 2. Validates the Bearer token format
/// 3. Validates the token signature, issuer and expiration
/// 4. Adds AuthenticatedUser to request extensions
///
/// ```ignore
/// use axum::{middleware, routing::get, Router};
/// use emporium_api::auth::middleware::auth_middleware;
///
/// let app = Router::new()
///     .route("/protected", get(protected_handler))
///     .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));
/// ```
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let resource = request.uri().path().to_string();

    let token = match extract_bearer_token(request.headers()) {
        Ok(token) => token,
        Err(e) => {
            audit_log(&AuditEvent::InvalidToken {
                resource,
                reason: e.to_string(),
            });
            return Err(e);
        }
    };

    let claims = match validate_access_token(state.auth.jwt_config(), token) {
        Ok(claims) => claims,
        Err(e) => {
            audit_log(&AuditEvent::InvalidToken {
                resource,
                reason: e.to_string(),
            });
            return Err(AuthError::InvalidToken(e));
        }
    };

    request
        .extensions_mut()
        .insert(AuthenticatedUser::from(claims));

    Ok(next.run(request).await)
}

/// Type alias for role middleware future
type RoleMiddlewareFuture =
    std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, AuthError>> + Send>>;

/// Middleware factory admitting callers whose role is in `allowed`
///
/// Membership is strict: no role implies another. Must run after
/// [`auth_middleware`]; a request without an authenticated user is a 401.
///
/// ```ignore
/// use axum::{middleware, routing::get, Router};
/// use emporium_api::auth::middleware::{auth_middleware, require_any_role};
/// use emporium_core::Role;
///
/// let app = Router::new()
///     .route("/moderation", get(handler))
///     .route_layer(middleware::from_fn(require_any_role(&[Role::Admin, Role::Moderator])))
///     .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));
/// ```
pub fn require_any_role(
    allowed: &'static [Role],
) -> impl Fn(Request<Body>, Next) -> RoleMiddlewareFuture + Clone {
    move |request: Request<Body>, next: Next| {
        Box::pin(async move {
            let resource = request.uri().path().to_string();

            let Some(user) = request.extensions().get::<AuthenticatedUser>().cloned() else {
                audit_log(&AuditEvent::AccessDenied {
                    user_id: None,
                    resource,
                    required_roles: role_names(allowed),
                });
                return Err(AuthError::MissingAuthHeader);
            };

            if !user.has_any_role(allowed) {
                audit_log(&AuditEvent::AccessDenied {
                    user_id: Some(user.user_id),
                    resource,
                    required_roles: role_names(allowed),
                });
                return Err(AuthError::InsufficientPermissions);
            }

            Ok(next.run(request).await)
        })
    }
}

/// Middleware factory admitting a single role
pub fn require_role(role: Role) -> impl Fn(Request<Body>, Next) -> RoleMiddlewareFuture + Clone {
    let allowed: &'static [Role] = match role {
        Role::Admin => &[Role::Admin],
        Role::User => &[Role::User],
        Role::Moderator => &[Role::Moderator],
    };
    require_any_role(allowed)
}

fn role_names(roles: &[Role]) -> Vec<String> {
    roles.iter().map(|r| r.to_string()).collect()
}
