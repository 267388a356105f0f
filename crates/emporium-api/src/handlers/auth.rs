//! Authentication API handlers
//!
//! Public endpoints for registration, login, session refresh and password
//! reset, plus the authenticated logout and password change.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};

use crate::auth::{
    AuthResponse, AuthenticatedUser, ChangePasswordRequest, ForgotPasswordRequest, LoginRequest,
    MessageResponse, RefreshRequest, RegisterRequest, ResetPasswordRequest,
};
use crate::error::AppError;
use crate::extract::ApiJson;
use crate::state::AppState;

/// Returned for every forgot-password request so callers cannot learn which
/// emails have accounts
const RESET_REQUESTED_MESSAGE: &str =
    "If an account exists for that email, a password reset link has been sent";

/// Register a new user account
///
/// Creates a new user with the `user` role.
///
/// # Request Body
///
/// * `email` - Valid email address, unique ignoring case
/// * `password` - 8+ chars with uppercase, lowercase, digit and special character
/// * `first_name` / `last_name` - 1-100 characters
///
/// # Responses
///
/// * `201 Created` - User registered, returns the account
/// * `400 Bad Request` - Malformed body, failed validation or weak password
/// * `409 Conflict` - Email already registered
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered successfully", body = emporium_core::User),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 409, description = "Email already registered", body = crate::error::ApiError),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.auth.register(request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Login with email and password
///
/// Unknown emails and wrong passwords produce the same response.
///
/// # Responses
///
/// * `200 OK` - Access token, refresh token and account
/// * `400 Bad Request` - Malformed body or failed validation
/// * `401 Unauthorized` - Invalid credentials or deactivated account
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 401, description = "Invalid credentials", body = crate::error::ApiError),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    Ok(Json(state.auth.login(request).await?))
}

/// Refresh access token
///
/// Exchanges the current refresh token for a new token pair. The presented
/// refresh token stops working immediately.
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Token refreshed successfully", body = AuthResponse),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 401, description = "Invalid or expired refresh token", body = crate::error::ApiError),
    )
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<RefreshRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    Ok(Json(state.auth.refresh(request).await?))
}

/// Request a password reset
///
/// Always answers `202 Accepted` for a well-formed email. When an active
/// account exists, a single-use reset token is handed to the configured
/// delivery channel.
#[utoipa::path(
    post,
    path = "/api/auth/forgot-password",
    tag = "auth",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 202, description = "Reset requested", body = MessageResponse),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
    )
)]
pub async fn forgot_password_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(ticket) = state.auth.forgot_password(request).await? {
        // A delivery failure must not change the response
        if let Err(e) = state.reset_delivery.deliver(&ticket).await {
            tracing::error!(user_id = %ticket.user.id, error = %e, "Reset token delivery failed");
        }
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse::new(RESET_REQUESTED_MESSAGE)),
    ))
}

/// Reset a password with a reset token
///
/// # Responses
///
/// * `200 OK` - Password replaced; all sessions signed out
/// * `400 Bad Request` - Invalid, used or expired token, or weak password
#[utoipa::path(
    post,
    path = "/api/auth/reset-password",
    tag = "auth",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Invalid token or password", body = crate::error::ApiError),
    )
)]
pub async fn reset_password_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state.auth.reset_password(request).await?;
    Ok(Json(MessageResponse::new("Password has been reset")))
}

/// Logout current session
///
/// Revokes the caller's refresh token. Access tokens stay valid until they
/// expire.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Logout successful", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<MessageResponse>, AppError> {
    state.auth.logout(user.user_id).await?;
    Ok(Json(MessageResponse::new("Logged out successfully")))
}

/// Change the caller's password
///
/// Requires the current password; the new one must satisfy the password
/// policy. Existing refresh tokens are revoked.
#[utoipa::path(
    post,
    path = "/api/auth/change-password",
    tag = "auth",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Wrong current password or weak new password", body = crate::error::ApiError),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn change_password_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiJson(request): ApiJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state.auth.change_password(user.user_id, request).await?;
    Ok(Json(MessageResponse::new("Password changed successfully")))
}
