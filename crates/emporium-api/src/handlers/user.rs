//! Profile handlers for the authenticated caller

use std::sync::Arc;

use axum::{extract::State, Extension, Json};
use emporium_core::User;

use crate::auth::{AuthenticatedUser, UpdateProfileRequest};
use crate::error::AppError;
use crate::extract::ApiJson;
use crate::state::AppState;

/// Get the caller's profile
#[utoipa::path(
    get,
    path = "/api/user/profile",
    tag = "user",
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
        (status = 404, description = "Account no longer exists", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<User>, AppError> {
    Ok(Json(state.auth.get_profile(user.user_id).await?))
}

#[utoipa::path(
    put,
    path = "/api/user/profile",
    tag = "user",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated user", body = User),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
        (status = 404, description = "Account no longer exists", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiJson(request): ApiJson<UpdateProfileRequest>,
) -> Result<Json<User>, AppError> {
    Ok(Json(state.auth.update_profile(user.user_id, request).await?))
}
