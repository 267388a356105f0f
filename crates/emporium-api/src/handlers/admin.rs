//! Administrator handlers
//!
//! Mounted behind the authentication layer and the admin role gate.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use emporium_core::{Role, User};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{AdminRegisterRequest, AuthenticatedUser, SetActiveRequest};
use crate::error::AppError;
use crate::extract::ApiJson;
use crate::state::AppState;

/// Admin dashboard response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DashboardResponse {
    pub message: String,
    pub user_id: Uuid,
    pub role: Role,
}

/// Admin dashboard
#[utoipa::path(
    get,
    path = "/api/admin/dashboard",
    tag = "admin",
    responses(
        (status = 200, description = "Dashboard info", body = DashboardResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
        (status = 403, description = "Not an administrator", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn dashboard_handler(
    Extension(user): Extension<AuthenticatedUser>,
) -> Json<DashboardResponse> {
    Json(DashboardResponse {
        message: "Welcome to the admin dashboard".to_string(),
        user_id: user.user_id,
        role: user.role,
    })
}

/// Create an account with any role
///
/// # Responses
///
/// * `201 Created` - Account created
/// * `400 Bad Request` - Invalid input, unknown role or weak password
/// * `409 Conflict` - Email already registered
#[utoipa::path(
    post,
    path = "/api/admin/register",
    tag = "admin",
    request_body = AdminRegisterRequest,
    responses(
        (status = 201, description = "Account created", body = User),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
        (status = 403, description = "Not an administrator", body = crate::error::ApiError),
        (status = 409, description = "Email already registered", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn admin_register_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<AdminRegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.auth.admin_register(request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Activate or deactivate an account
///
/// Deactivation revokes the account's refresh token; its access tokens stay
/// valid until they expire.
#[utoipa::path(
    patch,
    path = "/api/admin/users/{id}/status",
    tag = "admin",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    request_body = SetActiveRequest,
    responses(
        (status = 200, description = "Updated account", body = User),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
        (status = 403, description = "Not an administrator", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn set_status_handler(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthenticatedUser>,
    Path(user_id): Path<Uuid>,
    ApiJson(request): ApiJson<SetActiveRequest>,
) -> Result<Json<User>, AppError> {
    let user = state.auth.set_active(user_id, request.is_active).await?;

    tracing::info!(
        admin_id = %admin.user_id,
        user_id = %user.id,
        is_active = user.is_active,
        "Account status changed by administrator"
    );

    Ok(Json(user))
}
