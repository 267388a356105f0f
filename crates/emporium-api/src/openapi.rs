//! OpenAPI document

use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::auth::{
    AdminRegisterRequest, AuthResponse, ChangePasswordRequest, FieldError, ForgotPasswordRequest,
    LoginRequest, MessageResponse, RefreshRequest, RegisterRequest, ResetPasswordRequest,
    SetActiveRequest, UpdateProfileRequest,
};
use crate::error::ApiError;
use crate::handlers::{admin, auth, health, user};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Emporium Auth API",
        description = "User registration, login, sessions and role-based access control"
    ),
    paths(
        health::health_check,
        health::readiness_check,
        health::prometheus_metrics,
        auth::register_handler,
        auth::login_handler,
        auth::refresh_handler,
        auth::forgot_password_handler,
        auth::reset_password_handler,
        auth::logout_handler,
        auth::change_password_handler,
        user::get_profile_handler,
        user::update_profile_handler,
        admin::dashboard_handler,
        admin::admin_register_handler,
        admin::set_status_handler,
    ),
    components(schemas(
        emporium_core::User,
        emporium_core::Role,
        ApiError,
        FieldError,
        RegisterRequest,
        AdminRegisterRequest,
        LoginRequest,
        RefreshRequest,
        ForgotPasswordRequest,
        ResetPasswordRequest,
        ChangePasswordRequest,
        UpdateProfileRequest,
        SetActiveRequest,
        AuthResponse,
        MessageResponse,
        admin::DashboardResponse,
        health::HealthResponse,
        health::ReadinessResponse,
        health::ReadinessChecks,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Liveness, readiness and metrics"),
        (name = "auth", description = "Registration, login and sessions"),
        (name = "user", description = "Profile of the authenticated caller"),
        (name = "admin", description = "Administrator operations"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by protected paths
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
