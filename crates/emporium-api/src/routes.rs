//! API route definitions

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use emporium_core::Role;

use crate::auth::{auth_middleware, require_role};
use crate::handlers::{admin, auth, user};
use crate::state::AppState;

/// Create the `/api` routes
///
/// Route layers run bottom-up, so on protected groups the authentication
/// layer always runs before the role gate.
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/refresh", post(auth::refresh_handler))
        .route("/auth/forgot-password", post(auth::forgot_password_handler))
        .route("/auth/reset-password", post(auth::reset_password_handler));

    // Any authenticated caller
    let protected_routes = Router::new()
        .route("/auth/logout", post(auth::logout_handler))
        .route("/auth/change-password", post(auth::change_password_handler))
        .route(
            "/user/profile",
            get(user::get_profile_handler).put(user::update_profile_handler),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Administrators only
    let admin_routes = Router::new()
        .route("/admin/dashboard", get(admin::dashboard_handler))
        .route("/admin/register", post(admin::admin_register_handler))
        .route("/admin/users/:id/status", patch(admin::set_status_handler))
        .route_layer(middleware::from_fn(require_role(Role::Admin)))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
}
