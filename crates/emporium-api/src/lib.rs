//! Emporium API - authentication REST server
//!
//! Provides HTTP endpoints for registration, login, session refresh,
//! password management and role-gated administration.

pub mod audit;
pub mod auth;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers::health;
use crate::middleware::{metrics_middleware, security_headers_middleware};
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Build the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);
    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::prometheus_metrics))
        .nest("/api", routes::api_routes(state.clone()))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            metrics_middleware,
        ))
        .layer(axum_middleware::from_fn(security_headers_middleware))
        .layer(TimeoutLayer::new(timeout))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for the configured origins; any origin when none are configured
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(allowed)
}

/// Test state over the in-memory store, with cheap hashing and a capturing
/// reset delivery
#[cfg(any(test, feature = "test-utils"))]
pub fn test_state() -> (Arc<AppState>, Arc<auth::CapturingResetDelivery>) {
    use emporium_core::{AppConfig, Environment, InMemoryUserStore};

    let config = AppConfig {
        environment: Environment::Test,
        ..AppConfig::default()
    };

    let mut auth_config = auth::AuthConfig::from_app_config(&config);
    auth_config.password = auth::PasswordConfig::light();

    let store = Arc::new(InMemoryUserStore::new());
    let delivery = Arc::new(auth::CapturingResetDelivery::new());
    let state = AppState::with_auth(
        config,
        auth::AuthService::new(store, auth_config),
        delivery.clone(),
    );

    (Arc::new(state), delivery)
}

/// Create router for testing (uses fresh in-memory state)
#[cfg(any(test, feature = "test-utils"))]
pub fn create_router_for_testing() -> Router {
    let (state, _) = test_state();
    create_router(state)
}
