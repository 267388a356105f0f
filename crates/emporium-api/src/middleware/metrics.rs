//! Request metrics middleware
//!
//! Counts requests per endpoint and status code and keeps a latency
//! histogram, exposed in text form by the `/metrics` handler.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};

use crate::state::AppState;

/// Shared key for requests that matched no route
pub const UNMATCHED_ENDPOINT: &str = "unmatched";

/// Metrics tracking middleware
///
/// Records:
/// - Request count per endpoint
/// - Request latency distribution
/// - Response status codes
///
/// Endpoints are keyed by route template (`/api/admin/users/:id/status`),
/// so the key set is bounded by the router.
pub async fn metrics_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let endpoint = endpoint_key(&request);

    let response = next.run(request).await;

    let latency_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
    let status = response.status().as_u16();

    // Recorded off the response path
    tokio::spawn(async move {
        state.record_request(endpoint, status, latency_us).await;
    });

    response
}

fn endpoint_key(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ENDPOINT.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Router};
    use emporium_core::{AppConfig, InMemoryUserStore};
    use std::time::Duration;
    use tower::ServiceExt;

    fn app() -> (Router, Arc<AppState>) {
        let state = Arc::new(AppState::new(
            AppConfig::default(),
            Arc::new(InMemoryUserStore::new()),
        ));
        let router = Router::new()
            .route("/items/:id", get(|| async { "item" }))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                metrics_middleware,
            ))
            .with_state(state.clone());
        (router, state)
    }

    async fn get_status(router: &Router, uri: &str) -> StatusCode {
        router
            .clone()
            .oneshot(axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    async fn wait_for_requests(state: &AppState, count: u64) {
        for _ in 0..200 {
            if state.get_request_count() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("only {} of {count} requests recorded", state.get_request_count());
    }

    #[tokio::test]
    async fn test_keys_by_route_template() {
        let (router, state) = app();

        assert_eq!(get_status(&router, "/items/1").await, StatusCode::OK);
        assert_eq!(
            get_status(&router, "/items/550e8400-e29b-41d4-a716-446655440000").await,
            StatusCode::OK
        );
        wait_for_requests(&state, 2).await;

        let snapshot = state.metrics_snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].0, "/items/:id");
        assert_eq!(snapshot[0].1.status_counts.get(&200), Some(&2));
    }

    #[tokio::test]
    async fn test_unrouted_paths_share_one_key() {
        let (router, state) = app();

        for i in 0..200 {
            let status = get_status(&router, &format!("/scan/path-{i}")).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
        }
        wait_for_requests(&state, 200).await;

        let snapshot = state.metrics_snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].0, UNMATCHED_ENDPOINT);
        assert_eq!(snapshot[0].1.status_counts.get(&404), Some(&200));
    }
}
