//! Health, readiness and metrics handlers

use std::fmt::Write as _;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::{AppState, EndpointMetrics};

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Liveness probe - basic health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_secs(),
    })
}

/// Readiness response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub checks: ReadinessChecks,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReadinessChecks {
    /// Accepting traffic
    pub server: bool,
    /// User store reachable
    pub database: bool,
}

/// Readiness probe - checks the user store
#[utoipa::path(
    get,
    path = "/ready",
    tag = "health",
    responses(
        (status = 200, description = "Service is ready", body = ReadinessResponse),
        (status = 503, description = "Service not ready", body = ReadinessResponse)
    )
)]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = match state.auth.store().ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check: user store unavailable");
            false
        }
    };

    let checks = ReadinessChecks {
        server: state.is_ready(),
        database,
    };
    let ready = checks.server && checks.database;
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(ReadinessResponse { ready, checks }))
}

/// Prometheus-compatible metrics endpoint
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "health",
    responses(
        (status = 200, description = "Metrics in Prometheus text format", body = String, content_type = "text/plain")
    )
)]
pub async fn prometheus_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.metrics_snapshot().await;
    let output = render_metrics(
        state.uptime_secs(),
        state.get_request_count(),
        state.get_error_count(),
        &snapshot,
    );

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        output,
    )
}

fn render_metrics(
    uptime: u64,
    total_requests: u64,
    total_errors: u64,
    endpoints: &[(String, EndpointMetrics)],
) -> String {
    let mut out = String::new();

    // Writing to a String cannot fail
    let _ = writeln!(out, "# HELP emporium_uptime_seconds Time since server start");
    let _ = writeln!(out, "# TYPE emporium_uptime_seconds gauge");
    let _ = writeln!(out, "emporium_uptime_seconds {uptime}\n");

    let _ = writeln!(out, "# HELP emporium_requests_total Total number of HTTP requests");
    let _ = writeln!(out, "# TYPE emporium_requests_total counter");
    let _ = writeln!(out, "emporium_requests_total {total_requests}\n");

    let _ = writeln!(out, "# HELP emporium_errors_total HTTP responses with a 5xx status");
    let _ = writeln!(out, "# TYPE emporium_errors_total counter");
    let _ = writeln!(out, "emporium_errors_total {total_errors}\n");

    let _ = writeln!(
        out,
        "# HELP emporium_build_info Build information\n# TYPE emporium_build_info gauge"
    );
    let _ = writeln!(
        out,
        "emporium_build_info{{version=\"{}\"}} 1\n",
        env!("CARGO_PKG_VERSION")
    );

    let _ = writeln!(
        out,
        "# HELP emporium_http_requests_total HTTP requests by endpoint and status"
    );
    let _ = writeln!(out, "# TYPE emporium_http_requests_total counter");
    for (endpoint, metrics) in endpoints {
        let mut statuses: Vec<_> = metrics.status_counts.iter().collect();
        statuses.sort();
        for (status, count) in statuses {
            let _ = writeln!(
                out,
                "emporium_http_requests_total{{endpoint=\"{endpoint}\",status=\"{status}\"}} {count}"
            );
        }
    }
    out.push('\n');

    let _ = writeln!(
        out,
        "# HELP emporium_http_request_duration_seconds HTTP request latency"
    );
    let _ = writeln!(out, "# TYPE emporium_http_request_duration_seconds histogram");
    for (endpoint, metrics) in endpoints.iter().filter(|(_, m)| m.latency_count > 0) {
        let buckets = &metrics.latency_buckets;
        let mut cumulative = 0u64;
        for (le, count) in [
            ("0.01", buckets.under_10ms),
            ("0.05", buckets.ms_10_50),
            ("0.1", buckets.ms_50_100),
            ("0.5", buckets.ms_100_500),
            ("1.0", buckets.ms_500_1000),
            ("+Inf", buckets.over_1s),
        ] {
            cumulative += count;
            let _ = writeln!(
                out,
                "emporium_http_request_duration_seconds_bucket{{endpoint=\"{endpoint}\",le=\"{le}\"}} {cumulative}"
            );
        }

        let sum_s = metrics.total_latency_us as f64 / 1_000_000.0;
        let _ = writeln!(
            out,
            "emporium_http_request_duration_seconds_sum{{endpoint=\"{endpoint}\"}} {sum_s:.6}"
        );
        let _ = writeln!(
            out,
            "emporium_http_request_duration_seconds_count{{endpoint=\"{endpoint}\"}} {}",
            metrics.latency_count
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::LatencyBuckets;
    use std::collections::HashMap;

    #[test]
    fn test_render_metrics() {
        let endpoint = EndpointMetrics {
            status_counts: HashMap::from([(200, 3), (401, 1)]),
            latency_count: 4,
            total_latency_us: 2_500_000,
            min_latency_us: 1_000,
            max_latency_us: 1_500_000,
            latency_buckets: LatencyBuckets {
                under_10ms: 2,
                ms_10_50: 1,
                over_1s: 1,
                ..Default::default()
            },
        };

        let text = render_metrics(12, 4, 0, &[("/api/auth/login".to_string(), endpoint)]);

        assert!(text.contains("emporium_uptime_seconds 12"));
        assert!(text.contains("emporium_requests_total 4"));
        assert!(text.contains(
            "emporium_http_requests_total{endpoint=\"/api/auth/login\",status=\"401\"} 1"
        ));
        assert!(text.contains(
            "emporium_http_request_duration_seconds_bucket{endpoint=\"/api/auth/login\",le=\"0.05\"} 3"
        ));
        assert!(text.contains(
            "emporium_http_request_duration_seconds_bucket{endpoint=\"/api/auth/login\",le=\"+Inf\"} 4"
        ));
        assert!(text.contains(
            "emporium_http_request_duration_seconds_sum{endpoint=\"/api/auth/login\"} 2.500000"
        ));
    }

    #[test]
    fn test_render_metrics_without_traffic() {
        let text = render_metrics(0, 0, 0, &[]);
        assert!(text.contains("emporium_requests_total 0"));
        assert!(!text.contains("_bucket{"));
    }
}
