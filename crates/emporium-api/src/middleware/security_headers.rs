//! Security headers middleware
//!
//! Every response carries:
//! - `X-Content-Type-Options: nosniff`
//! - `X-Frame-Options: DENY`
//! - `Strict-Transport-Security` (one year, subdomains)
//! - `Content-Security-Policy: default-src 'self'`
//! - `Referrer-Policy: no-referrer`
//! - `Cache-Control: no-store`, since auth responses carry tokens
//!
//! Handlers that set their own `Cache-Control` keep it.

use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

const SECURITY_HEADERS: [(HeaderName, &str); 5] = [
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::X_FRAME_OPTIONS, "DENY"),
    (
        header::STRICT_TRANSPORT_SECURITY,
        "max-age=31536000; includeSubDomains",
    ),
    (header::CONTENT_SECURITY_POLICY, "default-src 'self'"),
    (header::REFERRER_POLICY, "no-referrer"),
];

/// Adds the security headers to every response, including errors
pub async fn security_headers_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    for (name, value) in SECURITY_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }

    if !headers.contains_key(header::CACHE_CONTROL) {
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::{Request, StatusCode},
        middleware,
        response::IntoResponse,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/ok", get(|| async { (StatusCode::OK, "ok") }))
            .route(
                "/fail",
                get(|| async { (StatusCode::UNAUTHORIZED, "nope").into_response() }),
            )
            .route(
                "/cached",
                get(|| async { ([(header::CACHE_CONTROL, "max-age=60")], "cached") }),
            )
            .layer(middleware::from_fn(security_headers_middleware))
    }

    async fn get_headers(uri: &str) -> (StatusCode, axum::http::HeaderMap) {
        let response = app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        (response.status(), response.headers().clone())
    }

    #[tokio::test]
    async fn test_security_headers_added() {
        let (status, headers) = get_headers("/ok").await;
        assert_eq!(status, StatusCode::OK);

        for (name, value) in SECURITY_HEADERS {
            assert_eq!(headers.get(&name).unwrap(), value, "{name}");
        }
        assert_eq!(headers.get(header::CACHE_CONTROL).unwrap(), "no-store");
    }

    #[tokio::test]
    async fn test_security_headers_on_error_response() {
        let (status, headers) = get_headers("/fail").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(headers.get(header::X_FRAME_OPTIONS).unwrap(), "DENY");
    }

    #[tokio::test]
    async fn test_existing_cache_control_kept() {
        let (_, headers) = get_headers("/cached").await;
        assert_eq!(headers.get(header::CACHE_CONTROL).unwrap(), "max-age=60");
    }
}
