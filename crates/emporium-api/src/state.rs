//! Application state management

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use emporium_core::{AppConfig, UserStore};
use tokio::sync::RwLock;

use crate::auth::{AuthConfig, AuthService, LogResetDelivery, ResetDelivery};

/// Latency histogram buckets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LatencyBuckets {
    pub under_10ms: u64,
    pub ms_10_50: u64,
    pub ms_50_100: u64,
    pub ms_100_500: u64,
    pub ms_500_1000: u64,
    pub over_1s: u64,
}

impl LatencyBuckets {
    fn record(&mut self, latency_us: u64) {
        let bucket = match latency_us {
            0..=9_999 => &mut self.under_10ms,
            10_000..=49_999 => &mut self.ms_10_50,
            50_000..=99_999 => &mut self.ms_50_100,
            100_000..=499_999 => &mut self.ms_100_500,
            500_000..=999_999 => &mut self.ms_500_1000,
            _ => &mut self.over_1s,
        };
        *bucket += 1;
    }
}

/// Per-endpoint request statistics
#[derive(Debug, Clone, Default)]
pub struct EndpointMetrics {
    /// Responses by HTTP status code
    pub status_counts: HashMap<u16, u64>,
    pub latency_count: u64,
    pub total_latency_us: u64,
    pub min_latency_us: u64,
    pub max_latency_us: u64,
    pub latency_buckets: LatencyBuckets,
}

impl EndpointMetrics {
    fn record(&mut self, status: u16, latency_us: u64) {
        *self.status_counts.entry(status).or_insert(0) += 1;

        if self.latency_count == 0 || latency_us < self.min_latency_us {
            self.min_latency_us = latency_us;
        }
        self.max_latency_us = self.max_latency_us.max(latency_us);
        self.latency_count += 1;
        self.total_latency_us = self.total_latency_us.saturating_add(latency_us);
        self.latency_buckets.record(latency_us);
    }
}

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Authentication service
    pub auth: AuthService,
    /// Channel for password reset tokens
    pub reset_delivery: Arc<dyn ResetDelivery>,
    /// Server start time
    pub start_time: Instant,
    /// Request counter
    pub request_count: AtomicU64,
    /// Responses with a 5xx status
    pub error_count: AtomicU64,
    /// Ready status
    pub is_ready: AtomicBool,
    /// Per-endpoint request metrics, keyed by normalized path
    pub metrics: RwLock<HashMap<String, EndpointMetrics>>,
}

impl AppState {
    /// Create application state backed by `store`
    pub fn new(config: AppConfig, store: Arc<dyn UserStore>) -> Self {
        let auth = AuthService::new(store, AuthConfig::from_app_config(&config));
        Self::with_auth(config, auth, Arc::new(LogResetDelivery))
    }

    /// Create application state from prebuilt parts
    pub fn with_auth(
        config: AppConfig,
        auth: AuthService,
        reset_delivery: Arc<dyn ResetDelivery>,
    ) -> Self {
        Self {
            config,
            auth,
            reset_delivery,
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            is_ready: AtomicBool::new(true),
            metrics: RwLock::new(HashMap::new()),
        }
    }

    /// Increment request counter
    pub fn increment_requests(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::SeqCst)
    }

    /// Get total request count
    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }

    pub fn get_error_count(&self) -> u64 {
        self.error_count.load(Ordering::SeqCst)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Check if service is ready
    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    /// Set ready status
    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::SeqCst);
    }

    /// Record one completed request
    pub async fn record_request(&self, endpoint: String, status: u16, latency_us: u64) {
        self.increment_requests();
        if status >= 500 {
            self.error_count.fetch_add(1, Ordering::SeqCst);
        }

        let mut metrics = self.metrics.write().await;
        metrics
            .entry(endpoint)
            .or_default()
            .record(status, latency_us);
    }

    /// Copy of the per-endpoint metrics, sorted by endpoint
    pub async fn metrics_snapshot(&self) -> Vec<(String, EndpointMetrics)> {
        let metrics = self.metrics.read().await;
        let mut snapshot: Vec<_> = metrics
            .iter()
            .map(|(endpoint, m)| (endpoint.clone(), m.clone()))
            .collect();
        snapshot.sort_by(|a, b| a.0.cmp(&b.0));
        snapshot
    }
}
