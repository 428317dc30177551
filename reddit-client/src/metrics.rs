use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiMetrics {
    pub session_started: DateTime<Utc>,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub rate_limited_requests: u64,
    pub average_response_time: Duration,
    pub last_request_time: Option<DateTime<Utc>>,
    pub requests_by_endpoint: HashMap<String, EndpointMetrics>,
    /// Responses per HTTP status; requests that never got a response are not counted.
    pub responses_by_status: BTreeMap<u16, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointMetrics {
    pub request_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub total_response_time: Duration,
    pub min_response_time: Duration,
    pub max_response_time: Duration,
}

#[derive(Debug, Clone)]
pub struct RequestMetrics {
    pub endpoint: String,
    pub status_code: Option<u16>,
    pub response_time: Duration,
    pub success: bool,
    pub rate_limited: bool,
}

impl Default for ApiMetrics {
    fn default() -> Self {
        Self {
            session_started: Utc::now(),
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            rate_limited_requests: 0,
            average_response_time: Duration::ZERO,
            last_request_time: None,
            requests_by_endpoint: HashMap::new(),
            responses_by_status: BTreeMap::new(),
        }
    }
}

impl ApiMetrics {
    /// Average request rate since the session started.
    pub fn requests_per_minute(&self) -> f64 {
        let elapsed = Utc::now()
            .signed_duration_since(self.session_started)
            .num_milliseconds();
        if elapsed <= 0 {
            return 0.0;
        }
        self.total_requests as f64 / (elapsed as f64 / 60_000.0)
    }
}

impl EndpointMetrics {
    fn new() -> Self {
        Self {
            request_count: 0,
            success_count: 0,
            error_count: 0,
            total_response_time: Duration::ZERO,
            min_response_time: Duration::MAX,
            max_response_time: Duration::ZERO,
        }
    }

    fn update(&mut self, metrics: &RequestMetrics) {
        self.request_count += 1;
        self.total_response_time += metrics.response_time;
        self.min_response_time = self.min_response_time.min(metrics.response_time);
        self.max_response_time = self.max_response_time.max(metrics.response_time);

        if metrics.success {
            self.success_count += 1;
        } else {
            self.error_count += 1;
        }
    }

    pub fn average_response_time(&self) -> Duration {
        if self.request_count == 0 {
            Duration::ZERO
        } else {
            self.total_response_time / self.request_count as u32
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.request_count == 0 {
            0.0
        } else {
            self.success_count as f64 / self.request_count as f64
        }
    }
}

/// Collapses ids and names out of an endpoint so per-post requests share one
/// bucket, e.g. `/comments/abc123` becomes `/comments/{id}`.
pub fn endpoint_route(endpoint: &str) -> String {
    let segments: Vec<&str> = endpoint.split('/').filter(|s| !s.is_empty()).collect();
    let route: Vec<&str> = segments
        .iter()
        .enumerate()
        .map(|(i, segment)| match (i, segments.first()) {
            (1, Some(&"r")) => "{subreddit}",
            (1, Some(&"user")) => "{username}",
            (1, Some(&"comments")) => "{id}",
            _ => *segment,
        })
        .collect();
    format!("/{}", route.join("/"))
}

#[derive(Debug)]
pub struct MetricsCollector {
    metrics: Arc<RwLock<ApiMetrics>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(RwLock::new(ApiMetrics::default())),
        }
    }

    pub async fn record_request(&self, request_metrics: RequestMetrics) {
        let mut metrics = self.metrics.write().await;

        metrics.total_requests += 1;
        metrics.last_request_time = Some(Utc::now());

        if request_metrics.success {
            metrics.successful_requests += 1;
        } else {
            metrics.failed_requests += 1;
        }

        if request_metrics.rate_limited {
            metrics.rate_limited_requests += 1;
        }

        if let Some(status) = request_metrics.status_code {
            *metrics.responses_by_status.entry(status).or_insert(0) += 1;
        }

        // Running average over all requests
        let previous = metrics.total_requests - 1;
        let total_time =
            metrics.average_response_time * previous as u32 + request_metrics.response_time;
        metrics.average_response_time = total_time / metrics.total_requests as u32;

        metrics
            .requests_by_endpoint
            .entry(endpoint_route(&request_metrics.endpoint))
            .or_insert_with(EndpointMetrics::new)
            .update(&request_metrics);
    }

    pub async fn get_metrics(&self) -> ApiMetrics {
        self.metrics.read().await.clone()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
