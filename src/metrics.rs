/// Metrics and monitoring for upstream scrape targets
///
/// Tracks success rates, error counts, and response times per upstream host.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostMetrics {
    pub host: String,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub average_response_time_ms: f64,
    pub total_response_time_ms: u64,
    pub rate_limit_hits: u64,
    pub timeout_count: u64,
}

impl HostMetrics {
    pub fn new(host: String) -> Self {
        Self {
            host,
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            last_success: None,
            last_failure: None,
            last_error: None,
            average_response_time_ms: 0.0,
            total_response_time_ms: 0,
            rate_limit_hits: 0,
            timeout_count: 0,
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            (self.successful_requests as f64 / self.total_requests as f64) * 100.0
        }
    }

    pub fn record_success(&mut self, response_time: Duration) {
        self.total_requests += 1;
        self.successful_requests += 1;
        self.last_success = Some(Utc::now());

        let response_ms = response_time.as_millis() as u64;
        self.total_response_time_ms += response_ms;
        self.average_response_time_ms =
            self.total_response_time_ms as f64 / self.successful_requests as f64;
    }

    pub fn record_failure(&mut self, error: String) {
        self.total_requests += 1;
        self.failed_requests += 1;
        self.last_failure = Some(Utc::now());

        if error.contains("429") || error.to_lowercase().contains("rate limit") {
            self.rate_limit_hits += 1;
        } else if error.to_lowercase().contains("timeout") {
            self.timeout_count += 1;
        }
        self.last_error = Some(error);
    }
}

/// Shared tracker, keyed by upstream host.
#[derive(Clone)]
pub struct MetricsTracker {
    metrics: Arc<Mutex<HashMap<String, HostMetrics>>>,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn record_success(&self, host: &str, response_time: Duration) {
        let mut metrics = self.metrics.lock().unwrap();
        let entry = metrics
            .entry(host.to_string())
            .or_insert_with(|| HostMetrics::new(host.to_string()));
        entry.record_success(response_time);
    }

    pub fn record_failure(&self, host: &str, error: String) {
        let mut metrics = self.metrics.lock().unwrap();
        let entry = metrics
            .entry(host.to_string())
            .or_insert_with(|| HostMetrics::new(host.to_string()));
        entry.record_failure(error.clone());

        log::warn!(
            "[{}] failure: {} (success rate {:.1}%)",
            host,
            error,
            entry.success_rate()
        );
    }

    /// Snapshot of all host metrics, sorted by host name for stable output.
    pub fn snapshot(&self) -> Vec<HostMetrics> {
        let metrics = self.metrics.lock().unwrap();
        let mut all: Vec<HostMetrics> = metrics.values().cloned().collect();
        all.sort_by(|a, b| a.host.cmp(&b.host));
        all
    }
}

impl Default for MetricsTracker {
    fn default() -> Self {
        Self::new()
    }
}
