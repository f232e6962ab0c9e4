//! # Application State Management
//!
//! Shared state accessed by every request handler: the runtime
//! configuration, the record stores, the pipeline trigger client, the
//! storage layout, and request metrics. Everything mutable sits behind
//! `Arc<RwLock<...>>` so concurrent readers never block each other and
//! writers get exclusive access.

use crate::config::AppConfig;
use crate::evaluation::categorize::ReadinessRule;
use crate::pipeline::{PipelineClient, StorageLayout};
use crate::store::AnnotationStore;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// The state shared across all HTTP request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration (can be updated at runtime)
    pub config: Arc<RwLock<AppConfig>>,

    /// Request/domain metrics, updated by middleware and handlers
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// Annotation record stores
    pub store: Arc<AnnotationStore>,

    /// Fire-and-forget client for the GPU collaborator
    pub pipeline: PipelineClient,

    /// Dual-mount storage path computation
    pub layout: StorageLayout,

    /// When the server started
    pub start_time: Instant,
}

/// Metrics collected across all HTTP requests, plus domain counters.
#[derive(Debug, Default)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed since server start
    pub request_count: u64,

    /// Total number of errors encountered since server start
    pub error_count: u64,

    /// Evaluation submissions accepted (creates and replacements)
    pub evaluation_submissions: u64,

    /// Chunk records created by the segmenter or bulk registration
    pub chunks_created: u64,

    /// Remote pipeline triggers that were not accepted
    pub failed_triggers: u64,

    /// Detailed metrics per API endpoint
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Performance metrics for one endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    /// Build the shared state from a validated configuration.
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let pipeline = PipelineClient::new(config.pipeline.clone())?;
        let layout = StorageLayout::new(config.storage.clone());
        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            store: Arc::new(AnnotationStore::new()),
            pipeline,
            layout,
            start_time: Instant::now(),
        })
    }

    /// Copy of the current configuration; cloning releases the lock
    /// immediately so readers never hold it across a request.
    pub fn get_config(&self) -> AppConfig {
        self.config.read().unwrap().clone()
    }

    /// Replace the configuration after validation.
    pub fn update_config(&self, new_config: AppConfig) -> Result<(), String> {
        match new_config.validate() {
            Ok(_) => {
                *self.config.write().unwrap() = new_config;
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        }
    }

    /// The readiness gate as currently configured.
    pub fn readiness_rule(&self) -> ReadinessRule {
        self.config.read().unwrap().evaluation.readiness_rule()
    }

    pub fn increment_request_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.request_count += 1;
    }

    pub fn increment_error_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.error_count += 1;
    }

    /// Called by the evaluation handler on every accepted submission.
    pub fn record_evaluation_submission(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.evaluation_submissions += 1;
    }

    /// Called when new chunk records are created.
    pub fn record_chunks_created(&self, count: u64) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.chunks_created += count;
    }

    /// Called when a remote trigger is rejected or unreachable.
    pub fn record_failed_trigger(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.failed_triggers += 1;
    }

    /// Record per-endpoint timing, called by the metrics middleware.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics.write().unwrap();
        let endpoint_metric = metrics
            .endpoint_metrics
            .entry(endpoint.to_string())
            .or_default();
        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;
        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Consistent snapshot of the metrics for the reporting endpoints.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        let metrics = self.metrics.read().unwrap();
        AppMetrics {
            request_count: metrics.request_count,
            error_count: metrics.error_count,
            evaluation_submissions: metrics.evaluation_submissions,
            chunks_created: metrics.chunks_created,
            failed_triggers: metrics.failed_triggers,
            endpoint_metrics: metrics.endpoint_metrics.clone(),
        }
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    /// Average response time for this endpoint in milliseconds.
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Error rate for this endpoint in [0, 1].
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppState {
        AppState::new(AppConfig::default()).unwrap()
    }

    #[test]
    fn test_domain_counters() {
        let state = state();
        state.record_evaluation_submission();
        state.record_evaluation_submission();
        state.record_chunks_created(7);
        state.record_failed_trigger();

        let snapshot = state.get_metrics_snapshot();
        assert_eq!(snapshot.evaluation_submissions, 2);
        assert_eq!(snapshot.chunks_created, 7);
        assert_eq!(snapshot.failed_triggers, 1);
    }

    #[test]
    fn test_endpoint_metrics_accumulate() {
        let state = state();
        state.record_endpoint_request("GET /api/v1/leaderboard", 10, false);
        state.record_endpoint_request("GET /api/v1/leaderboard", 30, true);

        let snapshot = state.get_metrics_snapshot();
        let metric = &snapshot.endpoint_metrics["GET /api/v1/leaderboard"];
        assert_eq!(metric.request_count, 2);
        assert_eq!(metric.average_duration_ms(), 20.0);
        assert_eq!(metric.error_rate(), 0.5);
    }

    #[test]
    fn test_update_config_rejects_invalid() {
        let state = state();
        let mut bad = AppConfig::default();
        bad.evaluation.quorum = 0;
        assert!(state.update_config(bad).is_err());

        let mut good = AppConfig::default();
        good.evaluation.quorum = 5;
        assert!(state.update_config(good).is_ok());
        assert_eq!(state.readiness_rule().quorum, 5);
    }
}
