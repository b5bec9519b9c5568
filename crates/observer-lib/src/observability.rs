//! Observability infrastructure for the observer engine
//!
//! Prometheus metrics behind a process-wide registry. Structured logging is
//! done with `tracing` fields at the call sites.

use prometheus::{register_histogram, register_int_counter, Histogram, IntCounter};
use std::sync::OnceLock;

/// Histogram buckets for tick duration (in seconds)
const TICK_BUCKETS: &[f64] = &[0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ObserverMetricsInner> = OnceLock::new();

struct ObserverMetricsInner {
    ticks_total: IntCounter,
    tick_duration_seconds: Histogram,
    pairs_skipped_total: IntCounter,
    source_errors_total: IntCounter,
    anomalies_detected_total: IntCounter,
    workflows_created_total: IntCounter,
    workflows_approved_total: IntCounter,
    workflows_rejected_total: IntCounter,
    remediation_step_failures_total: IntCounter,
}

impl ObserverMetricsInner {
    fn new() -> Self {
        Self {
            ticks_total: register_int_counter!(
                "observer_ticks_total",
                "Total number of completed detection ticks"
            )
            .expect("Failed to register ticks_total"),

            tick_duration_seconds: register_histogram!(
                "observer_tick_duration_seconds",
                "Time spent in one detection tick",
                TICK_BUCKETS.to_vec()
            )
            .expect("Failed to register tick_duration_seconds"),

            pairs_skipped_total: register_int_counter!(
                "observer_pairs_skipped_total",
                "Watched pairs skipped for insufficient signal"
            )
            .expect("Failed to register pairs_skipped_total"),

            source_errors_total: register_int_counter!(
                "observer_source_errors_total",
                "Source adapter failures, isolated per pair"
            )
            .expect("Failed to register source_errors_total"),

            anomalies_detected_total: register_int_counter!(
                "observer_anomalies_detected_total",
                "Total number of anomalies detected"
            )
            .expect("Failed to register anomalies_detected_total"),

            workflows_created_total: register_int_counter!(
                "observer_workflows_created_total",
                "Workflows proposed for approval"
            )
            .expect("Failed to register workflows_created_total"),

            workflows_approved_total: register_int_counter!(
                "observer_workflows_approved_total",
                "Workflows approved by an operator"
            )
            .expect("Failed to register workflows_approved_total"),

            workflows_rejected_total: register_int_counter!(
                "observer_workflows_rejected_total",
                "Workflows rejected by an operator"
            )
            .expect("Failed to register workflows_rejected_total"),

            remediation_step_failures_total: register_int_counter!(
                "observer_remediation_step_failures_total",
                "Remediation steps that failed during execution"
            )
            .expect("Failed to register remediation_step_failures_total"),
        }
    }
}

/// Lightweight handle to the global observer metrics.
///
/// Clones share the same underlying registry entries.
#[derive(Clone)]
pub struct ObserverMetrics {
    _private: (),
}

impl Default for ObserverMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ObserverMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ObserverMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ObserverMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn inc_ticks(&self) {
        self.inner().ticks_total.inc();
    }

    pub fn observe_tick_duration(&self, duration_secs: f64) {
        self.inner().tick_duration_seconds.observe(duration_secs);
    }

    pub fn inc_pairs_skipped(&self) {
        self.inner().pairs_skipped_total.inc();
    }

    pub fn inc_source_errors(&self) {
        self.inner().source_errors_total.inc();
    }

    pub fn inc_anomalies_detected(&self) {
        self.inner().anomalies_detected_total.inc();
    }

    pub fn inc_workflows_created(&self) {
        self.inner().workflows_created_total.inc();
    }

    pub fn inc_workflows_approved(&self) {
        self.inner().workflows_approved_total.inc();
    }

    pub fn inc_workflows_rejected(&self) {
        self.inner().workflows_rejected_total.inc();
    }

    pub fn inc_remediation_step_failures(&self) {
        self.inner().remediation_step_failures_total.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_handle() {
        let metrics = ObserverMetrics::new();
        metrics.inc_ticks();
        metrics.observe_tick_duration(0.05);
        metrics.inc_anomalies_detected();
        metrics.inc_workflows_created();
    }
}
