//! Scheduler / control loop
//!
//! Drives periodic detection over the configured watch list and exposes the
//! engine's lifecycle controls. Each tick fetches fresh windows per pair,
//! evaluates them, correlates any anomaly with recent commits and hands the
//! result to the workflow orchestrator. One pair's failure never aborts the
//! rest of the tick, and at most one detection pass is ever in flight.

use crate::activity::{merge_feeds, ActivityLog};
use crate::config::{ObserverConfig, WatchTarget};
use crate::correlate::CommitCorrelator;
use crate::detect::{AnomalyDetector, Detection};
use crate::error::ObserverError;
use crate::models::{
    ActivityCategory, ActivityEntry, Anomaly, SuspectCommit, Workflow,
};
use crate::observability::ObserverMetrics;
use crate::remediation::Remediation;
use crate::source::{CommitSource, MetricSource};
use crate::workflow::{WorkflowOrchestrator, WorkflowStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Scheduler run-state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Running,
    Stopped,
}

/// Snapshot returned by `status()`: the single source of truth for what the
/// engine is doing and what went wrong where.
#[derive(Debug, Clone, Serialize)]
pub struct ObserverStatus {
    pub status: RunState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_tick: Option<DateTime<Utc>>,
    pub tick_interval_secs: u64,
    pub sigma_threshold: f64,
    pub recent_anomalies: Vec<Anomaly>,
    pub pending_workflows: Vec<Workflow>,
    pub activity: Vec<ActivityEntry>,
}

/// The observer engine: detection loop plus control surface
pub struct ObserverEngine {
    config: ObserverConfig,
    metric_source: Arc<dyn MetricSource>,
    commit_source: Arc<dyn CommitSource>,
    detector: AnomalyDetector,
    correlator: CommitCorrelator,
    store: Arc<WorkflowStore>,
    orchestrator: WorkflowOrchestrator,
    activity: Arc<ActivityLog>,
    metrics: ObserverMetrics,
    running: AtomicBool,
    tick_in_flight: AtomicBool,
    stop_signal: Notify,
    last_tick: RwLock<Option<DateTime<Utc>>>,
    recent_anomalies: RwLock<VecDeque<Anomaly>>,
}

impl ObserverEngine {
    pub fn new(
        config: ObserverConfig,
        metric_source: Arc<dyn MetricSource>,
        commit_source: Arc<dyn CommitSource>,
        remediation: Arc<dyn Remediation>,
    ) -> Self {
        let store = Arc::new(WorkflowStore::new());
        let activity = Arc::new(ActivityLog::default());
        let orchestrator = WorkflowOrchestrator::new(
            store.clone(),
            remediation,
            activity.clone(),
            config.cooldown,
        );
        let detector = AnomalyDetector::new(config.sigma_threshold, config.min_baseline_samples);
        let correlator = CommitCorrelator::new(config.correlation_window);
        let cap = config.recent_anomaly_cap;

        Self {
            config,
            metric_source,
            commit_source,
            detector,
            correlator,
            store,
            orchestrator,
            activity,
            metrics: ObserverMetrics::new(),
            running: AtomicBool::new(false),
            tick_in_flight: AtomicBool::new(false),
            stop_signal: Notify::new(),
            last_tick: RwLock::new(None),
            recent_anomalies: RwLock::new(VecDeque::with_capacity(cap)),
        }
    }

    /// Start the recurring tick loop. Idempotent: calling while running is a
    /// no-op, not an error. Returns whether a new loop was launched.
    pub fn start(self: Arc<Self>) -> bool {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Observer already running; start ignored");
            return false;
        }

        info!(
            interval_secs = self.config.tick_interval.as_secs(),
            pairs = self.config.watch.len(),
            "Observer engine started"
        );

        let engine = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(engine.config.tick_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if !engine.is_running() {
                            break;
                        }
                        engine.tick().await;
                        if !engine.is_running() {
                            break;
                        }
                    }
                    _ = engine.stop_signal.notified() => break,
                }
            }
            info!("Observer engine loop exited");
        });

        true
    }

    /// Request the loop to stop. The in-flight tick, if any, completes first;
    /// a workflow already executing runs to its terminal state regardless.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("Observer engine stopping");
        }
        self.stop_signal.notify_waiters();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn run_state(&self) -> RunState {
        if self.is_running() {
            RunState::Running
        } else {
            RunState::Stopped
        }
    }

    /// Run one detection pass over the watch list.
    ///
    /// Skip-if-busy: if the previous pass has not finished, this one is
    /// deferred rather than run concurrently, so workflow creation never
    /// races against itself.
    pub async fn tick(&self) {
        if self
            .tick_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Previous tick still in flight; deferring");
            return;
        }

        let started = std::time::Instant::now();
        let now = Utc::now();
        let mut anomalies = 0usize;
        let mut errors = 0usize;
        let mut skipped = 0usize;

        for target in &self.config.watch {
            match self.evaluate_pair(target, now).await {
                Ok(Detection::Anomalous(anomaly)) => {
                    anomalies += 1;
                    self.handle_anomaly(anomaly).await;
                }
                Ok(Detection::Normal { sigma_deviation }) => {
                    debug!(
                        service = %target.service,
                        metric = %target.metric,
                        sigma = sigma_deviation,
                        "Within baseline"
                    );
                }
                Ok(Detection::Skipped(reason)) => {
                    skipped += 1;
                    self.metrics.inc_pairs_skipped();
                    debug!(
                        service = %target.service,
                        metric = %target.metric,
                        reason = %reason,
                        "Detection skipped"
                    );
                }
                // One pair's source failure is logged and skipped; the rest
                // of the tick proceeds.
                Err(e) => {
                    errors += 1;
                    self.metrics.inc_source_errors();
                    warn!(
                        service = %target.service,
                        metric = %target.metric,
                        error = %e,
                        "Pair evaluation failed; retrying next tick"
                    );
                }
            }
        }

        self.store.prune_terminal(now, self.config.workflow_retention);
        *self.last_tick.write().unwrap() = Some(now);

        self.metrics.inc_ticks();
        self.metrics
            .observe_tick_duration(started.elapsed().as_secs_f64());
        debug!(
            pairs = self.config.watch.len(),
            anomalies,
            errors,
            skipped,
            elapsed_ms = started.elapsed().as_millis(),
            "Tick complete"
        );

        self.tick_in_flight.store(false, Ordering::SeqCst);
    }

    /// Fetch both windows for one pair and evaluate them
    async fn evaluate_pair(
        &self,
        target: &WatchTarget,
        now: DateTime<Utc>,
    ) -> Result<Detection, ObserverError> {
        let baseline_window = self
            .metric_source
            .query(
                &target.service,
                &target.metric,
                now - self.config.baseline_window,
                now,
            )
            .await?;

        let current_window = self
            .metric_source
            .query(
                &target.service,
                &target.metric,
                now - self.config.current_window,
                now,
            )
            .await?;

        Ok(self.detector.evaluate(&baseline_window, &current_window, now))
    }

    /// Record an anomaly, correlate it with recent commits and propose a
    /// workflow.
    async fn handle_anomaly(&self, anomaly: Anomaly) {
        warn!(
            service = %anomaly.service,
            metric = %anomaly.metric,
            current = anomaly.current_value,
            baseline_mean = anomaly.baseline_mean,
            sigma = anomaly.sigma_deviation,
            severity = %anomaly.severity,
            "Anomaly detected"
        );
        self.metrics.inc_anomalies_detected();

        self.push_anomaly(anomaly.clone());
        self.activity.record_event(
            ActivityCategory::Detector,
            anomaly.detected_at,
            format!(
                "{} anomaly: {}.{} = {:.2} ({:.1}σ from baseline {:.2})",
                anomaly.severity,
                anomaly.service,
                anomaly.metric,
                anomaly.current_value,
                anomaly.sigma_deviation,
                anomaly.baseline_mean
            ),
            None,
        );

        let suspects = self.correlate(&anomaly).await;
        self.orchestrator
            .propose(&anomaly, suspects, anomaly.detected_at);
    }

    /// Rank candidate root-cause commits. A commit source failure is treated
    /// like an empty window: the anomaly response proceeds without suspects.
    async fn correlate(&self, anomaly: &Anomaly) -> Vec<SuspectCommit> {
        let from = anomaly.detected_at - self.config.correlation_window;
        match self
            .commit_source
            .recent_commits(from, anomaly.detected_at)
            .await
        {
            Ok(commits) => self.correlator.rank(anomaly.detected_at, &commits),
            Err(e) => {
                warn!(error = %e, "Commit source unavailable; no suspects identified");
                Vec::new()
            }
        }
    }

    fn push_anomaly(&self, anomaly: Anomaly) {
        let mut buffer = self.recent_anomalies.write().unwrap();
        if buffer.len() == self.config.recent_anomaly_cap {
            buffer.pop_front();
        }
        buffer.push_back(anomaly);
    }

    /// Approve a pending workflow and run its remediation sequence
    pub async fn approve(&self, id: &str, reason: &str) -> Result<Workflow, ObserverError> {
        self.orchestrator.approve(id, reason).await
    }

    /// Reject a pending workflow
    pub fn reject(&self, id: &str, reason: &str) -> Result<Workflow, ObserverError> {
        self.orchestrator.reject(id, reason)
    }

    /// Most recent anomalies, newest first
    pub fn recent_anomalies(&self, limit: usize) -> Vec<Anomaly> {
        let buffer = self.recent_anomalies.read().unwrap();
        buffer.iter().rev().take(limit).cloned().collect()
    }

    /// Workflows awaiting a decision, newest first
    pub fn pending_workflows(&self) -> Vec<Workflow> {
        self.store.pending()
    }

    pub fn workflow(&self, id: &str) -> Option<Workflow> {
        self.store.get(id)
    }

    /// Merged activity feed, newest first. Pure read-side assembly over the
    /// per-category feeds; an absent category is simply an empty source.
    pub fn activity_feed(&self, limit: usize) -> Vec<ActivityEntry> {
        merge_feeds(&self.activity.category_feeds(), limit)
    }

    /// Current run-state plus the projections the control surface displays
    pub fn status(&self) -> ObserverStatus {
        ObserverStatus {
            status: self.run_state(),
            last_tick: *self.last_tick.read().unwrap(),
            tick_interval_secs: self.config.tick_interval.as_secs(),
            sigma_threshold: self.config.sigma_threshold,
            recent_anomalies: self.recent_anomalies(10),
            pending_workflows: self.pending_workflows(),
            activity: self.activity_feed(20),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StepError;
    use crate::models::{
        CodeSearch, CommitRef, FixRequestRef, IncidentRecord, MetricSample, MetricWindow,
        NotificationReceipt, Severity, TicketRef, WorkflowStatus,
    };
    use crate::remediation::{
        async_trait, CodeSearchQuery, FixRequestDraft, IncidentDraft, Notification, TicketDraft,
    };
    use std::collections::HashMap;

    /// Canned metric source: per-service sample sets, missing services fail
    struct CannedMetrics {
        // service -> (baseline values, current values)
        series: HashMap<String, (Vec<f64>, Vec<f64>)>,
    }

    #[async_trait]
    impl MetricSource for CannedMetrics {
        async fn query(
            &self,
            service: &str,
            metric: &str,
            from: DateTime<Utc>,
            to: DateTime<Utc>,
        ) -> Result<MetricWindow, ObserverError> {
            let (baseline, current) = self
                .series
                .get(service)
                .ok_or_else(|| ObserverError::SourceUnavailable(format!("{} offline", service)))?;

            // The short window spans less than a day; the baseline spans 7
            let values = if (to - from) < chrono::Duration::days(1) {
                current
            } else {
                baseline
            };

            Ok(MetricWindow {
                service: service.to_string(),
                metric: metric.to_string(),
                from,
                to,
                samples: values
                    .iter()
                    .map(|&value| MetricSample {
                        timestamp: to,
                        value,
                    })
                    .collect(),
            })
        }
    }

    struct NoCommits;

    #[async_trait]
    impl CommitSource for NoCommits {
        async fn recent_commits(
            &self,
            _from: DateTime<Utc>,
            _to: DateTime<Utc>,
        ) -> Result<Vec<CommitRef>, ObserverError> {
            Ok(vec![])
        }
    }

    struct OkRemediation;

    #[async_trait]
    impl crate::remediation::Remediation for OkRemediation {
        async fn register_incident(
            &self,
            _draft: &IncidentDraft,
        ) -> Result<IncidentRecord, StepError> {
            Ok(IncidentRecord {
                incident_id: "INC-1001".to_string(),
                url: None,
            })
        }

        async fn search_code(&self, _query: &CodeSearchQuery) -> Result<CodeSearch, StepError> {
            Ok(CodeSearch {
                files: vec![],
                target_file: None,
            })
        }

        async fn open_fix_request(
            &self,
            _draft: &FixRequestDraft,
        ) -> Result<FixRequestRef, StepError> {
            Ok(FixRequestRef {
                reference: "PR-1".to_string(),
                url: None,
                file: None,
            })
        }

        async fn notify_team(
            &self,
            _note: &Notification,
        ) -> Result<NotificationReceipt, StepError> {
            Ok(NotificationReceipt {
                channel: "#ops".to_string(),
            })
        }

        async fn create_ticket(&self, _draft: &TicketDraft) -> Result<TicketRef, StepError> {
            Ok(TicketRef {
                key: "OPS-1".to_string(),
                url: None,
            })
        }
    }

    fn engine_with(series: HashMap<String, (Vec<f64>, Vec<f64>)>, watch: Vec<WatchTarget>) -> Arc<ObserverEngine> {
        let config = ObserverConfig {
            watch,
            ..Default::default()
        };
        Arc::new(ObserverEngine::new(
            config,
            Arc::new(CannedMetrics { series }),
            Arc::new(NoCommits),
            Arc::new(OkRemediation),
        ))
    }

    fn spiking_series() -> (Vec<f64>, Vec<f64>) {
        // Baseline mean 250, std 50; current max 1250.5 -> ~20 sigma
        (vec![200.0, 200.0, 300.0, 300.0], vec![240.0, 1250.5])
    }

    fn flat_series() -> (Vec<f64>, Vec<f64>) {
        // Zero variance baseline: never an anomaly
        (vec![100.0, 100.0, 100.0], vec![9999.0])
    }

    #[tokio::test]
    async fn test_tick_detects_anomaly_and_proposes_workflow() {
        let mut series = HashMap::new();
        series.insert("api-gateway".to_string(), spiking_series());
        let engine = engine_with(
            series,
            vec![WatchTarget::new("api-gateway", "p99_latency")],
        );

        engine.tick().await;

        let anomalies = engine.recent_anomalies(10);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].severity, Severity::Sev1);

        let pending = engine.pending_workflows();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].status, WorkflowStatus::Pending);
        assert_eq!(pending[0].anomaly.service, "api-gateway");
    }

    #[tokio::test]
    async fn test_zero_variance_pair_never_raises() {
        let mut series = HashMap::new();
        series.insert("checkout".to_string(), flat_series());
        let engine = engine_with(series, vec![WatchTarget::new("checkout", "error_rate")]);

        engine.tick().await;

        assert!(engine.recent_anomalies(10).is_empty());
        assert!(engine.pending_workflows().is_empty());
    }

    #[tokio::test]
    async fn test_one_failing_pair_does_not_abort_tick() {
        let mut series = HashMap::new();
        series.insert("api-gateway".to_string(), spiking_series());
        // "billing" has no canned series, so its query fails
        let engine = engine_with(
            series,
            vec![
                WatchTarget::new("billing", "error_rate"),
                WatchTarget::new("api-gateway", "p99_latency"),
            ],
        );

        engine.tick().await;

        // The failing pair was isolated; the healthy one still detected
        assert_eq!(engine.recent_anomalies(10).len(), 1);
        assert_eq!(engine.pending_workflows().len(), 1);
    }

    #[tokio::test]
    async fn test_cooldown_suppresses_duplicate_workflow() {
        let mut series = HashMap::new();
        series.insert("api-gateway".to_string(), spiking_series());
        let engine = engine_with(
            series,
            vec![WatchTarget::new("api-gateway", "p99_latency")],
        );

        engine.tick().await;
        engine.tick().await;

        // Both ticks saw the anomaly, only one workflow exists
        assert_eq!(engine.recent_anomalies(10).len(), 2);
        assert_eq!(engine.pending_workflows().len(), 1);
    }

    #[tokio::test]
    async fn test_approve_from_status_surface() {
        let mut series = HashMap::new();
        series.insert("api-gateway".to_string(), spiking_series());
        let engine = engine_with(
            series,
            vec![WatchTarget::new("api-gateway", "p99_latency")],
        );

        engine.tick().await;
        let id = engine.pending_workflows()[0].id.clone();

        let finished = engine.approve(&id, "looks real").await.unwrap();
        assert_eq!(finished.status, WorkflowStatus::Completed);
        assert_eq!(finished.execution.unwrap().steps.len(), 5);
        assert!(engine.pending_workflows().is_empty());
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_stop_drains() {
        let engine = engine_with(HashMap::new(), vec![]);

        assert_eq!(engine.run_state(), RunState::Stopped);
        assert!(engine.clone().start());
        assert!(!engine.clone().start());
        assert_eq!(engine.run_state(), RunState::Running);

        engine.stop();
        assert_eq!(engine.run_state(), RunState::Stopped);
        // stop on a stopped engine is harmless
        engine.stop();
    }

    #[tokio::test]
    async fn test_status_snapshot_fields() {
        let engine = engine_with(HashMap::new(), vec![]);
        engine.tick().await;

        let status = engine.status();
        assert_eq!(status.status, RunState::Stopped);
        assert!(status.last_tick.is_some());
        assert_eq!(status.tick_interval_secs, 60);
        assert_eq!(status.sigma_threshold, 3.0);
        assert!(status.recent_anomalies.is_empty());
        assert!(status.pending_workflows.is_empty());
    }
}
