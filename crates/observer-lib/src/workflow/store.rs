//! Concurrency-safe workflow store
//!
//! Holds every live workflow in a sharded concurrent map so approval requests
//! are served while a detection tick is suspended on adapter I/O. Only the
//! orchestrator mutates state, and only through `transition`, which
//! compare-and-sets the status under the shard lock: of two racing approvals
//! for the same id, exactly one succeeds and the other observes
//! `InvalidTransition`.

use crate::error::ObserverError;
use crate::models::{Workflow, WorkflowStatus};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

pub struct WorkflowStore {
    workflows: DashMap<String, Workflow>,
}

impl Default for WorkflowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowStore {
    pub fn new() -> Self {
        Self {
            workflows: DashMap::new(),
        }
    }

    pub fn insert(&self, workflow: Workflow) {
        self.workflows.insert(workflow.id.clone(), workflow);
    }

    pub fn get(&self, id: &str) -> Option<Workflow> {
        self.workflows.get(id).map(|w| w.clone())
    }

    /// True when a non-terminal workflow for the pair was created within the
    /// cooldown window ending at `now`. Terminal workflows never block a new
    /// proposal.
    pub fn has_active_for(
        &self,
        service: &str,
        metric: &str,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> bool {
        let cutoff = now - cooldown;
        self.workflows.iter().any(|entry| {
            let w = entry.value();
            !w.status.is_terminal()
                && w.anomaly.service == service
                && w.anomaly.metric == metric
                && w.created_at >= cutoff
        })
    }

    /// Atomically move a workflow from `expected` to `to`, applying `update`
    /// to the rest of the record under the same lock.
    pub fn transition(
        &self,
        id: &str,
        expected: WorkflowStatus,
        to: WorkflowStatus,
        update: impl FnOnce(&mut Workflow),
    ) -> Result<Workflow, ObserverError> {
        let mut entry = self
            .workflows
            .get_mut(id)
            .ok_or_else(|| ObserverError::NotFound(id.to_string()))?;

        if entry.status != expected {
            return Err(ObserverError::InvalidTransition {
                id: id.to_string(),
                expected,
                actual: entry.status,
            });
        }

        entry.status = to;
        update(&mut entry);
        Ok(entry.clone())
    }

    /// Pending workflows, newest first
    pub fn pending(&self) -> Vec<Workflow> {
        let mut pending: Vec<Workflow> = self
            .workflows
            .iter()
            .filter(|e| e.value().status == WorkflowStatus::Pending)
            .map(|e| e.value().clone())
            .collect();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        pending
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }

    /// Drop terminal workflows older than `retention`. Non-terminal entries
    /// are never pruned.
    pub fn prune_terminal(&self, now: DateTime<Utc>, retention: Duration) -> usize {
        let cutoff = now - retention;
        let before = self.workflows.len();
        self.workflows
            .retain(|_, w| !(w.status.is_terminal() && w.created_at < cutoff));
        before - self.workflows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Anomaly, Severity};

    fn anomaly(service: &str, metric: &str) -> Anomaly {
        Anomaly {
            service: service.to_string(),
            metric: metric.to_string(),
            detected_at: Utc::now(),
            current_value: 1250.5,
            baseline_mean: 250.0,
            baseline_std: 50.0,
            sigma_deviation: 20.0,
            severity: Severity::Sev1,
            anomaly_type: Anomaly::TYPE_STATISTICAL.to_string(),
        }
    }

    fn workflow_at(service: &str, metric: &str, created_at: DateTime<Utc>) -> Workflow {
        Workflow::new(anomaly(service, metric), vec![], created_at)
    }

    #[test]
    fn test_cooldown_blocks_same_pair() {
        let store = WorkflowStore::new();
        let now = Utc::now();
        store.insert(workflow_at("api-gateway", "p99_latency", now));

        assert!(store.has_active_for("api-gateway", "p99_latency", now, Duration::minutes(30)));
        assert!(!store.has_active_for("api-gateway", "error_rate", now, Duration::minutes(30)));
        assert!(!store.has_active_for("checkout", "p99_latency", now, Duration::minutes(30)));
    }

    #[test]
    fn test_cooldown_expires() {
        let store = WorkflowStore::new();
        let now = Utc::now();
        store.insert(workflow_at(
            "api-gateway",
            "p99_latency",
            now - Duration::minutes(45),
        ));

        assert!(!store.has_active_for("api-gateway", "p99_latency", now, Duration::minutes(30)));
    }

    #[test]
    fn test_terminal_workflow_does_not_block() {
        let store = WorkflowStore::new();
        let now = Utc::now();
        let wf = workflow_at("api-gateway", "p99_latency", now);
        let id = wf.id.clone();
        store.insert(wf);

        store
            .transition(&id, WorkflowStatus::Pending, WorkflowStatus::Rejected, |_| {})
            .unwrap();

        assert!(!store.has_active_for("api-gateway", "p99_latency", now, Duration::minutes(30)));
    }

    #[test]
    fn test_transition_unknown_id() {
        let store = WorkflowStore::new();
        let err = store
            .transition("wf-missing", WorkflowStatus::Pending, WorkflowStatus::Approved, |_| {})
            .unwrap_err();
        assert!(matches!(err, ObserverError::NotFound(_)));
    }

    #[test]
    fn test_transition_is_guarded_by_expected_state() {
        let store = WorkflowStore::new();
        let wf = workflow_at("svc", "m", Utc::now());
        let id = wf.id.clone();
        store.insert(wf);

        store
            .transition(&id, WorkflowStatus::Pending, WorkflowStatus::Approved, |_| {})
            .unwrap();

        // A second decision observes the new state and is refused
        let err = store
            .transition(&id, WorkflowStatus::Pending, WorkflowStatus::Rejected, |_| {})
            .unwrap_err();
        match err {
            ObserverError::InvalidTransition { actual, .. } => {
                assert_eq!(actual, WorkflowStatus::Approved)
            }
            other => panic!("expected InvalidTransition, got {:?}", other),
        }

        // State unchanged by the refused call
        assert_eq!(store.get(&id).unwrap().status, WorkflowStatus::Approved);
    }

    #[test]
    fn test_prune_keeps_recent_and_non_terminal() {
        let store = WorkflowStore::new();
        let now = Utc::now();

        let old_done = workflow_at("a", "m", now - Duration::hours(48));
        let old_done_id = old_done.id.clone();
        store.insert(old_done);
        store
            .transition(
                &old_done_id,
                WorkflowStatus::Pending,
                WorkflowStatus::Completed,
                |_| {},
            )
            .unwrap();

        let old_pending = workflow_at("b", "m", now - Duration::hours(48));
        let old_pending_id = old_pending.id.clone();
        store.insert(old_pending);

        let pruned = store.prune_terminal(now, Duration::hours(24));
        assert_eq!(pruned, 1);
        assert!(store.get(&old_done_id).is_none());
        assert!(store.get(&old_pending_id).is_some());
    }

    #[test]
    fn test_pending_sorted_newest_first() {
        let store = WorkflowStore::new();
        let now = Utc::now();
        store.insert(workflow_at("a", "m", now - Duration::minutes(10)));
        store.insert(workflow_at("b", "m", now));

        let pending = store.pending();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].anomaly.service, "b");
    }
}
