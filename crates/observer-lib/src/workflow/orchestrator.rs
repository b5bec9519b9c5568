//! Workflow orchestration
//!
//! Turns a detected anomaly into a pending workflow, records operator
//! decisions and drives the remediation sequence on approval. State only
//! ever changes through the store's compare-and-set transitions.

use super::WorkflowStore;
use crate::activity::ActivityLog;
use crate::error::{ObserverError, StepError};
use crate::models::{
    ActionKind, ActivityCategory, Anomaly, CompletedStep, Decision, ExecutionReport, FailedStep,
    Severity, StepOutput, SuspectCommit, Workflow, WorkflowStatus,
};
use crate::observability::ObserverMetrics;
use crate::remediation::{
    ticket_priority, CodeSearchQuery, FixRequestDraft, IncidentDraft, Notification, Remediation,
    TicketDraft,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

pub struct WorkflowOrchestrator {
    store: Arc<WorkflowStore>,
    remediation: Arc<dyn Remediation>,
    activity: Arc<ActivityLog>,
    metrics: ObserverMetrics,
    /// Minimum severity that proposes a workflow. Defaults to Sev-3, so every
    /// detected anomaly proposes one and severity only affects the label.
    auto_propose_floor: Severity,
    cooldown: chrono::Duration,
}

impl WorkflowOrchestrator {
    pub fn new(
        store: Arc<WorkflowStore>,
        remediation: Arc<dyn Remediation>,
        activity: Arc<ActivityLog>,
        cooldown: chrono::Duration,
    ) -> Self {
        Self {
            store,
            remediation,
            activity,
            metrics: ObserverMetrics::new(),
            auto_propose_floor: Severity::Sev3,
            cooldown,
        }
    }

    pub fn with_auto_propose_floor(mut self, floor: Severity) -> Self {
        self.auto_propose_floor = floor;
        self
    }

    /// Propose a workflow for an anomaly, or record it without one when the
    /// cooldown invariant forbids a duplicate.
    ///
    /// Returns the created workflow, or `None` when the anomaly was below the
    /// auto-propose floor or deduplicated against an active workflow for the
    /// same (service, metric).
    pub fn propose(
        &self,
        anomaly: &Anomaly,
        suspects: Vec<SuspectCommit>,
        now: chrono::DateTime<Utc>,
    ) -> Option<Workflow> {
        if anomaly.severity.rank() < self.auto_propose_floor.rank() {
            return None;
        }

        if self
            .store
            .has_active_for(&anomaly.service, &anomaly.metric, now, self.cooldown)
        {
            info!(
                service = %anomaly.service,
                metric = %anomaly.metric,
                "Anomaly recorded, workflow suppressed by cooldown"
            );
            return None;
        }

        let workflow = Workflow::new(anomaly.clone(), suspects, now);
        self.store.insert(workflow.clone());
        self.metrics.inc_workflows_created();

        info!(
            workflow_id = %workflow.id,
            service = %anomaly.service,
            metric = %anomaly.metric,
            severity = %anomaly.severity,
            "Workflow proposed, awaiting approval"
        );
        self.activity.record_event(
            ActivityCategory::Workflow,
            now,
            format!(
                "Proposed {} workflow {} for {}/{}",
                anomaly.severity, workflow.id, anomaly.service, anomaly.metric
            ),
            None,
        );

        Some(workflow)
    }

    /// Approve a pending workflow and run the remediation sequence.
    ///
    /// Fails with `NotFound` for an unknown id and `InvalidTransition` when
    /// the workflow is not pending. Exactly one of two racing decisions
    /// succeeds. The returned workflow carries the execution report.
    pub async fn approve(&self, id: &str, reason: &str) -> Result<Workflow, ObserverError> {
        let decided_at = Utc::now();
        let workflow = self.store.transition(
            id,
            WorkflowStatus::Pending,
            WorkflowStatus::Approved,
            |w| {
                w.decision = Some(Decision {
                    approved: true,
                    reason: reason.to_string(),
                    decided_at,
                });
            },
        )?;

        self.metrics.inc_workflows_approved();
        info!(workflow_id = %id, reason = %reason, "Workflow approved");
        self.activity.record_event(
            ActivityCategory::Workflow,
            decided_at,
            format!("Workflow {} approved: {}", id, reason),
            None,
        );

        // Approved moves straight into executing; once there, the attempt
        // runs to completed or failed regardless of scheduler run-state.
        self.store
            .transition(id, WorkflowStatus::Approved, WorkflowStatus::Executing, |_| {})?;

        let report = self.execute(&workflow).await;
        let succeeded = report.succeeded();

        let terminal = if succeeded {
            WorkflowStatus::Completed
        } else {
            WorkflowStatus::Failed
        };
        let finished = self
            .store
            .transition(id, WorkflowStatus::Executing, terminal, |w| {
                w.execution = Some(report);
            })?;

        if succeeded {
            info!(workflow_id = %id, "Workflow completed");
        } else {
            warn!(workflow_id = %id, "Workflow failed; partial results retained");
        }

        Ok(finished)
    }

    /// Reject a pending workflow. No remediation step ever runs for it; the
    /// reason is retained for audit.
    pub fn reject(&self, id: &str, reason: &str) -> Result<Workflow, ObserverError> {
        let decided_at = Utc::now();
        let workflow = self.store.transition(
            id,
            WorkflowStatus::Pending,
            WorkflowStatus::Rejected,
            |w| {
                w.decision = Some(Decision {
                    approved: false,
                    reason: reason.to_string(),
                    decided_at,
                });
            },
        )?;

        self.metrics.inc_workflows_rejected();
        info!(workflow_id = %id, reason = %reason, "Workflow rejected");
        self.activity.record_event(
            ActivityCategory::Workflow,
            decided_at,
            format!("Workflow {} rejected: {}", id, reason),
            None,
        );

        Ok(workflow)
    }

    /// Run the five-step sequence, threading each step's output into later
    /// ones. A step failure ends the attempt; earlier outputs are preserved.
    async fn execute(&self, workflow: &Workflow) -> ExecutionReport {
        let anomaly = &workflow.anomaly;
        let mut steps: Vec<CompletedStep> = Vec::with_capacity(ActionKind::PLAN.len());

        // Step 1: register-incident
        let draft = IncidentDraft {
            title: format!(
                "{} anomaly on {}/{}",
                anomaly.severity, anomaly.service, anomaly.metric
            ),
            service: anomaly.service.clone(),
            severity: anomaly.severity,
            description: format!(
                "{}.{} = {:.2} (baseline {:.2} ± {:.2}, {:.1}σ deviation)",
                anomaly.service,
                anomaly.metric,
                anomaly.current_value,
                anomaly.baseline_mean,
                anomaly.baseline_std,
                anomaly.sigma_deviation
            ),
        };
        let incident = match self.remediation.register_incident(&draft).await {
            Ok(incident) => incident,
            Err(e) => return self.fail(workflow, steps, ActionKind::RegisterIncident, e),
        };
        self.activity.record_event(
            ActivityCategory::Incident,
            Utc::now(),
            format!("Registered incident {}", incident.incident_id),
            incident.url.clone(),
        );
        steps.push(CompletedStep {
            action: ActionKind::RegisterIncident,
            output: StepOutput::RegisterIncident(incident.clone()),
        });

        // Step 2: search-code, seeded by the top suspect when one exists
        let suspect_file = workflow
            .suspects
            .first()
            .and_then(|s| s.commit.files.first())
            .cloned();
        let pattern = match &suspect_file {
            Some(file) => file.clone(),
            None => format!("*{}*", anomaly.metric),
        };
        let search = match self
            .remediation
            .search_code(&CodeSearchQuery { pattern })
            .await
        {
            Ok(search) => search,
            Err(e) => return self.fail(workflow, steps, ActionKind::SearchCode, e),
        };
        steps.push(CompletedStep {
            action: ActionKind::SearchCode,
            output: StepOutput::SearchCode(search.clone()),
        });

        // Adaptive override: a file the search actually found supersedes the
        // correlation-era guess.
        let target_file = search.target_file.or(suspect_file);

        // Step 3: open-fix-request
        let fix_draft = FixRequestDraft {
            title: format!("Fix: {} ({})", draft.title, incident.incident_id),
            incident_id: incident.incident_id.clone(),
            description: draft.description.clone(),
            target_file,
        };
        let fix_request = match self.remediation.open_fix_request(&fix_draft).await {
            Ok(fix) => fix,
            Err(e) => return self.fail(workflow, steps, ActionKind::OpenFixRequest, e),
        };
        self.activity.record_event(
            ActivityCategory::FixRequest,
            Utc::now(),
            format!("Opened fix request {}", fix_request.reference),
            fix_request.url.clone(),
        );
        steps.push(CompletedStep {
            action: ActionKind::OpenFixRequest,
            output: StepOutput::OpenFixRequest(fix_request.clone()),
        });

        // Step 4: notify-team, referencing the fix request
        let note = Notification {
            severity: anomaly.severity,
            incident_id: incident.incident_id.clone(),
            message: format!(
                "Incident {}: remediation proposed for {}/{}. Please review.",
                incident.incident_id, anomaly.service, anomaly.metric
            ),
            fix_request_url: fix_request.url.clone(),
        };
        let receipt = match self.remediation.notify_team(&note).await {
            Ok(receipt) => receipt,
            Err(e) => return self.fail(workflow, steps, ActionKind::NotifyTeam, e),
        };
        self.activity.record_event(
            ActivityCategory::Notification,
            Utc::now(),
            format!("Notified {} about {}", receipt.channel, incident.incident_id),
            None,
        );
        steps.push(CompletedStep {
            action: ActionKind::NotifyTeam,
            output: StepOutput::NotifyTeam(receipt),
        });

        // Step 5: create-ticket
        let ticket_draft = TicketDraft {
            summary: draft.title.clone(),
            description: draft.description.clone(),
            priority: ticket_priority(anomaly.severity).to_string(),
            incident_id: incident.incident_id.clone(),
        };
        let ticket = match self.remediation.create_ticket(&ticket_draft).await {
            Ok(ticket) => ticket,
            Err(e) => return self.fail(workflow, steps, ActionKind::CreateTicket, e),
        };
        self.activity.record_event(
            ActivityCategory::Ticket,
            Utc::now(),
            format!("Created ticket {}", ticket.key),
            ticket.url.clone(),
        );
        steps.push(CompletedStep {
            action: ActionKind::CreateTicket,
            output: StepOutput::CreateTicket(ticket),
        });

        ExecutionReport {
            steps,
            failed_step: None,
            finished_at: Utc::now(),
        }
    }

    fn fail(
        &self,
        workflow: &Workflow,
        steps: Vec<CompletedStep>,
        action: ActionKind,
        error: StepError,
    ) -> ExecutionReport {
        self.metrics.inc_remediation_step_failures();
        let failure = ObserverError::RemediationStepFailed {
            step: action,
            reason: error.to_string(),
        };
        warn!(
            workflow_id = %workflow.id,
            error = %failure,
            "Remediation step failed"
        );
        self.activity.record_event(
            ActivityCategory::Workflow,
            Utc::now(),
            format!("Workflow {}: {}", workflow.id, failure),
            None,
        );
        ExecutionReport {
            steps,
            failed_step: Some(FailedStep {
                action,
                reason: error.to_string(),
            }),
            finished_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CodeSearch, CommitRef, FixRequestRef, IncidentRecord, NotificationReceipt, TicketRef};
    use crate::remediation::async_trait;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted integration double: succeeds until `fail_at`, records every
    /// invocation and the drafts it received.
    struct ScriptedRemediation {
        fail_at: Option<ActionKind>,
        calls: AtomicUsize,
        search_target: Option<String>,
        seen_patterns: Mutex<Vec<String>>,
        seen_fix_files: Mutex<Vec<Option<String>>>,
    }

    impl ScriptedRemediation {
        fn succeeding() -> Self {
            Self {
                fail_at: None,
                calls: AtomicUsize::new(0),
                search_target: None,
                seen_patterns: Mutex::new(Vec::new()),
                seen_fix_files: Mutex::new(Vec::new()),
            }
        }

        fn failing_at(action: ActionKind) -> Self {
            Self {
                fail_at: Some(action),
                ..Self::succeeding()
            }
        }

        fn with_search_target(mut self, file: &str) -> Self {
            self.search_target = Some(file.to_string());
            self
        }

        fn check(&self, action: ActionKind) -> Result<(), StepError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_at == Some(action) {
                Err(StepError::new(format!("{} unavailable", action)))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl Remediation for ScriptedRemediation {
        async fn register_incident(
            &self,
            _draft: &IncidentDraft,
        ) -> Result<IncidentRecord, StepError> {
            self.check(ActionKind::RegisterIncident)?;
            Ok(IncidentRecord {
                incident_id: "INC-1001".to_string(),
                url: None,
            })
        }

        async fn search_code(&self, query: &CodeSearchQuery) -> Result<CodeSearch, StepError> {
            self.check(ActionKind::SearchCode)?;
            self.seen_patterns.lock().unwrap().push(query.pattern.clone());
            Ok(CodeSearch {
                files: self.search_target.iter().cloned().collect(),
                target_file: self.search_target.clone(),
            })
        }

        async fn open_fix_request(
            &self,
            draft: &FixRequestDraft,
        ) -> Result<FixRequestRef, StepError> {
            self.check(ActionKind::OpenFixRequest)?;
            self.seen_fix_files
                .lock()
                .unwrap()
                .push(draft.target_file.clone());
            Ok(FixRequestRef {
                reference: "PR-42".to_string(),
                url: Some("https://git.example.com/pr/42".to_string()),
                file: draft.target_file.clone(),
            })
        }

        async fn notify_team(&self, _note: &Notification) -> Result<NotificationReceipt, StepError> {
            self.check(ActionKind::NotifyTeam)?;
            Ok(NotificationReceipt {
                channel: "#war-room".to_string(),
            })
        }

        async fn create_ticket(&self, _draft: &TicketDraft) -> Result<TicketRef, StepError> {
            self.check(ActionKind::CreateTicket)?;
            Ok(TicketRef {
                key: "OPS-7".to_string(),
                url: None,
            })
        }
    }

    fn anomaly() -> Anomaly {
        Anomaly {
            service: "api-gateway".to_string(),
            metric: "p99_latency".to_string(),
            detected_at: Utc::now(),
            current_value: 1250.5,
            baseline_mean: 250.0,
            baseline_std: 50.0,
            sigma_deviation: 20.0,
            severity: Severity::Sev1,
            anomaly_type: Anomaly::TYPE_STATISTICAL.to_string(),
        }
    }

    fn suspect(file: &str) -> SuspectCommit {
        SuspectCommit {
            commit: CommitRef {
                sha: "abc1234".to_string(),
                author: "dev".to_string(),
                message: "tune cache".to_string(),
                authored_at: Utc::now(),
                files: vec![file.to_string()],
                url: None,
            },
            suspicion_score: 0.9,
        }
    }

    fn orchestrator(
        remediation: Arc<ScriptedRemediation>,
    ) -> (WorkflowOrchestrator, Arc<WorkflowStore>) {
        let store = Arc::new(WorkflowStore::new());
        let orchestrator = WorkflowOrchestrator::new(
            store.clone(),
            remediation,
            Arc::new(ActivityLog::default()),
            Duration::minutes(30),
        );
        (orchestrator, store)
    }

    #[tokio::test]
    async fn test_approve_runs_all_five_steps() {
        let remediation = Arc::new(ScriptedRemediation::succeeding());
        let (orchestrator, _store) = orchestrator(remediation.clone());

        let wf = orchestrator.propose(&anomaly(), vec![], Utc::now()).unwrap();
        let finished = orchestrator.approve(&wf.id, "ok").await.unwrap();

        assert_eq!(finished.status, WorkflowStatus::Completed);
        let report = finished.execution.unwrap();
        assert!(report.succeeded());
        assert_eq!(report.steps.len(), 5);

        // No suspects: the search pattern derives from the metric name
        let patterns = remediation.seen_patterns.lock().unwrap();
        assert_eq!(patterns[0], "*p99_latency*");
    }

    #[tokio::test]
    async fn test_third_step_failure_retains_first_two() {
        let remediation = Arc::new(ScriptedRemediation::failing_at(ActionKind::OpenFixRequest));
        let (orchestrator, _store) = orchestrator(remediation);

        let wf = orchestrator.propose(&anomaly(), vec![], Utc::now()).unwrap();
        let finished = orchestrator.approve(&wf.id, "ok").await.unwrap();

        assert_eq!(finished.status, WorkflowStatus::Failed);
        let report = finished.execution.unwrap();
        assert_eq!(report.steps.len(), 2);
        assert_eq!(report.steps[0].action, ActionKind::RegisterIncident);
        assert_eq!(report.steps[1].action, ActionKind::SearchCode);

        let failed = report.failed_step.unwrap();
        assert_eq!(failed.action, ActionKind::OpenFixRequest);
        assert!(failed.reason.contains("unavailable"));
    }

    #[tokio::test]
    async fn test_reject_never_invokes_integrations() {
        let remediation = Arc::new(ScriptedRemediation::succeeding());
        let (orchestrator, _store) = orchestrator(remediation.clone());

        let wf = orchestrator.propose(&anomaly(), vec![], Utc::now()).unwrap();
        let rejected = orchestrator.reject(&wf.id, "false positive").unwrap();

        assert_eq!(rejected.status, WorkflowStatus::Rejected);
        assert_eq!(rejected.decision.unwrap().reason, "false positive");
        assert_eq!(remediation.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_decision_is_effective_exactly_once() {
        let remediation = Arc::new(ScriptedRemediation::succeeding());
        let (orchestrator, store) = orchestrator(remediation);

        let wf = orchestrator.propose(&anomaly(), vec![], Utc::now()).unwrap();
        orchestrator.approve(&wf.id, "ok").await.unwrap();

        let err = orchestrator.approve(&wf.id, "again").await.unwrap_err();
        assert!(matches!(err, ObserverError::InvalidTransition { .. }));
        let err = orchestrator.reject(&wf.id, "no").unwrap_err();
        assert!(matches!(err, ObserverError::InvalidTransition { .. }));

        // Terminal state unchanged by the refused calls
        assert_eq!(
            store.get(&wf.id).unwrap().status,
            WorkflowStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_unknown_workflow_id() {
        let remediation = Arc::new(ScriptedRemediation::succeeding());
        let (orchestrator, _store) = orchestrator(remediation);

        assert!(matches!(
            orchestrator.approve("wf-missing", "ok").await.unwrap_err(),
            ObserverError::NotFound(_)
        ));
        assert!(matches!(
            orchestrator.reject("wf-missing", "no").unwrap_err(),
            ObserverError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_cooldown_dedup_then_expiry() {
        let remediation = Arc::new(ScriptedRemediation::succeeding());
        let (orchestrator, store) = orchestrator(remediation);

        let t0 = Utc::now();
        assert!(orchestrator.propose(&anomaly(), vec![], t0).is_some());
        // Second anomaly for the same pair inside the cooldown: recorded but
        // no new workflow
        assert!(orchestrator
            .propose(&anomaly(), vec![], t0 + Duration::minutes(10))
            .is_none());
        assert_eq!(store.len(), 1);

        // Third anomaly after cooldown expiry creates a new workflow
        assert!(orchestrator
            .propose(&anomaly(), vec![], t0 + Duration::minutes(31))
            .is_some());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_search_result_supersedes_suspect_file() {
        let remediation = Arc::new(
            ScriptedRemediation::succeeding().with_search_target("src/cache/warmup.rs"),
        );
        let (orchestrator, _store) = orchestrator(remediation.clone());

        let wf = orchestrator
            .propose(&anomaly(), vec![suspect("src/handlers/checkout.rs")], Utc::now())
            .unwrap();
        orchestrator.approve(&wf.id, "ok").await.unwrap();

        // Pattern seeded by the suspect's file, fix request targets the file
        // the search discovered
        let patterns = remediation.seen_patterns.lock().unwrap();
        assert_eq!(patterns[0], "src/handlers/checkout.rs");
        let files = remediation.seen_fix_files.lock().unwrap();
        assert_eq!(files[0].as_deref(), Some("src/cache/warmup.rs"));
    }

    #[tokio::test]
    async fn test_suspect_file_used_when_search_finds_nothing() {
        let remediation = Arc::new(ScriptedRemediation::succeeding());
        let (orchestrator, _store) = orchestrator(remediation.clone());

        let wf = orchestrator
            .propose(&anomaly(), vec![suspect("src/handlers/checkout.rs")], Utc::now())
            .unwrap();
        orchestrator.approve(&wf.id, "ok").await.unwrap();

        let files = remediation.seen_fix_files.lock().unwrap();
        assert_eq!(files[0].as_deref(), Some("src/handlers/checkout.rs"));
    }

    #[tokio::test]
    async fn test_auto_propose_floor_filters_low_severity() {
        let remediation = Arc::new(ScriptedRemediation::succeeding());
        let store = Arc::new(WorkflowStore::new());
        let orchestrator = WorkflowOrchestrator::new(
            store.clone(),
            remediation,
            Arc::new(ActivityLog::default()),
            Duration::minutes(30),
        )
        .with_auto_propose_floor(Severity::Sev1);

        let mut low = anomaly();
        low.severity = Severity::Sev3;
        low.sigma_deviation = 3.5;

        assert!(orchestrator.propose(&low, vec![], Utc::now()).is_none());
        assert!(store.is_empty());
        assert!(orchestrator.propose(&anomaly(), vec![], Utc::now()).is_some());
    }
}
