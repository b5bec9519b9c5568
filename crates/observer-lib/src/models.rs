//! Core data models for the observer engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single time-series sample
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Samples for one (service, metric) pair over a requested interval.
///
/// Produced per query by the metric source adapter; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricWindow {
    pub service: String,
    pub metric: String,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub samples: Vec<MetricSample>,
}

impl MetricWindow {
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.value)
    }

    /// Largest sample value in the window
    pub fn max_value(&self) -> Option<f64> {
        self.values()
            .max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Trailing-window statistics for one (service, metric) pair.
///
/// Recomputed from a fresh window on every tick; there is no incremental
/// mutation path, so a partially failed tick cannot leave a drifted baseline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Baseline {
    pub mean: f64,
    pub std_dev: f64,
    pub sample_count: usize,
}

/// Anomaly severity, derived strictly from the sigma deviation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    #[serde(rename = "Sev-1")]
    Sev1,
    #[serde(rename = "Sev-2")]
    Sev2,
    #[serde(rename = "Sev-3")]
    Sev3,
}

impl Severity {
    /// Map a sigma deviation to a severity tier. Callers only invoke this for
    /// deviations that already crossed the detection threshold, so anything
    /// below the named bounds is the lowest tier.
    pub fn for_deviation(sigma: f64) -> Self {
        if sigma >= 5.0 {
            Severity::Sev1
        } else if sigma >= 4.0 {
            Severity::Sev2
        } else {
            Severity::Sev3
        }
    }

    /// Higher rank = more severe, for auto-propose floor comparisons
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Sev1 => 3,
            Severity::Sev2 => 2,
            Severity::Sev3 => 1,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Sev1 => write!(f, "Sev-1"),
            Severity::Sev2 => write!(f, "Sev-2"),
            Severity::Sev3 => write!(f, "Sev-3"),
        }
    }
}

/// A statistically significant deviation detected on one tick.
///
/// Immutable once created; retained in a bounded recent-anomalies buffer for
/// status display and handed to the workflow orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub service: String,
    pub metric: String,
    pub detected_at: DateTime<Utc>,
    /// Max of the short current window
    pub current_value: f64,
    pub baseline_mean: f64,
    pub baseline_std: f64,
    pub sigma_deviation: f64,
    pub severity: Severity,
    #[serde(rename = "type")]
    pub anomaly_type: String,
}

impl Anomaly {
    pub const TYPE_STATISTICAL: &'static str = "statistical_anomaly";
}

/// A code change observed by the commit source adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRef {
    pub sha: String,
    pub author: String,
    pub message: String,
    pub authored_at: DateTime<Utc>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A commit ranked as a possible root cause of an anomaly
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspectCommit {
    #[serde(flatten)]
    pub commit: CommitRef,
    /// Higher = more likely cause, in [0, 1]
    pub suspicion_score: f64,
}

/// The remediation actions a workflow proposes, in execution order.
///
/// The order is a contract: later actions may reference artifacts produced by
/// earlier ones (the notification carries the fix-request URL, the ticket
/// carries the incident id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    RegisterIncident,
    SearchCode,
    OpenFixRequest,
    NotifyTeam,
    CreateTicket,
}

impl ActionKind {
    pub const PLAN: [ActionKind; 5] = [
        ActionKind::RegisterIncident,
        ActionKind::SearchCode,
        ActionKind::OpenFixRequest,
        ActionKind::NotifyTeam,
        ActionKind::CreateTicket,
    ];
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ActionKind::RegisterIncident => "register-incident",
            ActionKind::SearchCode => "search-code",
            ActionKind::OpenFixRequest => "open-fix-request",
            ActionKind::NotifyTeam => "notify-team",
            ActionKind::CreateTicket => "create-ticket",
        };
        write!(f, "{}", name)
    }
}

/// Workflow lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Pending,
    Approved,
    Rejected,
    Executing,
    Completed,
    Failed,
}

impl WorkflowStatus {
    /// Terminal states accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowStatus::Rejected | WorkflowStatus::Completed | WorkflowStatus::Failed
        )
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WorkflowStatus::Pending => "pending",
            WorkflowStatus::Approved => "approved",
            WorkflowStatus::Rejected => "rejected",
            WorkflowStatus::Executing => "executing",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Operator decision recorded on approve/reject
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub approved: bool,
    pub reason: String,
    pub decided_at: DateTime<Utc>,
}

/// Output of the register-incident step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentRecord {
    pub incident_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Output of the search-code step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeSearch {
    pub files: Vec<String>,
    /// Best match; supersedes any file implied by commit correlation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_file: Option<String>,
}

/// Output of the open-fix-request step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixRequestRef {
    pub reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Output of the notify-team step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationReceipt {
    pub channel: String,
}

/// Output of the create-ticket step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketRef {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Typed output of one remediation step.
///
/// Replaces the untyped payload dict the steps would otherwise pass around:
/// each later step declares exactly which earlier output fields it reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "kebab-case")]
pub enum StepOutput {
    RegisterIncident(IncidentRecord),
    SearchCode(CodeSearch),
    OpenFixRequest(FixRequestRef),
    NotifyTeam(NotificationReceipt),
    CreateTicket(TicketRef),
}

/// One successfully executed remediation step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedStep {
    pub action: ActionKind,
    pub output: StepOutput,
}

/// The step that ended an execution, and why
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedStep {
    pub action: ActionKind,
    pub reason: String,
}

/// Outcome of one execution attempt.
///
/// Partial success is preserved: steps that completed before a failure keep
/// their outputs here. Execution is a single irreversible attempt; a failed
/// workflow is re-triggered by a fresh anomaly/approval cycle, never resumed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub steps: Vec<CompletedStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<FailedStep>,
    pub finished_at: DateTime<Utc>,
}

impl ExecutionReport {
    pub fn succeeded(&self) -> bool {
        self.failed_step.is_none()
    }

    pub fn output_for(&self, action: ActionKind) -> Option<&StepOutput> {
        self.steps
            .iter()
            .find(|s| s.action == action)
            .map(|s| &s.output)
    }
}

/// The proposed-then-gated autonomous remediation sequence for one anomaly
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    #[serde(rename = "type")]
    pub workflow_type: String,
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
    pub anomaly: Anomaly,
    pub suspects: Vec<SuspectCommit>,
    pub actions: Vec<ActionKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionReport>,
}

impl Workflow {
    pub const TYPE_INCIDENT_RESPONSE: &'static str = "autonomous_incident_response";

    /// Derive an opaque id from creation time plus the anomaly fingerprint
    pub fn derive_id(created_at: DateTime<Utc>, service: &str, metric: &str) -> String {
        let fingerprint: String = format!("{}-{}", service, metric)
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        format!("wf-{}-{}", created_at.timestamp_millis(), fingerprint)
    }

    pub fn new(anomaly: Anomaly, suspects: Vec<SuspectCommit>, created_at: DateTime<Utc>) -> Self {
        let id = Self::derive_id(created_at, &anomaly.service, &anomaly.metric);
        Self {
            id,
            workflow_type: Self::TYPE_INCIDENT_RESPONSE.to_string(),
            status: WorkflowStatus::Pending,
            created_at,
            anomaly,
            suspects,
            actions: ActionKind::PLAN.to_vec(),
            decision: None,
            execution: None,
        }
    }
}

/// Integration categories for activity entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityCategory {
    Detector,
    Workflow,
    Incident,
    FixRequest,
    Notification,
    Ticket,
}

impl std::fmt::Display for ActivityCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ActivityCategory::Detector => "detector",
            ActivityCategory::Workflow => "workflow",
            ActivityCategory::Incident => "incident",
            ActivityCategory::FixRequest => "fix_request",
            ActivityCategory::Notification => "notification",
            ActivityCategory::Ticket => "ticket",
        };
        write!(f, "{}", name)
    }
}

/// One append-only entry in the merged activity feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub category: ActivityCategory,
    pub timestamp: DateTime<Utc>,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_tiers() {
        assert_eq!(Severity::for_deviation(5.0), Severity::Sev1);
        assert_eq!(Severity::for_deviation(20.0), Severity::Sev1);
        assert_eq!(Severity::for_deviation(4.999), Severity::Sev2);
        assert_eq!(Severity::for_deviation(4.0), Severity::Sev2);
        assert_eq!(Severity::for_deviation(3.0001), Severity::Sev3);
    }

    #[test]
    fn test_severity_rank_ordering() {
        assert!(Severity::Sev1.rank() > Severity::Sev2.rank());
        assert!(Severity::Sev2.rank() > Severity::Sev3.rank());
    }

    #[test]
    fn test_terminal_states() {
        assert!(WorkflowStatus::Rejected.is_terminal());
        assert!(WorkflowStatus::Completed.is_terminal());
        assert!(WorkflowStatus::Failed.is_terminal());
        assert!(!WorkflowStatus::Pending.is_terminal());
        assert!(!WorkflowStatus::Approved.is_terminal());
        assert!(!WorkflowStatus::Executing.is_terminal());
    }

    #[test]
    fn test_workflow_id_is_sanitized() {
        let at = Utc::now();
        let id = Workflow::derive_id(at, "api/gateway", "p99.latency");
        assert!(id.starts_with("wf-"));
        assert!(!id.contains('/'));
        assert!(!id.contains('.'));
    }

    #[test]
    fn test_action_plan_order() {
        let plan = ActionKind::PLAN;
        assert_eq!(plan[0], ActionKind::RegisterIncident);
        assert_eq!(plan[1], ActionKind::SearchCode);
        assert_eq!(plan[2], ActionKind::OpenFixRequest);
        assert_eq!(plan[3], ActionKind::NotifyTeam);
        assert_eq!(plan[4], ActionKind::CreateTicket);
    }

    #[test]
    fn test_wire_labels() {
        // The API and CLI share these exact labels
        assert_eq!(
            serde_json::to_string(&Severity::Sev1).unwrap(),
            "\"Sev-1\""
        );
        assert_eq!(
            serde_json::to_string(&WorkflowStatus::Pending).unwrap(),
            "\"pending\""
        );
        assert_eq!(
            serde_json::to_string(&ActionKind::OpenFixRequest).unwrap(),
            "\"open-fix-request\""
        );
        assert_eq!(
            serde_json::to_string(&ActivityCategory::FixRequest).unwrap(),
            "\"fix_request\""
        );
    }

    #[test]
    fn test_anomaly_type_field_name() {
        let anomaly = Anomaly {
            service: "api-gateway".to_string(),
            metric: "p99_latency".to_string(),
            detected_at: Utc::now(),
            current_value: 1250.5,
            baseline_mean: 250.0,
            baseline_std: 50.0,
            sigma_deviation: 20.0,
            severity: Severity::Sev1,
            anomaly_type: Anomaly::TYPE_STATISTICAL.to_string(),
        };
        let json: serde_json::Value = serde_json::to_value(&anomaly).unwrap();
        assert_eq!(json["type"], "statistical_anomaly");
        assert_eq!(json["severity"], "Sev-1");
    }

    #[test]
    fn test_max_value_on_empty_window() {
        let window = MetricWindow {
            service: "svc".to_string(),
            metric: "latency".to_string(),
            from: Utc::now(),
            to: Utc::now(),
            samples: vec![],
        };
        assert!(window.max_value().is_none());
    }
}
