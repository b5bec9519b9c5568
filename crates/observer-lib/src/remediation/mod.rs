//! Remediation integrations
//!
//! Five external capabilities the orchestrator invokes from the `executing`
//! state: register-incident, search-code, open-fix-request, notify-team and
//! create-ticket. Each takes a typed draft and returns a typed reference, so
//! later steps declare exactly which earlier outputs they consume.

mod http;

pub use http::{HttpRemediation, RemediationEndpoints};

use crate::error::StepError;
use crate::models::{
    CodeSearch, FixRequestRef, IncidentRecord, NotificationReceipt, Severity, TicketRef,
};
pub use async_trait::async_trait;

/// Input for the register-incident step
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IncidentDraft {
    pub title: String,
    pub service: String,
    pub severity: Severity,
    pub description: String,
}

/// Input for the search-code step
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CodeSearchQuery {
    /// Path pattern, seeded by the top suspect's files or derived from the
    /// metric name when no suspect was identified
    pub pattern: String,
}

/// Input for the open-fix-request step. Requires the incident id produced by
/// register-incident; the target file is the adaptive-override winner.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FixRequestDraft {
    pub title: String,
    pub incident_id: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_file: Option<String>,
}

/// Input for the notify-team step. References the incident id and, when one
/// was produced, the fix-request URL.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Notification {
    pub severity: Severity,
    pub incident_id: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix_request_url: Option<String>,
}

/// Input for the create-ticket step
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TicketDraft {
    pub summary: String,
    pub description: String,
    pub priority: String,
    pub incident_id: String,
}

/// Ticket priority derived from anomaly severity
pub fn ticket_priority(severity: Severity) -> &'static str {
    match severity {
        Severity::Sev1 => "Critical",
        Severity::Sev2 | Severity::Sev3 => "High",
    }
}

/// The remediation capability set, invoked only from `executing`.
///
/// An integration's timeout signal and its error are indistinguishable to the
/// orchestrator: both surface as a `StepError` and fail the workflow.
#[async_trait]
pub trait Remediation: Send + Sync {
    async fn register_incident(&self, draft: &IncidentDraft) -> Result<IncidentRecord, StepError>;

    async fn search_code(&self, query: &CodeSearchQuery) -> Result<CodeSearch, StepError>;

    async fn open_fix_request(&self, draft: &FixRequestDraft) -> Result<FixRequestRef, StepError>;

    async fn notify_team(&self, note: &Notification) -> Result<NotificationReceipt, StepError>;

    async fn create_ticket(&self, draft: &TicketDraft) -> Result<TicketRef, StepError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_priority_mapping() {
        assert_eq!(ticket_priority(Severity::Sev1), "Critical");
        assert_eq!(ticket_priority(Severity::Sev2), "High");
        assert_eq!(ticket_priority(Severity::Sev3), "High");
    }
}
