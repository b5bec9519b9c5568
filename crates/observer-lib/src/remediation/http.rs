//! HTTP-backed remediation integrations
//!
//! Each capability is a REST endpoint on the integration gateway. Request and
//! response bodies are the typed drafts/references from the trait; any
//! non-success status or transport error becomes a `StepError` with the body
//! preserved as the reason.

use super::{
    async_trait, CodeSearchQuery, FixRequestDraft, IncidentDraft, Notification, Remediation,
    TicketDraft,
};
use crate::error::StepError;
use crate::models::{CodeSearch, FixRequestRef, IncidentRecord, NotificationReceipt, TicketRef};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use url::Url;

/// Default per-step request timeout
const STEP_TIMEOUT: Duration = Duration::from_secs(120);

/// Endpoint paths on the integration gateway, relative to the base URL
#[derive(Debug, Clone)]
pub struct RemediationEndpoints {
    pub register_incident: String,
    pub search_code: String,
    pub open_fix_request: String,
    pub notify_team: String,
    pub create_ticket: String,
}

impl Default for RemediationEndpoints {
    fn default() -> Self {
        Self {
            register_incident: "/api/incidents/register".to_string(),
            search_code: "/api/code/search".to_string(),
            open_fix_request: "/api/fix-requests".to_string(),
            notify_team: "/api/notifications".to_string(),
            create_ticket: "/api/tickets".to_string(),
        }
    }
}

/// Remediation client against the REST integration gateway
pub struct HttpRemediation {
    client: Client,
    base_url: Url,
    endpoints: RemediationEndpoints,
}

impl HttpRemediation {
    pub fn new(base_url: &str) -> Result<Self, StepError> {
        let client = Client::builder()
            .timeout(STEP_TIMEOUT)
            .build()
            .map_err(|e| StepError::new(format!("failed to build HTTP client: {}", e)))?;
        let base_url = Url::parse(base_url)
            .map_err(|e| StepError::new(format!("invalid remediation base URL: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            endpoints: RemediationEndpoints::default(),
        })
    }

    pub fn with_endpoints(mut self, endpoints: RemediationEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, StepError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| StepError::new(format!("invalid endpoint path {}: {}", path, e)))?;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| StepError::new(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StepError::new(format!(
                "integration returned {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| StepError::new(format!("failed to parse response: {}", e)))
    }
}

#[async_trait]
impl Remediation for HttpRemediation {
    async fn register_incident(&self, draft: &IncidentDraft) -> Result<IncidentRecord, StepError> {
        self.post(&self.endpoints.register_incident, draft).await
    }

    async fn search_code(&self, query: &CodeSearchQuery) -> Result<CodeSearch, StepError> {
        self.post(&self.endpoints.search_code, query).await
    }

    async fn open_fix_request(&self, draft: &FixRequestDraft) -> Result<FixRequestRef, StepError> {
        self.post(&self.endpoints.open_fix_request, draft).await
    }

    async fn notify_team(&self, note: &Notification) -> Result<NotificationReceipt, StepError> {
        self.post(&self.endpoints.notify_team, note).await
    }

    async fn create_ticket(&self, draft: &TicketDraft) -> Result<TicketRef, StepError> {
        self.post(&self.endpoints.create_ticket, draft).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(HttpRemediation::new("not a url").is_err());
    }

    #[test]
    fn test_accepts_valid_base_url() {
        assert!(HttpRemediation::new("http://localhost:8001").is_ok());
    }
}
