//! HTTP implementations of the source adapters

use super::{async_trait, CommitSource, MetricSource};
use crate::error::ObserverError;
use crate::models::{CommitRef, MetricSample, MetricWindow};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

const QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Wire shape of a metric query response
#[derive(Debug, Deserialize)]
struct MetricQueryResponse {
    samples: Vec<MetricSample>,
}

/// Metric source adapter against a REST metric store.
///
/// `GET {base}/api/metrics/query?service=..&metric=..&from=..&to=..`
pub struct HttpMetricSource {
    client: Client,
    base_url: Url,
}

impl HttpMetricSource {
    pub fn new(base_url: &str) -> Result<Self, ObserverError> {
        let client = Client::builder()
            .timeout(QUERY_TIMEOUT)
            .build()
            .map_err(|e| ObserverError::SourceUnavailable(e.to_string()))?;
        let base_url = Url::parse(base_url)
            .map_err(|e| ObserverError::SourceUnavailable(format!("invalid base URL: {}", e)))?;
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl MetricSource for HttpMetricSource {
    async fn query(
        &self,
        service: &str,
        metric: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<MetricWindow, ObserverError> {
        let mut url = self
            .base_url
            .join("/api/metrics/query")
            .map_err(|e| ObserverError::SourceUnavailable(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("service", service)
            .append_pair("metric", metric)
            .append_pair("from", &from.to_rfc3339())
            .append_pair("to", &to.to_rfc3339());

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ObserverError::SourceUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ObserverError::SourceUnavailable(format!(
                "metric store returned {}",
                response.status()
            )));
        }

        let body: MetricQueryResponse = response
            .json()
            .await
            .map_err(|e| ObserverError::SourceUnavailable(e.to_string()))?;

        if body.samples.is_empty() {
            return Err(ObserverError::EmptyResult {
                service: service.to_string(),
                metric: metric.to_string(),
            });
        }

        Ok(MetricWindow {
            service: service.to_string(),
            metric: metric.to_string(),
            from,
            to,
            samples: body.samples,
        })
    }
}

/// Wire shape of one commit in the listing response
#[derive(Debug, Deserialize)]
struct CommitListingEntry {
    sha: String,
    author: String,
    message: String,
    authored_at: DateTime<Utc>,
    #[serde(default)]
    files: Vec<String>,
    #[serde(default)]
    url: Option<String>,
}

/// Commit source adapter against a repository-hosting API.
///
/// `GET {base}/api/commits?since=..&until=..`
pub struct HttpCommitSource {
    client: Client,
    base_url: Url,
}

impl HttpCommitSource {
    pub fn new(base_url: &str) -> Result<Self, ObserverError> {
        let client = Client::builder()
            .timeout(QUERY_TIMEOUT)
            .build()
            .map_err(|e| ObserverError::SourceUnavailable(e.to_string()))?;
        let base_url = Url::parse(base_url)
            .map_err(|e| ObserverError::SourceUnavailable(format!("invalid base URL: {}", e)))?;
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl CommitSource for HttpCommitSource {
    async fn recent_commits(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CommitRef>, ObserverError> {
        let mut url = self
            .base_url
            .join("/api/commits")
            .map_err(|e| ObserverError::SourceUnavailable(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("since", &from.to_rfc3339())
            .append_pair("until", &to.to_rfc3339());

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ObserverError::SourceUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ObserverError::SourceUnavailable(format!(
                "commit listing returned {}",
                response.status()
            )));
        }

        let entries: Vec<CommitListingEntry> = response
            .json()
            .await
            .map_err(|e| ObserverError::SourceUnavailable(e.to_string()))?;

        Ok(entries
            .into_iter()
            .map(|e| CommitRef {
                sha: e.sha,
                author: e.author,
                message: e.message,
                authored_at: e.authored_at,
                files: e.files,
                url: e.url,
            })
            .collect())
    }
}
