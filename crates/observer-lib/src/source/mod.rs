//! Source adapters
//!
//! Narrow contracts over the external systems the engine observes: a metric
//! store for time-series windows and a commit listing for recent code
//! changes. The engine only ever sees these traits; HTTP implementations
//! ship alongside for production wiring.

mod http;

pub use http::{HttpCommitSource, HttpMetricSource};

use crate::error::ObserverError;
use crate::models::{CommitRef, MetricWindow};
use chrono::{DateTime, Utc};
pub use async_trait::async_trait;

/// Fetches raw time-series samples for a (service, metric) pair
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Query samples covering [from, to]. Fails with `SourceUnavailable` on
    /// I/O problems and `EmptyResult` when the pair has no samples at all.
    async fn query(
        &self,
        service: &str,
        metric: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<MetricWindow, ObserverError>;
}

/// Lists code changes observed in a time window
#[async_trait]
pub trait CommitSource: Send + Sync {
    async fn recent_commits(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CommitRef>, ObserverError>;
}
