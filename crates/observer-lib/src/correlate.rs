//! Commit correlation
//!
//! Ranks recently observed code changes by temporal proximity to an anomaly.
//! The heuristic is deliberately simple: the closer a commit landed to the
//! anomaly, the more suspicious it is. Scores decay linearly across the
//! correlation window and the ranking is fully deterministic for a given
//! input set.

use crate::models::{CommitRef, SuspectCommit};
use chrono::{DateTime, Duration, Utc};

/// Default lookback before the anomaly timestamp (2 hours)
pub const DEFAULT_CORRELATION_WINDOW_SECS: i64 = 2 * 60 * 60;

#[derive(Debug, Clone)]
pub struct CommitCorrelator {
    /// Window extends from `anomaly_at - lookback` to `anomaly_at`
    pub lookback: Duration,
}

impl Default for CommitCorrelator {
    fn default() -> Self {
        Self {
            lookback: Duration::seconds(DEFAULT_CORRELATION_WINDOW_SECS),
        }
    }
}

impl CommitCorrelator {
    pub fn new(lookback: Duration) -> Self {
        Self { lookback }
    }

    /// Rank commits inside the window by suspicion.
    ///
    /// A commit at the anomaly timestamp scores 1.0; one at the window's
    /// start boundary scores 0.0. Commits outside the window are dropped.
    /// An empty result is a normal outcome, not an error: downstream treats
    /// it as "no suspect identified".
    pub fn rank(&self, anomaly_at: DateTime<Utc>, commits: &[CommitRef]) -> Vec<SuspectCommit> {
        let window_start = anomaly_at - self.lookback;
        let span_secs = self.lookback.num_milliseconds() as f64 / 1000.0;
        if span_secs <= 0.0 {
            return Vec::new();
        }

        let mut suspects: Vec<SuspectCommit> = commits
            .iter()
            .filter(|c| c.authored_at >= window_start && c.authored_at <= anomaly_at)
            .map(|c| {
                let age_secs =
                    (anomaly_at - c.authored_at).num_milliseconds() as f64 / 1000.0;
                let suspicion_score = (1.0 - age_secs / span_secs).clamp(0.0, 1.0);
                SuspectCommit {
                    commit: c.clone(),
                    suspicion_score,
                }
            })
            .collect();

        // Score descending; ties break by authored time descending, then by
        // sha, so equal inputs always rank identically.
        suspects.sort_by(|a, b| {
            b.suspicion_score
                .partial_cmp(&a.suspicion_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.commit.authored_at.cmp(&a.commit.authored_at))
                .then_with(|| a.commit.sha.cmp(&b.commit.sha))
        });

        suspects
    }
}
