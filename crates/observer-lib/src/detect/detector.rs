//! Sigma-deviation anomaly detection

use super::estimate_baseline;
use crate::models::{Anomaly, MetricWindow, Severity};
use chrono::{DateTime, Utc};

/// Minimum baseline samples required by default
pub const DEFAULT_MIN_SAMPLES: usize = 2;

/// Default detection threshold (3 sigma)
pub const DEFAULT_SIGMA_THRESHOLD: f64 = 3.0;

/// Outcome of evaluating one (service, metric) pair on one tick
#[derive(Debug, Clone)]
pub enum Detection {
    /// Deviation crossed the threshold
    Anomalous(Anomaly),
    /// Signal present, deviation within the threshold
    Normal { sigma_deviation: f64 },
    /// Not enough signal to decide; not an error
    Skipped(SkipReason),
}

/// Why detection was skipped for a pair this tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Fewer baseline samples than the configured minimum
    InsufficientSamples { have: usize, need: usize },
    /// Baseline standard deviation is zero; no deviation is computable
    ZeroVariance,
    /// The short current window carried no samples
    EmptyCurrentWindow,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::InsufficientSamples { have, need } => {
                write!(f, "insufficient baseline: {} samples, need {}", have, need)
            }
            SkipReason::ZeroVariance => write!(f, "baseline standard deviation is zero"),
            SkipReason::EmptyCurrentWindow => write!(f, "current window has no samples"),
        }
    }
}

/// Detects deviations of the current window against a trailing baseline
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    /// Number of standard deviations that raises an anomaly (strict `>`)
    pub sigma_threshold: f64,
    /// Minimum baseline samples before detection is attempted
    pub min_samples: usize,
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self {
            sigma_threshold: DEFAULT_SIGMA_THRESHOLD,
            min_samples: DEFAULT_MIN_SAMPLES,
        }
    }
}

impl AnomalyDetector {
    pub fn new(sigma_threshold: f64, min_samples: usize) -> Self {
        Self {
            sigma_threshold,
            min_samples,
        }
    }

    /// Evaluate one pair: baseline window vs the short current window.
    ///
    /// The current representative is the max of the current window, so a
    /// short spike inside the window is not averaged away.
    pub fn evaluate(
        &self,
        baseline_window: &MetricWindow,
        current_window: &MetricWindow,
        detected_at: DateTime<Utc>,
    ) -> Detection {
        let baseline = match estimate_baseline(baseline_window) {
            Some(b) if b.sample_count >= self.min_samples => b,
            Some(b) => {
                return Detection::Skipped(SkipReason::InsufficientSamples {
                    have: b.sample_count,
                    need: self.min_samples,
                })
            }
            None => {
                return Detection::Skipped(SkipReason::InsufficientSamples {
                    have: 0,
                    need: self.min_samples,
                })
            }
        };

        // Divide-by-zero guard: a constant baseline can never deviate
        if baseline.std_dev <= f64::EPSILON {
            return Detection::Skipped(SkipReason::ZeroVariance);
        }

        let current = match current_window.max_value() {
            Some(v) => v,
            None => return Detection::Skipped(SkipReason::EmptyCurrentWindow),
        };

        let sigma_deviation = (current - baseline.mean).abs() / baseline.std_dev;

        if sigma_deviation > self.sigma_threshold {
            Detection::Anomalous(Anomaly {
                service: baseline_window.service.clone(),
                metric: baseline_window.metric.clone(),
                detected_at,
                current_value: current,
                baseline_mean: baseline.mean,
                baseline_std: baseline.std_dev,
                sigma_deviation,
                severity: Severity::for_deviation(sigma_deviation),
                anomaly_type: Anomaly::TYPE_STATISTICAL.to_string(),
            })
        } else {
            Detection::Normal { sigma_deviation }
        }
    }
}
