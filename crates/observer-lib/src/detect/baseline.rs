//! Baseline estimation
//!
//! Computes trailing-window statistics for one (service, metric) pair. The
//! baseline is always derived fresh from a full window rather than updated
//! incrementally, so a partial failure on one tick cannot drift the next.

use crate::models::{Baseline, MetricWindow};

/// Compute mean and population standard deviation over a baseline window.
///
/// Returns `None` when the window has no samples at all; callers apply their
/// own minimum-sample-count policy on top of `sample_count`.
pub fn estimate_baseline(window: &MetricWindow) -> Option<Baseline> {
    let count = window.samples.len();
    if count == 0 {
        return None;
    }

    let sum: f64 = window.values().sum();
    let mean = sum / count as f64;

    let variance = window
        .values()
        .map(|v| (v - mean).powi(2))
        .sum::<f64>()
        / count as f64;

    Some(Baseline {
        mean,
        std_dev: variance.sqrt(),
        sample_count: count,
    })
}
