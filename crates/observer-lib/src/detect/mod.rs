//! Statistical anomaly detection
//!
//! This module turns raw metric windows into detection decisions:
//! - Baseline estimation (trailing-window mean and standard deviation)
//! - Sigma-deviation evaluation against a configurable threshold
//! - Severity tiering derived strictly from the deviation

mod baseline;
mod detector;

pub use baseline::estimate_baseline;
pub use detector::{AnomalyDetector, Detection, SkipReason};
