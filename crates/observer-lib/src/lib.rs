//! Observer engine library
//!
//! This crate provides the core of the incident observer:
//! - Statistical anomaly detection over watched time-series
//! - Commit correlation for root-cause suspects
//! - The approval-gated remediation workflow state machine
//! - The scheduler/control loop and its status projections
//! - Health checks and observability

pub mod activity;
pub mod config;
pub mod correlate;
pub mod detect;
pub mod engine;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod remediation;
pub mod source;
pub mod workflow;

pub use config::{ObserverConfig, WatchTarget};
pub use engine::{ObserverEngine, ObserverStatus, RunState};
pub use error::{ObserverError, StepError};
pub use models::*;
pub use observability::ObserverMetrics;
