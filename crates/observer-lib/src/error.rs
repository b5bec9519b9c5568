//! Error taxonomy for the observer engine.
//!
//! Nothing here is fatal to the process: adapter and remediation failures are
//! contained to the anomaly or workflow they concern and surfaced through
//! status queries.

use crate::models::{ActionKind, WorkflowStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObserverError {
    /// Adapter I/O failure; the affected pair is skipped this tick and
    /// retried on the next one.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// The source answered but returned no samples for the pair.
    #[error("source returned no samples for {service}/{metric}")]
    EmptyResult { service: String, metric: String },

    /// Not enough signal to detect against. A skip condition, not a failure.
    #[error("insufficient baseline: {have} samples, need {need}")]
    InsufficientBaseline { have: usize, need: usize },

    /// Unknown workflow id on a decision call.
    #[error("workflow not found: {0}")]
    NotFound(String),

    /// Decision on a non-pending workflow, or any attempted mutation of a
    /// terminal one. Surfaced to the caller, never silently ignored.
    #[error("invalid transition for workflow {id}: expected {expected}, was {actual}")]
    InvalidTransition {
        id: String,
        expected: WorkflowStatus,
        actual: WorkflowStatus,
    },

    /// An execution-phase integration call failed; the workflow moves to
    /// failed with partial results retained.
    #[error("remediation step {step} failed: {reason}")]
    RemediationStepFailed { step: ActionKind, reason: String },
}

/// Failure reported by a single remediation capability. Integration errors
/// and timeout signals are both expressed this way; the orchestrator treats
/// them identically.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct StepError(pub String);

impl StepError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}
