//! Error taxonomy for the coordinator.
//!
//! Seam errors (`MotionError`, `VisionError`, `LinkError`) describe what a
//! collaborator failed to do. `ActionError` is the executor-level rollup
//! that decides the terminal goal status: `Canceled` maps to a canceled
//! goal, everything else aborts. `ServiceError` covers the latched console
//! services. `ConfigError` lives in [`crate::config`].

use std::time::Duration;

use thiserror::Error;

use octa_common::action::GoalStatus;

/// Failure modes of the motion seam.
#[derive(Debug, Clone, Error)]
pub enum MotionError {
    /// No candidate pipeline produced a valid trajectory.
    #[error("planning failed: {0}")]
    Planning(String),
    /// A trajectory was rejected or interrupted during execution.
    #[error("execution failed: {0}")]
    Execution(String),
    /// The motion device itself is unavailable or refused the request.
    #[error("motion device error: {0}")]
    Device(String),
}

/// Failure modes of the vision seam.
#[derive(Debug, Clone, Error)]
pub enum VisionError {
    /// Frame source failed while acquiring.
    #[error("capture failed: {0}")]
    Capture(String),
    /// Volume reconstruction failed outright.
    #[error("reconstruction failed: {0}")]
    Reconstruction(String),
    /// Too few points to fit an oriented box.
    #[error("degenerate point cloud ({points} points)")]
    DegenerateCloud { points: usize },
}

/// Failure modes of the console transport.
#[derive(Debug, Clone, Error)]
pub enum LinkError {
    /// The peer went away; publishing is pointless until reconnect.
    #[error("console link closed")]
    Closed,
    /// Snapshot could not be encoded for the wire.
    #[error("encode error: {0}")]
    Encode(String),
}

/// Terminal failure of an action executor.
///
/// The lifecycle layer turns the executor's `Result<String, ActionError>`
/// into exactly one terminal event; the `Display` text of the error is
/// what the console sees.
#[derive(Debug, Clone, Error)]
pub enum ActionError {
    /// A bounded wait expired. Always terminal, never retried.
    #[error("{what} timed out after {after:?}")]
    Timeout {
        what: &'static str,
        after: Duration,
    },
    /// Planning failed and the executor does not retry.
    #[error("planning failed: {0}")]
    Planning(String),
    /// Execution failed and the executor does not retry.
    #[error("execution failed: {0}")]
    Execution(String),
    /// The vision seam failed mid-loop.
    #[error("vision error: {0}")]
    Vision(String),
    /// Cooperative cancellation was observed.
    #[error("canceled")]
    Canceled,
}

impl ActionError {
    /// Terminal goal status this error maps to.
    pub fn terminal_status(&self) -> GoalStatus {
        match self {
            Self::Canceled => GoalStatus::Canceled,
            _ => GoalStatus::Aborted,
        }
    }
}

impl From<MotionError> for ActionError {
    fn from(err: MotionError) -> Self {
        match err {
            MotionError::Planning(e) => Self::Planning(e),
            MotionError::Execution(e) => Self::Execution(e),
            MotionError::Device(e) => Self::Execution(e),
        }
    }
}

impl From<VisionError> for ActionError {
    fn from(err: VisionError) -> Self {
        Self::Vision(err.to_string())
    }
}

/// Failure modes of the latched console services.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// Another service request is already in flight.
    #[error("service request already latched")]
    Busy,
    /// The console never mirrored the requested state back.
    #[error("console did not confirm within {0:?}")]
    NotConfirmed(Duration),
}
