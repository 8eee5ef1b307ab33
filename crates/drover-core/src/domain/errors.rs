//! Error taxonomy.
//!
//! Two channels, kept deliberately apart:
//! - [`DroverError`] reports misuse of the coordination API itself
//!   (submitting after shutdown, waiting from a terminal stage). These are
//!   raised synchronously, never absorbed.
//! - [`TaskError`] is whatever escaped a task body. It is captured on the
//!   control and only observable through `failure_cause()`; it is never
//!   rethrown to the submitter.

use thiserror::Error;

use super::stage::TaskStage;

/// Anything a task body can fail with.
pub type TaskError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum DroverError {
    /// The owning service is terminating or terminated and accepts no new
    /// submissions.
    #[error("execution denied: service is shutting down")]
    ExecutionDenied,

    /// A stage wait was requested from a stage that has no successor.
    /// Programmer error, raised before any suspension; distinct from a
    /// timeout.
    #[error("useless waiting: no stage follows {0}")]
    UselessWait(TaskStage),
}
