//! TaskExecutor port.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::TaskContext;
use crate::control::TaskControl;
use crate::domain::{DroverError, ExecutorId};
use crate::task::Task;

/// Executes a given task with a given context in an implementation-defined
/// mode, with control over the execution.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Submit `task` for execution with `context`.
    ///
    /// The returned [`TaskControl`] enables monitoring and cancellation.
    /// Submission itself never waits for the task: implementations may run
    /// it before returning (inline resources) or long after.
    ///
    /// # Errors
    /// [`DroverError::ExecutionDenied`] when the executor no longer accepts
    /// submissions (a service past `shutdown`).
    async fn execute(
        &self,
        task: Arc<dyn Task>,
        context: Arc<TaskContext>,
    ) -> Result<TaskControl, DroverError>;

    /// Stable identity of this executor; controls carry it as their
    /// back-reference.
    fn executor_id(&self) -> ExecutorId;
}
