//! Proxy task executor: decorates an execution resource with lifecycle
//! tracking.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::TaskContext;
use crate::control::TaskControl;
use crate::domain::{DroverError, ExecutorId, TaskStage};
use crate::ports::{ExecutionResource, TaskExecutor};
use crate::task::Task;

/// Drive one control through its lifecycle. Shared by [`ProxyTaskExecutor`]
/// and the executor service.
///
/// The opening compare-and-transition is the cancelled-before-start guard:
/// when it loses, the body is never touched.
pub(crate) async fn run_task(control: &TaskControl) {
    if !control.try_advance(TaskStage::Pending, TaskStage::Running) {
        return;
    }
    let task = control.task();
    let context = control.context();
    match task.run(&context).await {
        Ok(()) => {
            if task.is_interrupted() {
                control.advance(TaskStage::Cancelled);
            } else {
                control.advance(TaskStage::Complete);
            }
        }
        Err(cause) => {
            tracing::warn!(task_id = %control.task_id(), error = %cause, "task failed");
            control.record_failure(cause);
            control.advance(TaskStage::Failed);
        }
    }
}

/// A [`TaskExecutor`] that wraps each submitted task in a unit of work and
/// delegates execution to an inner [`ExecutionResource`].
///
/// No registry, no termination protocol — just submission and per-control
/// observation. The executor service builds on the same runner and adds
/// both.
pub struct ProxyTaskExecutor {
    id: ExecutorId,
    resource: Arc<dyn ExecutionResource>,
}

impl ProxyTaskExecutor {
    pub fn new(resource: Arc<dyn ExecutionResource>) -> Self {
        Self {
            id: ExecutorId::generate(),
            resource,
        }
    }
}

#[async_trait]
impl TaskExecutor for ProxyTaskExecutor {
    async fn execute(
        &self,
        task: Arc<dyn Task>,
        context: Arc<TaskContext>,
    ) -> Result<TaskControl, DroverError> {
        let control = TaskControl::new(task, context, self.id, None);
        tracing::debug!(task_id = %control.task_id(), executor_id = %self.id, "task submitted");
        let runner = control.clone();
        self.resource
            .submit(Box::pin(async move { run_task(&runner).await }))
            .await;
        Ok(control)
    }

    fn executor_id(&self) -> ExecutorId {
        self.id
    }
}
