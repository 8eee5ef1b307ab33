//! Built-in execution resources.

use async_trait::async_trait;

use crate::ports::{ExecutionResource, Work};

/// Runs each unit of work as its own tokio task.
#[derive(Debug, Default)]
pub struct TokioResource;

impl TokioResource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ExecutionResource for TokioResource {
    async fn submit(&self, work: Work) {
        tokio::spawn(work);
    }
}

/// Runs each unit of work in place, on the submitting task.
///
/// With this resource an executor behaves synchronously: `execute` returns
/// only after the task body finished, and the control it returns is already
/// terminal. Useful in tests and for callers that want strictly sequential
/// execution.
#[derive(Debug, Default)]
pub struct InlineResource;

impl InlineResource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ExecutionResource for InlineResource {
    async fn submit(&self, work: Work) {
        work.await;
    }
}
