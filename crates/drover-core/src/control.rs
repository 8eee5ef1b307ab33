//! TaskControl - the per-submission handle.
//!
//! One control per submitted `(task, context)` pair. The submitter and the
//! owning service each hold a clone; all clones share the same state. The
//! stage lives in a `watch` channel: reads are plain borrows (no lock
//! contention with the service), transitions broadcast to every waiter, and
//! `send_if_modified` gives the compare-and-transition primitive that makes
//! cancellation races resolve deterministically.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::context::TaskContext;
use crate::domain::{DroverError, ExecutorId, TaskError, TaskId, TaskStage};
use crate::service::StatePoint;
use crate::task::Task;

/// Slot value while a control is not chained into a linked registry.
pub(crate) const UNTRACKED: usize = usize::MAX;

struct ControlInner {
    task_id: TaskId,
    task: Arc<dyn Task>,
    context: Arc<TaskContext>,
    executor_id: ExecutorId,
    submitted_at: DateTime<Utc>,
    stage: watch::Sender<TaskStage>,
    /// Set at most once, before the transition into `Failed`.
    failure: OnceLock<TaskError>,
    /// Generation channel of the owning service; `None` for controls of
    /// standalone executors.
    service_point: Option<watch::Sender<StatePoint>>,
    /// Linked-registry slot index; [`UNTRACKED`] while not chained.
    slot: AtomicUsize,
}

/// Handle for observing and influencing one submitted task's lifecycle.
#[derive(Clone)]
pub struct TaskControl {
    inner: Arc<ControlInner>,
}

impl TaskControl {
    pub(crate) fn new(
        task: Arc<dyn Task>,
        context: Arc<TaskContext>,
        executor_id: ExecutorId,
        service_point: Option<watch::Sender<StatePoint>>,
    ) -> Self {
        let (stage, _) = watch::channel(TaskStage::Pending);
        Self {
            inner: Arc::new(ControlInner {
                task_id: TaskId::generate(),
                task,
                context,
                executor_id,
                submitted_at: Utc::now(),
                stage,
                failure: OnceLock::new(),
                service_point,
                slot: AtomicUsize::new(UNTRACKED),
            }),
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.inner.task_id
    }

    pub fn task(&self) -> Arc<dyn Task> {
        Arc::clone(&self.inner.task)
    }

    pub fn context(&self) -> Arc<TaskContext> {
        Arc::clone(&self.inner.context)
    }

    /// Id of the executor this task was submitted to.
    pub fn executor_id(&self) -> ExecutorId {
        self.inner.executor_id
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.inner.submitted_at
    }

    /// Current stage. Safe from any thread at any time; never suspends.
    pub fn stage(&self) -> TaskStage {
        *self.inner.stage.borrow()
    }

    /// The error that drove this task to `Failed`; `None` in every other
    /// stage.
    pub fn failure_cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.inner.failure.get().map(|e| e.as_ref())
    }

    /// Suspend until the stage differs from `start`, and return it.
    ///
    /// Returns immediately when the stage already differs. Fails with
    /// [`DroverError::UselessWait`] before suspending when `start` is
    /// terminal: nothing later is reachable, so the wait could never end.
    pub async fn await_next_stage(&self, start: TaskStage) -> Result<TaskStage, DroverError> {
        if start.is_terminal() {
            return Err(DroverError::UselessWait(start));
        }
        let mut rx = self.inner.stage.subscribe();
        let stage = *rx
            .wait_for(|s| *s != start)
            .await
            .expect("stage sender lives in this control");
        Ok(stage)
    }

    /// Timed variant of [`await_next_stage`](Self::await_next_stage).
    ///
    /// On timeout this returns the *current* stage, which may still equal
    /// `start` — callers compare to detect the timeout. The useless-wait
    /// guard applies the same way; a timeout is not an error.
    pub async fn await_next_stage_timeout(
        &self,
        start: TaskStage,
        timeout: Duration,
    ) -> Result<TaskStage, DroverError> {
        if start.is_terminal() {
            return Err(DroverError::UselessWait(start));
        }
        let mut rx = self.inner.stage.subscribe();
        match tokio::time::timeout(timeout, rx.wait_for(|s| *s != start)).await {
            Ok(stage) => Ok(*stage.expect("stage sender lives in this control")),
            Err(_) => Ok(self.stage()),
        }
    }

    /// Request cancellation.
    ///
    /// Still pending: one atomic compare-and-transition to `Cancelled` —
    /// when this races with execution start, exactly one side wins.
    /// Already running: forwards the advisory interrupt to the task (only
    /// cooperative tasks honor it). Already terminal: no-op.
    pub fn cancel(&self) {
        if self.try_advance(TaskStage::Pending, TaskStage::Cancelled) {
            tracing::debug!(task_id = %self.inner.task_id, "task cancelled before start");
        } else if self.stage() == TaskStage::Running {
            self.inner.task.interrupt();
        }
        // Cancellation refreshes the owner's state point unconditionally;
        // waiters re-check their own condition and re-arm.
        if let Some(point) = &self.inner.service_point {
            point.send_modify(|p| p.advance());
        }
    }

    /// Transition `expected -> next` only if the current stage is exactly
    /// `expected`. The check, the write and the waiter broadcast are one
    /// atomic step.
    pub(crate) fn try_advance(&self, expected: TaskStage, next: TaskStage) -> bool {
        self.inner.stage.send_if_modified(|stage| {
            if *stage == expected {
                *stage = next;
                true
            } else {
                false
            }
        })
    }

    /// Unconditional transition, for the runner's own natural progress
    /// (which only ever happens from a stage the runner itself entered).
    pub(crate) fn advance(&self, next: TaskStage) {
        self.inner.stage.send_modify(|stage| *stage = next);
    }

    /// Record the failure cause. Written before the `Failed` transition so
    /// every observer of that stage sees it.
    pub(crate) fn record_failure(&self, cause: TaskError) {
        let _ = self.inner.failure.set(cause);
    }

    pub(crate) fn set_slot(&self, slot: usize) {
        self.inner.slot.store(slot, Ordering::SeqCst);
    }

    pub(crate) fn take_slot(&self) -> usize {
        self.inner.slot.swap(UNTRACKED, Ordering::SeqCst)
    }
}

impl std::fmt::Debug for TaskControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskControl")
            .field("task_id", &self.inner.task_id)
            .field("stage", &self.stage())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use async_trait::async_trait;

    use super::*;

    struct Noop;

    #[async_trait]
    impl Task for Noop {
        async fn run(&self, _: &TaskContext) -> Result<(), TaskError> {
            Ok(())
        }
    }

    fn pending_control() -> TaskControl {
        TaskControl::new(
            Arc::new(Noop),
            Arc::new(TaskContext::new()),
            ExecutorId::generate(),
            None,
        )
    }

    #[test]
    fn starts_pending_with_no_cause() {
        let control = pending_control();
        assert_eq!(control.stage(), TaskStage::Pending);
        assert!(control.failure_cause().is_none());
    }

    #[test]
    fn try_advance_is_a_single_winner() {
        let control = pending_control();
        assert!(control.try_advance(TaskStage::Pending, TaskStage::Running));
        // Second attempt from the same expectation loses.
        assert!(!control.try_advance(TaskStage::Pending, TaskStage::Cancelled));
        assert_eq!(control.stage(), TaskStage::Running);
    }

    #[tokio::test]
    async fn await_returns_immediately_when_already_past() {
        let control = pending_control();
        control.advance(TaskStage::Running);
        let stage = control.await_next_stage(TaskStage::Pending).await.unwrap();
        assert_eq!(stage, TaskStage::Running);
    }

    #[tokio::test]
    async fn await_wakes_on_transition() {
        let control = pending_control();
        let waiter = control.clone();
        let join = tokio::spawn(async move { waiter.await_next_stage(TaskStage::Pending).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        control.advance(TaskStage::Running);

        let stage = tokio::time::timeout(Duration::from_secs(1), join)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(stage, TaskStage::Running);
    }

    #[tokio::test]
    async fn useless_wait_is_rejected_before_suspending() {
        let control = pending_control();
        control.advance(TaskStage::Complete);
        let err = control
            .await_next_stage(TaskStage::Complete)
            .await
            .unwrap_err();
        assert!(matches!(err, DroverError::UselessWait(TaskStage::Complete)));

        // Timed variant applies the same guard.
        let err = control
            .await_next_stage_timeout(TaskStage::Cancelled, Duration::from_millis(1))
            .await
            .unwrap_err();
        assert!(matches!(err, DroverError::UselessWait(_)));
    }

    #[tokio::test]
    async fn timed_wait_returns_current_stage_on_timeout() {
        let control = pending_control();
        let timeout = Duration::from_millis(50);
        let start = Instant::now();
        let stage = control
            .await_next_stage_timeout(TaskStage::Pending, timeout)
            .await
            .unwrap();
        assert!(start.elapsed() >= timeout);
        assert_eq!(stage, TaskStage::Pending);
    }

    #[test]
    fn cancel_pending_wins_and_terminal_is_noop() {
        let control = pending_control();
        control.cancel();
        assert_eq!(control.stage(), TaskStage::Cancelled);
        assert!(control.failure_cause().is_none());

        // Cancelling after a terminal stage changes nothing.
        control.cancel();
        assert_eq!(control.stage(), TaskStage::Cancelled);
    }

    #[test]
    fn failure_cause_visible_after_failed() {
        let control = pending_control();
        control.advance(TaskStage::Running);
        control.record_failure("broken".into());
        control.advance(TaskStage::Failed);
        assert_eq!(control.stage(), TaskStage::Failed);
        assert_eq!(control.failure_cause().unwrap().to_string(), "broken");
    }
}
