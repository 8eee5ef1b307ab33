//! Task executor service: a proxy executor plus a registry of in-flight
//! controls, a termination protocol and the generation-wait primitive.
//!
//! One `Mutex` (the registry lock) serializes every registry mutation and
//! every termination decision; the `watch` generation channel is the
//! broadcast side. The token is replaced while the lock is held wherever
//! the two must be consistent, so a waiter can never park between "task
//! became terminal" and "waiters woken" and miss the change.

pub mod point;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, watch};

use crate::context::TaskContext;
use crate::control::TaskControl;
use crate::domain::{DroverError, ExecutorId};
use crate::executors::proxy::run_task;
use crate::observability::StageCounts;
use crate::ports::{ExecutionResource, TaskExecutor};
use crate::registry::{HashedRegistry, LinkedRegistry, TaskRegistry};
use crate::task::Task;

pub use self::point::StatePoint;

/// State shared with the wrapper futures handed to the execution resource.
struct ServiceShared<R> {
    registry: Mutex<R>,
    point: watch::Sender<StatePoint>,
    /// running -> terminating -> terminated, never reversed. Written only
    /// under the registry lock; reads are lock-free.
    terminating: AtomicBool,
    terminated: AtomicBool,
}

impl<R: TaskRegistry> ServiceShared<R> {
    /// Called by every wrapper after its control went terminal (or was
    /// found cancelled before start): drop it from the registry and
    /// re-evaluate termination.
    async fn reclaim(&self, control: &TaskControl) {
        let mut registry = self.registry.lock().await;
        registry.remove(control);
        if self.terminating.load(Ordering::SeqCst)
            && registry.all_terminal()
            && !self.terminated.swap(true, Ordering::SeqCst)
        {
            tracing::info!("service terminated");
        }
        self.point.send_modify(|p| p.advance());
    }
}

/// Executor service generic over the registry strategy.
///
/// The two stock strategies:
/// - [`LinkedTasksService`]: `tasks()` enumerates in submission order.
/// - [`HashedTasksService`]: no enumeration order, marginally simpler
///   bookkeeping.
pub struct TaskExecutorService<R: TaskRegistry> {
    id: ExecutorId,
    resource: Arc<dyn ExecutionResource>,
    shared: Arc<ServiceShared<R>>,
}

/// Service with insertion-ordered task enumeration.
pub type LinkedTasksService = TaskExecutorService<LinkedRegistry>;

/// Service with unordered task enumeration.
pub type HashedTasksService = TaskExecutorService<HashedRegistry>;

impl<R: TaskRegistry> TaskExecutorService<R> {
    pub fn new(resource: Arc<dyn ExecutionResource>) -> Self {
        let (point, _) = watch::channel(StatePoint::default());
        Self {
            id: ExecutorId::generate(),
            resource,
            shared: Arc::new(ServiceShared {
                registry: Mutex::new(R::default()),
                point,
                terminating: AtomicBool::new(false),
                terminated: AtomicBool::new(false),
            }),
        }
    }

    pub fn is_terminating(&self) -> bool {
        self.shared.terminating.load(Ordering::SeqCst)
    }

    pub fn is_terminated(&self) -> bool {
        self.shared.terminated.load(Ordering::SeqCst)
    }

    /// Stop accepting submissions; already-submitted tasks finish
    /// naturally.
    pub async fn shutdown(&self) {
        let registry = self.shared.registry.lock().await;
        self.shared.terminating.store(true, Ordering::SeqCst);
        if registry.all_terminal() {
            self.shared.terminated.store(true, Ordering::SeqCst);
        }
        self.shared.point.send_modify(|p| p.advance());
        tracing::info!(executor_id = %self.id, terminated = self.is_terminated(), "shutdown requested");
    }

    /// [`shutdown`](Self::shutdown), plus cancellation of every tracked
    /// task that is still pending. Running tasks are not stopped — they
    /// only receive the advisory interrupt through their own `cancel` path
    /// when asked individually; here they simply keep running to their
    /// natural end.
    pub async fn shutdown_now(&self) {
        let registry = self.shared.registry.lock().await;
        self.shared.terminating.store(true, Ordering::SeqCst);
        registry.cancel_pending();
        if registry.all_terminal() {
            self.shared.terminated.store(true, Ordering::SeqCst);
        }
        self.shared.point.send_modify(|p| p.advance());
        tracing::info!(executor_id = %self.id, terminated = self.is_terminated(), "immediate shutdown requested");
    }

    /// Suspend until the service is terminated.
    pub async fn await_termination(&self) {
        let mut rx = self.shared.point.subscribe();
        loop {
            if self.is_terminated() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Timed variant; `true` when termination was observed in time. The
    /// timeout bounds the whole wait across every intermediate wake-up.
    pub async fn await_termination_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.await_termination())
            .await
            .is_ok()
    }

    /// Capture the current generation token, to arm an
    /// [`await_action`](Self::await_action) wait.
    pub fn state_point(&self) -> StatePoint {
        *self.shared.point.borrow()
    }

    /// Suspend until the service's token differs from `seen`; returns the
    /// new current token so the caller can re-arm without missing
    /// intervening changes.
    pub async fn await_action(&self, seen: StatePoint) -> StatePoint {
        let mut rx = self.shared.point.subscribe();
        *rx.wait_for(|p| *p != seen)
            .await
            .expect("point sender lives in this service")
    }

    /// Timed variant; on timeout the returned token is the current one and
    /// may equal `seen`.
    pub async fn await_action_timeout(&self, seen: StatePoint, timeout: Duration) -> StatePoint {
        match tokio::time::timeout(timeout, self.await_action(seen)).await {
            Ok(point) => point,
            Err(_) => self.state_point(),
        }
    }

    /// Number of currently tracked controls.
    pub async fn task_count(&self) -> usize {
        self.shared.registry.lock().await.len()
    }

    /// Snapshot of every tracked control. The buffer is independent: the
    /// registry keeps mutating underneath while the caller consumes it.
    pub async fn tasks(&self) -> Vec<TaskControl> {
        self.shared.registry.lock().await.snapshot()
    }

    pub async fn stage_counts(&self) -> StageCounts {
        let snapshot = self.tasks().await;
        StageCounts::tally(snapshot.iter().map(|c| c.stage()))
    }
}

#[async_trait]
impl<R: TaskRegistry> TaskExecutor for TaskExecutorService<R> {
    async fn execute(
        &self,
        task: Arc<dyn Task>,
        context: Arc<TaskContext>,
    ) -> Result<TaskControl, DroverError> {
        let control = {
            let mut registry = self.shared.registry.lock().await;
            if self.shared.terminating.load(Ordering::SeqCst) {
                return Err(DroverError::ExecutionDenied);
            }
            let control =
                TaskControl::new(task, context, self.id, Some(self.shared.point.clone()));
            registry.add(control.clone());
            control
        };
        tracing::debug!(task_id = %control.task_id(), executor_id = %self.id, "task submitted");

        let shared = Arc::clone(&self.shared);
        let runner = control.clone();
        self.resource
            .submit(Box::pin(async move {
                run_task(&runner).await;
                shared.reclaim(&runner).await;
            }))
            .await;
        Ok(control)
    }

    fn executor_id(&self) -> ExecutorId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::AtomicBool;
    use std::time::Instant;

    use rand::Rng;
    use serde_json::json;

    use super::*;
    use crate::domain::{TaskError, TaskStage};
    use crate::impls::{InlineResource, TokioResource};
    use crate::test_util::ManualResource;

    struct PutAnswer;

    #[async_trait]
    impl Task for PutAnswer {
        async fn run(&self, context: &TaskContext) -> Result<(), TaskError> {
            context.put("k", json!(42));
            Ok(())
        }
    }

    struct Probe {
        fired: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Task for Probe {
        async fn run(&self, _: &TaskContext) -> Result<(), TaskError> {
            self.fired.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn probe() -> (Arc<dyn Task>, Arc<AtomicBool>) {
        let fired = Arc::new(AtomicBool::new(false));
        (
            Arc::new(Probe {
                fired: Arc::clone(&fired),
            }),
            fired,
        )
    }

    const GUARD: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn tracks_then_reclaims_in_submission_order() {
        let resource = Arc::new(ManualResource::new());
        let service = LinkedTasksService::new(Arc::clone(&resource) as Arc<dyn ExecutionResource>);
        let context = Arc::new(TaskContext::new());

        let first = service
            .execute(Arc::new(PutAnswer), Arc::clone(&context))
            .await
            .unwrap();
        let second = service
            .execute(Arc::new(PutAnswer), Arc::clone(&context))
            .await
            .unwrap();

        assert_eq!(service.task_count().await, 2);
        let snapshot = service.tasks().await;
        assert_eq!(
            snapshot.iter().map(|c| c.task_id()).collect::<Vec<_>>(),
            vec![first.task_id(), second.task_id()],
        );
        let counts = service.stage_counts().await;
        assert_eq!(counts.pending, 2);

        resource.run_all().await;

        assert_eq!(first.stage(), TaskStage::Complete);
        assert_eq!(second.stage(), TaskStage::Complete);
        assert_eq!(context.get("k"), Some(json!(42)));
        // Terminal controls are reclaimed from the registry.
        assert_eq!(service.task_count().await, 0);
    }

    #[tokio::test]
    async fn snapshot_stays_usable_while_registry_mutates() {
        let resource = Arc::new(ManualResource::new());
        let service = LinkedTasksService::new(Arc::clone(&resource) as Arc<dyn ExecutionResource>);

        for _ in 0..3 {
            service
                .execute(Arc::new(PutAnswer), Arc::new(TaskContext::new()))
                .await
                .unwrap();
        }
        let snapshot = service.tasks().await;

        // Everything completes and leaves the registry; the snapshot's
        // handles keep observing the final stages.
        resource.run_all().await;
        assert_eq!(service.task_count().await, 0);
        assert_eq!(snapshot.len(), 3);
        for control in &snapshot {
            assert_eq!(control.stage(), TaskStage::Complete);
        }
    }

    #[tokio::test]
    async fn inline_resource_makes_the_service_synchronous() {
        let service = LinkedTasksService::new(Arc::new(InlineResource::new()));
        let context = Arc::new(TaskContext::new());
        let control = service
            .execute(Arc::new(PutAnswer), Arc::clone(&context))
            .await
            .unwrap();

        // The wrapper ran inside execute: terminal and already reclaimed.
        assert_eq!(control.stage(), TaskStage::Complete);
        assert_eq!(context.get("k"), Some(json!(42)));
        assert_eq!(service.task_count().await, 0);
    }

    #[tokio::test]
    async fn hashed_service_tracks_membership() {
        let resource = Arc::new(ManualResource::new());
        let service = HashedTasksService::new(Arc::clone(&resource) as Arc<dyn ExecutionResource>);

        let a = service
            .execute(Arc::new(PutAnswer), Arc::new(TaskContext::new()))
            .await
            .unwrap();
        let b = service
            .execute(Arc::new(PutAnswer), Arc::new(TaskContext::new()))
            .await
            .unwrap();

        let snapshot: HashSet<_> = service.tasks().await.iter().map(|c| c.task_id()).collect();
        assert_eq!(snapshot, HashSet::from([a.task_id(), b.task_id()]));

        resource.run_all().await;
        assert_eq!(service.task_count().await, 0);
    }

    #[tokio::test]
    async fn execute_denied_once_terminating() {
        let service = LinkedTasksService::new(Arc::new(TokioResource::new()));
        service.shutdown().await;
        assert!(service.is_terminating());

        let err = service
            .execute(Arc::new(PutAnswer), Arc::new(TaskContext::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, DroverError::ExecutionDenied));
    }

    #[tokio::test]
    async fn shutdown_with_no_tasks_terminates_immediately() {
        let service = LinkedTasksService::new(Arc::new(TokioResource::new()));
        assert!(!service.is_terminating());
        service.shutdown().await;
        assert!(service.is_terminated());
        assert!(service.await_termination_timeout(GUARD).await);
    }

    #[tokio::test]
    async fn shutdown_waits_for_tasks_in_flight() {
        let resource = Arc::new(ManualResource::new());
        let service = LinkedTasksService::new(Arc::clone(&resource) as Arc<dyn ExecutionResource>);
        let (task, fired) = probe();
        service
            .execute(task, Arc::new(TaskContext::new()))
            .await
            .unwrap();

        service.shutdown().await;
        assert!(service.is_terminating());
        assert!(!service.is_terminated());
        assert!(!service.await_termination_timeout(Duration::from_millis(50)).await);

        resource.run_all().await;
        assert!(fired.load(Ordering::SeqCst));
        assert!(service.is_terminated());
        assert!(service.await_termination_timeout(GUARD).await);
    }

    #[tokio::test]
    async fn shutdown_now_cancels_pending_and_skips_their_bodies() {
        let resource = Arc::new(ManualResource::new());
        let service = LinkedTasksService::new(Arc::clone(&resource) as Arc<dyn ExecutionResource>);

        let mut controls = Vec::new();
        let mut probes = Vec::new();
        for _ in 0..3 {
            let (task, fired) = probe();
            controls.push(
                service
                    .execute(task, Arc::new(TaskContext::new()))
                    .await
                    .unwrap(),
            );
            probes.push(fired);
        }

        service.shutdown_now().await;
        for control in &controls {
            assert_eq!(control.stage(), TaskStage::Cancelled);
        }
        // All tracked controls are terminal, so termination is immediate
        // even though the wrappers have not run yet.
        assert!(service.is_terminated());

        resource.run_all().await;
        for fired in &probes {
            assert!(!fired.load(Ordering::SeqCst));
        }
        assert_eq!(service.task_count().await, 0);
    }

    #[tokio::test]
    async fn shutdown_now_still_terminates_when_work_is_abandoned() {
        let resource = Arc::new(ManualResource::new());
        let service = LinkedTasksService::new(Arc::clone(&resource) as Arc<dyn ExecutionResource>);
        let (task, fired) = probe();
        service
            .execute(task, Arc::new(TaskContext::new()))
            .await
            .unwrap();

        // The resource drops the parked wrapper without running it.
        resource.abandon_all();
        service.shutdown_now().await;

        assert!(service.is_terminated());
        assert!(!fired.load(Ordering::SeqCst));
        // Never reclaimed, but terminal — that is what termination counts.
        assert_eq!(service.task_count().await, 1);
    }

    /// Runs until released, so tests can hold a task in `Running`.
    struct Gated {
        release: Arc<tokio::sync::Notify>,
    }

    #[async_trait]
    impl Task for Gated {
        async fn run(&self, _: &TaskContext) -> Result<(), TaskError> {
            self.release.notified().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn shutdown_now_waits_for_running_tasks_to_finish() {
        let service = LinkedTasksService::new(Arc::new(TokioResource::new()));
        let release = Arc::new(tokio::sync::Notify::new());
        let control = service
            .execute(
                Arc::new(Gated {
                    release: Arc::clone(&release),
                }),
                Arc::new(TaskContext::new()),
            )
            .await
            .unwrap();

        let stage = tokio::time::timeout(GUARD, control.await_next_stage(TaskStage::Pending))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stage, TaskStage::Running);

        service.shutdown_now().await;
        // Not forcibly stopped; the task is still parked at its gate.
        assert_eq!(control.stage(), TaskStage::Running);
        assert!(!service.is_terminated());

        release.notify_one();
        assert!(service.await_termination_timeout(GUARD).await);
        assert_eq!(control.stage(), TaskStage::Complete);
    }

    #[tokio::test]
    async fn await_action_sees_a_cancellation() {
        let resource = Arc::new(ManualResource::new());
        let service = Arc::new(LinkedTasksService::new(Arc::clone(&resource) as Arc<dyn ExecutionResource>));
        let control = service
            .execute(Arc::new(PutAnswer), Arc::new(TaskContext::new()))
            .await
            .unwrap();

        let seen = service.state_point();
        let waiter = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.await_action(seen).await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        control.cancel();

        let fresh = tokio::time::timeout(GUARD, waiter).await.unwrap().unwrap();
        assert_ne!(fresh, seen);
    }

    #[tokio::test]
    async fn await_action_timeout_returns_unchanged_point() {
        let service = LinkedTasksService::new(Arc::new(TokioResource::new()));
        let seen = service.state_point();
        let timeout = Duration::from_millis(50);

        let start = Instant::now();
        let current = service.await_action_timeout(seen, timeout).await;
        assert!(start.elapsed() >= timeout);
        assert_eq!(current, seen);
    }

    #[tokio::test]
    async fn completion_replaces_the_state_point() {
        let resource = Arc::new(ManualResource::new());
        let service = LinkedTasksService::new(Arc::clone(&resource) as Arc<dyn ExecutionResource>);
        service
            .execute(Arc::new(PutAnswer), Arc::new(TaskContext::new()))
            .await
            .unwrap();

        let seen = service.state_point();
        resource.run_all().await;
        let current = service.await_action_timeout(seen, GUARD).await;
        assert_ne!(current, seen);
    }

    #[tokio::test]
    async fn cancel_versus_start_races_settle_in_exactly_one_outcome() {
        for _ in 0..50 {
            let resource = Arc::new(ManualResource::new());
            let service = LinkedTasksService::new(Arc::clone(&resource) as Arc<dyn ExecutionResource>);
            let (task, fired) = probe();
            let control = service
                .execute(task, Arc::new(TaskContext::new()))
                .await
                .unwrap();

            let canceller = tokio::spawn({
                let control = control.clone();
                let jitter = rand::thread_rng().gen_range(0..40);
                async move {
                    tokio::time::sleep(Duration::from_micros(jitter)).await;
                    control.cancel();
                }
            });
            let runner = tokio::spawn({
                let resource = Arc::clone(&resource);
                let jitter = rand::thread_rng().gen_range(0..40);
                async move {
                    tokio::time::sleep(Duration::from_micros(jitter)).await;
                    resource.run_all().await;
                }
            });
            canceller.await.unwrap();
            runner.await.unwrap();

            // Exactly one side wins, and the body ran iff completion won.
            let stage = control.stage();
            assert!(
                stage == TaskStage::Cancelled || stage == TaskStage::Complete,
                "unexpected stage {stage}",
            );
            assert_eq!(fired.load(Ordering::SeqCst), stage == TaskStage::Complete);
        }
    }
}
