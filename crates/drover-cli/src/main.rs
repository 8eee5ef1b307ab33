use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use drover_core::{
    Checkpoint, CheckpointTask, Cooperative, LinkedTasksService, Task, TaskContext, TaskError,
    TaskExecutor, TaskStage, TokioResource,
};

/// Writes its result into the context.
struct Greeting;

#[async_trait]
impl Task for Greeting {
    async fn run(&self, context: &TaskContext) -> Result<(), TaskError> {
        let name = context
            .get_as::<String>("name")
            .unwrap_or_else(|| "drover".to_string());
        context.put("greeting", serde_json::json!(format!("Hello, {name}!")));
        Ok(())
    }
}

/// Always fails; the cause stays observable on the control.
struct Flaky;

#[async_trait]
impl Task for Flaky {
    async fn run(&self, _: &TaskContext) -> Result<(), TaskError> {
        Err("intentional failure".into())
    }
}

/// Long-running body that polls a checkpoint between batches.
struct Grind;

#[async_trait]
impl CheckpointTask for Grind {
    async fn run(&self, context: &TaskContext, checkpoint: &Checkpoint) -> Result<(), TaskError> {
        for batch in 0..1000u32 {
            checkpoint.check()?;
            context.put_value("batches", &batch)?;
            sleep(Duration::from_millis(10)).await;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // (A) 実行資源 (tokio spawn) の上に service を構築
    let service = LinkedTasksService::new(Arc::new(TokioResource::new()));
    tracing::info!(executor_id = %service.executor_id(), "demo service ready");

    // (B) 成功するタスク: context 経由で引数を渡し、結果を受け取る
    let context = Arc::new(TaskContext::new());
    context.put("name", serde_json::json!("drover"));
    let control = service
        .execute(Arc::new(Greeting), Arc::clone(&context))
        .await
        .expect("service accepts submissions");
    let mut stage = control
        .await_next_stage(TaskStage::Pending)
        .await
        .expect("pending is not terminal");
    while !stage.is_terminal() {
        stage = control
            .await_next_stage(stage)
            .await
            .expect("stage was not terminal");
    }
    println!(
        "greeting task: stage={stage} submitted_at={} result={:?}",
        control.submitted_at(),
        context.get("greeting")
    );

    // (C) 失敗するタスク: 失敗は control に吸収され、こちらから観測する
    let control = service
        .execute(Arc::new(Flaky), Arc::new(TaskContext::new()))
        .await
        .expect("service accepts submissions");
    let mut stage = control.stage();
    while !stage.is_terminal() {
        stage = control
            .await_next_stage(stage)
            .await
            .expect("stage was not terminal");
    }
    println!(
        "flaky task: stage={stage} cause={:?}",
        control.failure_cause().map(|e| e.to_string())
    );

    // (D) 協調的キャンセル: running を観測してから cancel を要求
    let seen = service.state_point();
    let control = service
        .execute(
            Arc::new(Cooperative::new(Grind)),
            Arc::new(TaskContext::new()),
        )
        .await
        .expect("service accepts submissions");
    let stage = control
        .await_next_stage(TaskStage::Pending)
        .await
        .expect("pending is not terminal");
    if stage == TaskStage::Running {
        sleep(Duration::from_millis(35)).await;
        control.cancel();
    }
    // cancel は service の state point も進める
    let fresh = service.await_action(seen).await;
    assert_ne!(fresh, seen);
    let stage = control
        .await_next_stage(TaskStage::Running)
        .await
        .expect("running is not terminal");
    println!("grind task: stage={stage}");

    // (E) 片付け: 新規受付を止め、追跡中のタスクが全て終わるのを待つ
    println!("counts before shutdown: {:?}", service.stage_counts().await);
    service.shutdown().await;
    service.await_termination().await;
    println!("service terminated (tracked tasks: {})", service.task_count().await);
}
