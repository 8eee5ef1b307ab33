//! drover-core
//!
//! Core building blocks for the Drover task-execution coordination layer:
//! submit an opaque task with an opaque context to an execution resource,
//! get back a control handle, observe the lifecycle, wait for transitions
//! with or without timeout, and request cooperative cancellation — without
//! ever losing the result of a race between natural completion and
//! cancellation.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（stage, ids, errors）
//! - **context**: タスクの引数/結果コンテナ（string-keyed）
//! - **task** / **coop**: Task trait と協調的キャンセルのラッパー
//! - **control**: 提出ごとのハンドル（stage 観測、待機、キャンセル）
//! - **ports**: 抽象化レイヤー（TaskExecutor, ExecutionResource）
//! - **impls**: ExecutionResource の実装（tokio spawn / inline）
//! - **executors**: proxy executor（実行資源のデコレータ）
//! - **registry**: in-flight control の追跡戦略（linked / hashed）
//! - **service**: executor service（終了プロトコル + generation 待機）
//! - **observability**: status views

pub mod context;
pub mod control;
pub mod coop;
pub mod domain;
pub mod executors;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod registry;
pub mod service;
pub mod task;

#[cfg(test)]
mod test_util;

pub use self::context::TaskContext;
pub use self::control::TaskControl;
pub use self::coop::{Checkpoint, CheckpointTask, Cooperative, Interrupted};
pub use self::domain::{DroverError, ExecutorId, TaskError, TaskId, TaskStage};
pub use self::executors::ProxyTaskExecutor;
pub use self::impls::{InlineResource, TokioResource};
pub use self::observability::StageCounts;
pub use self::ports::{ExecutionResource, TaskExecutor, Work};
pub use self::registry::{HashedRegistry, LinkedRegistry, TaskRegistry};
pub use self::service::{HashedTasksService, LinkedTasksService, StatePoint, TaskExecutorService};
pub use self::task::Task;
