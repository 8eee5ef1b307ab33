//! Task lifecycle state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle stage of a submitted task.
///
/// Stage transitions:
/// - Pending -> Running -> Complete (normal return)
/// - Pending -> Running -> Failed (task body returned an error)
/// - Pending -> Running -> Cancelled (cooperative interruption honored)
/// - Pending -> Cancelled (cancelled before execution started)
///
/// The three terminal stages are mutually exclusive and final: exactly one
/// of them is reached exactly once, and nothing follows it.
///
/// Design note: Using an enum ensures exhaustive matching and prevents
/// invalid states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStage {
    /// Submitted, execution not started yet.
    Pending,

    /// Task body is currently executing.
    Running,

    /// Task body returned normally.
    Complete,

    /// Task body returned an error (cause recorded on the control).
    Failed,

    /// Cancelled before start, or interrupted cooperatively while running.
    Cancelled,
}

impl TaskStage {
    /// Is `other` strictly later in the happens-after ordering?
    ///
    /// `Pending < Running < {Complete, Failed, Cancelled}`; the terminal
    /// stages are not ordered against each other.
    pub fn is_before(self, other: TaskStage) -> bool {
        match self {
            TaskStage::Pending => other != TaskStage::Pending,
            TaskStage::Running => other.is_terminal(),
            _ => false,
        }
    }

    /// Is this a terminal stage (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStage::Complete | TaskStage::Failed | TaskStage::Cancelled
        )
    }
}

impl fmt::Display for TaskStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskStage::Pending => "pending",
            TaskStage::Running => "running",
            TaskStage::Complete => "complete",
            TaskStage::Failed => "failed",
            TaskStage::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}
