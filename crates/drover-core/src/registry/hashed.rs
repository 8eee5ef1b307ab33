//! Unordered registry: plain hash membership.

use std::collections::HashMap;

use crate::control::TaskControl;
use crate::domain::{TaskId, TaskStage};

use super::TaskRegistry;

/// O(1) average add/remove, no ordering guarantee.
///
/// Enumeration copies membership into an independent buffer: hash iteration
/// cannot be resumed safely across calls into foreign code, so the snapshot
/// is taken in one go while the service holds its lock.
#[derive(Default)]
pub struct HashedRegistry {
    controls: HashMap<TaskId, TaskControl>,
}

impl HashedRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskRegistry for HashedRegistry {
    fn add(&mut self, control: TaskControl) {
        self.controls.insert(control.task_id(), control);
    }

    fn remove(&mut self, control: &TaskControl) {
        self.controls.remove(&control.task_id());
    }

    fn len(&self) -> usize {
        self.controls.len()
    }

    fn snapshot(&self) -> Vec<TaskControl> {
        self.controls.values().cloned().collect()
    }

    fn cancel_pending(&self) {
        for control in self.controls.values() {
            control.try_advance(TaskStage::Pending, TaskStage::Cancelled);
        }
    }

    fn all_terminal(&self) -> bool {
        self.controls
            .values()
            .all(|control| control.stage().is_terminal())
    }
}
