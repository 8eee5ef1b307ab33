//! Status views.

use serde::{Deserialize, Serialize};

use crate::domain::TaskStage;

/// Tracked-control counts by stage, for dashboards and logs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageCounts {
    pub pending: usize,
    pub running: usize,
    pub complete: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl StageCounts {
    pub fn tally(stages: impl IntoIterator<Item = TaskStage>) -> Self {
        let mut counts = StageCounts::default();
        for stage in stages {
            match stage {
                TaskStage::Pending => counts.pending += 1,
                TaskStage::Running => counts.running += 1,
                TaskStage::Complete => counts.complete += 1,
                TaskStage::Failed => counts.failed += 1,
                TaskStage::Cancelled => counts.cancelled += 1,
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_counts_each_stage() {
        let counts = StageCounts::tally([
            TaskStage::Pending,
            TaskStage::Running,
            TaskStage::Running,
            TaskStage::Failed,
        ]);
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.running, 2);
        assert_eq!(counts.complete, 0);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.cancelled, 0);
    }
}
