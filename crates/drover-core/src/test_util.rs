//! Test helpers.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::ports::{ExecutionResource, Work};

/// Execution resource that parks submitted work until told to run it.
///
/// Gives tests a deterministic pending state: nothing runs until
/// `run_next`/`run_all`, so cancel-before-start and shutdown paths can be
/// exercised without timing games.
pub(crate) struct ManualResource {
    parked: Mutex<VecDeque<Work>>,
}

impl ManualResource {
    pub(crate) fn new() -> Self {
        Self {
            parked: Mutex::new(VecDeque::new()),
        }
    }

    /// Run the oldest parked unit of work; `false` when nothing is parked.
    pub(crate) async fn run_next(&self) -> bool {
        let work = self.parked.lock().unwrap().pop_front();
        match work {
            Some(work) => {
                work.await;
                true
            }
            None => false,
        }
    }

    /// Drain the park queue in submission order.
    pub(crate) async fn run_all(&self) {
        while self.run_next().await {}
    }

    /// Drop everything parked without running it (an abandoning resource).
    pub(crate) fn abandon_all(&self) {
        self.parked.lock().unwrap().clear();
    }

    pub(crate) fn parked(&self) -> usize {
        self.parked.lock().unwrap().len()
    }
}

#[async_trait]
impl ExecutionResource for ManualResource {
    async fn submit(&self, work: Work) {
        self.parked.lock().unwrap().push_back(work);
    }
}
