//! Cooperative interruption.
//!
//! Cancellation of a task that already started is advisory only: the body
//! has to poll a [`Checkpoint`] to honor it. `checkpoint.check()?` aborts
//! the body with an [`Interrupted`] signal that [`Cooperative`] catches
//! itself — it never reaches the submitter as a failure. A body that never
//! checks cannot be cancelled once running.
//!
//! ```ignore
//! struct Sweep;
//!
//! #[async_trait]
//! impl CheckpointTask for Sweep {
//!     async fn run(&self, ctx: &TaskContext, checkpoint: &Checkpoint) -> Result<(), TaskError> {
//!         for batch in 0..64 {
//!             checkpoint.check()?;
//!             // ...one batch of work...
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let task = Cooperative::new(Sweep);
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::context::TaskContext;
use crate::domain::TaskError;
use crate::task::Task;

/// Control-flow signal raised by [`Checkpoint::check`]. Caught by the
/// wrapper, never surfaced as a task failure.
#[derive(Debug)]
pub struct Interrupted;

impl fmt::Display for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("task interrupted at checkpoint")
    }
}

impl std::error::Error for Interrupted {}

/// Handed to the body of a [`CheckpointTask`]; the body decides where it is
/// safe to stop.
pub struct Checkpoint {
    requested: Arc<AtomicBool>,
}

impl Checkpoint {
    /// Abort the body if interruption was requested. Intended to be used
    /// as `checkpoint.check()?`.
    pub fn check(&self) -> Result<(), TaskError> {
        if self.requested.load(Ordering::SeqCst) {
            Err(Box::new(Interrupted))
        } else {
            Ok(())
        }
    }

    /// Non-aborting probe, for bodies that prefer to wind down manually.
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// A task body that accepts interruption checkpoints.
#[async_trait]
pub trait CheckpointTask: Send + Sync {
    async fn run(&self, context: &TaskContext, checkpoint: &Checkpoint) -> Result<(), TaskError>;
}

/// Adapter that makes a [`CheckpointTask`] cancellable while running.
///
/// The interrupt flag is only armed once the body has started: cancelling
/// a still-pending task is handled by the stage machine, not here. A
/// started or interrupted instance cannot be restarted.
pub struct Cooperative<T> {
    inner: T,
    started: AtomicBool,
    requested: Arc<AtomicBool>,
    interrupted: AtomicBool,
}

impl<T> Cooperative<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            started: AtomicBool::new(false),
            requested: Arc::new(AtomicBool::new(false)),
            interrupted: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl<T: CheckpointTask> Task for Cooperative<T> {
    async fn run(&self, context: &TaskContext) -> Result<(), TaskError> {
        self.started.store(true, Ordering::SeqCst);
        let checkpoint = Checkpoint {
            requested: Arc::clone(&self.requested),
        };
        match self.inner.run(context, &checkpoint).await {
            Err(e) if e.is::<Interrupted>() => {
                // The body abandoned itself; report it via the flag, not as
                // a failure.
                self.interrupted.store(true, Ordering::SeqCst);
                Ok(())
            }
            other => other,
        }
    }

    fn interrupt(&self) {
        if self.started.load(Ordering::SeqCst) {
            self.requested.store(true, Ordering::SeqCst);
        }
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }
}
