//! Task trait - the unit of work the coordination layer runs.

use async_trait::async_trait;

use crate::context::TaskContext;
use crate::domain::TaskError;

/// An opaque unit of work executed against a context.
///
/// The body reads its arguments from the context and writes results back;
/// the executor passes the reference through unchanged. Returning `Err`
/// drives the control to `Failed` with the cause recorded.
///
/// The two interruption hooks default to "not interruptible": a plain task
/// ignores cancellation once it is running. [`crate::coop::Cooperative`]
/// overrides them to opt in.
#[async_trait]
pub trait Task: Send + Sync {
    async fn run(&self, context: &TaskContext) -> Result<(), TaskError>;

    /// Advisory request to stop at the next checkpoint. No-op by default.
    fn interrupt(&self) {}

    /// Did the body abandon itself at a checkpoint? The runner maps a
    /// normal return with this flag set to `Cancelled` instead of
    /// `Complete`.
    fn is_interrupted(&self) -> bool {
        false
    }
}
