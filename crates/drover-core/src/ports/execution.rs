//! ExecutionResource port.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;

/// A boxed unit of work handed to an execution resource.
pub type Work = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Anything capable of accepting a unit of work and running it eventually,
/// possibly on another thread.
///
/// The only requirement the core places on an implementation: submitted
/// work eventually either runs to completion or is abandoned without side
/// effects before running. Nothing here guarantees *when* it runs — the
/// core only observes whatever lifecycle actually happens.
#[async_trait]
pub trait ExecutionResource: Send + Sync {
    async fn submit(&self, work: Work);
}
