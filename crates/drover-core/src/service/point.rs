//! Generation state-point token.

use serde::{Deserialize, Serialize};

/// Opaque "something relevant changed" marker owned by an executor service.
///
/// Callers capture the current point, then wait until the service's point
/// differs from the captured one. The counter value carries no meaning —
/// only the "changed since" comparison does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatePoint(u64);

impl StatePoint {
    /// Replace this point with a fresh one. Used through
    /// `watch::Sender::send_modify`, so the replacement and the
    /// broadcast-wake are one atomic step.
    pub(crate) fn advance(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }
}
