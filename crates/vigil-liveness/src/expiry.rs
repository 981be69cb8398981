//! Session expiry scheduler.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use vigil_tick::Deadline;

use crate::LivenessEvent;

/// Declares the session expired once its reported lifetime (plus a grace
/// margin) has passed, by sending [`LivenessEvent::ExpiryFired`].
///
/// Arming again replaces the previous schedule. Each arming gets a new
/// generation so a fire that raced a re-arm can be recognised as stale
/// with [`is_current`](Self::is_current).
#[derive(Debug)]
pub struct ExpiryScheduler {
    deadline: Deadline,
    grace: Duration,
    generation: u64,
    sink: mpsc::UnboundedSender<LivenessEvent>,
}

impl ExpiryScheduler {
    pub fn new(grace: Duration, sink: mpsc::UnboundedSender<LivenessEvent>) -> Self {
        Self {
            deadline: Deadline::new("session-expiry"),
            grace,
            generation: 0,
            sink,
        }
    }

    /// Fires `seconds_until_expiration + grace` from now. Negative input
    /// counts as zero.
    pub fn arm(&mut self, seconds_until_expiration: i64) {
        self.generation += 1;
        let generation = self.generation;
        let after = Duration::from_secs(seconds_until_expiration.max(0) as u64) + self.grace;
        let sink = self.sink.clone();

        self.deadline.arm(after, async move {
            tracing::info!(generation, "session expiry reached");
            let _ = sink.send(LivenessEvent::ExpiryFired { generation });
        });
    }

    /// Idempotent.
    pub fn cancel(&mut self) {
        self.deadline.cancel();
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_armed()
    }

    pub fn due_at(&self) -> Option<Instant> {
        self.deadline.due_at()
    }

    /// `true` if `generation` belongs to the latest arming.
    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }
}
