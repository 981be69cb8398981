//! Request deduplication window.

use std::time::Duration;

use tokio::time::Instant;

/// Suppresses repeated requests for the same resource.
///
/// A request may start only when none is in flight *and* the previous
/// one started at least `window` ago. Callers pair every successful
/// [`try_begin`](Self::try_begin) with a [`finish`](Self::finish) once the
/// response (or failure) arrives.
///
/// ```text
/// try_begin ──→ true ──→ [in flight] ──→ finish
///     │                      │
///     └─ false (window / in flight): skip, reuse last result
/// ```
#[derive(Debug, Clone)]
pub struct Dedup {
    window: Duration,
    last_started: Option<Instant>,
    in_flight: bool,
}

impl Dedup {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_started: None,
            in_flight: false,
        }
    }

    /// Marks a request as started at `now` if allowed. Returns whether
    /// the caller should actually send it.
    pub fn try_begin(&mut self, now: Instant) -> bool {
        if self.in_flight {
            return false;
        }
        if let Some(last) = self.last_started {
            if now.saturating_duration_since(last) < self.window {
                return false;
            }
        }
        self.last_started = Some(now);
        self.in_flight = true;
        true
    }

    /// [`try_begin`](Self::try_begin) at the current tokio instant.
    pub fn try_begin_now(&mut self) -> bool {
        self.try_begin(Instant::now())
    }

    /// Marks the in-flight request as done.
    pub fn finish(&mut self) {
        self.in_flight = false;
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }
}
