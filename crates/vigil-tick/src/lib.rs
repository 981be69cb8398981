//! Scheduling primitives for Vigil.
//!
//! Three small building blocks, each owned by exactly one object and torn
//! down with it:
//!
//! - [`Cadence`]: a repeating tick (health poll, session poll, refresh
//!   cadence). Pends forever when disabled or paused.
//! - [`Deadline`]: a single-shot, cancellable timer. Re-arming replaces
//!   the previous schedule; dropping it cancels.
//! - [`Dedup`]: suppresses repeated requests within a window and while
//!   one is still in flight.
//!
//! # Integration
//!
//! A cadence is designed to sit inside an actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(event) = events.recv() => { /* handle events */ }
//!         _ = health.wait_for_tick() => {
//!             if dedup.try_begin_now() { spawn_health_poll(); }
//!         }
//!     }
//! }
//! ```

mod deadline;
mod dedup;

pub use deadline::Deadline;
pub use dedup::Dedup;

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// When the first tick of a cadence fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FirstTick {
    /// Right away (plus jitter). Polls want data as soon as the page mounts.
    #[default]
    Immediate,
    /// One full period after creation. The refresh cadence starts this way.
    AfterPeriod,
}

/// Full configuration for a [`Cadence`].
#[derive(Debug, Clone)]
pub struct CadenceConfig {
    /// Time between ticks. `None` disables the cadence entirely.
    pub period: Option<Duration>,
    pub first_tick: FirstTick,
    /// Random jitter (0–max) added to the *first* tick so several pages
    /// opened at once don't poll in lockstep.
    pub initial_jitter: Duration,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            period: None,
            first_tick: FirstTick::default(),
            initial_jitter: Duration::ZERO,
        }
    }
}

impl CadenceConfig {
    /// Shortest period accepted. Anything faster is a request storm.
    pub const MIN_PERIOD: Duration = Duration::from_millis(100);

    /// A cadence ticking every `period`, first tick immediately.
    pub fn every(period: Duration) -> Self {
        Self {
            period: Some(period),
            ..Default::default()
        }
    }

    /// Builder-style override of [`first_tick`](Self::first_tick).
    pub fn starting(mut self, first_tick: FirstTick) -> Self {
        self.first_tick = first_tick;
        self
    }

    /// Builder-style override of [`initial_jitter`](Self::initial_jitter).
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.initial_jitter = jitter;
        self
    }

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`Cadence::new`]. A zero period disables
    /// the cadence; a positive period below [`Self::MIN_PERIOD`] is raised
    /// to it.
    pub fn validated(mut self) -> Self {
        match self.period {
            Some(p) if p.is_zero() => {
                debug!("cadence period is zero, disabling");
                self.period = None;
            }
            Some(p) if p < Self::MIN_PERIOD => {
                warn!(
                    period_ms = p.as_millis() as u64,
                    min_ms = Self::MIN_PERIOD.as_millis() as u64,
                    "cadence period below minimum, clamping"
                );
                self.period = Some(Self::MIN_PERIOD);
            }
            _ => {}
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Tick info (returned to caller each tick)
// ---------------------------------------------------------------------------

/// Information about a fired tick, returned by [`Cadence::wait_for_tick`].
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Monotonically increasing tick number (starts at 1).
    pub tick: u64,
    /// How far past its scheduled instant this tick fired.
    pub late_by: Duration,
    /// Whole periods missed because the owner wasn't waiting (0 normally).
    /// Missed ticks are skipped, never replayed.
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Cadence
// ---------------------------------------------------------------------------

/// A repeating tick.
///
/// Missed ticks are skipped: after a late wake-up the next tick is
/// scheduled one period from *now*, so a suspended page never fires a
/// burst of polls on resume.
pub struct Cadence {
    period: Option<Duration>,
    next_tick: Option<Instant>,
    tick_count: u64,
    total_skipped: u64,
    paused: bool,
}

impl Cadence {
    /// Create a new cadence from config.
    pub fn new(config: CadenceConfig) -> Self {
        let config = config.validated();

        let next_tick = config.period.map(|period| {
            let jitter = if config.initial_jitter.is_zero() {
                Duration::ZERO
            } else {
                let max = config.initial_jitter.as_micros() as u64;
                Duration::from_micros(rand::rng().random_range(0..max))
            };
            let first = match config.first_tick {
                FirstTick::Immediate => Duration::ZERO,
                FirstTick::AfterPeriod => period,
            };
            Instant::now() + first + jitter
        });

        match config.period {
            Some(period) => debug!(
                period_ms = period.as_millis() as u64,
                first_tick = ?config.first_tick,
                "cadence created"
            ),
            None => debug!("cadence created disabled (never ticks)"),
        }

        Self {
            period: config.period,
            next_tick,
            tick_count: 0,
            total_skipped: 0,
            paused: false,
        }
    }

    /// A cadence that never ticks.
    pub fn disabled() -> Self {
        Self::new(CadenceConfig::default())
    }

    /// Wait until the next tick is due.
    ///
    /// When disabled or paused this future pends forever; inside
    /// `tokio::select!` the other branches keep running.
    ///
    /// Cancel-safe: dropping the future before it resolves leaves the
    /// schedule untouched.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let (next, period) = match (self.next_tick, self.period) {
            (Some(next), Some(period)) if !self.paused => (next, period),
            _ => std::future::pending().await,
        };

        time::sleep_until(next).await;

        let now = Instant::now();
        self.tick_count += 1;

        let late_by = now.saturating_duration_since(next);
        let ticks_skipped = (late_by.as_nanos() / period.as_nanos()) as u64;
        if ticks_skipped > 0 {
            warn!(
                tick = self.tick_count,
                skipped = ticks_skipped,
                late_ms = late_by.as_millis() as u64,
                "cadence fell behind, skipping ahead"
            );
        }
        self.total_skipped += ticks_skipped;
        self.next_tick = Some(now + period);

        trace!(tick = self.tick_count, "cadence tick");

        TickInfo {
            tick: self.tick_count,
            late_by,
            ticks_skipped,
        }
    }

    /// Pause ticking. [`wait_for_tick`](Self::wait_for_tick) pends until
    /// [`resume`](Self::resume). Idempotent.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(tick = self.tick_count, "cadence paused");
        }
    }

    /// Resume after a pause. The next tick is one full period from now.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            if let Some(period) = self.period {
                self.next_tick = Some(Instant::now() + period);
            }
            debug!(tick = self.tick_count, "cadence resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_disabled(&self) -> bool {
        self.period.is_none()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Total ticks skipped since creation.
    pub fn total_skipped(&self) -> u64 {
        self.total_skipped
    }

    pub fn period(&self) -> Option<Duration> {
        self.period
    }

    /// When the next tick is scheduled, if any.
    pub fn next_tick(&self) -> Option<Instant> {
        self.next_tick
    }
}
