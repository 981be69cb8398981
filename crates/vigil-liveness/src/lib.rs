//! Session liveness supervision for Vigil.
//!
//! Once a page has a session, this crate keeps watching it:
//!
//! - **Polling**: `/api/health` and `/api/me` on a cadence, deduplicated.
//! - **Expiry**: [`ExpiryScheduler`] declares the session expired after
//!   its reported lifetime plus a grace margin.
//! - **Refresh**: [`RefreshLoop`] runs [`RefreshCycle`]s against an
//!   external token endpoint, on a cadence, eagerly when the session
//!   is about to expire, and again ahead of expiry when a refresh
//!   still leaves it short.
//! - **Verdict**: [`LivenessState`] folds all of the above into
//!   [`Verdict::Healthy`], [`Verdict::Degraded`] or
//!   [`Verdict::LoggedOut`].
//!
//! [`Supervisor`] runs it all as one actor task:
//!
//! ```text
//! Cadence ─┐                                   ┌─→ watch<LivenessSnapshot>
//! polls ───┼─→ mpsc<LivenessEvent> ─→ actor ───┤
//! expiry ──┤                                   └─→ Navigator (logout)
//! refresh ─┘
//! ```

mod config;
mod error;
mod expiry;
mod refresh;
mod state;
mod supervisor;

pub use config::{ExpiryConfig, LivenessConfig, PollConfig, RefreshConfig};
pub use error::{LivenessError, RefreshStep};
pub use expiry::ExpiryScheduler;
pub use refresh::{
    HttpRefresher, RefreshAttempt, RefreshCycle, RefreshGate, RefreshGuard, RefreshLoop,
    RefreshOutcome, TokenRefresher, REQUESTED_REFRESH_INTERVAL_SECS, renewal_delay,
};
pub use state::{Effect, LivenessEvent, LivenessSnapshot, LivenessState, LogoutReason, Verdict};
pub use supervisor::{Supervisor, SupervisorHandle};
