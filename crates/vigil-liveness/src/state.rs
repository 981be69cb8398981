//! The liveness state machine.
//!
//! Pure and synchronous: [`LivenessState::apply`] takes one event and
//! returns the side effects the supervisor must carry out. No timers, no
//! I/O, no clock reads, so every transition is testable in isolation.
//!
//! ```text
//!            health fails          health ok
//!  Healthy ─────────────────→ Degraded ─────────→ Healthy
//!     │                          │
//!     └── 403 on /api/me, 403 on /api/health, expiry fires ──→ LoggedOut (final)
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vigil_protocol::{FetchError, UserInfo};
use vigil_session::is_auth_page;

use crate::RefreshOutcome;

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// Why the page was logged out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogoutReason {
    /// `/api/me` answered `403`.
    SessionForbidden,
    /// The expiry scheduler fired.
    SessionExpired,
    /// `/api/health` answered `403`.
    HealthRedirect,
}

impl std::fmt::Display for LogoutReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SessionForbidden => write!(f, "SessionForbidden"),
            Self::SessionExpired => write!(f, "SessionExpired"),
            Self::HealthRedirect => write!(f, "HealthRedirect"),
        }
    }
}

/// The derived liveness verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Healthy,
    /// Backend unreachable; recoverable. The only state with a banner.
    Degraded,
    /// Final for the life of the page.
    LoggedOut(LogoutReason),
}

impl Verdict {
    pub fn is_logged_out(&self) -> bool {
        matches!(self, Self::LoggedOut(_))
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "Healthy"),
            Self::Degraded => write!(f, "Degraded"),
            Self::LoggedOut(reason) => write!(f, "LoggedOut({reason})"),
        }
    }
}

// ---------------------------------------------------------------------------
// Events and effects
// ---------------------------------------------------------------------------

/// Everything that can change liveness, delivered to the supervisor on
/// one channel.
#[derive(Debug)]
pub enum LivenessEvent {
    HealthPolled(Result<(), FetchError>),
    SessionPolled(Result<UserInfo, FetchError>),
    /// The expiry scheduler fired. `generation` identifies which arming.
    ExpiryFired { generation: u64 },
    Refreshed(RefreshOutcome),
}

/// A side effect requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// (Re-)arm the expiry scheduler for a session expiring in `seconds`.
    ArmExpiry { seconds: i64 },
    /// Start the refresh loop. Requested at most once.
    StartRefreshLoop,
    /// Run a refresh cycle now.
    RefreshNow,
    /// A refresh left the session expiring in `seconds`, sooner than the
    /// next scheduled cycle. Run one before it expires.
    RenewBefore { seconds: i64 },
    /// The page just entered `LoggedOut`. `redirect` says whether to send
    /// the user to the login page (never from an auth page).
    LoggedOut { reason: LogoutReason, redirect: bool },
}

/// Identifies the expiry metadata of a session, to tell a changed
/// session from a re-poll of the same one.
type ExpiryKey = (Option<DateTime<Utc>>, Option<DateTime<Utc>>, Option<i64>);

fn expiry_key(user: &UserInfo) -> ExpiryKey {
    (
        user.oidc_expiry,
        user.current_token_created_at,
        user.current_token_expiry_length,
    )
}

// ---------------------------------------------------------------------------
// LivenessSnapshot
// ---------------------------------------------------------------------------

/// What the presentation layer renders from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessSnapshot {
    pub verdict: Verdict,
    pub backend_reachable: bool,
    pub session_expired: bool,
    pub show_logged_out_prompt: bool,
    /// As of the last session observation.
    pub seconds_until_expiration: Option<i64>,
}

impl LivenessSnapshot {
    /// `true` exactly when the failure is recoverable.
    pub fn show_banner(&self) -> bool {
        self.verdict == Verdict::Degraded
    }
}

impl Default for LivenessSnapshot {
    fn default() -> Self {
        LivenessState::default().snapshot()
    }
}

// ---------------------------------------------------------------------------
// LivenessState
// ---------------------------------------------------------------------------

/// Per-page liveness state. Never persisted.
#[derive(Debug, Clone, Default)]
pub struct LivenessState {
    backend_reachable: Option<bool>,
    session_expired: bool,
    show_logged_out_prompt: bool,
    logged_out: Option<LogoutReason>,
    expiry_key: Option<ExpiryKey>,
    seconds_until_expiration: Option<i64>,
    /// `None` when refresh is disabled.
    refresh_threshold: Option<Duration>,
    refresh_started: bool,
}

impl LivenessState {
    /// `refresh_threshold` is the refresh cadence when a refresh URL is
    /// configured, `None` otherwise.
    pub fn new(refresh_threshold: Option<Duration>) -> Self {
        Self {
            refresh_threshold,
            ..Self::default()
        }
    }

    pub fn verdict(&self) -> Verdict {
        if let Some(reason) = self.logged_out {
            return Verdict::LoggedOut(reason);
        }
        // No poll yet counts as reachable.
        if self.backend_reachable == Some(false) {
            Verdict::Degraded
        } else {
            Verdict::Healthy
        }
    }

    pub fn show_banner(&self) -> bool {
        self.verdict() == Verdict::Degraded
    }

    pub fn is_logged_out(&self) -> bool {
        self.logged_out.is_some()
    }

    pub fn snapshot(&self) -> LivenessSnapshot {
        LivenessSnapshot {
            verdict: self.verdict(),
            backend_reachable: self.backend_reachable != Some(false),
            session_expired: self.session_expired,
            show_logged_out_prompt: self.show_logged_out_prompt,
            seconds_until_expiration: self.seconds_until_expiration,
        }
    }

    /// Applies one event.
    ///
    /// `now` is used to turn session expiry metadata into seconds;
    /// `current_path` decides whether a logout redirects. Once logged
    /// out, every event is ignored.
    pub fn apply(
        &mut self,
        event: LivenessEvent,
        now: DateTime<Utc>,
        current_path: &str,
    ) -> Vec<Effect> {
        if self.is_logged_out() {
            return Vec::new();
        }

        match event {
            LivenessEvent::HealthPolled(Ok(())) => {
                if self.backend_reachable == Some(false) {
                    tracing::info!("backend reachable again");
                }
                self.backend_reachable = Some(true);
                Vec::new()
            }
            LivenessEvent::HealthPolled(Err(e)) if e.is_redirect() => {
                self.log_out(LogoutReason::HealthRedirect, current_path)
            }
            LivenessEvent::HealthPolled(Err(e)) => {
                if self.backend_reachable != Some(false) {
                    tracing::warn!(error = %e, "backend unreachable");
                }
                self.backend_reachable = Some(false);
                Vec::new()
            }

            LivenessEvent::SessionPolled(Ok(user)) => self.observe_session(&user, now),
            LivenessEvent::SessionPolled(Err(e)) if e.is_redirect() => {
                self.log_out(LogoutReason::SessionForbidden, current_path)
            }
            LivenessEvent::SessionPolled(Err(e)) => {
                tracing::debug!(error = %e, "session poll failed, keeping verdict");
                Vec::new()
            }

            LivenessEvent::ExpiryFired { .. } => {
                self.session_expired = true;
                self.log_out(LogoutReason::SessionExpired, current_path)
            }

            LivenessEvent::Refreshed(RefreshOutcome::Renewed {
                session,
                seconds_until_expiration,
                ..
            }) => {
                self.expiry_key = Some(expiry_key(&session));
                self.seconds_until_expiration = seconds_until_expiration;
                let Some(seconds) = seconds_until_expiration else {
                    return Vec::new();
                };
                // Not RefreshNow: a session that is short by nature would
                // refresh in a tight loop.
                let mut effects = vec![Effect::ArmExpiry { seconds }];
                if self.expires_before_next_refresh(seconds) {
                    effects.push(Effect::RenewBefore { seconds });
                }
                effects
            }
            LivenessEvent::Refreshed(_) => Vec::new(),
        }
    }

    fn observe_session(&mut self, user: &UserInfo, now: DateTime<Utc>) -> Vec<Effect> {
        let key = expiry_key(user);
        if self.expiry_key == Some(key) {
            return Vec::new();
        }
        self.expiry_key = Some(key);

        let Some(seconds) = user.seconds_until_expiration(now) else {
            self.seconds_until_expiration = None;
            return Vec::new();
        };
        self.seconds_until_expiration = Some(seconds);

        let mut effects = vec![Effect::ArmExpiry { seconds }];
        if self.refresh_threshold.is_some() {
            if !self.refresh_started {
                self.refresh_started = true;
                effects.push(Effect::StartRefreshLoop);
            }
            if self.expires_before_next_refresh(seconds) {
                tracing::info!(seconds, "session expires soon, refreshing eagerly");
                effects.push(Effect::RefreshNow);
            }
        }
        effects
    }

    /// `false` when refresh is disabled.
    fn expires_before_next_refresh(&self, seconds: i64) -> bool {
        self.refresh_threshold.is_some_and(|threshold| {
            seconds < i64::try_from(threshold.as_secs()).unwrap_or(i64::MAX)
        })
    }

    fn log_out(&mut self, reason: LogoutReason, current_path: &str) -> Vec<Effect> {
        self.logged_out = Some(reason);
        let redirect = !is_auth_page(current_path);
        self.show_logged_out_prompt = redirect;
        tracing::info!(%reason, redirect, "logged out");
        vec![Effect::LoggedOut { reason, redirect }]
    }
}
