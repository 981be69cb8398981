//! Token refresh: one cycle with retries, and the loop that runs cycles
//! on a cadence or on demand.
//!
//! ```text
//! refresh() ──→ push to backend ──→ settle ──→ GET /api/me ──→ Renewed
//!     │               │                            │
//!     └───── any failure: back off 2s, 4s … ───────┘
//!                    after max_retries ──→ Exhausted
//! ```
//!
//! Only one cycle runs at a time. [`RefreshGate`] is held for the whole
//! cycle; a trigger that finds it held returns [`RefreshOutcome::Skipped`]
//! immediately instead of queueing.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use url::Url;
use vigil_protocol::{FetchError, JsonApi, RefreshTokenData, UserInfo};
use vigil_tick::{Cadence, CadenceConfig, Deadline, FirstTick};
use vigil_transport::HttpClient;

use crate::{LivenessError, LivenessEvent, RefreshConfig, RefreshStep};

/// Refresh interval (seconds) requested from the external endpoint.
pub const REQUESTED_REFRESH_INTERVAL_SECS: u32 = 3600;

// ---------------------------------------------------------------------------
// TokenRefresher
// ---------------------------------------------------------------------------

/// Source of fresh token material.
pub trait TokenRefresher: Send + Sync + 'static {
    fn refresh(&self) -> impl Future<Output = Result<RefreshTokenData, FetchError>> + Send;
}

/// Fetches token material from an external URL over the app's HTTP client.
pub struct HttpRefresher<C> {
    api: JsonApi<C>,
    url: Url,
}

impl<C: HttpClient> HttpRefresher<C> {
    /// `url` gets the `info=json` and `access_token_refresh_interval`
    /// query parameters appended.
    pub fn new(api: JsonApi<C>, url: &Url) -> Self {
        let mut url = url.clone();
        url.query_pairs_mut()
            .append_pair("info", "json")
            .append_pair(
                "access_token_refresh_interval",
                &REQUESTED_REFRESH_INTERVAL_SECS.to_string(),
            );
        Self { api, url }
    }

    /// The full URL requested on each refresh.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl<C: HttpClient> TokenRefresher for HttpRefresher<C> {
    async fn refresh(&self) -> Result<RefreshTokenData, FetchError> {
        self.api.get_json(self.url.as_str()).await
    }
}

// ---------------------------------------------------------------------------
// Outcome and attempt schedule
// ---------------------------------------------------------------------------

/// How a refresh cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New tokens are in place and the session was re-fetched.
    Renewed {
        session: UserInfo,
        /// `None` when the re-fetched session carries no expiry data.
        seconds_until_expiration: Option<i64>,
        attempts: u32,
    },
    /// Every attempt failed. The next cadence tick tries again.
    Exhausted { attempts: u32 },
    /// Another cycle was already in flight; nothing was done.
    Skipped,
}

/// One attempt within a cycle and the backoff that precedes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshAttempt {
    /// 1-based.
    pub attempt: u32,
    pub backoff: Duration,
}

impl RefreshAttempt {
    /// The attempts of one cycle: no wait before the first, then
    /// `2^k` seconds before attempt `k + 1`.
    pub fn schedule(max_retries: u32) -> impl Iterator<Item = RefreshAttempt> {
        (1..=max_retries).map(|attempt| RefreshAttempt {
            attempt,
            backoff: if attempt == 1 {
                Duration::ZERO
            } else {
                Duration::from_secs(1u64 << (attempt - 1).min(16))
            },
        })
    }
}

// ---------------------------------------------------------------------------
// RefreshGate
// ---------------------------------------------------------------------------

/// Mutual exclusion for refresh cycles.
///
/// Unlike a mutex, a caller that finds the gate held does not wait.
#[derive(Debug, Clone, Default)]
pub struct RefreshGate {
    held: Arc<AtomicBool>,
}

impl RefreshGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the gate if free. It is released when the guard drops,
    /// including when the holding task is aborted.
    pub fn try_acquire(&self) -> Option<RefreshGuard> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RefreshGuard {
                held: Arc::clone(&self.held),
            })
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// Proof of holding the [`RefreshGate`].
#[derive(Debug)]
pub struct RefreshGuard {
    held: Arc<AtomicBool>,
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// RefreshCycle
// ---------------------------------------------------------------------------

/// One refresh cycle: up to `max_retries` attempts with backoff.
pub struct RefreshCycle<C, R> {
    api: JsonApi<C>,
    refresher: Arc<R>,
    gate: RefreshGate,
    max_retries: u32,
    settle_delay: Duration,
}

impl<C: HttpClient, R: TokenRefresher> RefreshCycle<C, R> {
    pub fn new(api: JsonApi<C>, refresher: Arc<R>, config: &RefreshConfig) -> Self {
        Self {
            api,
            refresher,
            gate: RefreshGate::new(),
            max_retries: config.max_retries.max(1),
            settle_delay: config.settle_delay,
        }
    }

    /// Runs the cycle. Never fails: exhaustion is an outcome.
    pub async fn run(&self) -> RefreshOutcome {
        let Some(_guard) = self.gate.try_acquire() else {
            tracing::debug!("refresh already in flight, skipping");
            return RefreshOutcome::Skipped;
        };

        for RefreshAttempt { attempt, backoff } in RefreshAttempt::schedule(self.max_retries) {
            if !backoff.is_zero() {
                tokio::time::sleep(backoff).await;
            }
            match self.attempt().await {
                Ok(session) => {
                    let seconds_until_expiration = session.seconds_until_expiration_now();
                    tracing::info!(attempt, ?seconds_until_expiration, "token refreshed");
                    return RefreshOutcome::Renewed {
                        session,
                        seconds_until_expiration,
                        attempts: attempt,
                    };
                }
                Err(e) => {
                    tracing::debug!(attempt, error = %e, "refresh attempt failed");
                }
            }
        }

        tracing::warn!(attempts = self.max_retries, "token refresh exhausted");
        RefreshOutcome::Exhausted {
            attempts: self.max_retries,
        }
    }

    async fn attempt(&self) -> Result<UserInfo, LivenessError> {
        let tokens = self
            .refresher
            .refresh()
            .await
            .map_err(|source| LivenessError::Refresh {
                step: RefreshStep::Fetch,
                source,
            })?;

        self.api
            .push_refresh_token(&tokens)
            .await
            .map_err(|source| LivenessError::Refresh {
                step: RefreshStep::Push,
                source,
            })?;

        tokio::time::sleep(self.settle_delay).await;

        // Straight to the API: the supervisor's dedup window must not
        // hide the session the new tokens produced.
        self.api.me().await.map_err(|source| LivenessError::Refresh {
            step: RefreshStep::Revalidate,
            source,
        })
    }
}

// ---------------------------------------------------------------------------
// RefreshLoop
// ---------------------------------------------------------------------------

/// Runs refresh cycles on a cadence and on demand, reporting every
/// outcome as [`LivenessEvent::Refreshed`].
///
/// The first scheduled cycle fires one cadence period after start.
/// Dropping the loop aborts the cadence, any pending renewal and any
/// in-flight cycle.
#[derive(Debug)]
pub struct RefreshLoop {
    trigger: mpsc::UnboundedSender<()>,
    renewal: Deadline,
    task: JoinHandle<()>,
}

impl RefreshLoop {
    /// Spawns the loop. Must be called inside a Tokio runtime.
    pub fn start<C, R>(
        cycle: RefreshCycle<C, R>,
        cadence: Duration,
        sink: mpsc::UnboundedSender<LivenessEvent>,
    ) -> Self
    where
        C: HttpClient,
        R: TokenRefresher,
    {
        let (trigger, triggers) = mpsc::unbounded_channel();
        let cadence = Cadence::new(CadenceConfig::every(cadence).starting(FirstTick::AfterPeriod));
        let task = tokio::spawn(run_loop(Arc::new(cycle), cadence, triggers, sink));
        tracing::info!("refresh loop started");
        Self {
            trigger,
            renewal: Deadline::new("token-renewal"),
            task,
        }
    }

    /// Requests a cycle now. Skipped if one is already running.
    pub fn trigger(&self) {
        let _ = self.trigger.send(());
    }

    /// Schedules one cycle ahead of a session expiring in `seconds`,
    /// replacing any earlier renewal. See [`renewal_delay`].
    pub fn renew_before(&mut self, seconds: i64, lead: Duration) {
        let after = renewal_delay(seconds, lead);
        tracing::info!(seconds, after_secs = after.as_secs(), "renewal scheduled");
        let trigger = self.trigger.clone();
        self.renewal.arm(after, async move {
            let _ = trigger.send(());
        });
    }

    /// When the pending renewal runs, if one is scheduled.
    pub fn renewal_due_at(&self) -> Option<tokio::time::Instant> {
        self.renewal.due_at()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for RefreshLoop {
    fn drop(&mut self) {
        self.task.abort();
        tracing::debug!("refresh loop stopped");
    }
}

/// Delay before renewing a session that expires in `seconds`: `lead`
/// ahead of expiry, but no earlier than halfway there and never under a
/// second, so a session shorter than `lead` doesn't renew back to back.
pub fn renewal_delay(seconds: i64, lead: Duration) -> Duration {
    let seconds = u64::try_from(seconds).unwrap_or(0);
    let ahead = seconds.saturating_sub(lead.as_secs());
    Duration::from_secs(ahead.max(seconds / 2).max(1))
}

async fn run_loop<C, R>(
    cycle: Arc<RefreshCycle<C, R>>,
    mut cadence: Cadence,
    mut triggers: mpsc::UnboundedReceiver<()>,
    sink: mpsc::UnboundedSender<LivenessEvent>,
) where
    C: HttpClient,
    R: TokenRefresher,
{
    // Owned here so aborting this task aborts in-flight cycles too.
    let mut cycles = JoinSet::new();

    loop {
        tokio::select! {
            tick = cadence.wait_for_tick() => {
                tracing::debug!(tick = tick.tick, "refresh cadence tick");
            }
            trigger = triggers.recv() => {
                if trigger.is_none() {
                    break;
                }
                tracing::debug!("refresh requested");
            }
            Some(_) = cycles.join_next(), if !cycles.is_empty() => continue,
        }

        let cycle = Arc::clone(&cycle);
        let sink = sink.clone();
        cycles.spawn(async move {
            let outcome = cycle.run().await;
            let _ = sink.send(LivenessEvent::Refreshed(outcome));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_backs_off_exponentially() {
        let schedule: Vec<_> = RefreshAttempt::schedule(3).collect();
        assert_eq!(
            schedule,
            vec![
                RefreshAttempt {
                    attempt: 1,
                    backoff: Duration::ZERO
                },
                RefreshAttempt {
                    attempt: 2,
                    backoff: Duration::from_secs(2)
                },
                RefreshAttempt {
                    attempt: 3,
                    backoff: Duration::from_secs(4)
                },
            ]
        );
    }

    #[test]
    fn test_schedule_empty_for_zero_retries() {
        assert_eq!(RefreshAttempt::schedule(0).count(), 0);
    }

    #[test]
    fn test_renewal_delay_leads_expiry() {
        let lead = Duration::from_secs(60);
        assert_eq!(renewal_delay(600, lead), Duration::from_secs(540));
        assert_eq!(renewal_delay(3600, lead), Duration::from_secs(3540));
    }

    #[test]
    fn test_renewal_delay_waits_at_least_half_the_lifetime() {
        let lead = Duration::from_secs(60);
        assert_eq!(renewal_delay(90, lead), Duration::from_secs(45));
        assert_eq!(renewal_delay(30, lead), Duration::from_secs(15));
    }

    #[test]
    fn test_renewal_delay_floors_at_one_second() {
        let lead = Duration::from_secs(60);
        assert_eq!(renewal_delay(1, lead), Duration::from_secs(1));
        assert_eq!(renewal_delay(0, lead), Duration::from_secs(1));
        assert_eq!(renewal_delay(-30, lead), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_renew_before_triggers_once_at_delay() {
        let (trigger, mut triggers) = mpsc::unbounded_channel();
        let mut renewal = RefreshLoop {
            trigger,
            renewal: Deadline::new("token-renewal"),
            task: tokio::spawn(async {}),
        };
        let start = tokio::time::Instant::now();

        renewal.renew_before(600, Duration::from_secs(60));
        renewal.renew_before(120, Duration::from_secs(60));
        assert_eq!(
            renewal.renewal_due_at(),
            Some(start + Duration::from_secs(60)),
            "re-scheduling replaces the earlier renewal"
        );

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert!(triggers.try_recv().is_err());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(triggers.try_recv().is_ok());

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert!(triggers.try_recv().is_err(), "fires once");
    }

    #[test]
    fn test_gate_is_exclusive_until_guard_drops() {
        let gate = RefreshGate::new();
        let guard = gate.try_acquire().unwrap();
        assert!(gate.is_held());
        assert!(gate.try_acquire().is_none());
        assert!(gate.clone().try_acquire().is_none(), "clones share the flag");

        drop(guard);
        assert!(!gate.is_held());
        assert!(gate.try_acquire().is_some());
    }
}
