//! Liveness configuration: poll cadence, refresh loop and expiry grace.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

// ---------------------------------------------------------------------------
// PollConfig
// ---------------------------------------------------------------------------

/// How often health and session are polled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Time between polls of each resource.
    pub interval: Duration,

    /// A repeated request for the same resource within this window is
    /// skipped, as is one issued while a request is still in flight.
    pub dedup_window: Duration,

    /// Upper bound of the random delay before the first poll.
    pub initial_jitter: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            dedup_window: Duration::from_secs(30),
            initial_jitter: Duration::from_millis(250),
        }
    }
}

// ---------------------------------------------------------------------------
// RefreshConfig
// ---------------------------------------------------------------------------

/// The token refresh loop. Disabled entirely when `url` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// External endpoint that hands out fresh token material.
    pub url: Option<Url>,

    /// Time between scheduled refresh cycles. Also the eager threshold:
    /// a session expiring sooner than this is refreshed right away.
    pub cadence: Duration,

    /// Attempts per cycle before giving up until the next tick.
    pub max_retries: u32,

    /// Pause between pushing new tokens and re-fetching the session, so
    /// the backend has applied them.
    pub settle_delay: Duration,

    /// How long before expiry a renewed but still short-lived session is
    /// refreshed again.
    pub renewal_lead: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            url: None,
            cadence: Duration::from_secs(15 * 60),
            max_retries: 3,
            settle_delay: Duration::from_secs(4),
            renewal_lead: Duration::from_secs(60),
        }
    }
}

impl RefreshConfig {
    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }
}

// ---------------------------------------------------------------------------
// ExpiryConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryConfig {
    /// Added to the reported time-to-expiry before declaring the session
    /// expired, absorbing clock skew between client and server.
    pub grace: Duration,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(10),
        }
    }
}

// ---------------------------------------------------------------------------
// LivenessConfig
// ---------------------------------------------------------------------------

/// Everything the supervisor needs to know about timing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessConfig {
    pub poll: PollConfig,
    pub refresh: RefreshConfig,
    pub expiry: ExpiryConfig,
}

impl LivenessConfig {
    /// Shortest refresh cadence accepted.
    pub const MIN_REFRESH_CADENCE: Duration = Duration::from_secs(1);

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called by the supervisor before spawning. Poll periods are clamped
    /// again by the cadence itself.
    pub fn validated(mut self) -> Self {
        if self.refresh.max_retries == 0 {
            tracing::warn!("refresh max_retries is 0, using 1");
            self.refresh.max_retries = 1;
        }
        if self.refresh.cadence < Self::MIN_REFRESH_CADENCE {
            tracing::warn!(
                cadence_ms = self.refresh.cadence.as_millis() as u64,
                "refresh cadence below minimum, clamping"
            );
            self.refresh.cadence = Self::MIN_REFRESH_CADENCE;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_liveness_config_defaults() {
        let config = LivenessConfig::default();
        assert_eq!(config.poll.interval, Duration::from_secs(30));
        assert_eq!(config.poll.dedup_window, Duration::from_secs(30));
        assert_eq!(config.refresh.cadence, Duration::from_secs(900));
        assert_eq!(config.refresh.max_retries, 3);
        assert_eq!(config.refresh.settle_delay, Duration::from_secs(4));
        assert_eq!(config.refresh.renewal_lead, Duration::from_secs(60));
        assert_eq!(config.expiry.grace, Duration::from_secs(10));
        assert!(!config.refresh.is_enabled());
    }

    #[test]
    fn test_validated_clamps_retries_and_cadence() {
        let mut config = LivenessConfig::default();
        config.refresh.max_retries = 0;
        config.refresh.cadence = Duration::ZERO;

        let config = config.validated();
        assert_eq!(config.refresh.max_retries, 1);
        assert_eq!(config.refresh.cadence, LivenessConfig::MIN_REFRESH_CADENCE);
    }

    #[test]
    fn test_validated_keeps_sane_values() {
        let config = LivenessConfig::default();
        assert_eq!(config.clone().validated(), config);
    }
}
