//! Error types for the liveness layer.

use std::fmt;

use vigil_protocol::FetchError;

/// The step of a refresh attempt that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStep {
    /// Fetching token material from the external refresh endpoint.
    Fetch,
    /// Pushing the token material to the backend.
    Push,
    /// Re-fetching the session after the settle delay.
    Revalidate,
}

impl fmt::Display for RefreshStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch => write!(f, "fetch"),
            Self::Push => write!(f, "push"),
            Self::Revalidate => write!(f, "revalidate"),
        }
    }
}

/// Errors that can occur in the liveness layer.
#[derive(Debug, thiserror::Error)]
pub enum LivenessError {
    /// One step of a refresh attempt failed. The cycle retries.
    #[error("refresh {step} failed: {source}")]
    Refresh {
        step: RefreshStep,
        #[source]
        source: FetchError,
    },

    /// The supervisor actor has stopped; its handle is stale.
    #[error("liveness supervisor has stopped")]
    Stopped,
}

impl LivenessError {
    /// The failed refresh step, if this is a refresh error.
    pub fn step(&self) -> Option<RefreshStep> {
        match self {
            Self::Refresh { step, .. } => Some(*step),
            Self::Stopped => None,
        }
    }
}
