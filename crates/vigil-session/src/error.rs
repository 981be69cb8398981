//! Error types for the session layer.

use std::fmt;

use vigil_protocol::FetchError;

/// Which step of auto-provisioning gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningStage {
    /// Login failed and creating the account failed too.
    Signup,
    /// The account was created but logging into it still failed.
    LoginAfterSignup,
}

impl fmt::Display for ProvisioningStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signup => write!(f, "signup"),
            Self::LoginAfterSignup => write!(f, "login after signup"),
        }
    }
}

/// Errors that can occur while establishing a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Login and signup both failed. Terminal: needs an operator, the
    /// page stays on its loading state.
    #[error("auto-provisioning failed at {stage}: {source}")]
    Provisioning {
        stage: ProvisioningStage,
        #[source]
        source: FetchError,
    },

    /// The backend could not be reached during the login flow.
    #[error("login flow aborted: {0}")]
    Unreachable(#[source] FetchError),
}

impl SessionError {
    /// The provisioning stage that failed, if this is a provisioning error.
    pub fn stage(&self) -> Option<ProvisioningStage> {
        match self {
            Self::Provisioning { stage, .. } => Some(*stage),
            Self::Unreachable(_) => None,
        }
    }
}
