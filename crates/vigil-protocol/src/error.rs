//! Error types for the protocol layer.

use vigil_transport::TransportError;

/// Errors turning bodies into bytes and back.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization of a request body failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// A response body didn't match the expected shape.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The body decoded but violates the API's rules.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

/// A failed API call, classified for the liveness core.
///
/// The classification mirrors how the page reacts:
///
/// | Variant | Meaning | Typical reaction |
/// |---|---|---|
/// | `Transport` | no response at all | banner / retry |
/// | `Redirect` | `403` | force re-authentication |
/// | `Status` | any other non-2xx | banner / retry / signup |
/// | `Protocol` | body unreadable | treated like `Status` |
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The backend refused the session; the user must log in again.
    #[error("{path} answered {status}: re-authentication required")]
    Redirect { path: String, status: u16 },

    #[error("{path} answered {status}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl FetchError {
    /// `true` when the failure means "send the user back to login".
    pub fn is_redirect(&self) -> bool {
        matches!(self, Self::Redirect { .. })
    }

    /// `true` when no response was received at all.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// The HTTP status, when the backend answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Redirect { status, .. } | Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
