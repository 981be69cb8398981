//! Unified error type for Vigil.

use vigil_liveness::LivenessError;
use vigil_protocol::{FetchError, ProtocolError};
use vigil_session::SessionError;
use vigil_transport::TransportError;

use crate::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// Through the `vigil` crate you deal with this single error type; `?`
/// converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum VigilError {
    /// No response from the backend (connection, timeout, bad URL).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A body could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A backend call failed (redirect, error status, transport).
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Session establishment failed (provisioning, unreachable backend).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Liveness supervision failed (refresh step, stopped supervisor).
    #[error(transparent)]
    Liveness(#[from] LivenessError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
