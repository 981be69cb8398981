//! # Vigil
//!
//! Client-side session liveness for web apps whose users arrive with a
//! token delivered out-of-band.
//!
//! Vigil captures the token from the URL, exchanges it for a backend
//! session (creating the account on first use), then keeps watching that
//! session: backend health, session expiry, proactive token refresh, and
//! a forced return to the login page when the session is gone.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vigil::prelude::*;
//!
//! # async fn run() -> Result<(), VigilError> {
//! vigil::init_tracing();
//! let config = VigilConfig::from_env()?;
//! let page = Vigil::connect(
//!     config,
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(StaticCookies::empty()),
//!     Arc::new(MemoryNavigator::at("/chat")),
//! )?;
//!
//! let supervisor = page.supervise();
//! let mut updates = supervisor.subscribe();
//! while updates.changed().await.is_ok() {
//!     let snapshot = updates.borrow().clone();
//!     println!("{} (banner: {})", snapshot.verdict, snapshot.show_banner());
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod page;

pub use config::{
    ConfigError, VigilConfig, ENV_BASE_URL, ENV_ENTERPRISE_FEATURES, ENV_ENVIRONMENT,
    ENV_REFRESH_URL,
};
pub use error::VigilError;
pub use page::Vigil;

pub use vigil_liveness as liveness;
pub use vigil_protocol as protocol;
pub use vigil_session as session;
pub use vigil_tick as tick;
pub use vigil_transport as transport;

use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber filtered by `RUST_LOG` (default `info`).
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Everything most embedders need.
pub mod prelude {
    pub use crate::{init_tracing, Vigil, VigilConfig, VigilError};
    pub use vigil_liveness::{
        LivenessConfig, LivenessSnapshot, LogoutReason, SupervisorHandle, Verdict,
    };
    pub use vigil_session::{
        CookieSource, CredentialStore, LoginOutcome, MemoryNavigator, MemoryStore, Navigator,
        RouteDecision, RoutingConfig, StaticCookies,
    };
    pub use vigil_transport::HttpClient;
    #[cfg(feature = "reqwest")]
    pub use vigil_transport::ReqwestClient;
}
