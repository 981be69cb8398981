//! Credential capture and session establishment for Vigil.
//!
//! This crate covers everything that happens *before* a session exists:
//!
//! 1. **Token capture** ([`route`]): the routing layer lifts a
//!    `tokenInfo` query parameter into a cookie and strips it from the
//!    visible URL.
//! 2. **Credential resolution**: durable storage first, cookie second
//!    ([`CredentialStore`], [`CookieSource`]).
//! 3. **Auto-provisioning login** ([`AutoLogin`]): login, falling back to
//!    signup-then-login, then a full reload.
//!
//! The browser-side globals (storage, cookies, location) are capabilities
//! passed in as traits, so the logic runs the same under test.
//!
//! ```text
//! Liveness Layer (above)  ← supervises the session this crate creates
//!     ↕
//! Session Layer (this crate)  ← turns a delivered token into a session
//!     ↕
//! Protocol Layer (below)  ← login / signup calls, FetchError
//! ```

mod capability;
mod cookie;
mod credential;
mod error;
mod login;
mod routing;

pub use capability::{
    is_auth_page, CookieSource, CredentialStore, MemoryNavigator, MemoryStore, Navigator,
    StaticCookies,
};
pub use cookie::{read_cookie, SameSite, TokenCookie};
pub use credential::{Credential, RELOAD_MARKER_KEY, TOKEN_KEY};
pub use error::{ProvisioningStage, SessionError};
pub use login::{AutoLogin, LoginOutcome, PLACEHOLDER_IDENTITY};
pub use routing::{route, RouteDecision, RoutingConfig, ENTERPRISE_PATH_PREFIXES};
