//! Wire types exchanged with the backend and the external refresh endpoint.
//!
//! Credential-bearing types implement `Debug` by hand so a stray `?req`
//! in a log line never prints a token.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

/// Backend paths, relative to the application origin.
pub mod endpoints {
    /// Backend health probe. Non-2xx means unavailable; `403` means
    /// the user must re-authenticate.
    pub const HEALTH: &str = "/api/health";
    /// Current user and session metadata.
    pub const ME: &str = "/api/me";
    pub const LOGIN: &str = "/api/auth/login";
    pub const SIGNUP: &str = "/api/auth/register";
    pub const LOGOUT: &str = "/api/auth/logout";
    /// Receives token material obtained from the external refresh URL.
    pub const REFRESH_TOKEN: &str = "/api/enterprise-settings/refresh-token";
    /// The login surface users are redirected to.
    pub const LOGIN_PAGE: &str = "/auth/login";
}

// ---------------------------------------------------------------------------
// Login / signup
// ---------------------------------------------------------------------------

/// Body of `POST /api/auth/login`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub identity: String,
    pub credential: String,
}

impl LoginRequest {
    pub fn new(identity: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            credential: credential.into(),
        }
    }
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("identity", &self.identity)
            .field("credential", &"<redacted>")
            .finish()
    }
}

/// Body of `POST /api/auth/register`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupRequest {
    pub identity: String,
    pub credential: String,
    pub display_name: String,
}

impl SignupRequest {
    pub fn new(
        identity: impl Into<String>,
        credential: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            identity: identity.into(),
            credential: credential.into(),
            display_name: display_name.into(),
        }
    }
}

impl fmt::Debug for SignupRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignupRequest")
            .field("identity", &self.identity)
            .field("credential", &"<redacted>")
            .field("display_name", &self.display_name)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// UserInfo
// ---------------------------------------------------------------------------

/// The subset of `GET /api/me` the liveness core reads.
///
/// The session expiry is never sent directly. It is derived from two
/// optional sources: the OIDC expiry instant, and the backend token's
/// creation time plus lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub oidc_expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    pub current_token_created_at: Option<DateTime<Utc>>,
    /// Token lifetime in seconds.
    #[serde(default)]
    pub current_token_expiry_length: Option<i64>,
}

impl UserInfo {
    /// Whole seconds from `now` until the earliest known expiry.
    ///
    /// Returns `None` when the session carries no expiry data at all.
    /// Never negative: an already-expired session yields `0`.
    pub fn seconds_until_expiration(&self, now: DateTime<Utc>) -> Option<i64> {
        let token_expiry = match (self.current_token_created_at, self.current_token_expiry_length) {
            (Some(created), Some(length)) => TimeDelta::try_seconds(length)
                .and_then(|lifetime| created.checked_add_signed(lifetime)),
            _ => None,
        };

        [token_expiry, self.oidc_expiry]
            .into_iter()
            .flatten()
            .map(|expires_at| (expires_at - now).num_seconds())
            .min()
            .map(|secs| secs.max(0))
    }

    /// [`seconds_until_expiration`](Self::seconds_until_expiration) against the wall clock.
    pub fn seconds_until_expiration_now(&self) -> Option<i64> {
        self.seconds_until_expiration(Utc::now())
    }
}

// ---------------------------------------------------------------------------
// Refresh token data
// ---------------------------------------------------------------------------

/// Token material returned by the external refresh URL and forwarded
/// verbatim to `POST /api/enterprise-settings/refresh-token`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenData {
    pub access_token: String,
    pub refresh_token: String,
    pub session: RefreshSession,
    pub userinfo: RefreshUserInfo,
}

impl fmt::Debug for RefreshTokenData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshTokenData")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("session", &self.session)
            .field("userinfo", &self.userinfo)
            .finish()
    }
}

/// Session expiry as seen by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshSession {
    /// Unix timestamp (seconds).
    pub exp: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshUserInfo {
    #[serde(default)]
    pub sub: String,
    #[serde(default)]
    pub family_name: String,
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub email: String,
}
