//! Auto-provisioning login, run once when the login surface mounts.
//!
//! ```text
//! resolve credential ──(none)──→ reload once ──→ stop
//!        │
//!        ▼
//!      login ──ok──────────────────────────────┐
//!        │ fail                                │
//!        ▼                                     ▼
//!      signup ──fail──→ Provisioning(Signup)   reload
//!        │ ok                                  ▲
//!        ▼                                     │
//!      login ──fail──→ Provisioning(LoginAfterSignup)
//!        └──ok─────────────────────────────────┘
//! ```
//!
//! Signup is only attempted after a failed login, so running the flow
//! twice with the same credential never creates a second account: the
//! second run's first login succeeds.

use std::sync::Arc;

use vigil_protocol::{FetchError, JsonApi, LoginRequest, SignupRequest};
use vigil_transport::HttpClient;

use crate::{
    read_cookie, CookieSource, Credential, CredentialStore, Navigator, ProvisioningStage,
    SessionError, RELOAD_MARKER_KEY, TOKEN_KEY,
};

/// Identity sent with every login. The backend derives the real user
/// from the credential, so this never varies.
pub const PLACEHOLDER_IDENTITY: &str = "token@login.com";

/// How a successful run of [`AutoLogin::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Logged in; a full reload was requested so the app picks up the session.
    LoggedIn,
    /// No credential anywhere; one reload was requested so the routing
    /// layer can lift a token out of the URL.
    ReloadRequested,
    /// Still no credential after the one allowed reload. Nothing was called.
    NoCredential,
}

/// The auto-provisioning login flow.
pub struct AutoLogin<C, S, K, N> {
    api: JsonApi<C>,
    store: Arc<S>,
    cookies: Arc<K>,
    navigator: Arc<N>,
}

impl<C, S, K, N> AutoLogin<C, S, K, N>
where
    C: HttpClient,
    S: CredentialStore,
    K: CookieSource,
    N: Navigator,
{
    pub fn new(api: JsonApi<C>, store: Arc<S>, cookies: Arc<K>, navigator: Arc<N>) -> Self {
        Self {
            api,
            store,
            cookies,
            navigator,
        }
    }

    /// Runs the flow to completion.
    ///
    /// # Errors
    /// - [`SessionError::Provisioning`]: login and signup both failed, or
    ///   login failed again after a successful signup. Terminal.
    /// - [`SessionError::Unreachable`]: no response from the backend.
    pub async fn run(&self) -> Result<LoginOutcome, SessionError> {
        let Some(credential) = self.resolve_credential() else {
            return Ok(self.reload_once());
        };

        let login = LoginRequest::new(PLACEHOLDER_IDENTITY, credential.expose());

        match self.api.login(&login).await {
            Ok(()) => return Ok(self.finish()),
            Err(e) if e.is_transport() => return Err(self.unreachable(e)),
            Err(e) => {
                tracing::info!(error = %e, "login failed, provisioning account");
            }
        }

        let signup = SignupRequest::new(PLACEHOLDER_IDENTITY, credential.expose(), "");
        if let Err(e) = self.api.signup(&signup).await {
            if e.is_transport() {
                return Err(self.unreachable(e));
            }
            return Err(self.provisioning_failed(ProvisioningStage::Signup, e));
        }

        match self.api.login(&login).await {
            Ok(()) => Ok(self.finish()),
            Err(e) if e.is_transport() => Err(self.unreachable(e)),
            Err(e) => Err(self.provisioning_failed(ProvisioningStage::LoginAfterSignup, e)),
        }
    }

    /// Durable storage first, then the cookie (persisted on first sight).
    fn resolve_credential(&self) -> Option<Credential> {
        if let Some(stored) = self.store.get(TOKEN_KEY).and_then(Credential::new) {
            self.store.remove(RELOAD_MARKER_KEY);
            return Some(stored);
        }

        let header = self.cookies.cookie_header()?;
        let from_cookie = read_cookie(&header, TOKEN_KEY).and_then(Credential::new)?;
        self.store.set(TOKEN_KEY, from_cookie.expose());
        self.store.remove(RELOAD_MARKER_KEY);
        tracing::debug!("credential persisted from cookie");
        Some(from_cookie)
    }

    fn reload_once(&self) -> LoginOutcome {
        if self.store.get(RELOAD_MARKER_KEY).is_some() {
            tracing::warn!("no credential found after reload; giving up");
            return LoginOutcome::NoCredential;
        }
        self.store.set(RELOAD_MARKER_KEY, "1");
        tracing::info!("no credential found; reloading once");
        self.navigator.reload();
        LoginOutcome::ReloadRequested
    }

    fn finish(&self) -> LoginOutcome {
        tracing::info!("auto-login succeeded; reloading");
        self.navigator.reload();
        LoginOutcome::LoggedIn
    }

    fn provisioning_failed(&self, stage: ProvisioningStage, source: FetchError) -> SessionError {
        tracing::error!(%stage, error = %source, "auto-provisioning failed");
        SessionError::Provisioning { stage, source }
    }

    fn unreachable(&self, source: FetchError) -> SessionError {
        tracing::error!(error = %source, "auto-login could not reach backend");
        SessionError::Unreachable(source)
    }
}
