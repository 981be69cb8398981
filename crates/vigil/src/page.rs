//! `Vigil`: wires routing, auto-login and supervision for one page.

use std::sync::Arc;

use url::Url;
use vigil_liveness::{Supervisor, SupervisorHandle};
use vigil_protocol::{Api, JsonApi};
use vigil_session::{
    route, AutoLogin, CookieSource, CredentialStore, LoginOutcome, Navigator, RouteDecision,
};
use vigil_transport::HttpClient;

use crate::{VigilConfig, VigilError};

/// One page's session lifecycle.
///
/// ```text
/// route(url) ──→ auto_login() ──→ supervise() ──→ SupervisorHandle
///  (any page)   (login surface)   (signed-in pages)
/// ```
///
/// Each step is independent: the routing layer runs on every navigation,
/// the login flow only on the login surface, and supervision for as long
/// as a signed-in page is mounted.
pub struct Vigil<C, S, K, N> {
    api: JsonApi<C>,
    store: Arc<S>,
    cookies: Arc<K>,
    navigator: Arc<N>,
    config: VigilConfig,
}

impl<C, S, K, N> Vigil<C, S, K, N>
where
    C: HttpClient,
    S: CredentialStore,
    K: CookieSource,
    N: Navigator,
{
    pub fn new(
        client: Arc<C>,
        store: Arc<S>,
        cookies: Arc<K>,
        navigator: Arc<N>,
        config: VigilConfig,
    ) -> Self {
        Self {
            api: Api::new(client),
            store,
            cookies,
            navigator,
            config,
        }
    }

    pub fn config(&self) -> &VigilConfig {
        &self.config
    }

    pub fn api(&self) -> &JsonApi<C> {
        &self.api
    }

    /// Routing decision for an inbound URL. Pure; never fails.
    pub fn route(&self, url: &Url) -> RouteDecision {
        route(url, &self.config.routing)
    }

    /// Runs the auto-provisioning login flow once.
    pub async fn auto_login(&self) -> Result<LoginOutcome, VigilError> {
        let flow = AutoLogin::new(
            self.api.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.cookies),
            Arc::clone(&self.navigator),
        );
        Ok(flow.run().await?)
    }

    /// Starts liveness supervision. Dropping the handle stops it.
    pub fn supervise(&self) -> SupervisorHandle {
        Supervisor::new(
            self.api.clone(),
            Arc::clone(&self.navigator),
            self.config.liveness.clone(),
        )
        .spawn()
    }
}

#[cfg(feature = "reqwest")]
impl<S, K, N> Vigil<vigil_transport::ReqwestClient, S, K, N>
where
    S: CredentialStore,
    K: CookieSource,
    N: Navigator,
{
    /// A page talking to the real backend at `config.base_url`.
    pub fn connect(
        config: VigilConfig,
        store: Arc<S>,
        cookies: Arc<K>,
        navigator: Arc<N>,
    ) -> Result<Self, VigilError> {
        let client = vigil_transport::ReqwestClient::new(config.base_url.clone())?;
        tracing::info!(base_url = %config.base_url, "vigil connected");
        Ok(Self::new(Arc::new(client), store, cookies, navigator, config))
    }
}
