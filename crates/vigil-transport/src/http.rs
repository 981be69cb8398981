//! [`HttpClient`] implementation using `reqwest`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use url::Url;

use crate::{HttpClient, HttpRequest, HttpResponse, Method, TransportError};

/// Counter for tagging requests in logs.
static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Default per-request timeout. The backend answers health and session
/// polls quickly; anything slower counts as unavailable.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// An [`HttpClient`] that talks to a real backend.
///
/// Relative paths are joined onto `base_url`; absolute URLs (the external
/// refresh endpoint) are used as-is. The underlying `reqwest::Client`
/// keeps a cookie store so the session cookie set by login is sent on
/// every later poll, the way a browser would.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    base_url: Url,
    inner: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a client for the backend at `base_url`.
    pub fn new(base_url: Url) -> Result<Self, TransportError> {
        let inner = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;
        Ok(Self { base_url, inner })
    }

    /// Parses `base_url` and creates a client for it.
    pub fn from_base(base_url: &str) -> Result<Self, TransportError> {
        let url = Url::parse(base_url).map_err(|e| TransportError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        Self::new(url)
    }

    /// The base URL relative paths are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn resolve(&self, path: &str) -> Result<Url, TransportError> {
        let resolved = match Url::parse(path) {
            Ok(absolute) => Ok(absolute),
            Err(url::ParseError::RelativeUrlWithoutBase) => self.base_url.join(path),
            Err(e) => Err(e),
        };
        resolved.map_err(|e| TransportError::InvalidUrl {
            url: path.to_string(),
            reason: e.to_string(),
        })
    }
}

impl HttpClient for ReqwestClient {
    async fn request(
        &self,
        request: HttpRequest,
    ) -> Result<HttpResponse, TransportError> {
        let id = NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed);
        let url = self.resolve(&request.path)?;

        let mut builder = match request.method {
            Method::Get => self.inner.get(url),
            Method::Post => self.inner.post(url),
        };
        if let Some(body) = request.body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        tracing::trace!(id, method = %request.method, path = %request.path, "sending request");

        let response = builder.send().await.map_err(|e| {
            TransportError::RequestFailed {
                path: request.path.clone(),
                reason: e.to_string(),
            }
        })?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| {
            TransportError::BodyFailed {
                path: request.path.clone(),
                reason: e.to_string(),
            }
        })?;

        tracing::debug!(id, method = %request.method, path = %request.path, status, "response received");

        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}
