//! Typed backend calls with error classification.
//!
//! Every call goes through [`Api::send`], which turns the raw
//! [`HttpResponse`] into either success or a [`FetchError`]:
//!
//! ```text
//! no response ──→ FetchError::Transport
//! 2xx         ──→ Ok
//! 403         ──→ FetchError::Redirect   (must re-authenticate)
//! other       ──→ FetchError::Status     (body kept as text)
//! ```

use std::sync::Arc;

use serde::de::DeserializeOwned;
use vigil_transport::{HttpClient, HttpRequest, HttpResponse};

#[cfg(feature = "json")]
use crate::JsonCodec;
use crate::types::endpoints;
use crate::{Codec, FetchError, LoginRequest, RefreshTokenData, SignupRequest, UserInfo};

/// Status that always means "the session is gone, log in again".
const FORBIDDEN: u16 = 403;

/// The backend API over an [`HttpClient`].
///
/// Cheap to clone: the client is behind an `Arc` and codecs are unit
/// structs, so each background task holds its own copy.
pub struct Api<C, K> {
    client: Arc<C>,
    codec: K,
}

/// The API with the JSON codec, which is what the backend speaks.
#[cfg(feature = "json")]
pub type JsonApi<C> = Api<C, JsonCodec>;

impl<C, K: Clone> Clone for Api<C, K> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            codec: self.codec.clone(),
        }
    }
}

#[cfg(feature = "json")]
impl<C: HttpClient> Api<C, JsonCodec> {
    pub fn new(client: Arc<C>) -> Self {
        Self::with_codec(client, JsonCodec)
    }
}

impl<C: HttpClient, K: Codec> Api<C, K> {
    pub fn with_codec(client: Arc<C>, codec: K) -> Self {
        Self { client, codec }
    }

    /// The underlying HTTP capability.
    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// `GET /api/health`. The body is ignored.
    pub async fn health(&self) -> Result<(), FetchError> {
        self.send(HttpRequest::get(endpoints::HEALTH)).await.map(drop)
    }

    /// `GET /api/me`.
    pub async fn me(&self) -> Result<UserInfo, FetchError> {
        self.get_json(endpoints::ME).await
    }

    /// `POST /api/auth/login`.
    pub async fn login(&self, req: &LoginRequest) -> Result<(), FetchError> {
        let body = self.codec.encode(req)?;
        self.send(HttpRequest::post(endpoints::LOGIN, body)).await.map(drop)
    }

    /// `POST /api/auth/register`.
    pub async fn signup(&self, req: &SignupRequest) -> Result<(), FetchError> {
        let body = self.codec.encode(req)?;
        self.send(HttpRequest::post(endpoints::SIGNUP, body)).await.map(drop)
    }

    /// `POST /api/auth/logout`.
    pub async fn logout(&self) -> Result<(), FetchError> {
        self.send(HttpRequest::post_empty(endpoints::LOGOUT)).await.map(drop)
    }

    /// `POST /api/enterprise-settings/refresh-token` with fresh token material.
    pub async fn push_refresh_token(&self, data: &RefreshTokenData) -> Result<(), FetchError> {
        let body = self.codec.encode(data)?;
        self.send(HttpRequest::post(endpoints::REFRESH_TOKEN, body))
            .await
            .map(drop)
    }

    /// `GET` any path (or absolute URL) and decode a 2xx body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let resp = self.send(HttpRequest::get(path)).await?;
        Ok(self.codec.decode(&resp.body)?)
    }

    /// Sends a request and classifies the outcome.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, FetchError> {
        let path = request.path.clone();
        let resp = self.client.request(request).await?;
        classify(path, resp)
    }
}

fn classify(path: String, resp: HttpResponse) -> Result<HttpResponse, FetchError> {
    if resp.is_success() {
        return Ok(resp);
    }
    tracing::debug!(%path, status = resp.status, "request failed");
    if resp.status == FORBIDDEN {
        Err(FetchError::Redirect {
            path,
            status: resp.status,
        })
    } else {
        Err(FetchError::Status {
            path,
            status: resp.status,
            body: resp.text(),
        })
    }
}
