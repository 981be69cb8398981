//! HTTP capability layer for Vigil.
//!
//! The liveness core never talks to the network directly. It is handed
//! something that implements [`HttpClient`]: a single async method that
//! takes an [`HttpRequest`] and returns an [`HttpResponse`] (status +
//! raw body) or a [`TransportError`] when no response arrived at all.
//!
//! Whether a non-2xx status is a failure is a protocol decision, not a
//! transport one, so [`HttpClient::request`] returns `Ok` for every
//! response the server actually sent.
//!
//! # Feature Flags
//!
//! - `reqwest` (default): [`ReqwestClient`], backed by `reqwest` with a
//!   cookie store so the backend session cookie survives between calls.
//! - `testing`: [`testing::ScriptedClient`], an in-memory client with
//!   per-path scripted responses and a request log.

mod error;
#[cfg(feature = "reqwest")]
mod http;
#[cfg(feature = "testing")]
pub mod testing;

pub use error::TransportError;
#[cfg(feature = "reqwest")]
pub use http::ReqwestClient;

use std::fmt;
use std::future::Future;

/// HTTP method of a request. Only the verbs the backend API uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

/// A request to the backend (or to an absolute external URL).
///
/// `path` is either relative to the client's base URL (`/api/me`) or an
/// absolute URL (`https://idp.example.com/refresh?info=json`). The body,
/// when present, is already-encoded JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// A `GET` without a body.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    /// A `POST` carrying a JSON body.
    pub fn post(path: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Some(body),
        }
    }

    /// A `POST` without a body.
    pub fn post_empty(path: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: None,
        }
    }
}

/// A response the server actually sent, successful or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Builds a response from a status and anything byte-like.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// `true` for any 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The body as text, lossily decoded. Used for failure diagnostics.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// The HTTP capability handed to the core.
///
/// # Trait bounds
///
/// - `Send + Sync + 'static` → one client is shared (behind an `Arc`) by
///   the poll tasks, the refresh loop and the login flow.
/// - The returned future is `Send` so callers can run requests inside
///   `tokio::spawn`ed tasks. Implementors can still write `async fn`.
pub trait HttpClient: Send + Sync + 'static {
    /// Sends one request and waits for the response.
    ///
    /// Returns `Err` only when no response was received (connect failure,
    /// timeout, malformed URL). Any status code is `Ok`.
    fn request(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}
