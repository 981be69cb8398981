//! In-memory [`HttpClient`] for tests.
//!
//! ```rust
//! use vigil_transport::testing::ScriptedClient;
//! use vigil_transport::{HttpClient, HttpRequest, HttpResponse, Method};
//!
//! # tokio_test_block_on(async {
//! let client = ScriptedClient::new();
//! client.respond("/api/health", HttpResponse::new(200, "{}"));
//! client.push("/api/me", HttpResponse::new(403, "forbidden"));
//!
//! let resp = client.request(HttpRequest::get("/api/me")).await.unwrap();
//! assert_eq!(resp.status, 403);
//! assert_eq!(client.count(Method::Get, "/api/me"), 1);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use crate::{HttpClient, HttpRequest, HttpResponse, Method, TransportError};

/// One scripted outcome for a path.
#[derive(Debug, Clone)]
enum Scripted {
    Respond(HttpResponse),
    Fail(String),
}

#[derive(Debug, Default)]
struct Script {
    /// Consumed front to back before `fallback` is used.
    queued: VecDeque<Scripted>,
    fallback: Option<Scripted>,
    latency: Duration,
}

/// An [`HttpClient`] whose answers are scripted per path.
///
/// Paths are matched with the query string removed, so an absolute
/// refresh URL like `https://idp/refresh?info=json` is scripted as
/// `https://idp/refresh`. Unscripted paths answer `404`.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    scripts: Mutex<HashMap<String, Script>>,
    log: Mutex<Vec<HttpRequest>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the response returned for `path` once its queue is empty.
    pub fn respond(&self, path: &str, response: HttpResponse) {
        self.with_script(path, |s| s.fallback = Some(Scripted::Respond(response)));
    }

    /// Makes `path` fail at the transport level once its queue is empty.
    pub fn fail(&self, path: &str, reason: &str) {
        self.with_script(path, |s| s.fallback = Some(Scripted::Fail(reason.to_string())));
    }

    /// Queues a one-shot response for `path`.
    pub fn push(&self, path: &str, response: HttpResponse) {
        self.with_script(path, |s| s.queued.push_back(Scripted::Respond(response)));
    }

    /// Queues a one-shot transport failure for `path`.
    pub fn push_failure(&self, path: &str, reason: &str) {
        self.with_script(path, |s| s.queued.push_back(Scripted::Fail(reason.to_string())));
    }

    /// Delays every answer for `path` by `latency` (tokio time).
    pub fn latency(&self, path: &str, latency: Duration) {
        self.with_script(path, |s| s.latency = latency);
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    /// How many requests with `method` hit `path` (query ignored).
    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && strip_query(&r.path) == path)
            .count()
    }

    fn with_script(&self, path: &str, f: impl FnOnce(&mut Script)) {
        if let Ok(mut scripts) = self.scripts.lock() {
            f(scripts.entry(path.to_string()).or_default());
        }
    }

    /// Pops the next outcome for `path` and its latency.
    fn next(&self, path: &str) -> (Option<Scripted>, Duration) {
        let Ok(mut scripts) = self.scripts.lock() else {
            return (None, Duration::ZERO);
        };
        match scripts.get_mut(path) {
            Some(script) => {
                let outcome = script.queued.pop_front().or_else(|| script.fallback.clone());
                (outcome, script.latency)
            }
            None => (None, Duration::ZERO),
        }
    }
}

impl HttpClient for ScriptedClient {
    async fn request(
        &self,
        request: HttpRequest,
    ) -> Result<HttpResponse, TransportError> {
        let key = strip_query(&request.path).to_string();
        if let Ok(mut log) = self.log.lock() {
            log.push(request.clone());
        }

        let (outcome, latency) = self.next(&key);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        match outcome {
            Some(Scripted::Respond(resp)) => Ok(resp),
            Some(Scripted::Fail(reason)) => Err(TransportError::RequestFailed {
                path: request.path,
                reason,
            }),
            None => Ok(HttpResponse::new(404, "not scripted")),
        }
    }
}

fn strip_query(path: &str) -> &str {
    path.split_once('?').map_or(path, |(before, _)| before)
}
