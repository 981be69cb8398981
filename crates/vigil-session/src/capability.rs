//! Capabilities standing in for browser globals.
//!
//! The core never reaches for storage, cookies or the location bar
//! directly. It is handed these traits, which keeps it testable and lets
//! an embedder back them with whatever the host actually has.

use std::collections::HashMap;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Durable key-value storage (survives page loads on one device).
pub trait CredentialStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Read access to the cookies visible to client code.
pub trait CookieSource: Send + Sync + 'static {
    /// The raw `name=value; name2=value2` cookie string, if any.
    fn cookie_header(&self) -> Option<String>;
}

/// Redirect capability.
pub trait Navigator: Send + Sync + 'static {
    /// Client-side navigation to `path`.
    fn navigate(&self, path: &str);
    /// Full reload of the current page.
    fn reload(&self);
    /// Path of the page currently shown.
    fn current_path(&self) -> String;
}

/// Authentication pages never get the logged-out prompt or a redirect.
pub fn is_auth_page(path: &str) -> bool {
    path.contains("/auth")
}

// ---------------------------------------------------------------------------
// In-memory implementations
// ---------------------------------------------------------------------------

/// A [`CredentialStore`] backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with one entry.
    pub fn with(key: &str, value: &str) -> Self {
        let store = Self::new();
        store.set(key, value);
        store
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }
}

/// A [`CookieSource`] returning a fixed cookie string.
#[derive(Debug, Default, Clone)]
pub struct StaticCookies(Option<String>);

impl StaticCookies {
    pub fn new(header: impl Into<String>) -> Self {
        Self(Some(header.into()))
    }

    pub fn empty() -> Self {
        Self(None)
    }
}

impl CookieSource for StaticCookies {
    fn cookie_header(&self) -> Option<String> {
        self.0.clone()
    }
}

/// A [`Navigator`] that records what it was asked to do.
///
/// `navigate` updates the current path, so auth-page checks made after a
/// redirect see the login page, as they would in a browser.
#[derive(Debug)]
pub struct MemoryNavigator {
    state: Mutex<NavState>,
}

#[derive(Debug)]
struct NavState {
    path: String,
    navigations: Vec<String>,
    reloads: usize,
}

impl MemoryNavigator {
    pub fn at(path: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(NavState {
                path: path.into(),
                navigations: Vec::new(),
                reloads: 0,
            }),
        }
    }

    /// Every path passed to `navigate`, in order.
    pub fn navigations(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.navigations.clone())
            .unwrap_or_default()
    }

    pub fn reloads(&self) -> usize {
        self.state.lock().map(|s| s.reloads).unwrap_or_default()
    }
}

impl Navigator for MemoryNavigator {
    fn navigate(&self, path: &str) {
        if let Ok(mut s) = self.state.lock() {
            tracing::debug!(from = %s.path, to = path, "navigate");
            s.path = path.to_string();
            s.navigations.push(path.to_string());
        }
    }

    fn reload(&self) {
        if let Ok(mut s) = self.state.lock() {
            tracing::debug!(path = %s.path, "reload");
            s.reloads += 1;
        }
    }

    fn current_path(&self) -> String {
        self.state
            .lock()
            .map(|s| s.path.clone())
            .unwrap_or_default()
    }
}
