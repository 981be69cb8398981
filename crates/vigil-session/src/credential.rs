//! The credential: an opaque token proving identity.

use std::fmt;

/// Name shared by the URL parameter, the cookie and the storage key.
pub const TOKEN_KEY: &str = "tokenInfo";

/// Storage key recording that the login surface already forced a reload
/// while looking for a credential.
pub const RELOAD_MARKER_KEY: &str = "tokenInfo.reloadAttempted";

/// An opaque bearer token delivered out-of-band.
///
/// The value is never interpreted, only forwarded to the backend. `Debug`
/// and `Display` are redacted so it can't leak into logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wraps a raw token. Returns `None` for empty or whitespace-only input.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            None
        } else {
            Some(Self(raw))
        }
    }

    /// The raw token, for sending to the backend.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential(<redacted, {} bytes>)", self.0.len())
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<credential>")
    }
}
