//! The `tokenInfo` cookie: writing it as a `Set-Cookie` value and reading
//! it back out of a cookie string.
//!
//! Values are percent-encoded with `urlencoding`, so tokens containing
//! `;`, `=` or spaces survive the trip through the cookie jar.

use std::fmt;

/// The `SameSite` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "Strict"),
            Self::Lax => write!(f, "Lax"),
            Self::None => write!(f, "None"),
        }
    }
}

/// A cookie to set on the response, rendered by `Display` as a
/// `Set-Cookie` header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenCookie {
    pub name: String,
    /// Raw (unencoded) value.
    pub value: String,
    pub path: String,
    /// Always `false` for the token cookie: client code must read it.
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
}

impl TokenCookie {
    /// The cookie carrying a captured credential.
    pub fn token(value: impl Into<String>, secure: bool) -> Self {
        Self {
            name: crate::TOKEN_KEY.to_string(),
            value: value.into(),
            path: "/".to_string(),
            http_only: false,
            secure,
            same_site: SameSite::Lax,
        }
    }

    /// `name=value` with the value percent-encoded, as a browser sends it
    /// back in a `Cookie` header.
    pub fn pair(&self) -> String {
        format!("{}={}", self.name, urlencoding::encode(&self.value))
    }
}

impl fmt::Display for TokenCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}; Path={}", self.pair(), self.path)?;
        if self.http_only {
            write!(f, "; HttpOnly")?;
        }
        if self.secure {
            write!(f, "; Secure")?;
        }
        write!(f, "; SameSite={}", self.same_site)
    }
}

/// Finds cookie `name` in a `a=1; b=2` string and percent-decodes it.
///
/// Returns `None` when absent, empty, or not UTF-8 once decoded.
pub fn read_cookie(header: &str, name: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .and_then(|(_, v)| urlencoding::decode(v).ok())
        .map(|v| v.into_owned())
        .filter(|v| !v.is_empty())
}
