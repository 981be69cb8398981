//! Routing layer: runs once per navigation, before any page renders.
//!
//! Synchronous and I/O-free. Two concerns, checked in this order:
//!
//! 1. **Enterprise rewrite**: when enterprise features are on, a fixed
//!    set of admin paths is served from under `/ee`.
//! 2. **Token capture**: a `tokenInfo` query parameter becomes a cookie
//!    and disappears from the visible URL.

use url::Url;

use crate::{TokenCookie, TOKEN_KEY};

/// Paths served from the enterprise tree when enterprise features are on.
pub const ENTERPRISE_PATH_PREFIXES: &[&str] = &[
    "/admin/groups",
    "/admin/performance/usage",
    "/admin/performance/query-history",
    "/admin/whitelabeling",
    "/admin/performance/custom-analytics",
    "/admin/standard-answer",
    "/assistants/stats",
    "/admin/billing",
];

/// Settings for [`route`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoutingConfig {
    /// Production-like deployment: the token cookie gets `Secure`.
    pub production: bool,
    pub enterprise_features: bool,
}

/// What the routing layer does with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Serve the request unchanged.
    PassThrough,
    /// Serve the content of another URL without changing the visible one.
    Rewrite(Url),
    /// Set `cookie` and send the client to `location` (token stripped).
    CaptureToken { cookie: TokenCookie, location: Url },
}

/// Decides how to handle an inbound request URL.
pub fn route(url: &Url, config: &RoutingConfig) -> RouteDecision {
    if config.enterprise_features {
        if let Some(rewritten) = enterprise_rewrite(url) {
            tracing::debug!(from = url.path(), to = rewritten.path(), "enterprise rewrite");
            return RouteDecision::Rewrite(rewritten);
        }
    }

    // Last occurrence wins if the parameter is repeated; all are stripped.
    let token = url
        .query_pairs()
        .filter(|(k, _)| k == TOKEN_KEY)
        .map(|(_, v)| v.into_owned())
        .last();

    match token {
        Some(token) if !token.is_empty() => {
            let location = strip_param(url, TOKEN_KEY);
            tracing::info!(path = url.path(), "captured token from url");
            RouteDecision::CaptureToken {
                cookie: TokenCookie::token(token, config.production),
                location,
            }
        }
        _ => RouteDecision::PassThrough,
    }
}

fn enterprise_rewrite(url: &Url) -> Option<Url> {
    let path = url.path();
    if !ENTERPRISE_PATH_PREFIXES
        .iter()
        .any(|prefix| path.starts_with(prefix))
    {
        return None;
    }
    let mut rewritten = url.clone();
    rewritten.set_path(&format!("/ee{path}"));
    Some(rewritten)
}

/// `url` with every `name` parameter removed; other parameters keep
/// their order. An emptied query is dropped entirely (no trailing `?`).
fn strip_param(url: &Url, name: &str) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != name)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut stripped = url.clone();
    if kept.is_empty() {
        stripped.set_query(None);
    } else {
        stripped.query_pairs_mut().clear().extend_pairs(kept);
    }
    stripped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn dev() -> RoutingConfig {
        RoutingConfig::default()
    }

    #[test]
    fn test_route_captures_token_and_strips_it() {
        let decision = route(&url("https://app.example.com/chat?tokenInfo=abc"), &dev());
        match decision {
            RouteDecision::CaptureToken { cookie, location } => {
                assert_eq!(cookie.name, "tokenInfo");
                assert_eq!(cookie.value, "abc");
                assert_eq!(cookie.path, "/");
                assert!(!cookie.http_only);
                assert!(!cookie.secure);
                assert_eq!(location.as_str(), "https://app.example.com/chat");
            }
            other => panic!("expected CaptureToken, got {other:?}"),
        }
    }

    #[test]
    fn test_route_keeps_other_params_in_order() {
        let decision = route(
            &url("https://app.example.com/chat?a=1&tokenInfo=abc&b=2"),
            &dev(),
        );
        let RouteDecision::CaptureToken { location, .. } = decision else {
            panic!("expected capture");
        };
        assert_eq!(location.query(), Some("a=1&b=2"));
    }

    #[test]
    fn test_route_cookie_secure_in_production() {
        let config = RoutingConfig {
            production: true,
            ..dev()
        };
        let RouteDecision::CaptureToken { cookie, .. } =
            route(&url("https://app.example.com/?tokenInfo=abc"), &config)
        else {
            panic!("expected capture");
        };
        assert!(cookie.secure);
    }

    #[test]
    fn test_route_without_token_passes_through() {
        assert_eq!(
            route(&url("https://app.example.com/chat?a=1"), &dev()),
            RouteDecision::PassThrough
        );
    }

    #[test]
    fn test_route_empty_token_passes_through() {
        assert_eq!(
            route(&url("https://app.example.com/chat?tokenInfo="), &dev()),
            RouteDecision::PassThrough
        );
    }

    #[test]
    fn test_route_stripped_location_does_not_recapture() {
        let RouteDecision::CaptureToken { location, .. } =
            route(&url("https://app.example.com/chat?tokenInfo=abc&x=1"), &dev())
        else {
            panic!("expected capture");
        };
        assert_eq!(route(&location, &dev()), RouteDecision::PassThrough);
    }

    #[test]
    fn test_route_strips_repeated_token_params() {
        let RouteDecision::CaptureToken { cookie, location } = route(
            &url("https://app.example.com/?tokenInfo=old&tokenInfo=new"),
            &dev(),
        ) else {
            panic!("expected capture");
        };
        assert_eq!(cookie.value, "new");
        assert_eq!(location.query(), None);
    }

    #[test]
    fn test_enterprise_rewrite_only_when_enabled() {
        let u = url("https://app.example.com/admin/billing/plans");
        assert_eq!(route(&u, &dev()), RouteDecision::PassThrough);

        let config = RoutingConfig {
            enterprise_features: true,
            ..dev()
        };
        let RouteDecision::Rewrite(target) = route(&u, &config) else {
            panic!("expected rewrite");
        };
        assert_eq!(target.path(), "/ee/admin/billing/plans");
    }

    #[test]
    fn test_enterprise_rewrite_ignores_other_paths() {
        let config = RoutingConfig {
            enterprise_features: true,
            ..dev()
        };
        assert_eq!(
            route(&url("https://app.example.com/admin/users"), &config),
            RouteDecision::PassThrough
        );
    }
}
