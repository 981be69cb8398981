//! Environment configuration.

use url::Url;
use vigil_liveness::LivenessConfig;
use vigil_session::RoutingConfig;

/// Backend origin. Required.
pub const ENV_BASE_URL: &str = "VIGIL_BASE_URL";
/// External token refresh endpoint. Absent or empty disables refresh.
pub const ENV_REFRESH_URL: &str = "VIGIL_REFRESH_URL";
/// `true` or `1` enables the enterprise path rewrite.
pub const ENV_ENTERPRISE_FEATURES: &str = "VIGIL_ENTERPRISE_FEATURES";
/// `production` makes the token cookie `Secure`.
pub const ENV_ENVIRONMENT: &str = "VIGIL_ENV";

/// Errors loading a [`VigilConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required variable {0}")]
    Missing(&'static str),

    #[error("{var} is not a valid URL ({value:?}): {reason}")]
    InvalidUrl {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Everything one page needs: where the backend is, how routing
/// behaves, and liveness timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VigilConfig {
    pub base_url: Url,
    pub routing: RoutingConfig,
    pub liveness: LivenessConfig,
}

impl VigilConfig {
    /// Defaults for everything except the backend origin.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            routing: RoutingConfig::default(),
            liveness: LivenessConfig::default(),
        }
    }

    /// Loads from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads using `lookup` to read variables, so tests don't touch the
    /// process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let base_url = var(ENV_BASE_URL).ok_or(ConfigError::Missing(ENV_BASE_URL))?;
        let mut config = Self::new(parse_url(ENV_BASE_URL, &base_url)?);

        config.liveness.refresh.url = var(ENV_REFRESH_URL)
            .map(|url| parse_url(ENV_REFRESH_URL, &url))
            .transpose()?;

        config.routing.enterprise_features = var(ENV_ENTERPRISE_FEATURES)
            .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
        config.routing.production =
            var(ENV_ENVIRONMENT).is_some_and(|v| v.eq_ignore_ascii_case("production"));

        tracing::debug!(
            base_url = %config.base_url,
            refresh = config.liveness.refresh.is_enabled(),
            enterprise = config.routing.enterprise_features,
            production = config.routing.production,
            "configuration loaded"
        );
        Ok(config)
    }
}

fn parse_url(var: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}
