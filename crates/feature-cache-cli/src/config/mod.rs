//! Configuration loading and resolution.

use std::time::Duration;

use anyhow::{bail, Context};
use feature_cache::{Endpoints, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};

/// Environment variable overriding the feature service host.
pub const BASE_URL_ENV: &str = "FEATURE_CACHE_BASE_URL";

/// Environment variable overriding the request timeout, in seconds.
pub const TIMEOUT_ENV: &str = "FEATURE_CACHE_TIMEOUT_SECS";

/// Where and how long to talk to the feature service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl FetchConfig {
    /// Resolve from command-line values, then the environment, then defaults.
    pub fn resolve(base_url: Option<&str>, timeout_secs: Option<u64>) -> anyhow::Result<Self> {
        Self::from_sources(
            base_url,
            std::env::var(BASE_URL_ENV).ok().as_deref(),
            timeout_secs,
            std::env::var(TIMEOUT_ENV).ok().as_deref(),
        )
    }

    fn from_sources(
        base_url: Option<&str>,
        env_base_url: Option<&str>,
        timeout_secs: Option<u64>,
        env_timeout_secs: Option<&str>,
    ) -> anyhow::Result<Self> {
        let base_url = base_url
            .or(env_base_url)
            .unwrap_or(DEFAULT_BASE_URL)
            .to_string();

        let timeout = match (timeout_secs, env_timeout_secs) {
            (Some(secs), _) => Duration::from_secs(secs),
            (None, Some(raw)) => Duration::from_secs(
                raw.trim()
                    .parse()
                    .with_context(|| format!("{TIMEOUT_ENV} must be a number of seconds, got {raw:?}"))?,
            ),
            (None, None) => DEFAULT_TIMEOUT,
        };
        if timeout.is_zero() {
            bail!("Request timeout must be at least one second");
        }

        Ok(Self { base_url, timeout })
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints::with_base_url(&self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FetchConfig::from_sources(None, None, None, None).unwrap();
        assert_eq!(config.base_url, "http://akiwi.eu");
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_flag_beats_env() {
        let config = FetchConfig::from_sources(
            Some("http://flag"),
            Some("http://env"),
            Some(3),
            Some("7"),
        )
        .unwrap();
        assert_eq!(config.base_url, "http://flag");
        assert_eq!(config.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_env_beats_default() {
        let config = FetchConfig::from_sources(None, Some("http://env"), None, Some(" 30 ")).unwrap();
        assert_eq!(config.base_url, "http://env");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.endpoints().fv50, "http://env/feature/fv50/");
    }

    #[test]
    fn test_bad_timeout() {
        assert!(FetchConfig::from_sources(None, None, None, Some("soon")).is_err());
        assert!(FetchConfig::from_sources(None, None, Some(0), None).is_err());
    }
}
