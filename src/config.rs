//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::gateway::RetryPolicy;

/// Base address used when running against a local backend.
pub const DEVELOPMENT_BASE_URL: &str = "http://localhost:8081";

/// Every request is bounded by this timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_SESSION_DB: &str = "./data/farrin-session.db";

/// Build/environment mode that selects the service base address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    Development,
    Production,
}

impl BuildMode {
    /// Mode implied by the compilation profile.
    pub fn from_build() -> Self {
        if cfg!(debug_assertions) {
            Self::Development
        } else {
            Self::Production
        }
    }
}

impl std::str::FromStr for BuildMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(ConfigError::InvalidValue {
                key: "FARRIN_MODE".to_string(),
                message: format!("expected development or production, got {other:?}"),
            }),
        }
    }
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub mode: BuildMode,
    /// Base address of the service boundary, without a trailing slash.
    pub base_url: String,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    /// Durable backing file for the session slots.
    pub session_db_path: PathBuf,
}

impl ClientConfig {
    /// Development defaults pointing at a local backend.
    pub fn development() -> Self {
        Self {
            mode: BuildMode::Development,
            base_url: DEVELOPMENT_BASE_URL.to_string(),
            request_timeout: REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
            session_db_path: PathBuf::from(DEFAULT_SESSION_DB),
        }
    }

    /// Configuration for an explicit base address (tests, embedding).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: trim_base(&base_url.into()),
            ..Self::development()
        }
    }

    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mode = match lookup("FARRIN_MODE") {
            Some(raw) => raw.parse()?,
            None => BuildMode::from_build(),
        };

        let base_url = match (lookup("FARRIN_API_BASE_URL"), mode) {
            (Some(url), _) => url,
            (None, BuildMode::Development) => DEVELOPMENT_BASE_URL.to_string(),
            (None, BuildMode::Production) => {
                let origin = lookup("FARRIN_PUBLIC_ORIGIN").ok_or_else(|| {
                    ConfigError::MissingRequired {
                        key: "FARRIN_PUBLIC_ORIGIN".to_string(),
                        hint: "Production serves the API under <origin>/api; set the origin or FARRIN_API_BASE_URL.".to_string(),
                    }
                })?;
                format!("{}/api", trim_base(&origin))
            }
        };

        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                key: "FARRIN_API_BASE_URL".to_string(),
                message: format!("{base_url:?} is not an http(s) address"),
            });
        }

        let session_db_path = lookup("FARRIN_SESSION_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_DB));

        Ok(Self {
            mode,
            base_url: trim_base(&base_url),
            request_timeout: REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
            session_db_path,
        })
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::development()
    }
}

fn trim_base(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn development_uses_local_backend() {
        let config = ClientConfig::from_lookup(lookup_from(&[("FARRIN_MODE", "development")])).unwrap();
        assert_eq!(config.mode, BuildMode::Development);
        assert_eq!(config.base_url, "http://localhost:8081");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn production_requires_origin() {
        let err = ClientConfig::from_lookup(lookup_from(&[("FARRIN_MODE", "production")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { ref key, .. } if key == "FARRIN_PUBLIC_ORIGIN"));
    }

    #[test]
    fn production_serves_api_under_origin() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("FARRIN_MODE", "prod"),
            ("FARRIN_PUBLIC_ORIGIN", "https://travel.example/"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "https://travel.example/api");
    }

    #[test]
    fn explicit_base_url_wins() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("FARRIN_MODE", "production"),
            ("FARRIN_API_BASE_URL", "http://10.0.0.5:9000/"),
            ("FARRIN_SESSION_DB", "/tmp/s.db"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "http://10.0.0.5:9000");
        assert_eq!(config.session_db_path, PathBuf::from("/tmp/s.db"));
    }

    #[test]
    fn rejects_unknown_mode_and_bad_url() {
        assert!(ClientConfig::from_lookup(lookup_from(&[("FARRIN_MODE", "staging")])).is_err());
        assert!(
            ClientConfig::from_lookup(lookup_from(&[("FARRIN_API_BASE_URL", "localhost:8081")]))
                .is_err()
        );
    }
}
