//! Pre-order client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `TECHSHOP_BASE_URL` - Base URL of the shop backend (e.g., <https://shop.example.com>)
//!
//! ## Optional
//! - `TECHSHOP_SESSION_COOKIE` - Session cookie (`name=value`) identifying the signed-in customer
//! - `TECHSHOP_SNAPSHOT_DIR` - Directory for the persisted snapshot (default: .techshop/preorders)
//! - `TECHSHOP_CACHE_TTL_SECS` - Maximum snapshot age before it is discarded (default: 300)
//! - `TECHSHOP_REFRESH_AFTER_SECS` - Cache age that triggers a refresh on focus (default: 60)
//! - `TECHSHOP_HTTP_TIMEOUT_SECS` - Request timeout (default: 30)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

/// Default snapshot TTL (5 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Pre-order client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend connection settings
    pub backend: BackendConfig,
    /// Directory holding the persisted snapshot
    pub snapshot_dir: PathBuf,
    /// Cache timing
    pub cache: CacheOptions,
    /// Cache age after which a focus event triggers reconciliation
    pub refresh_after: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Backend connection settings.
///
/// Implements `Debug` manually to redact the session cookie.
#[derive(Clone)]
pub struct BackendConfig {
    /// Base URL that endpoint paths are joined onto
    pub base_url: Url,
    /// Session cookie (`name=value`); absent for anonymous browsing
    pub session_cookie: Option<SecretString>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url.as_str())
            .field(
                "session_cookie",
                &self.session_cookie.as_ref().map(|_| "[REDACTED]"),
            )
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Tunables for `PreorderStateCache`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    /// Persisted snapshots older than this are deleted instead of loaded.
    pub cache_ttl: Duration,
    /// Buffered change notifications per subscriber before it lags.
    pub event_capacity: usize,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            event_capacity: 256,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid, or
    /// if the session cookie looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let backend = BackendConfig::from_env()?;
        let snapshot_dir = PathBuf::from(get_env_or_default(
            "TECHSHOP_SNAPSHOT_DIR",
            ".techshop/preorders",
        ));
        let cache = CacheOptions {
            cache_ttl: get_duration_secs("TECHSHOP_CACHE_TTL_SECS", DEFAULT_CACHE_TTL.as_secs())?,
            ..CacheOptions::default()
        };
        let refresh_after = get_duration_secs("TECHSHOP_REFRESH_AFTER_SECS", 60)?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(Self {
            backend,
            snapshot_dir,
            cache,
            refresh_after,
            sentry_dsn,
        })
    }
}

impl BackendConfig {
    /// Build backend settings for a base URL with no session and the default timeout.
    #[must_use]
    pub const fn new(base_url: Url) -> Self {
        Self {
            base_url,
            session_cookie: None,
            timeout: Duration::from_secs(30),
        }
    }

    fn from_env() -> Result<Self, ConfigError> {
        let base_url = parse_base_url(&get_required_env("TECHSHOP_BASE_URL")?)?;
        let session_cookie = get_optional_env("TECHSHOP_SESSION_COOKIE")
            .map(|value| {
                validate_cookie(&value, "TECHSHOP_SESSION_COOKIE")?;
                Ok::<_, ConfigError>(SecretString::from(value))
            })
            .transpose()?;
        let timeout = get_duration_secs("TECHSHOP_HTTP_TIMEOUT_SECS", 30)?;

        Ok(Self {
            base_url,
            session_cookie,
            timeout,
        })
    }

    /// Whether a session cookie is configured.
    #[must_use]
    pub const fn has_session(&self) -> bool {
        self.session_cookie.is_some()
    }

    /// Session cookie value for the `Cookie` header.
    pub(crate) fn cookie_header(&self) -> Option<&str> {
        self.session_cookie
            .as_ref()
            .map(|cookie| cookie.expose_secret())
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating empty as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get a whole number of seconds as a `Duration`.
fn get_duration_secs(key: &str, default: u64) -> Result<Duration, ConfigError> {
    get_env_or_default(key, &default.to_string())
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse the backend base URL. A trailing slash is added so relative
/// endpoint paths join below it rather than replacing its last segment.
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let with_slash = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    let url = Url::parse(&with_slash)
        .map_err(|e| ConfigError::InvalidEnvVar("TECHSHOP_BASE_URL".to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            "TECHSHOP_BASE_URL".to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

/// Validate that a session cookie is `name=value` and not a placeholder.
fn validate_cookie(cookie: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = cookie.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    match cookie.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() && !value.trim().is_empty() => Ok(()),
        _ => Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            "expected name=value".to_string(),
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_base_url_adds_trailing_slash() {
        let url = parse_base_url("https://shop.test/store").unwrap();
        assert_eq!(url.as_str(), "https://shop.test/store/");
        assert_eq!(
            url.join("api/user/current").unwrap().as_str(),
            "https://shop.test/store/api/user/current"
        );
    }

    #[test]
    fn test_parse_base_url_rejects_other_schemes() {
        let result = parse_base_url("ftp://shop.test");
        assert!(matches!(result, Err(ConfigError::InvalidEnvVar(_, _))));
    }

    #[test]
    fn test_parse_base_url_rejects_garbage() {
        assert!(parse_base_url("not a url").is_err());
    }

    #[test]
    fn test_validate_cookie_placeholder() {
        let result = validate_cookie("session=changeme", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_cookie_requires_name_value() {
        assert!(validate_cookie("abcdef", "TEST_VAR").is_err());
        assert!(validate_cookie("session=", "TEST_VAR").is_err());
    }

    #[test]
    fn test_validate_cookie_valid() {
        assert!(validate_cookie("sessionid=q8Zr2LmX0pVt", "TEST_VAR").is_ok());
    }

    #[test]
    fn test_cache_options_default_ttl_is_five_minutes() {
        assert_eq!(CacheOptions::default().cache_ttl, Duration::from_secs(300));
    }

    #[test]
    fn test_backend_config_debug_redacts_cookie() {
        let config = BackendConfig {
            session_cookie: Some(SecretString::from("sessionid=super_secret_value")),
            ..BackendConfig::new(Url::parse("https://shop.test/").unwrap())
        };

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("https://shop.test/"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_value"));
    }
}
