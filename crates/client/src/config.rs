//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `CAFE_DATA_DIR` - Directory for the durable store (default: `.cafe-loyalty`)
//! - `CAFE_CART_SCOPE` - `device` (one cart per device) or `user` (one cart
//!   per signed-in user). Default: `device`
//! - `CAFE_BACKEND_URL` - Base URL of the cafeteria backend API
//! - `CAFE_CATALOG_CACHE_SECS` - Catalog cache TTL in seconds (default: 300)
//! - `CAFE_AUTH_URL` - Base URL of the auth provider
//! - `CAFE_AUTH_ANON_KEY` - Public API key for the auth provider (required
//!   when `CAFE_AUTH_URL` is set)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::cart::CartScope;

const DEFAULT_DATA_DIR: &str = ".cafe-loyalty";
const DEFAULT_CATALOG_CACHE_SECS: u64 = 300;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Directory holding the durable key-value store
    pub data_dir: PathBuf,
    /// Whether the cart is shared by the device or kept per user
    pub cart_scope: CartScope,
    /// Backend API configuration, if a backend is configured
    pub backend: Option<BackendConfig>,
    /// Auth provider configuration, if sign-in is available
    pub auth: Option<AuthConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Backend API configuration.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL, always ending in `/`
    pub base_url: Url,
    /// How long catalog responses stay cached
    pub cache_ttl: Duration,
}

/// Auth provider configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct AuthConfig {
    /// Base URL of the auth provider, always ending in `/`
    pub url: Url,
    /// Public (anon) API key sent with every request
    pub anon_key: SecretString,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("url", &self.url.as_str())
            .field("anon_key", &"[REDACTED]")
            .finish()
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid, or if
    /// `CAFE_AUTH_URL` is set without `CAFE_AUTH_ANON_KEY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_source(&|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`ClientConfig::from_env`].
    pub fn from_source(vars: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let data_dir = PathBuf::from(
            non_empty(vars("CAFE_DATA_DIR")).unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
        );

        let cart_scope = match non_empty(vars("CAFE_CART_SCOPE")) {
            Some(raw) => raw
                .parse::<CartScope>()
                .map_err(|e| ConfigError::InvalidEnvVar("CAFE_CART_SCOPE".to_string(), e))?,
            None => CartScope::default(),
        };

        let backend = match non_empty(vars("CAFE_BACKEND_URL")) {
            Some(raw) => {
                let cache_secs = match non_empty(vars("CAFE_CATALOG_CACHE_SECS")) {
                    Some(s) => s.parse::<u64>().map_err(|e| {
                        ConfigError::InvalidEnvVar(
                            "CAFE_CATALOG_CACHE_SECS".to_string(),
                            e.to_string(),
                        )
                    })?,
                    None => DEFAULT_CATALOG_CACHE_SECS,
                };
                Some(BackendConfig {
                    base_url: parse_base_url("CAFE_BACKEND_URL", &raw)?,
                    cache_ttl: Duration::from_secs(cache_secs),
                })
            }
            None => None,
        };

        let auth = match non_empty(vars("CAFE_AUTH_URL")) {
            Some(raw) => {
                let anon_key = non_empty(vars("CAFE_AUTH_ANON_KEY"))
                    .ok_or_else(|| ConfigError::MissingEnvVar("CAFE_AUTH_ANON_KEY".to_string()))?;
                Some(AuthConfig {
                    url: parse_base_url("CAFE_AUTH_URL", &raw)?,
                    anon_key: SecretString::from(anon_key),
                })
            }
            None => None,
        };

        Ok(Self {
            data_dir,
            cart_scope,
            backend,
            auth,
            sentry_dsn: non_empty(vars("SENTRY_DSN")),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Treat empty values the same as unset ones.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parse an http(s) base URL and make sure it ends with `/` so that
/// relative joins keep the full path.
fn parse_base_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let mut url =
        Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
