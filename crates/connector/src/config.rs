//! Connector configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `COMMERCE_API_URL` - GraphQL endpoint of the commerce backend
//!
//! ## Optional
//! - `CIF_HOST` - Bind address (default: 127.0.0.1)
//! - `CIF_PORT` - Listen port (default: 3000)
//! - `COMMERCE_CURRENCY` - Currency for new carts (default: EUR)
//! - `COMMERCE_COUNTRY` - Country for new carts (default: DE)
//! - `COMMERCE_LOCALE` - Locale used when a request sends no `Accept-Language` (default: en)
//! - `COMMERCE_TIMEOUT_SECS` - Backend request timeout in seconds (default: 30)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Connector application configuration.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Commerce backend configuration
    pub commerce: CommerceConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Commerce backend configuration.
#[derive(Debug, Clone)]
pub struct CommerceConfig {
    /// GraphQL endpoint of the backend project
    pub api_url: Url,
    /// Currency used for carts created by `createEmptyCart`
    pub currency: String,
    /// Country used for carts created by `createEmptyCart`
    pub country: String,
    /// Fallback locale for localized backend fields
    pub default_locale: String,
    /// Timeout applied to each backend request
    pub timeout: Duration,
}

impl ConnectorConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("CIF_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("CIF_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("CIF_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("CIF_PORT".to_string(), e.to_string()))?;

        Ok(Self {
            host,
            port,
            commerce: CommerceConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl CommerceConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let api_url = get_required_env("COMMERCE_API_URL")?;
        let api_url = Url::parse(&api_url).map_err(|e| {
            ConfigError::InvalidEnvVar("COMMERCE_API_URL".to_string(), e.to_string())
        })?;
        let timeout_secs = get_env_or_default("COMMERCE_TIMEOUT_SECS", "30")
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("COMMERCE_TIMEOUT_SECS".to_string(), e.to_string())
            })?;

        Ok(Self {
            currency: get_env_or_default("COMMERCE_CURRENCY", "EUR"),
            country: get_env_or_default("COMMERCE_COUNTRY", "DE"),
            default_locale: get_env_or_default("COMMERCE_LOCALE", "en"),
            timeout: Duration::from_secs(timeout_secs),
            ..Self::new(api_url)
        })
    }

    /// Configuration for `api_url` with every optional setting at its default.
    #[must_use]
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            currency: "EUR".to_string(),
            country: "DE".to_string(),
            default_locale: "en".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
