//! Application state shared across handlers.

use std::sync::Arc;

use axum::http::HeaderMap;

use crate::backend::{Gateway, HttpGateway, RequestSettings, Session};
use crate::config::ConnectorConfig;
use crate::error::CifError;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and holds the configuration and
/// the backend gateway. Nothing request-scoped lives here: loaders belong to
/// the [`Session`] built per request.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ConnectorConfig,
    gateway: Arc<dyn Gateway>,
}

impl AppState {
    /// Create the state with an HTTP gateway to the configured backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: ConnectorConfig) -> Result<Self, CifError> {
        let gateway = HttpGateway::new(&config.commerce)?;
        Ok(Self::with_gateway(config, Arc::new(gateway)))
    }

    /// Create the state around an existing gateway.
    #[must_use]
    pub fn with_gateway(config: ConnectorConfig, gateway: Arc<dyn Gateway>) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, gateway }),
        }
    }

    /// Get a reference to the connector configuration.
    #[must_use]
    pub fn config(&self) -> &ConnectorConfig {
        &self.inner.config
    }

    /// Start a backend session for one storefront request.
    #[must_use]
    pub fn session(&self, headers: &HeaderMap) -> Session {
        let settings = RequestSettings::from_headers(headers, &self.inner.config.commerce);
        Session::new(Arc::clone(&self.inner.gateway), settings)
    }
}
