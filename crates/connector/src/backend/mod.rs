//! Commerce backend access.
//!
//! Every backend call goes through a [`Gateway`]: it takes a GraphQL request
//! body plus the caller's authorization and returns the raw GraphQL response.
//! [`HttpGateway`] talks to the real backend over HTTP; tests substitute a
//! scripted gateway.
//!
//! A [`Session`] pairs a gateway with the per-request settings (bearer token,
//! locale, currency) and turns GraphQL `errors` into [`CifError::Backend`].

mod http;
pub mod operations;
mod settings;

use std::sync::Arc;

use async_trait::async_trait;
use graphql_client::{QueryBody, Response};
use secrecy::SecretString;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::{BackendError, CifError};

pub use http::HttpGateway;
pub use operations::Operation;
pub use settings::RequestSettings;

/// Transport for backend GraphQL requests.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Send one GraphQL request.
    ///
    /// Returns the decoded response even when it carries GraphQL `errors`;
    /// only transport and decoding failures are errors here.
    async fn send(
        &self,
        body: QueryBody<Value>,
        authorization: Option<&SecretString>,
    ) -> Result<Response<Value>, CifError>;
}

// =============================================================================
// Session
// =============================================================================

/// Backend access for one storefront request.
///
/// Cheap to clone; every domain object created while resolving the request
/// holds a clone.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    gateway: Arc<dyn Gateway>,
    settings: RequestSettings,
}

impl Session {
    /// Create a session for one request.
    #[must_use]
    pub fn new(gateway: Arc<dyn Gateway>, settings: RequestSettings) -> Self {
        Self {
            inner: Arc::new(SessionInner { gateway, settings }),
        }
    }

    /// Settings extracted from the storefront request.
    #[must_use]
    pub fn settings(&self) -> &RequestSettings {
        &self.inner.settings
    }

    /// Locale used for localized backend fields.
    #[must_use]
    pub fn locale(&self) -> &str {
        &self.inner.settings.locale
    }

    /// Execute a backend operation and return its `data`.
    ///
    /// # Errors
    ///
    /// Returns [`CifError::Backend`] with the backend's messages when the
    /// response has a non-empty `errors` array, [`CifError::Transport`] when
    /// the request fails, and [`CifError::Decode`] when the response carries
    /// neither data nor errors.
    #[instrument(skip(self, operation, variables), fields(operation = operation.name))]
    pub async fn execute(&self, operation: &Operation, variables: Value) -> Result<Value, CifError> {
        let body = QueryBody {
            variables,
            query: operation.query,
            operation_name: operation.name,
        };

        let response = self
            .inner
            .gateway
            .send(body, self.inner.settings.bearer.as_ref())
            .await?;

        if let Some(errors) = response.errors
            && !errors.is_empty()
        {
            debug!(errors = ?errors, "GraphQL errors in backend response");
            return Err(CifError::Backend(
                errors.into_iter().map(BackendError::from).collect(),
            ));
        }

        response
            .data
            .ok_or_else(|| CifError::Decode(format!("{} returned no data", operation.name)))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    struct CannedGateway {
        response: Value,
        seen: Mutex<Vec<(String, bool)>>,
    }

    #[async_trait]
    impl Gateway for CannedGateway {
        async fn send(
            &self,
            body: QueryBody<Value>,
            authorization: Option<&SecretString>,
        ) -> Result<Response<Value>, CifError> {
            self.seen
                .lock()
                .unwrap()
                .push((body.operation_name.to_string(), authorization.is_some()));
            Ok(serde_json::from_value(self.response.clone())?)
        }
    }

    fn session(response: Value, bearer: Option<&str>) -> (Session, Arc<CannedGateway>) {
        let gateway = Arc::new(CannedGateway {
            response,
            seen: Mutex::new(Vec::new()),
        });
        let mut settings = RequestSettings::anonymous("en", "EUR", "DE");
        if let Some(token) = bearer {
            settings = settings.with_bearer(token);
        }
        (Session::new(gateway.clone(), settings), gateway)
    }

    #[tokio::test]
    async fn test_execute_returns_data() {
        let (session, gateway) = session(json!({"data": {"cart": {"version": 3}}}), Some("tok"));
        let data = session
            .execute(&operations::CART_VERSION, json!({"id": "c1"}))
            .await
            .unwrap();
        assert_eq!(data["cart"]["version"], 3);
        assert_eq!(
            gateway.seen.lock().unwrap().as_slice(),
            &[("CartVersion".to_string(), true)]
        );
    }

    #[tokio::test]
    async fn test_execute_maps_graphql_errors() {
        let (session, _) = session(
            json!({
                "data": null,
                "errors": [{
                    "message": "The Cart with ID 'c1' was not found.",
                    "extensions": {"code": "ResourceNotFound"}
                }]
            }),
            None,
        );
        let err = session
            .execute(&operations::CART_VERSION, json!({"id": "c1"}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "The Cart with ID 'c1' was not found.");
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_execute_without_data_is_decode_error() {
        let (session, _) = session(json!({}), None);
        let err = session
            .execute(&operations::ZONES, Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, CifError::Decode(_)));
    }
}
