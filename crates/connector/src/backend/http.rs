//! HTTP gateway to the commerce backend.
//!
//! Uses `graphql_client` wire types with `reqwest` 0.13 for HTTP.

use std::sync::Arc;

use async_trait::async_trait;
use graphql_client::{QueryBody, Response};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::instrument;

use super::Gateway;
use crate::config::CommerceConfig;
use crate::error::CifError;

/// Gateway that posts GraphQL requests to the backend endpoint.
#[derive(Clone)]
pub struct HttpGateway {
    inner: Arc<HttpGatewayInner>,
}

struct HttpGatewayInner {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpGateway {
    /// Create a gateway for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns [`CifError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: &CommerceConfig) -> Result<Self, CifError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(HttpGatewayInner {
                client,
                endpoint: config.api_url.to_string(),
            }),
        })
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    #[instrument(skip_all, fields(operation = body.operation_name))]
    async fn send(
        &self,
        body: QueryBody<Value>,
        authorization: Option<&SecretString>,
    ) -> Result<Response<Value>, CifError> {
        let mut request = self
            .inner
            .client
            .post(&self.inner.endpoint)
            .header("Content-Type", "application/json")
            .json(&body);

        if let Some(token) = authorization {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() && !looks_like_graphql(&response_text) {
            tracing::error!(
                status = %status,
                body = %response_text.chars().take(500).collect::<String>(),
                "Backend returned non-success status"
            );
            return Err(CifError::Transport(format!(
                "HTTP {status}: {}",
                response_text.chars().take(200).collect::<String>()
            )));
        }

        serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %response_text.chars().take(500).collect::<String>(),
                "Failed to parse backend GraphQL response"
            );
            CifError::Decode(e.to_string())
        })
    }
}

/// Backends answer some GraphQL errors with 4xx and a regular error body.
fn looks_like_graphql(body: &str) -> bool {
    serde_json::from_str::<Value>(body)
        .map(|value| value.get("errors").is_some() || value.get("data").is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_looks_like_graphql() {
        assert!(looks_like_graphql(r#"{"errors":[{"message":"x"}]}"#));
        assert!(looks_like_graphql(r#"{"data":null}"#));
        assert!(!looks_like_graphql("<html>Bad Gateway</html>"));
        assert!(!looks_like_graphql(r#"{"message":"unauthorized"}"#));
    }
}
