//! Storefront GraphQL endpoint.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::HeaderMap,
};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::resolvers::{self, ResolverModule};
use crate::state::AppState;

/// Execute a GraphQL-over-HTTP request against one resolver module.
///
/// GraphQL errors (backend rejections included) are part of a `200` response;
/// only an unknown module, an unusable body or a missing schema fail the
/// request itself.
#[instrument(skip(state, headers, body), fields(module = %module))]
pub async fn execute(
    State(state): State<AppState>,
    Path(module): Path<String>,
    headers: HeaderMap,
    body: std::result::Result<Json<async_graphql::Request>, JsonRejection>,
) -> Result<Json<async_graphql::Response>> {
    let module = module
        .parse::<ResolverModule>()
        .map_err(|e| AppError::NotFound(e.to_string()))?;
    let Json(request) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let session = state.session(&headers);
    let response = resolvers::execute(module, request, session)
        .await
        .map_err(|e| AppError::SchemaUnavailable(e.to_string()))?;

    if response.is_err() {
        tracing::debug!(errors = response.errors.len(), "GraphQL response carries errors");
    }
    Ok(Json(response))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use graphql_client::{QueryBody, Response};
    use secrecy::SecretString;
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use url::Url;

    use super::*;
    use crate::backend::Gateway;
    use crate::config::{CommerceConfig, ConnectorConfig};
    use crate::error::CifError;

    struct OfflineGateway;

    #[async_trait]
    impl Gateway for OfflineGateway {
        async fn send(
            &self,
            _body: QueryBody<Value>,
            _authorization: Option<&SecretString>,
        ) -> std::result::Result<Response<Value>, CifError> {
            Err(CifError::Transport("offline".to_string()))
        }
    }

    fn app() -> axum::Router {
        let config = ConnectorConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            commerce: CommerceConfig::new(Url::parse("http://backend.invalid/graphql").unwrap()),
            sentry_dsn: None,
            sentry_environment: None,
        };
        let state = AppState::with_gateway(config, Arc::new(OfflineGateway));
        crate::routes::routes().with_state(state)
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_module_is_not_found() {
        let response = app()
            .oneshot(post("/graphql/wishlist", r#"{"query": "{ __typename }"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let response = app().oneshot(post("/graphql/cart", "{")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_backend_failure_is_a_field_error() {
        let response = app()
            .oneshot(post(
                "/graphql/cart",
                r#"{"query": "{ cart(cart_id: \"c1\") { id } }"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["data"], json!({"cart": null}));
        assert_eq!(body["errors"][0]["extensions"]["code"], "BACKEND_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_modules_do_not_share_fields() {
        let response = app()
            .oneshot(post("/graphql/category", r#"{"query": "{ customerCart { id } }"}"#))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert!(body["errors"][0]["message"].as_str().unwrap().contains("customerCart"));
    }
}
