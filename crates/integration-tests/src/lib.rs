//! Integration test support for the CIF connector.
//!
//! Tests run storefront GraphQL documents through the real resolver modules
//! against a [`MockGateway`]: a scripted backend that answers per operation
//! name and records every call, so tests can assert what reached the backend
//! and in which order.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cif-integration-tests
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use cif_connector::backend::{Gateway, RequestSettings, Session};
use cif_connector::error::CifError;
use cif_connector::resolvers::{self, ResolverModule};
use graphql_client::{QueryBody, Response};
use secrecy::SecretString;
use serde_json::Value;

type Responder = Box<dyn Fn(&Value) -> Value + Send + Sync>;

/// One backend call seen by the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Backend operation name.
    pub operation: String,
    /// Variables sent with it.
    pub variables: Value,
}

/// Scripted backend.
///
/// Each operation name maps to a responder that builds the raw GraphQL
/// response (`{"data": ..., "errors": [...]}`) from the request variables.
/// Operations without a responder fail with a transport error.
#[derive(Default)]
pub struct MockGateway {
    responders: HashMap<&'static str, Responder>,
    calls: Mutex<Vec<Call>>,
}

impl MockGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every call of `operation` with the same response.
    #[must_use]
    pub fn on(self, operation: &'static str, response: Value) -> Self {
        self.respond(operation, move |_| response.clone())
    }

    /// Answer calls of `operation` depending on their variables.
    #[must_use]
    pub fn respond(
        mut self,
        operation: &'static str,
        responder: impl Fn(&Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.responders.insert(operation, Box::new(responder));
        self
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Operation names of every call so far, in order.
    pub fn operations(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.operation).collect()
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn send(
        &self,
        body: QueryBody<Value>,
        _authorization: Option<&SecretString>,
    ) -> Result<Response<Value>, CifError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Call {
                operation: body.operation_name.to_string(),
                variables: body.variables.clone(),
            });

        let responder = self.responders.get(body.operation_name).ok_or_else(|| {
            CifError::Transport(format!("no scripted response for {}", body.operation_name))
        })?;
        Ok(serde_json::from_value(responder(&body.variables))?)
    }
}

/// Load a JSON fixture from `fixtures/`.
///
/// # Panics
///
/// Panics if the fixture does not exist or is not valid JSON.
#[must_use]
pub fn fixture(name: &str) -> Value {
    let path = format!("{}/fixtures/{name}.json", env!("CARGO_MANIFEST_DIR"));
    let text = std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("{path}: {e}"));
    serde_json::from_str(&text).unwrap_or_else(|e| panic!("{path}: {e}"))
}

/// A successful backend response carrying `data`.
#[must_use]
pub fn data(data: Value) -> Value {
    serde_json::json!({ "data": data })
}

/// Run a storefront document against a resolver module and return the
/// response as JSON (`data` and `errors`).
///
/// # Panics
///
/// Panics if the module's schema does not build.
pub async fn run(gateway: &Arc<MockGateway>, module: ResolverModule, query: &str) -> Value {
    let session = Session::new(
        Arc::clone(gateway) as Arc<dyn Gateway>,
        RequestSettings::anonymous("en", "EUR", "DE"),
    );
    let response = resolvers::execute(module, async_graphql::Request::new(query), session)
        .await
        .unwrap_or_else(|e| panic!("schema for {module}: {e}"));
    serde_json::to_value(&response).unwrap_or_else(|e| panic!("response: {e}"))
}
