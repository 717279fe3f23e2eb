//! Error taxonomy for backend calls and the HTTP surface.
//!
//! [`CifError`] is what loaders, domain objects and resolvers return. It is
//! `Clone` because a loader shares one settled result between every caller
//! of the same key. Backend messages are kept verbatim so the storefront sees
//! exactly what the backend said; [`CifError::kind`] adds a stable
//! classification that is exposed as the GraphQL `extensions.code`.
//!
//! [`AppError`] covers failures outside GraphQL execution (the schema could
//! not be built, the request body was unusable) and captures server errors
//! to Sentry before responding.

use std::fmt;

use async_graphql::ErrorExtensions;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Backend error codes that mean the aggregate changed since it was read.
const VERSION_CONFLICT_CODES: &[&str] = &["ConcurrentModification"];

/// Backend error codes that mean the addressed resource does not exist.
const NOT_FOUND_CODES: &[&str] = &["ResourceNotFound", "NotFound", "ReferencedResourceNotFound"];

/// Backend error codes that mean the request itself was rejected.
const VALIDATION_CODES: &[&str] = &[
    "InvalidInput",
    "InvalidOperation",
    "InvalidField",
    "InvalidJsonInput",
    "InvalidCurrentPassword",
    "InvalidCredentials",
    "DiscountCodeNonApplicable",
    "DuplicateField",
    "RequiredField",
];

/// One error entry from a backend GraphQL response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    /// Message exactly as the backend sent it.
    pub message: String,
    /// `extensions.code`, when the backend provided one.
    pub code: Option<String>,
}

impl BackendError {
    /// Create an error entry without a code.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Attach a backend error code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl From<graphql_client::Error> for BackendError {
    fn from(error: graphql_client::Error) -> Self {
        let code = error
            .extensions
            .as_ref()
            .and_then(|extensions| extensions.get("code"))
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned);
        Self {
            message: error.message,
            code,
        }
    }
}

/// Classification of a [`CifError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The aggregate version the mutation was issued with is stale.
    VersionConflict,
    /// The addressed cart, category, customer or address does not exist.
    NotFound,
    /// The input was rejected before or by the backend.
    Validation,
    /// The backend could not be reached or answered with a non-GraphQL error.
    Transport,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// The GraphQL `extensions.code` value for this kind.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::VersionConflict => "VERSION_CONFLICT",
            Self::NotFound => "NOT_FOUND",
            Self::Validation => "BAD_USER_INPUT",
            Self::Transport => "BACKEND_UNAVAILABLE",
            Self::Internal => "INTERNAL_SERVER_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Errors produced while resolving storefront fields against the backend.
#[derive(Debug, Clone, Error)]
pub enum CifError {
    /// The backend answered with a non-empty `errors` array.
    #[error("{}", join_messages(.0))]
    Backend(Vec<BackendError>),

    /// The HTTP request to the backend failed.
    #[error("Backend request failed: {0}")]
    Transport(String),

    /// The backend response did not have the expected shape.
    #[error("Unexpected backend response: {0}")]
    Decode(String),

    /// The addressed resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The storefront input was rejected before reaching the backend.
    #[error("{0}")]
    Validation(String),

    /// Internal invariant violated.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn join_messages(errors: &[BackendError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

impl CifError {
    /// Classify the error.
    ///
    /// Backend errors are classified by the first entry that carries a known
    /// `extensions.code`; entries without a code fall back to the message
    /// wording the backend uses for version conflicts and missing resources.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Backend(errors) => errors
                .iter()
                .find_map(|e| e.code.as_deref().and_then(kind_from_code))
                .or_else(|| errors.iter().find_map(|e| kind_from_message(&e.message)))
                .unwrap_or(ErrorKind::Internal),
            Self::Transport(_) => ErrorKind::Transport,
            Self::Decode(_) | Self::Internal(_) => ErrorKind::Internal,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Validation(_) => ErrorKind::Validation,
        }
    }

    /// Convert into a GraphQL field error with `extensions.code` set.
    ///
    /// The message is passed through unchanged.
    #[must_use]
    pub fn into_graphql(self) -> async_graphql::Error {
        let code = self.kind().code();
        async_graphql::Error::new(self.to_string()).extend_with(|_, extensions| {
            extensions.set("code", code);
        })
    }
}

fn kind_from_code(code: &str) -> Option<ErrorKind> {
    if VERSION_CONFLICT_CODES.contains(&code) {
        Some(ErrorKind::VersionConflict)
    } else if NOT_FOUND_CODES.contains(&code) {
        Some(ErrorKind::NotFound)
    } else if VALIDATION_CODES.contains(&code) {
        Some(ErrorKind::Validation)
    } else {
        None
    }
}

fn kind_from_message(message: &str) -> Option<ErrorKind> {
    if message.contains("different version than expected") {
        Some(ErrorKind::VersionConflict)
    } else if message.contains("was not found") {
        Some(ErrorKind::NotFound)
    } else {
        None
    }
}

impl From<reqwest::Error> for CifError {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport(error.to_string())
    }
}

impl From<serde_json::Error> for CifError {
    fn from(error: serde_json::Error) -> Self {
        Self::Decode(error.to_string())
    }
}

impl From<cif_core::EmailError> for CifError {
    fn from(error: cif_core::EmailError) -> Self {
        Self::Validation(error.to_string())
    }
}

// =============================================================================
// HTTP errors
// =============================================================================

/// Application-level error type for the HTTP handlers.
#[derive(Debug, Error)]
pub enum AppError {
    /// The executable schema for a resolver module could not be built.
    #[error("Schema unavailable: {0}")]
    SchemaUnavailable(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// No resolver module is served at the requested path.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(self, Self::SchemaUnavailable(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::SchemaUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::SchemaUnavailable(_) => "Internal server error".to_string(),
            Self::BadRequest(_) | Self::NotFound(_) => self.to_string(),
        };

        (status, message).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
