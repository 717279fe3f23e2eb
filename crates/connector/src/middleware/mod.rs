//! HTTP middleware for the connector.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (recorded in the span and the Sentry scope)

pub mod request_id;

pub use request_id::request_id_middleware;
