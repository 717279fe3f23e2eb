//! HTTP route handlers for the connector.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health              - Health check
//!
//! # Storefront GraphQL (one schema per resolver module)
//! POST /graphql/cart        - Carts, checkout and orders
//! POST /graphql/category    - Products and category trees (read-only)
//! POST /graphql/customer    - Customer account, address book and countries
//! ```

pub mod graphql;

use axum::{Router, routing::post};

use crate::state::AppState;

/// Create the storefront GraphQL router.
pub fn routes() -> Router<AppState> {
    Router::new().route("/graphql/{module}", post(graphql::execute))
}
