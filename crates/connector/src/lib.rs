//! CIF connector library.
//!
//! Serves a storefront GraphQL schema on top of a commerce backend's GraphQL
//! API. Each storefront field is resolved by a lazily loading domain object
//! whose backend calls are batched and memoized per request.
//!
//! # Layers
//!
//! - [`routes`] / [`middleware`] - HTTP surface (one endpoint per resolver module)
//! - [`resolvers`] - allow-listed root fields per module, bound to domain objects
//! - [`schema`] - executable schemas built from the storefront SDL
//! - [`domain`] - carts, catalog, customers and their backend mappings
//! - [`resolve`] / [`loader`] - lazy field resolution and request-scoped loaders
//! - [`backend`] - gateway to the commerce backend

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod config;
pub mod domain;
pub mod error;
pub mod loader;
pub mod middleware;
pub mod resolve;
pub mod resolvers;
pub mod routes;
pub mod schema;
pub mod state;
