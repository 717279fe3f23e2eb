//! CIF Core - Shared commerce types.
//!
//! This crate provides the value types used by the connector and its tools:
//! - `connector` - GraphQL adapter between the storefront schema and the commerce backend
//! - `cli` - Schema checks and SDL export
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no GraphQL
//! execution. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Backend identifiers, money amounts, emails and the payment catalogue

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
