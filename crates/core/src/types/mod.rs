//! Core types for the CIF connector.
//!
//! This module provides type-safe wrappers for common commerce concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod payment;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{Money, MoneyError};
pub use payment::PaymentMethod;
