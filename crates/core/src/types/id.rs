//! Newtype IDs for backend entity references.
//!
//! The commerce backend identifies every resource by an opaque string (a UUID
//! for carts, a UUID or external key for categories).
//! Use the `define_id!` macro to create wrappers that prevent accidentally
//! passing a cart ID where a category ID is expected.

use serde::{Deserialize, Serialize};

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `as_str()`, `into_inner()`
/// - `From<String>`, `From<&str>` and `Display` implementations
///
/// # Example
///
/// ```rust
/// # use cif_core::define_id;
/// define_id!(WishlistId);
/// define_id!(StoreId);
///
/// let wishlist = WishlistId::new("w-1");
/// let store = StoreId::new("w-1");
///
/// // These are different types, so this won't compile:
/// // let _: WishlistId = store;
/// assert_eq!(wishlist.as_str(), store.as_str());
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the backend identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the wrapper and return the backend identifier.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// Backend resources addressed by the connector
define_id!(CartId);
define_id!(CategoryId);

/// Optimistic-concurrency version of a backend aggregate (cart, customer).
///
/// Every mutation must carry the version the client last saw; the backend
/// rejects the update if the aggregate changed in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Wrap a raw version number.
    #[must_use]
    pub const fn new(version: i64) -> Self {
        Self(version)
    }

    /// Get the raw version number.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl core::fmt::Display for Version {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}
