//! Domain objects resolved against the commerce backend.
//!
//! Each object implements [`Resolvable`](crate::resolve::Resolvable): it is
//! constructed synchronously by a root resolver with the loaders and
//! parameters it needs, fetches its backend payload on the first field read
//! and reshapes it into storefront fields.

pub mod address;
pub mod cart;
pub mod cart_mutation;
pub mod category;
pub mod country;
pub mod customer;
pub mod product;

use cif_core::Money;
use serde_json::{Value, json};

use crate::resolve::Args;

/// Default number of items per page.
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// One page of a paginated list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Page {
    /// Items per page, at least 1.
    pub size: u64,
    /// One-based page number.
    pub current: u64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            size: DEFAULT_PAGE_SIZE,
            current: 1,
        }
    }
}

impl Page {
    /// Build a page from optional storefront arguments.
    #[must_use]
    pub fn new(size: Option<i64>, current: Option<i64>) -> Self {
        // GraphQL `Int` is 32-bit; larger literals are clamped to its range.
        let positive = |value: Option<i64>| {
            value
                .and_then(|v| u64::try_from(v.min(i64::from(i32::MAX))).ok())
                .filter(|v| *v > 0)
        };
        Self {
            size: positive(size).unwrap_or(DEFAULT_PAGE_SIZE),
            current: positive(current).unwrap_or(1),
        }
    }

    /// Page from `pageSize`/`currentPage` field arguments.
    #[must_use]
    pub fn from_args(args: &Args) -> Self {
        Self::new(
            args.get("pageSize").and_then(Value::as_i64),
            args.get("currentPage").and_then(Value::as_i64),
        )
    }

    /// Number of items to skip.
    #[must_use]
    pub const fn offset(self) -> u64 {
        self.current.saturating_sub(1).saturating_mul(self.size)
    }

    /// Storefront `SearchResultPageInfo` for `total` items.
    #[must_use]
    pub fn info(self, total: u64) -> Value {
        json!({
            "current_page": self.current,
            "page_size": self.size,
            "total_pages": total.div_ceil(self.size),
        })
    }
}

/// Storefront `Money` from a backend money object (`null` if absent).
pub(crate) fn money(raw: &Value) -> Value {
    serde_json::from_value::<Money>(raw.clone()).map_or(Value::Null, |money| {
        json!({
            "value": money.value(),
            "currency": money.currency_code,
        })
    })
}

/// Storefront `Money` of zero in `currency`.
pub(crate) fn zero(currency: &Value) -> Value {
    json!({"value": 0.0, "currency": currency})
}

/// Quote a value for a backend `where` predicate.
pub(crate) fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Elements of a JSON array, or nothing.
pub(crate) fn elements(value: &Value) -> impl Iterator<Item = &Value> {
    value.as_array().into_iter().flatten()
}
