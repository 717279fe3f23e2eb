//! Payment methods offered at checkout.
//!
//! The backend has no payment-method catalogue of its own; the connector
//! offers a fixed set and records the choice as a backend payment whose
//! amount is the method's fee.

use serde::Serialize;

/// A payment method the storefront can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaymentMethod {
    /// Storefront code (`credit_card`, `cash_on_delivery`, `free`).
    pub code: &'static str,
    /// Display title.
    pub title: &'static str,
    /// Fee recorded on the backend payment, in cents.
    #[serde(skip)]
    pub cent_amount: i64,
}

impl PaymentMethod {
    /// Every method offered, in display order.
    pub const ALL: [Self; 3] = [
        Self {
            code: "credit_card",
            title: "Credit Card",
            cent_amount: 400,
        },
        Self {
            code: "cash_on_delivery",
            title: "Cash On Delivery",
            cent_amount: 500,
        },
        Self::FREE,
    ];

    /// Method reported when a cart has no payment yet.
    pub const FREE: Self = Self {
        code: "free",
        title: "Free",
        cent_amount: 0,
    };

    /// Look up a method by its storefront code.
    #[must_use]
    pub fn by_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|method| method.code == code)
    }
}
