//! Backend GraphQL operations.
//!
//! Query documents live in `graphql/backend/` next to the crate manifest.
//! Documents that select a cart share the `CartFields` fragment.

/// A named backend GraphQL document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    /// Operation name, sent as `operationName`.
    pub name: &'static str,
    /// Full GraphQL document.
    pub query: &'static str,
}

impl Operation {
    const fn new(name: &'static str, query: &'static str) -> Self {
        Self { name, query }
    }
}

// =============================================================================
// Cart
// =============================================================================

pub const CART: Operation = Operation::new(
    "Cart",
    concat!(
        include_str!("../../graphql/backend/cart.graphql"),
        include_str!("../../graphql/backend/cart_fields.graphql")
    ),
);

pub const ACTIVE_CART: Operation = Operation::new(
    "ActiveCart",
    concat!(
        include_str!("../../graphql/backend/active_cart.graphql"),
        include_str!("../../graphql/backend/cart_fields.graphql")
    ),
);

pub const CART_VERSION: Operation = Operation::new(
    "CartVersion",
    include_str!("../../graphql/backend/cart_version.graphql"),
);

pub const CREATE_CART: Operation = Operation::new(
    "CreateCart",
    include_str!("../../graphql/backend/create_cart.graphql"),
);

pub const UPDATE_CART: Operation = Operation::new(
    "UpdateCart",
    concat!(
        include_str!("../../graphql/backend/update_cart.graphql"),
        include_str!("../../graphql/backend/cart_fields.graphql")
    ),
);

pub const CREATE_PAYMENT: Operation = Operation::new(
    "CreatePayment",
    include_str!("../../graphql/backend/create_payment.graphql"),
);

pub const CREATE_ORDER: Operation = Operation::new(
    "CreateOrder",
    include_str!("../../graphql/backend/create_order.graphql"),
);

pub const SHIPPING_METHODS: Operation = Operation::new(
    "ShippingMethods",
    include_str!("../../graphql/backend/shipping_methods.graphql"),
);

// =============================================================================
// Catalog
// =============================================================================

pub const CATEGORIES: Operation = Operation::new(
    "Categories",
    include_str!("../../graphql/backend/categories.graphql"),
);

pub const PRODUCTS: Operation = Operation::new(
    "Products",
    include_str!("../../graphql/backend/products.graphql"),
);

// =============================================================================
// Customer
// =============================================================================

pub const CUSTOMER: Operation = Operation::new(
    "Customer",
    include_str!("../../graphql/backend/customer.graphql"),
);

pub const CUSTOMER_VERSION: Operation = Operation::new(
    "CustomerVersion",
    include_str!("../../graphql/backend/customer_version.graphql"),
);

pub const CUSTOMER_SIGN_UP: Operation = Operation::new(
    "CustomerSignUp",
    include_str!("../../graphql/backend/customer_sign_up.graphql"),
);

pub const UPDATE_MY_CUSTOMER: Operation = Operation::new(
    "UpdateMyCustomer",
    include_str!("../../graphql/backend/update_my_customer.graphql"),
);

pub const CHANGE_MY_PASSWORD: Operation = Operation::new(
    "ChangeMyPassword",
    include_str!("../../graphql/backend/change_my_password.graphql"),
);

pub const ZONES: Operation = Operation::new(
    "Zones",
    include_str!("../../graphql/backend/zones.graphql"),
);
