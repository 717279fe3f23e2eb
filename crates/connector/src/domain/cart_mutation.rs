//! Cart mutations.
//!
//! Every cart mutation runs the same pipeline:
//!
//! 1. turn the storefront input into backend update actions, which for some
//!    inputs needs a lookup first (saved customer address, payment method,
//!    applied coupon),
//! 2. fetch the cart's current version,
//! 3. send the actions with that version.
//!
//! A stale version is reported with the backend's message and is not
//! retried. Each step runs through its own loader keyed by everything the
//! step depends on.

use cif_core::{CartId, PaymentMethod, Version};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

use super::address::AddressDraft;
use super::cart::Cart;
use crate::backend::{Session, operations};
use crate::error::CifError;
use crate::loader::Loader;
use crate::resolve::{Args, Resolvable, Resolved};

/// Reference to another backend resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceIdentifier {
    pub type_id: &'static str,
    pub id: String,
}

impl ResourceIdentifier {
    #[must_use]
    pub fn new(type_id: &'static str, id: impl Into<String>) -> Self {
        Self {
            type_id,
            id: id.into(),
        }
    }
}

/// Backend cart update action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CartAction {
    AddLineItem { sku: String, quantity: u64 },
    ChangeLineItemQuantity { line_item_id: String, quantity: u64 },
    RemoveLineItem { line_item_id: String },
    SetShippingAddress { address: AddressDraft },
    SetBillingAddress { address: AddressDraft },
    SetShippingMethod { shipping_method: ResourceIdentifier },
    AddPayment { payment: ResourceIdentifier },
    AddDiscountCode { code: String },
    RemoveDiscountCode { discount_code: ResourceIdentifier },
}

/// Validate a storefront quantity.
///
/// # Errors
///
/// Returns [`CifError::Validation`] unless `quantity` is a non-negative whole
/// number.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn quantity(quantity: f64) -> Result<u64, CifError> {
    if quantity.is_finite() && quantity >= 0.0 && quantity.fract() == 0.0 {
        Ok(quantity as u64)
    } else {
        Err(CifError::Validation(format!(
            "Quantity must be a whole number, got {quantity}"
        )))
    }
}

/// Which cart address a saved address is copied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressTarget {
    Shipping,
    Billing,
}

/// What a cart mutation does, before it is turned into update actions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CartMutationKind {
    /// Actions that need no lookup.
    Actions(Vec<CartAction>),
    /// Copy an address from the signed-in customer's address book.
    AddressFromBook { index: usize, target: AddressTarget },
    /// Use the cart's shipping address as billing address.
    BillingSameAsShipping,
    /// Record a payment with the given storefront method code.
    PaymentMethod { code: String },
    /// Remove the coupon currently applied to the cart.
    RemoveCoupon,
}

/// Key of a backend cart update.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CartUpdate {
    pub cart_id: CartId,
    pub version: Version,
    pub actions: Vec<CartAction>,
}

/// Loader of the current version of a cart.
#[must_use]
pub fn cart_version_loader(session: &Session) -> Loader<CartId, Version> {
    let session = session.clone();
    Loader::per_key("cart_versions", move |id: CartId| {
        let session = session.clone();
        async move {
            let data = session
                .execute(&operations::CART_VERSION, json!({"id": id}))
                .await?;
            data["cart"]["version"]
                .as_i64()
                .map(Version::new)
                .ok_or_else(|| CifError::NotFound(format!("The Cart with ID '{id}' was not found.")))
        }
    })
}

fn actions_loader(session: &Session, cart_id: &CartId) -> Loader<CartMutationKind, Vec<CartAction>> {
    let session = session.clone();
    let cart_id = cart_id.clone();
    Loader::per_key("cart_actions", move |kind: CartMutationKind| {
        let session = session.clone();
        let cart_id = cart_id.clone();
        async move { resolve_actions(&session, &cart_id, kind).await }
    })
}

async fn resolve_actions(
    session: &Session,
    cart_id: &CartId,
    kind: CartMutationKind,
) -> Result<Vec<CartAction>, CifError> {
    match kind {
        CartMutationKind::Actions(actions) => Ok(actions),
        CartMutationKind::AddressFromBook { index, target } => {
            let data = session
                .execute(&operations::CUSTOMER, json!({"where": null, "locale": session.locale()}))
                .await?;
            let raw = &data["me"]["customer"]["addresses"][index];
            if raw.is_null() {
                return Err(CifError::NotFound(format!(
                    "Customer address {index} was not found."
                )));
            }
            let address: AddressDraft = serde_json::from_value(raw.clone())?;
            Ok(vec![match target {
                AddressTarget::Shipping => CartAction::SetShippingAddress { address },
                AddressTarget::Billing => CartAction::SetBillingAddress { address },
            }])
        }
        CartMutationKind::BillingSameAsShipping => {
            let cart = fetch_cart(session, cart_id).await?;
            let raw = &cart["shippingAddress"];
            if raw.is_null() {
                return Err(CifError::Validation(
                    "The cart has no shipping address.".to_string(),
                ));
            }
            let address: AddressDraft = serde_json::from_value(raw.clone())?;
            Ok(vec![CartAction::SetBillingAddress { address }])
        }
        CartMutationKind::PaymentMethod { code } => {
            let method = PaymentMethod::by_code(&code).ok_or_else(|| {
                CifError::Validation(format!("The requested Payment Method '{code}' is not available."))
            })?;
            let data = session
                .execute(
                    &operations::CREATE_PAYMENT,
                    json!({
                        "method": method.code,
                        "centAmount": method.cent_amount,
                        "currencyCode": session.settings().currency,
                    }),
                )
                .await?;
            let id = data["createPayment"]["id"]
                .as_str()
                .ok_or_else(|| CifError::Decode("createPayment returned no id".to_string()))?;
            Ok(vec![CartAction::AddPayment {
                payment: ResourceIdentifier::new("payment", id),
            }])
        }
        CartMutationKind::RemoveCoupon => {
            let cart = fetch_cart(session, cart_id).await?;
            let id = cart["discountCodes"][0]["discountCode"]["id"]
                .as_str()
                .ok_or_else(|| CifError::NotFound("The cart has no coupon applied.".to_string()))?;
            Ok(vec![CartAction::RemoveDiscountCode {
                discount_code: ResourceIdentifier::new("discount-code", id),
            }])
        }
    }
}

async fn fetch_cart(session: &Session, cart_id: &CartId) -> Result<Value, CifError> {
    let data = session
        .execute(&operations::CART, json!({"id": cart_id, "locale": session.locale()}))
        .await?;
    Some(data["cart"].clone())
        .filter(|cart| !cart.is_null())
        .ok_or_else(|| CifError::NotFound(format!("The Cart with ID '{cart_id}' was not found.")))
}

fn updates_loader(session: &Session) -> Loader<CartUpdate, Value> {
    let session = session.clone();
    Loader::per_key("cart_updates", move |update: CartUpdate| {
        let session = session.clone();
        async move {
            debug!(
                cart = %update.cart_id,
                version = %update.version,
                actions = update.actions.len(),
                "Updating cart"
            );
            let data = session
                .execute(
                    &operations::UPDATE_CART,
                    json!({
                        "id": update.cart_id,
                        "version": update.version,
                        "actions": update.actions,
                        "locale": session.locale(),
                    }),
                )
                .await?;
            Ok(data["updateCart"].clone())
        }
    })
}

/// A cart mutation; its `cart` field is the updated cart.
pub struct CartMutation {
    session: Session,
    cart_id: CartId,
    kind: CartMutationKind,
    actions: Loader<CartMutationKind, Vec<CartAction>>,
    versions: Loader<CartId, Version>,
    updates: Loader<CartUpdate, Value>,
}

impl CartMutation {
    #[must_use]
    pub fn new(session: Session, cart_id: CartId, kind: CartMutationKind) -> Self {
        Self {
            actions: actions_loader(&session, &cart_id),
            versions: cart_version_loader(&session),
            updates: updates_loader(&session),
            session,
            cart_id,
            kind,
        }
    }

    /// Mutation sending fixed actions.
    #[must_use]
    pub fn actions(session: Session, cart_id: CartId, actions: Vec<CartAction>) -> Self {
        Self::new(session, cart_id, CartMutationKind::Actions(actions))
    }
}

impl Resolvable for CartMutation {
    fn typename(&self) -> &'static str {
        "CartMutationOutput"
    }

    fn load(&self) -> BoxFuture<'_, Result<Value, CifError>> {
        async move {
            let actions = self.actions.load(self.kind.clone()).await?;
            let version = self.versions.load(self.cart_id.clone()).await?;
            self.updates
                .load(CartUpdate {
                    cart_id: self.cart_id.clone(),
                    version,
                    actions,
                })
                .await
        }
        .boxed()
    }

    fn convert(&self, _raw: &Value) -> Value {
        json!({})
    }

    fn computed<'a>(
        &'a self,
        field: &str,
        _args: &'a Args,
    ) -> Option<BoxFuture<'a, Result<Resolved, CifError>>> {
        match field {
            "cart" => Some(
                async move {
                    let raw = self.load().await?;
                    Ok(Resolved::object(Cart::from_raw(self.session.clone(), raw)))
                }
                .boxed(),
            ),
            _ => None,
        }
    }
}

/// Turns a cart into an order.
pub struct PlaceOrder {
    cart_id: CartId,
    versions: Loader<CartId, Version>,
    orders: Loader<(CartId, Version), Value>,
}

impl PlaceOrder {
    #[must_use]
    pub fn new(session: &Session, cart_id: CartId) -> Self {
        let orders_session = session.clone();
        let orders = Loader::per_key("orders", move |(id, version): (CartId, Version)| {
            let session = orders_session.clone();
            async move {
                let data = session
                    .execute(&operations::CREATE_ORDER, json!({"id": id, "version": version}))
                    .await?;
                Ok(data["createMyOrderFromCart"].clone())
            }
        });
        Self {
            cart_id,
            versions: cart_version_loader(session),
            orders,
        }
    }
}

impl Resolvable for PlaceOrder {
    fn typename(&self) -> &'static str {
        "PlaceOrderOutput"
    }

    fn load(&self) -> BoxFuture<'_, Result<Value, CifError>> {
        async move {
            let version = self.versions.load(self.cart_id.clone()).await?;
            self.orders.load((self.cart_id.clone(), version)).await
        }
        .boxed()
    }

    fn convert(&self, raw: &Value) -> Value {
        let number = if raw["orderNumber"].is_null() {
            &raw["id"]
        } else {
            &raw["orderNumber"]
        };
        json!({
            "order": {
                "order_number": number,
                "order_id": raw["id"],
            }
        })
    }
}
