//! Cart resolvers (`/graphql/cart`).

use std::sync::LazyLock;

use async_graphql::dynamic::Schema;
use cif_core::CartId;
use serde::Deserialize;
use serde_json::Value;

use super::Input;
use crate::backend::Session;
use crate::domain::address::{AddressDraft, CartAddressInput};
use crate::domain::cart::{Cart, create_empty_cart};
use crate::domain::cart_mutation::{
    AddressTarget, CartAction, CartMutation, CartMutationKind, PlaceOrder, ResourceIdentifier,
    quantity,
};
use crate::error::CifError;
use crate::resolve::Resolved;
use crate::schema::{NoArgs, RootFields, SchemaBuildError, SchemaBuilder};

const QUERIES: &[&str] = &["cart", "customerCart"];

const MUTATIONS: &[&str] = &[
    "createEmptyCart",
    "addSimpleProductsToCart",
    "addProductsToCart",
    "updateCartItems",
    "removeItemFromCart",
    "setShippingAddressesOnCart",
    "setBillingAddressOnCart",
    "setShippingMethodsOnCart",
    "setPaymentMethodOnCart",
    "applyCouponToCart",
    "removeCouponFromCart",
    "placeOrder",
];

pub(super) static SCHEMA: LazyLock<Result<Schema, SchemaBuildError>> = LazyLock::new(|| {
    SchemaBuilder::new()
        .filter_query_fields(QUERIES.iter().copied())
        .filter_mutation_fields(MUTATIONS.iter().copied())
        .build(roots())
});

fn roots() -> RootFields {
    RootFields::new()
        .query("cart", |session, args: CartArgs| async move {
            Ok(Resolved::object(Cart::new(session, CartId::new(args.cart_id))))
        })
        .query("customerCart", |session, _: NoArgs| async move {
            Ok(Resolved::object(Cart::active(session)))
        })
        .mutation("createEmptyCart", |session, _: NoArgs| async move {
            Ok(Resolved::Value(Value::String(create_empty_cart(&session).await?)))
        })
        .mutation(
            "addSimpleProductsToCart",
            |session, args: Input<AddSimpleProductsInput>| async move {
                let input = args.input;
                let items = input.cart_items.into_iter().flatten().map(|item| item.data);
                mutate(session, input.cart_id, add_line_items(items)?)
            },
        )
        .mutation("addProductsToCart", |session, args: AddProductsArgs| async move {
            mutate(session, args.cart_id, add_line_items(args.cart_items)?)
        })
        .mutation("updateCartItems", |session, args: Input<UpdateCartItemsInput>| async move {
            let input = args.input;
            let actions = input
                .cart_items
                .into_iter()
                .flatten()
                .map(CartItemUpdate::into_action)
                .collect::<Result<Vec<_>, _>>()?;
            mutate(session, input.cart_id, actions)
        })
        .mutation("removeItemFromCart", |session, args: Input<RemoveItemInput>| async move {
            let input = args.input;
            let line_item_id = line_item_id(input.cart_item_uid, input.cart_item_id)?;
            mutate(session, input.cart_id, vec![CartAction::RemoveLineItem { line_item_id }])
        })
        .mutation(
            "setShippingAddressesOnCart",
            |session, args: Input<SetShippingAddressesInput>| async move {
                let input = args.input;
                let address = input
                    .shipping_addresses
                    .into_iter()
                    .flatten()
                    .next()
                    .ok_or_else(|| CifError::Validation("No shipping address given.".to_string()))?;
                let kind = match (address.address, address.customer_address_id) {
                    (Some(address), _) => CartMutationKind::Actions(vec![
                        CartAction::SetShippingAddress {
                            address: address.into(),
                        },
                    ]),
                    (None, Some(index)) => CartMutationKind::AddressFromBook {
                        index: address_index(index)?,
                        target: AddressTarget::Shipping,
                    },
                    (None, None) => {
                        return Err(CifError::Validation(
                            "The shipping address must contain either \"customer_address_id\" or \"address\"."
                                .to_string(),
                        ));
                    }
                };
                Ok(Resolved::object(CartMutation::new(
                    session,
                    CartId::new(input.cart_id),
                    kind,
                )))
            },
        )
        .mutation(
            "setBillingAddressOnCart",
            |session, args: Input<SetBillingAddressInput>| async move {
                let input = args.input;
                let kind = input.billing_address.into_kind()?;
                Ok(Resolved::object(CartMutation::new(
                    session,
                    CartId::new(input.cart_id),
                    kind,
                )))
            },
        )
        .mutation(
            "setShippingMethodsOnCart",
            |session, args: Input<SetShippingMethodsInput>| async move {
                let input = args.input;
                let method = input
                    .shipping_methods
                    .into_iter()
                    .flatten()
                    .next()
                    .ok_or_else(|| CifError::Validation("No shipping method given.".to_string()))?;
                let action = CartAction::SetShippingMethod {
                    shipping_method: ResourceIdentifier::new("shipping-method", method.method_code),
                };
                mutate(session, input.cart_id, vec![action])
            },
        )
        .mutation(
            "setPaymentMethodOnCart",
            |session, args: Input<SetPaymentMethodInput>| async move {
                let input = args.input;
                Ok(Resolved::object(CartMutation::new(
                    session,
                    CartId::new(input.cart_id),
                    CartMutationKind::PaymentMethod {
                        code: input.payment_method.code,
                    },
                )))
            },
        )
        .mutation("applyCouponToCart", |session, args: Input<ApplyCouponInput>| async move {
            let input = args.input;
            mutate(
                session,
                input.cart_id,
                vec![CartAction::AddDiscountCode {
                    code: input.coupon_code,
                }],
            )
        })
        .mutation("removeCouponFromCart", |session, args: Input<CartIdInput>| async move {
            Ok(Resolved::object(CartMutation::new(
                session,
                CartId::new(args.input.cart_id),
                CartMutationKind::RemoveCoupon,
            )))
        })
        .mutation("placeOrder", |session, args: Input<CartIdInput>| async move {
            Ok(Resolved::object(PlaceOrder::new(
                &session,
                CartId::new(args.input.cart_id),
            )))
        })
}

fn mutate(session: Session, cart_id: String, actions: Vec<CartAction>) -> Result<Resolved, CifError> {
    Ok(Resolved::object(CartMutation::actions(
        session,
        CartId::new(cart_id),
        actions,
    )))
}

fn add_line_items(items: impl IntoIterator<Item = CartItemInput>) -> Result<Vec<CartAction>, CifError> {
    let actions = items
        .into_iter()
        .map(|item| {
            Ok(CartAction::AddLineItem {
                sku: item.sku,
                quantity: quantity(item.quantity)?,
            })
        })
        .collect::<Result<Vec<_>, CifError>>()?;
    if actions.is_empty() {
        return Err(CifError::Validation("No cart items given.".to_string()));
    }
    Ok(actions)
}

fn line_item_id(uid: Option<String>, id: Option<String>) -> Result<String, CifError> {
    uid.or(id)
        .ok_or_else(|| CifError::Validation("Required parameter \"cart_item_uid\" is missing.".to_string()))
}

fn address_index(index: i64) -> Result<usize, CifError> {
    usize::try_from(index)
        .map_err(|_| CifError::Validation(format!("Invalid customer address id {index}.")))
}

// =============================================================================
// Inputs
// =============================================================================

#[derive(Debug, Deserialize)]
struct CartArgs {
    cart_id: String,
}

#[derive(Debug, Deserialize)]
struct CartIdInput {
    cart_id: String,
}

#[derive(Debug, Deserialize)]
struct CartItemInput {
    sku: String,
    quantity: f64,
}

#[derive(Debug, Deserialize)]
struct SimpleProductItem {
    data: CartItemInput,
}

#[derive(Debug, Deserialize)]
struct AddSimpleProductsInput {
    cart_id: String,
    cart_items: Vec<Option<SimpleProductItem>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddProductsArgs {
    cart_id: String,
    cart_items: Vec<CartItemInput>,
}

#[derive(Debug, Deserialize)]
struct CartItemUpdate {
    cart_item_id: Option<String>,
    cart_item_uid: Option<String>,
    quantity: Option<f64>,
}

impl CartItemUpdate {
    /// Quantity zero removes the line item.
    fn into_action(self) -> Result<CartAction, CifError> {
        let line_item_id = line_item_id(self.cart_item_uid, self.cart_item_id)?;
        let quantity = quantity(
            self.quantity
                .ok_or_else(|| CifError::Validation("Required parameter \"quantity\" is missing.".to_string()))?,
        )?;
        Ok(if quantity == 0 {
            CartAction::RemoveLineItem { line_item_id }
        } else {
            CartAction::ChangeLineItemQuantity {
                line_item_id,
                quantity,
            }
        })
    }
}

#[derive(Debug, Deserialize)]
struct UpdateCartItemsInput {
    cart_id: String,
    cart_items: Vec<Option<CartItemUpdate>>,
}

#[derive(Debug, Deserialize)]
struct RemoveItemInput {
    cart_id: String,
    cart_item_id: Option<String>,
    cart_item_uid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ShippingAddressInput {
    address: Option<CartAddressInput>,
    customer_address_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SetShippingAddressesInput {
    cart_id: String,
    shipping_addresses: Vec<Option<ShippingAddressInput>>,
}

#[derive(Debug, Deserialize)]
struct BillingAddressInput {
    address: Option<CartAddressInput>,
    customer_address_id: Option<i64>,
    same_as_shipping: Option<bool>,
    use_for_shipping: Option<bool>,
}

impl BillingAddressInput {
    fn into_kind(self) -> Result<CartMutationKind, CifError> {
        if let Some(address) = self.address {
            let address = AddressDraft::from(address);
            let mut actions = vec![CartAction::SetBillingAddress {
                address: address.clone(),
            }];
            if self.use_for_shipping.unwrap_or(false) || self.same_as_shipping.unwrap_or(false) {
                actions.push(CartAction::SetShippingAddress { address });
            }
            return Ok(CartMutationKind::Actions(actions));
        }
        if let Some(index) = self.customer_address_id {
            return Ok(CartMutationKind::AddressFromBook {
                index: address_index(index)?,
                target: AddressTarget::Billing,
            });
        }
        if self.same_as_shipping.unwrap_or(false) {
            return Ok(CartMutationKind::BillingSameAsShipping);
        }
        Err(CifError::Validation(
            "The billing address must contain either \"customer_address_id\", \"address\", or \"same_as_shipping\"."
                .to_string(),
        ))
    }
}

#[derive(Debug, Deserialize)]
struct SetBillingAddressInput {
    cart_id: String,
    billing_address: BillingAddressInput,
}

#[derive(Debug, Deserialize)]
struct ShippingMethodInput {
    method_code: String,
}

#[derive(Debug, Deserialize)]
struct SetShippingMethodsInput {
    cart_id: String,
    shipping_methods: Vec<Option<ShippingMethodInput>>,
}

#[derive(Debug, Deserialize)]
struct PaymentMethodInput {
    code: String,
}

#[derive(Debug, Deserialize)]
struct SetPaymentMethodInput {
    cart_id: String,
    payment_method: PaymentMethodInput,
}

#[derive(Debug, Deserialize)]
struct ApplyCouponInput {
    cart_id: String,
    coupon_code: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_schema_serves_cart_fields_only() {
        let sdl = SCHEMA.as_ref().unwrap().sdl();
        assert!(sdl.contains("customerCart: Cart!"));
        assert!(sdl.contains("placeOrder("));
        assert!(!sdl.contains("mergeCarts"));
        assert!(!sdl.contains("categoryList"));
    }

    #[test]
    fn test_update_to_zero_removes_item() {
        let update: CartItemUpdate =
            serde_json::from_value(json!({"cart_item_uid": "li1", "quantity": 0})).unwrap();
        assert_eq!(
            update.into_action().unwrap(),
            CartAction::RemoveLineItem {
                line_item_id: "li1".into()
            }
        );

        let update: CartItemUpdate =
            serde_json::from_value(json!({"cart_item_id": "li2", "quantity": 3})).unwrap();
        assert_eq!(
            update.into_action().unwrap(),
            CartAction::ChangeLineItemQuantity {
                line_item_id: "li2".into(),
                quantity: 3
            }
        );
    }

    #[test]
    fn test_fractional_quantity_is_rejected() {
        let err = add_line_items([CartItemInput {
            sku: "TEE-1".into(),
            quantity: 0.5,
        }])
        .unwrap_err();
        assert!(matches!(err, CifError::Validation(_)));
    }

    #[test]
    fn test_billing_address_input_kinds() {
        let billing: BillingAddressInput =
            serde_json::from_value(json!({"customer_address_id": 2})).unwrap();
        assert_eq!(
            billing.into_kind().unwrap(),
            CartMutationKind::AddressFromBook {
                index: 2,
                target: AddressTarget::Billing
            }
        );

        let billing: BillingAddressInput =
            serde_json::from_value(json!({"same_as_shipping": true})).unwrap();
        assert_eq!(billing.into_kind().unwrap(), CartMutationKind::BillingSameAsShipping);

        let billing: BillingAddressInput = serde_json::from_value(json!({
            "address": {
                "firstname": "Ada",
                "lastname": "Lovelace",
                "street": ["Main Street"],
                "city": "Berlin",
                "country_code": "DE"
            },
            "use_for_shipping": true
        }))
        .unwrap();
        let CartMutationKind::Actions(actions) = billing.into_kind().unwrap() else {
            panic!("inline address needs no lookup");
        };
        assert_eq!(actions.len(), 2);

        let billing: BillingAddressInput = serde_json::from_value(json!({})).unwrap();
        assert!(billing.into_kind().is_err());
    }
}
