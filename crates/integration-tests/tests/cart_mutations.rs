//! Integration tests for version-guarded cart mutations.
//!
//! Every cart update needs the cart's current version, so the backend must
//! see the version query strictly before the update, and a version conflict
//! must reach the storefront exactly as the backend phrased it.

use std::sync::Arc;

use cif_connector::resolvers::ResolverModule;
use cif_integration_tests::{MockGateway, data, fixture, run};
use serde_json::json;

const UPDATE_ITEMS: &str = r#"
    mutation {
        updateCartItems(input: {
            cart_id: "c1",
            cart_items: [{ cart_item_uid: "li-tee", quantity: 5 }]
        }) {
            cart { id total_quantity }
        }
    }
"#;

const CONFLICT: &str =
    "Object c1 has a different version than expected. Expected: 3 - Actual: 4.";

fn versioned_backend() -> MockGateway {
    MockGateway::new().on("CartVersion", data(json!({"cart": {"id": "c1", "version": 3}})))
}

// =============================================================================
// Ordering
// =============================================================================

#[tokio::test]
async fn test_version_is_read_before_update() {
    let gateway = Arc::new(
        versioned_backend().on("UpdateCart", data(json!({"updateCart": fixture("cart")}))),
    );

    let response = run(&gateway, ResolverModule::Cart, UPDATE_ITEMS).await;

    assert!(response.get("errors").is_none(), "{response}");
    assert_eq!(
        response["data"]["updateCartItems"]["cart"],
        json!({"id": "c1", "total_quantity": 3})
    );
    assert_eq!(gateway.operations(), ["CartVersion", "UpdateCart"]);

    let update = &gateway.calls()[1];
    assert_eq!(update.variables["version"], 3);
    assert_eq!(
        update.variables["actions"],
        json!([{"changeLineItemQuantity": {"lineItemId": "li-tee", "quantity": 5}}])
    );
}

#[tokio::test]
async fn test_payment_is_created_before_version_and_update() {
    let gateway = Arc::new(
        versioned_backend()
            .on("CreatePayment", data(json!({"createPayment": {"id": "pay-1"}})))
            .on("UpdateCart", data(json!({"updateCart": fixture("cart")}))),
    );

    let response = run(
        &gateway,
        ResolverModule::Cart,
        r#"mutation {
            setPaymentMethodOnCart(input: {cart_id: "c1", payment_method: {code: "free"}}) {
                cart { id }
            }
        }"#,
    )
    .await;

    assert!(response.get("errors").is_none(), "{response}");
    assert_eq!(gateway.operations(), ["CreatePayment", "CartVersion", "UpdateCart"]);
    assert_eq!(
        gateway.calls()[2].variables["actions"],
        json!([{"addPayment": {"payment": {"typeId": "payment", "id": "pay-1"}}}])
    );
}

#[tokio::test]
async fn test_missing_cart_skips_update() {
    let gateway = Arc::new(MockGateway::new().on("CartVersion", data(json!({"cart": null}))));

    let response = run(&gateway, ResolverModule::Cart, UPDATE_ITEMS).await;

    assert_eq!(response["data"]["updateCartItems"], json!(null));
    assert_eq!(
        response["errors"][0]["message"],
        "The Cart with ID 'c1' was not found."
    );
    assert_eq!(gateway.operations(), ["CartVersion"]);
}

// =============================================================================
// Error passthrough
// =============================================================================

#[tokio::test]
async fn test_version_conflict_is_passed_through() {
    let gateway = Arc::new(versioned_backend().on(
        "UpdateCart",
        json!({
            "data": null,
            "errors": [{
                "message": CONFLICT,
                "extensions": {"code": "ConcurrentModification"}
            }]
        }),
    ));

    let response = run(&gateway, ResolverModule::Cart, UPDATE_ITEMS).await;

    assert_eq!(response["data"], json!({"updateCartItems": null}));
    assert_eq!(response["errors"][0]["message"], CONFLICT);
    assert_eq!(response["errors"][0]["extensions"]["code"], "VERSION_CONFLICT");
}

#[tokio::test]
async fn test_invalid_quantity_never_reaches_backend() {
    let gateway = Arc::new(versioned_backend());

    let response = run(
        &gateway,
        ResolverModule::Cart,
        r#"mutation {
            addProductsToCart(cartId: "c1", cartItems: [{sku: "TEE-1", quantity: 1.5}]) {
                cart { id }
            }
        }"#,
    )
    .await;

    assert_eq!(response["errors"][0]["extensions"]["code"], "BAD_USER_INPUT");
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn test_failed_mutation_leaves_siblings_intact() {
    let gateway = Arc::new(
        versioned_backend().on("UpdateCart", data(json!({"updateCart": fixture("cart")}))),
    );

    let response = run(
        &gateway,
        ResolverModule::Cart,
        r#"mutation {
            bad: addProductsToCart(cartId: "c1", cartItems: [{sku: "TEE-1", quantity: 1.5}]) {
                cart { id }
            }
            good: applyCouponToCart(input: {cart_id: "c1", coupon_code: "SUMMER"}) {
                cart { id }
            }
        }"#,
    )
    .await;

    assert_eq!(
        response["data"],
        json!({"bad": null, "good": {"cart": {"id": "c1"}}})
    );
    assert_eq!(response["errors"].as_array().map(Vec::len), Some(1));
    assert_eq!(response["errors"][0]["path"], json!(["bad"]));
    assert_eq!(gateway.operations(), ["CartVersion", "UpdateCart"]);
}

#[tokio::test]
async fn test_create_empty_cart_error_is_field_scoped() {
    let gateway = Arc::new(MockGateway::new().on(
        "CreateCart",
        json!({
            "data": null,
            "errors": [{
                "message": CONFLICT,
                "extensions": {"code": "ConcurrentModification"}
            }]
        }),
    ));

    let response = run(&gateway, ResolverModule::Cart, "mutation { createEmptyCart }").await;

    assert_eq!(response["data"], json!({"createEmptyCart": null}));
    assert_eq!(response["errors"][0]["message"], CONFLICT);
    assert_eq!(response["errors"][0]["extensions"]["code"], "VERSION_CONFLICT");
}
