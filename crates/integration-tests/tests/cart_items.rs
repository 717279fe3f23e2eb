//! Integration tests for cart item enrichment.
//!
//! Line items get their thumbnail from a product lookup per item. A failed
//! lookup only costs that item its thumbnail; the cart still resolves.

use std::sync::Arc;

use cif_connector::resolvers::ResolverModule;
use cif_integration_tests::{MockGateway, data, fixture, run};
use serde_json::{Value, json};

const CART_ITEMS: &str = r#"
    {
        cart(cart_id: "c1") {
            items {
                uid
                product { sku thumbnail { url } }
            }
        }
    }
"#;

/// Finds every product except the mug, the middle line of the cart.
fn product_lookup(variables: &Value) -> Value {
    let predicate = variables["where"].as_str().unwrap_or_default();
    let Some(slug) = ["tee", "cap"]
        .into_iter()
        .find(|slug| predicate.contains(&format!("\"{slug}\"")))
    else {
        return json!({"data": null, "errors": [{"message": "Product search is unavailable."}]});
    };
    data(json!({"products": {"total": 1, "results": [{
        "id": format!("p-{slug}"),
        "masterData": {"current": {
            "name": slug,
            "masterVariant": {"images": [{"url": format!("https://img.example.com/{slug}.jpg")}]}
        }}
    }]}}))
}

#[tokio::test]
async fn test_failed_lookup_leaves_item_without_thumbnail() {
    let gateway = Arc::new(
        MockGateway::new()
            .on("Cart", data(json!({"cart": fixture("cart")})))
            .respond("Products", product_lookup),
    );

    let response = run(&gateway, ResolverModule::Cart, CART_ITEMS).await;

    assert!(response.get("errors").is_none(), "{response}");
    assert_eq!(
        response["data"]["cart"]["items"],
        json!([
            {
                "uid": "li-tee",
                "product": {"sku": "TEE-1", "thumbnail": {"url": "https://img.example.com/tee.jpg"}}
            },
            {
                "uid": "li-mug",
                "product": {"sku": "MUG-1", "thumbnail": null}
            },
            {
                "uid": "li-cap",
                "product": {"sku": "CAP-1", "thumbnail": {"url": "https://img.example.com/cap.jpg"}}
            }
        ])
    );
}

#[tokio::test]
async fn test_each_item_is_looked_up_once() {
    let gateway = Arc::new(
        MockGateway::new()
            .on("Cart", data(json!({"cart": fixture("cart")})))
            .respond("Products", product_lookup),
    );

    run(&gateway, ResolverModule::Cart, CART_ITEMS).await;

    let operations = gateway.operations();
    assert_eq!(operations.iter().filter(|op| *op == "Cart").count(), 1);
    assert_eq!(operations.iter().filter(|op| *op == "Products").count(), 3);
}

#[tokio::test]
async fn test_sibling_fields_share_one_cart_load() {
    let gateway = Arc::new(MockGateway::new().on("Cart", data(json!({"cart": fixture("cart")}))));

    let response = run(
        &gateway,
        ResolverModule::Cart,
        r#"{ cart(cart_id: "c1") { id email total_quantity prices { grand_total { value currency } } } }"#,
    )
    .await;

    assert!(response.get("errors").is_none(), "{response}");
    assert_eq!(
        response["data"]["cart"]["prices"]["grand_total"],
        json!({"value": 44.0, "currency": "EUR"})
    );
    assert_eq!(gateway.operations(), ["Cart"]);
}
