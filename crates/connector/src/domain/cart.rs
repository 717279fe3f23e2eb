//! Carts.

use cif_core::{CartId, Money, PaymentMethod};
use futures::FutureExt;
use futures::future::{BoxFuture, ready};
use serde_json::{Value, json};
use tracing::warn;

use super::address::{billing_address, shipping_address};
use super::product::{ProductsKey, price_range, products_loader};
use super::{elements, money, quote};
use crate::backend::{Session, operations};
use crate::error::CifError;
use crate::loader::Loader;
use crate::resolve::{Args, Resolvable, Resolved};

/// Which cart to load.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CartLookup {
    /// Cart with this backend id.
    Id(CartId),
    /// Active cart of the signed-in customer.
    Active,
}

enum CartSource {
    Lookup(CartLookup),
    Raw(Value),
}

/// Loader running the cart queries.
#[must_use]
pub fn carts_loader(session: &Session) -> Loader<CartLookup, Value> {
    let session = session.clone();
    Loader::per_key("carts", move |lookup: CartLookup| {
        let session = session.clone();
        async move {
            let locale = session.locale();
            match lookup {
                CartLookup::Id(id) => {
                    let data = session
                        .execute(&operations::CART, json!({"id": id, "locale": locale}))
                        .await?;
                    Some(data["cart"].clone())
                        .filter(|cart| !cart.is_null())
                        .ok_or_else(|| CifError::NotFound(format!("The Cart with ID '{id}' was not found.")))
                }
                CartLookup::Active => {
                    let data = session
                        .execute(&operations::ACTIVE_CART, json!({"locale": locale}))
                        .await?;
                    Some(data["me"]["activeCart"].clone())
                        .filter(|cart| !cart.is_null())
                        .ok_or_else(|| CifError::NotFound("The customer has no active cart.".to_string()))
                }
            }
        }
    })
}

/// Loader of the shipping methods available for a cart.
fn shipping_methods_loader(session: &Session) -> Loader<CartId, Value> {
    let session = session.clone();
    Loader::per_key("shipping_methods", move |cart_id: CartId| {
        let session = session.clone();
        async move {
            let data = session
                .execute(&operations::SHIPPING_METHODS, json!({"cartId": cart_id}))
                .await?;
            Ok(data["shippingMethodsByCart"].clone())
        }
    })
}

/// A storefront cart.
pub struct Cart {
    session: Session,
    source: CartSource,
    carts: Loader<CartLookup, Value>,
    products: Loader<ProductsKey, Value>,
    shipping_methods: Loader<CartId, Value>,
}

impl Cart {
    fn with_source(session: Session, source: CartSource) -> Self {
        Self {
            carts: carts_loader(&session),
            products: products_loader(&session),
            shipping_methods: shipping_methods_loader(&session),
            session,
            source,
        }
    }

    /// Cart with the given id.
    #[must_use]
    pub fn new(session: Session, id: CartId) -> Self {
        Self::with_source(session, CartSource::Lookup(CartLookup::Id(id)))
    }

    /// Active cart of the signed-in customer.
    #[must_use]
    pub fn active(session: Session) -> Self {
        Self::with_source(session, CartSource::Lookup(CartLookup::Active))
    }

    /// Cart from a payload the backend already returned, e.g. by a mutation.
    #[must_use]
    pub fn from_raw(session: Session, raw: Value) -> Self {
        Self::with_source(session, CartSource::Raw(raw))
    }

    /// Line items, enriched with product images where the product lookup
    /// succeeds.
    async fn items(&self) -> Result<Value, CifError> {
        let raw = self.load().await?;
        let lines: Vec<&Value> = elements(&raw["lineItems"]).collect();

        let locale = self.session.locale();
        let lookups = self
            .products
            .load_many(lines.iter().map(|line| ProductsKey {
                predicate: Some(format!(
                    "masterData(current(slug({locale}={})))",
                    quote(line["productSlug"].as_str().unwrap_or_default())
                )),
                limit: 1,
                offset: 0,
            }))
            .await;

        let items = lines
            .into_iter()
            .zip(lookups)
            .map(|(line, lookup)| {
                let mut item = line_item(line);
                match lookup {
                    Ok(products) => {
                        let product = &products["results"][0]["masterData"]["current"];
                        if let Some(url) = product["masterVariant"]["images"][0]["url"].as_str() {
                            let image = json!({"url": url, "label": product["name"]});
                            item["product"]["thumbnail"] = image.clone();
                            item["product"]["small_image"] = image;
                        }
                    }
                    Err(error) => {
                        warn!(
                            line_item = %line["id"],
                            error = %error,
                            "Product lookup for cart item failed"
                        );
                    }
                }
                item
            })
            .collect();
        Ok(Value::Array(items))
    }

    async fn shipping_addresses(&self) -> Result<Value, CifError> {
        let raw = self.load().await?;
        let address = &raw["shippingAddress"];
        if address.is_null() {
            return Ok(json!([]));
        }

        let methods = match raw["id"].as_str() {
            Some(id) => self
                .shipping_methods
                .load(CartId::new(id))
                .await
                .unwrap_or_else(|error| {
                    warn!(cart = id, error = %error, "Shipping methods lookup failed");
                    Value::Null
                }),
            None => Value::Null,
        };
        let methods: Vec<Value> = elements(&methods).cloned().collect();

        Ok(json!([shipping_address(
            address,
            &methods,
            &raw["shippingInfo"]
        )]))
    }
}

impl Resolvable for Cart {
    fn typename(&self) -> &'static str {
        "Cart"
    }

    fn load(&self) -> BoxFuture<'_, Result<Value, CifError>> {
        match &self.source {
            CartSource::Lookup(lookup) => self.carts.load(lookup.clone()).boxed(),
            CartSource::Raw(raw) => ready(Ok(raw.clone())).boxed(),
        }
    }

    fn convert(&self, raw: &Value) -> Value {
        let coupons: Vec<Value> = elements(&raw["discountCodes"])
            .map(|discount| json!({"code": discount["discountCode"]["code"]}))
            .collect();
        let selected = elements(&raw["paymentInfo"]["payments"])
            .last()
            .and_then(|payment| payment["paymentMethodInfo"]["method"].as_str())
            .and_then(PaymentMethod::by_code)
            .unwrap_or(PaymentMethod::FREE);
        let billing = &raw["billingAddress"];

        json!({
            "id": raw["id"],
            "email": raw["customerEmail"],
            "items": elements(&raw["lineItems"]).map(line_item).collect::<Vec<_>>(),
            "total_quantity": elements(&raw["lineItems"]).count(),
            "is_virtual": false,
            "applied_coupon": coupons.first(),
            "applied_coupons": coupons,
            "available_payment_methods": PaymentMethod::ALL,
            "selected_payment_method": selected,
            "billing_address": if billing.is_null() { Value::Null } else { billing_address(billing) },
            "prices": prices(raw),
        })
    }

    fn computed<'a>(
        &'a self,
        field: &str,
        _args: &'a Args,
    ) -> Option<BoxFuture<'a, Result<Resolved, CifError>>> {
        match field {
            "items" => Some(async move { self.items().await.map(Resolved::from) }.boxed()),
            "shipping_addresses" => {
                Some(async move { self.shipping_addresses().await.map(Resolved::from) }.boxed())
            }
            _ => None,
        }
    }
}

/// Storefront `SimpleCartItem` from a backend line item, without images.
fn line_item(line: &Value) -> Value {
    let price = money(&line["price"]["value"]);
    let row_total = money(&line["totalPrice"]);
    json!({
        "__typename": "SimpleCartItem",
        "uid": line["id"],
        "id": line["id"],
        "quantity": line["quantity"],
        "product": {
            "__typename": "SimpleProduct",
            "uid": line["productId"],
            "name": line["name"],
            "sku": line["variant"]["sku"],
            "url_key": line["productSlug"],
            "staged": false,
            "thumbnail": null,
            "small_image": null,
            "price_range": price_range(&price),
        },
        "prices": {
            "price": price,
            "row_total": row_total,
            "row_total_including_tax": row_total,
        },
    })
}

/// Storefront `CartPrices`; subtotals are the sum of the line item totals.
fn prices(raw: &Value) -> Value {
    let total = &raw["totalPrice"];
    let subtotal = serde_json::from_value::<Money>(total.clone())
        .map(|total| {
            let cents = elements(&raw["lineItems"])
                .filter_map(|line| line["totalPrice"]["centAmount"].as_i64())
                .sum();
            Money {
                cent_amount: cents,
                ..total
            }
        })
        .ok()
        .and_then(|subtotal| serde_json::to_value(subtotal).ok())
        .map_or(Value::Null, |subtotal| money(&subtotal));

    json!({
        "grand_total": money(total),
        "subtotal_excluding_tax": subtotal,
        "subtotal_including_tax": subtotal,
        "subtotal_with_discount_excluding_tax": subtotal,
        "applied_taxes": [],
    })
}

/// Create an empty cart in the session's currency and country.
///
/// # Errors
///
/// Returns the backend error, or [`CifError::Decode`] if the response has no
/// cart id.
pub async fn create_empty_cart(session: &Session) -> Result<String, CifError> {
    let settings = session.settings();
    let data = session
        .execute(
            &operations::CREATE_CART,
            json!({"draft": {"currency": settings.currency, "country": settings.country}}),
        )
        .await?;
    data["createMyCart"]["id"]
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| CifError::Decode("createMyCart returned no id".to_string()))
}
