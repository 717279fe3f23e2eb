//! Address conversion between storefront and backend shapes.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{elements, money, zero};

/// Backend address draft, as sent in cart and customer update actions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Storefront `CartAddressInput`.
#[derive(Debug, Clone, Deserialize)]
pub struct CartAddressInput {
    pub firstname: String,
    pub lastname: String,
    pub company: Option<String>,
    #[serde(default)]
    pub street: Vec<Option<String>>,
    pub city: String,
    pub region: Option<String>,
    pub postcode: Option<String>,
    pub country_code: String,
    pub telephone: Option<String>,
    pub email: Option<String>,
}

impl From<CartAddressInput> for AddressDraft {
    fn from(input: CartAddressInput) -> Self {
        let mut street = input.street.into_iter().flatten();
        Self {
            first_name: Some(input.firstname),
            last_name: Some(input.lastname),
            company: input.company,
            street_name: street.next(),
            street_number: street.next(),
            city: Some(input.city),
            region: input.region,
            postal_code: input.postcode,
            country: input.country_code,
            phone: input.telephone,
            email: input.email,
        }
    }
}

/// Storefront `CustomerAddressRegionInput`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerAddressRegionInput {
    pub region: Option<String>,
    pub region_code: Option<String>,
}

/// Storefront `CustomerAddressInput`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerAddressInput {
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub company: Option<String>,
    #[serde(default)]
    pub street: Vec<Option<String>>,
    pub city: Option<String>,
    pub region: Option<CustomerAddressRegionInput>,
    pub postcode: Option<String>,
    pub country_code: Option<String>,
    pub telephone: Option<String>,
}

impl CustomerAddressInput {
    /// Convert into a backend draft, falling back to `default_country`.
    #[must_use]
    pub fn into_draft(self, default_country: &str) -> AddressDraft {
        let mut street = self.street.into_iter().flatten();
        AddressDraft {
            first_name: self.firstname,
            last_name: self.lastname,
            company: self.company,
            street_name: street.next(),
            street_number: street.next(),
            city: self.city,
            region: self
                .region
                .and_then(|region| region.region_code.or(region.region)),
            postal_code: self.postcode,
            country: self
                .country_code
                .unwrap_or_else(|| default_country.to_string()),
            phone: self.telephone,
            email: None,
        }
    }
}

fn street(raw: &Value) -> Value {
    Value::Array(
        [&raw["streetName"], &raw["streetNumber"]]
            .into_iter()
            .filter(|part| part.is_string())
            .cloned()
            .collect(),
    )
}

/// Storefront `BillingCartAddress` from a backend address.
#[must_use]
pub fn billing_address(raw: &Value) -> Value {
    json!({
        "firstname": raw["firstName"],
        "lastname": raw["lastName"],
        "company": raw["company"],
        "street": street(raw),
        "city": raw["city"],
        "region": {
            "code": raw["region"],
            "label": raw["region"],
            "region_id": raw["region"],
        },
        "postcode": raw["postalCode"],
        "country": {
            "code": raw["country"],
            "label": raw["country"],
        },
        "telephone": raw["phone"],
        "email": raw["email"],
    })
}

/// Storefront `ShippingCartAddress` from a backend address.
///
/// `methods` are the backend shipping methods available for the cart and
/// `shipping_info` the cart's selected shipping info, if any.
#[must_use]
pub fn shipping_address(raw: &Value, methods: &[Value], shipping_info: &Value) -> Value {
    let mut address = billing_address(raw);
    address["available_shipping_methods"] = methods.iter().map(available_shipping_method).collect();
    address["selected_shipping_method"] = selected_shipping_method(shipping_info);
    address
}

/// Storefront `AvailableShippingMethod` from a backend shipping method.
///
/// The amount is the price of the first matching shipping rate.
#[must_use]
pub fn available_shipping_method(method: &Value) -> Value {
    let rates: Vec<&Value> = elements(&method["zoneRates"])
        .flat_map(|zone| elements(&zone["shippingRates"]))
        .collect();
    let price = rates
        .iter()
        .find(|rate| rate["isMatching"].as_bool().unwrap_or(false))
        .or_else(|| rates.first())
        .map(|rate| money(&rate["price"]))
        .filter(|amount| !amount.is_null())
        .unwrap_or_else(|| zero(&Value::Null));

    json!({
        "amount": price,
        "available": true,
        "carrier_code": method["id"],
        "carrier_title": method["name"],
        "error_message": "",
        "method_code": method["id"],
        "method_title": method["name"],
        "price_excl_tax": price,
        "price_incl_tax": price,
    })
}

fn selected_shipping_method(shipping_info: &Value) -> Value {
    let method = &shipping_info["shippingMethod"];
    if method.is_null() {
        return Value::Null;
    }
    let title = if method["name"].is_null() {
        &shipping_info["shippingMethodName"]
    } else {
        &method["name"]
    };
    json!({
        "amount": money(&shipping_info["price"]),
        "carrier_code": method["id"],
        "carrier_title": title,
        "method_code": method["id"],
        "method_title": title,
    })
}

/// Storefront `CustomerAddress` from a backend address at `index` in the
/// customer's address book.
#[must_use]
pub fn customer_address(raw: &Value, index: usize, customer: &Value) -> Value {
    let id = &raw["id"];
    json!({
        "id": index,
        "firstname": raw["firstName"],
        "lastname": raw["lastName"],
        "company": raw["company"],
        "street": street(raw),
        "city": raw["city"],
        "region": {
            "region": raw["region"],
            "region_code": raw["region"],
            "region_id": raw["region"],
        },
        "postcode": raw["postalCode"],
        "country_code": raw["country"],
        "country_id": raw["country"],
        "telephone": raw["phone"],
        "default_shipping": !id.is_null() && customer["defaultShippingAddressId"] == *id,
        "default_billing": !id.is_null() && customer["defaultBillingAddressId"] == *id,
    })
}

/// Storefront `OrderAddress` from a backend address.
#[must_use]
pub fn order_address(raw: &Value) -> Value {
    if raw.is_null() {
        return Value::Null;
    }
    json!({
        "firstname": raw["firstName"],
        "lastname": raw["lastName"],
        "street": street(raw),
        "city": raw["city"],
        "region": raw["region"],
        "postcode": raw["postalCode"],
        "country_code": raw["country"],
        "telephone": raw["phone"],
    })
}
