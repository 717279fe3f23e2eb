//! The signed-in customer: profile, address book, orders and updates.

use std::fmt;

use cif_core::{Email, Money, Version};
use futures::FutureExt;
use futures::future::{BoxFuture, ready};
use serde::Serialize;
use serde_json::{Value, json};

use super::address::{AddressDraft, customer_address, order_address};
use super::{Page, elements, money, quote, zero};
use crate::backend::{Session, operations};
use crate::error::CifError;
use crate::loader::Loader;
use crate::resolve::{Args, Resolvable, Resolved};

/// Loader of the `me` payload, keyed by an optional order number filter.
fn me_loader(session: &Session) -> Loader<Option<String>, Value> {
    let session = session.clone();
    Loader::per_key("customers", move |order_number: Option<String>| {
        let session = session.clone();
        async move {
            let predicate = order_number.map(|number| format!("orderNumber={}", quote(&number)));
            let data = session
                .execute(
                    &operations::CUSTOMER,
                    json!({"where": predicate, "locale": session.locale()}),
                )
                .await?;
            let me = data["me"].clone();
            if me["customer"].is_null() {
                return Err(CifError::NotFound(
                    "The current customer isn't authorized.".to_string(),
                ));
            }
            Ok(me)
        }
    })
}

enum CustomerSource {
    Me,
    Raw(Value),
}

/// The signed-in customer.
pub struct Customer {
    source: CustomerSource,
    loader: Loader<Option<String>, Value>,
}

impl Customer {
    /// The customer the session's bearer token belongs to.
    #[must_use]
    pub fn me(session: &Session) -> Self {
        Self {
            source: CustomerSource::Me,
            loader: me_loader(session),
        }
    }

    /// Customer from a payload a mutation already returned.
    #[must_use]
    pub fn from_raw(session: &Session, customer: Value) -> Self {
        Self {
            source: CustomerSource::Raw(customer),
            loader: me_loader(session),
        }
    }

    async fn orders(&self, args: &Args) -> Result<Value, CifError> {
        let number = args
            .get("filter")
            .and_then(|filter| filter["number"]["eq"].as_str())
            .map(str::to_owned);
        let me = self.loader.load(number).await?;
        let orders = &me["orders"];
        let items: Vec<Value> = elements(&orders["results"]).map(order).collect();
        let total = orders["total"].as_u64().unwrap_or(items.len() as u64);
        Ok(json!({
            "items": items,
            "total_count": total,
            "page_info": Page::from_args(args).info(total),
        }))
    }
}

impl Resolvable for Customer {
    fn typename(&self) -> &'static str {
        "Customer"
    }

    fn load(&self) -> BoxFuture<'_, Result<Value, CifError>> {
        match &self.source {
            CustomerSource::Me => self.loader.load(None).boxed(),
            CustomerSource::Raw(customer) => {
                ready(Ok(json!({"customer": customer, "orders": null}))).boxed()
            }
        }
    }

    fn convert(&self, raw: &Value) -> Value {
        customer_fields(&raw["customer"])
    }

    fn computed<'a>(
        &'a self,
        field: &str,
        args: &'a Args,
    ) -> Option<BoxFuture<'a, Result<Resolved, CifError>>> {
        match field {
            "orders" => Some(async move { self.orders(args).await.map(Resolved::from) }.boxed()),
            _ => None,
        }
    }
}

/// Storefront `Customer` fields from a backend customer (without orders).
#[must_use]
pub fn customer_fields(customer: &Value) -> Value {
    let addresses: Vec<&Value> = elements(&customer["addresses"]).collect();
    let default_index = |key: &str| {
        let id = &customer[key];
        addresses
            .iter()
            .position(|address| !id.is_null() && address["id"] == *id)
            .map(|index| index.to_string())
    };

    json!({
        "id": customer["id"],
        "firstname": customer["firstName"],
        "lastname": customer["lastName"],
        "email": customer["email"],
        "is_subscribed": false,
        "default_billing": default_index("defaultBillingAddressId"),
        "default_shipping": default_index("defaultShippingAddressId"),
        "addresses": addresses
            .iter()
            .enumerate()
            .map(|(index, address)| customer_address(address, index, customer))
            .collect::<Vec<_>>(),
    })
}

/// Storefront `CustomerOrder` from a backend order.
fn order(raw: &Value) -> Value {
    let currency = &raw["totalPrice"]["currencyCode"];
    let net = &raw["taxedPrice"]["totalNet"];
    let gross = &raw["taxedPrice"]["totalGross"];
    let subtotal = if net.is_null() { &raw["totalPrice"] } else { net };
    let tax = match (
        serde_json::from_value::<Money>(gross.clone()),
        serde_json::from_value::<Money>(net.clone()),
    ) {
        (Ok(gross), Ok(net)) => serde_json::to_value(Money {
            cent_amount: gross.cent_amount - net.cent_amount,
            ..gross
        })
        .map_or(Value::Null, |tax| money(&tax)),
        _ => Value::Null,
    };
    let shipping = Some(money(&raw["shippingInfo"]["price"]))
        .filter(|price| !price.is_null())
        .unwrap_or_else(|| zero(currency));
    let shipping_address = order_address(&raw["shippingAddress"]);
    let billing_address = Some(order_address(&raw["billingAddress"]))
        .filter(|address| !address.is_null())
        .unwrap_or_else(|| shipping_address.clone());

    json!({
        "id": raw["id"],
        "number": if raw["orderNumber"].is_null() { &raw["id"] } else { &raw["orderNumber"] },
        "order_date": raw["createdAt"],
        "status": raw["orderState"],
        "total": {
            "grand_total": money(&raw["totalPrice"]),
            "subtotal": money(subtotal),
            "total_shipping": shipping,
            "total_tax": tax,
        },
        "items": elements(&raw["lineItems"]).map(|line| json!({
            "__typename": "OrderItem",
            "id": line["id"],
            "product_name": line["name"],
            "product_sku": line["variant"]["sku"],
            "product_url_key": line["productSlug"],
            "product_sale_price": money(&line["price"]["value"]),
            "quantity_ordered": line["quantity"],
        })).collect::<Vec<_>>(),
        "shipping_address": shipping_address,
        "billing_address": billing_address,
        "shipping_method": raw["shippingInfo"]["shippingMethodName"],
    })
}

/// Backend customer update action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CustomerAction {
    SetFirstName { first_name: String },
    SetLastName { last_name: String },
    ChangeEmail { email: String },
    AddAddress { address: AddressDraft },
}

/// What a customer mutation does.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum CustomerMutationKind {
    /// Profile updates; resolves to `CustomerOutput`.
    Update(Vec<CustomerAction>),
    /// Password change; resolves to `Customer`.
    ChangePassword { current: String, new: String },
    /// New address book entry; resolves to `CustomerAddress`.
    AddAddress(AddressDraft),
}

impl fmt::Debug for CustomerMutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Update(actions) => f.debug_tuple("Update").field(actions).finish(),
            Self::ChangePassword { .. } => f.write_str("ChangePassword { .. }"),
            Self::AddAddress(address) => f.debug_tuple("AddAddress").field(address).finish(),
        }
    }
}

/// Key of a backend customer update.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CustomerUpdate {
    version: Version,
    kind: CustomerMutationKind,
}

/// A version-guarded update of the signed-in customer.
pub struct CustomerMutation {
    session: Session,
    kind: CustomerMutationKind,
    versions: Loader<(), Version>,
    updates: Loader<CustomerUpdate, Value>,
}

impl CustomerMutation {
    #[must_use]
    pub fn new(session: Session, kind: CustomerMutationKind) -> Self {
        let versions_session = session.clone();
        let versions = Loader::per_key("customer_versions", move |(): ()| {
            let session = versions_session.clone();
            async move {
                let data = session.execute(&operations::CUSTOMER_VERSION, Value::Null).await?;
                data["me"]["customer"]["version"]
                    .as_i64()
                    .map(Version::new)
                    .ok_or_else(|| {
                        CifError::NotFound("The current customer isn't authorized.".to_string())
                    })
            }
        });

        let updates_session = session.clone();
        let updates = Loader::per_key("customer_updates", move |update: CustomerUpdate| {
            let session = updates_session.clone();
            async move {
                match update.kind {
                    CustomerMutationKind::ChangePassword { current, new } => {
                        let data = session
                            .execute(
                                &operations::CHANGE_MY_PASSWORD,
                                json!({
                                    "version": update.version,
                                    "currentPassword": current,
                                    "newPassword": new,
                                }),
                            )
                            .await?;
                        Ok(data["customerChangeMyPassword"].clone())
                    }
                    kind => {
                        let actions = match kind {
                            CustomerMutationKind::AddAddress(address) => {
                                vec![CustomerAction::AddAddress { address }]
                            }
                            CustomerMutationKind::Update(actions) => actions,
                            CustomerMutationKind::ChangePassword { .. } => Vec::new(),
                        };
                        let data = session
                            .execute(
                                &operations::UPDATE_MY_CUSTOMER,
                                json!({"version": update.version, "actions": actions}),
                            )
                            .await?;
                        Ok(data["updateMyCustomer"].clone())
                    }
                }
            }
        });

        Self {
            session,
            kind,
            versions,
            updates,
        }
    }
}

impl Resolvable for CustomerMutation {
    fn typename(&self) -> &'static str {
        match self.kind {
            CustomerMutationKind::Update(_) => "CustomerOutput",
            CustomerMutationKind::ChangePassword { .. } => "Customer",
            CustomerMutationKind::AddAddress(_) => "CustomerAddress",
        }
    }

    fn load(&self) -> BoxFuture<'_, Result<Value, CifError>> {
        async move {
            let version = self.versions.load(()).await?;
            self.updates
                .load(CustomerUpdate {
                    version,
                    kind: self.kind.clone(),
                })
                .await
        }
        .boxed()
    }

    fn convert(&self, raw: &Value) -> Value {
        match self.kind {
            CustomerMutationKind::Update(_) => json!({}),
            CustomerMutationKind::ChangePassword { .. } => customer_fields(raw),
            CustomerMutationKind::AddAddress(_) => {
                let addresses: Vec<&Value> = elements(&raw["addresses"]).collect();
                addresses.last().map_or(Value::Null, |address| {
                    customer_address(address, addresses.len() - 1, raw)
                })
            }
        }
    }

    fn computed<'a>(
        &'a self,
        field: &str,
        _args: &'a Args,
    ) -> Option<BoxFuture<'a, Result<Resolved, CifError>>> {
        match (&self.kind, field) {
            (CustomerMutationKind::Update(_), "customer") => Some(
                async move {
                    let raw = self.load().await?;
                    Ok(Resolved::object(Customer::from_raw(&self.session, raw)))
                }
                .boxed(),
            ),
            _ => None,
        }
    }
}

/// Storefront customer registration input.
#[derive(Clone, Default)]
pub struct SignUp {
    pub email: String,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Register a new customer and return the backend customer.
///
/// # Errors
///
/// Returns [`CifError::Validation`] for a malformed email (before any backend
/// call) and the backend error otherwise.
pub async fn sign_up(session: &Session, input: SignUp) -> Result<Value, CifError> {
    let email = Email::parse(&input.email)?;
    let password = input
        .password
        .ok_or_else(|| CifError::Validation("A password is required.".to_string()))?;
    let data = session
        .execute(
            &operations::CUSTOMER_SIGN_UP,
            json!({"draft": {
                "email": email.as_str(),
                "password": password,
                "firstName": input.first_name,
                "lastName": input.last_name,
            }}),
        )
        .await?;
    Ok(data["customerSignMeUp"]["customer"].clone())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use graphql_client::{QueryBody, Response};
    use secrecy::SecretString;

    use super::*;
    use crate::backend::{Gateway, RequestSettings};
    use crate::resolve::{resolve_field, resolve_field_with, resolve_whole};

    struct TableGateway {
        responses: Vec<(&'static str, Value)>,
        calls: Mutex<Vec<(String, Value)>>,
    }

    #[async_trait]
    impl Gateway for TableGateway {
        async fn send(
            &self,
            body: QueryBody<Value>,
            _authorization: Option<&SecretString>,
        ) -> Result<Response<Value>, CifError> {
            self.calls
                .lock()
                .unwrap()
                .push((body.operation_name.to_string(), body.variables.clone()));
            let response = self
                .responses
                .iter()
                .find(|(name, _)| *name == body.operation_name)
                .map_or_else(|| json!({"data": null}), |(_, response)| response.clone());
            Ok(serde_json::from_value(response)?)
        }
    }

    fn session(responses: Vec<(&'static str, Value)>) -> (Session, Arc<TableGateway>) {
        let gateway = Arc::new(TableGateway {
            responses,
            calls: Mutex::new(Vec::new()),
        });
        let settings = RequestSettings::anonymous("en", "EUR", "DE").with_bearer("token");
        (Session::new(gateway.clone(), settings), gateway)
    }

    fn eur(cents: i64) -> Value {
        json!({"centAmount": cents, "currencyCode": "EUR", "fractionDigits": 2})
    }

    fn backend_me() -> Value {
        json!({"data": {"me": {
            "customer": {
                "id": "cu1",
                "email": "ada@example.com",
                "firstName": "Ada",
                "lastName": "Lovelace",
                "defaultShippingAddressId": "a2",
                "addresses": [
                    {"id": "a1", "firstName": "Ada", "country": "DE"},
                    {"id": "a2", "firstName": "Ada", "country": "GB"}
                ]
            },
            "orders": {
                "total": 1,
                "results": [{
                    "id": "o1",
                    "orderNumber": "100042",
                    "orderState": "Open",
                    "createdAt": "2024-05-01T10:00:00.000Z",
                    "totalPrice": eur(3490),
                    "taxedPrice": {"totalNet": eur(2500), "totalGross": eur(2975)},
                    "shippingAddress": {"firstName": "Ada", "streetName": "Main Street", "country": "DE"},
                    "billingAddress": null,
                    "shippingInfo": {"shippingMethodName": "Standard", "price": eur(515)},
                    "lineItems": [{
                        "id": "li1",
                        "quantity": 1,
                        "name": "Cotton Tee",
                        "productSlug": "cotton-tee",
                        "variant": {"sku": "TEE-1"},
                        "price": {"value": eur(2500)}
                    }]
                }]
            }
        }}})
    }

    #[tokio::test]
    async fn test_customer_profile() {
        let (session, _) = session(vec![("Customer", backend_me())]);
        let customer = Customer::me(&session);

        let shaped = resolve_whole(&customer).await.unwrap();
        assert_eq!(shaped["firstname"], "Ada");
        assert_eq!(shaped["default_shipping"], "1");
        assert!(shaped["default_billing"].is_null());
        assert_eq!(shaped["addresses"][1]["default_shipping"], true);
        assert_eq!(shaped["addresses"][1]["id"], 1);
    }

    #[tokio::test]
    async fn test_orders_share_the_profile_query() {
        let (session, gateway) = session(vec![("Customer", backend_me())]);
        let customer = Customer::me(&session);

        resolve_field(&customer, "email").await.unwrap();
        let Resolved::Value(orders) = resolve_field(&customer, "orders").await.unwrap() else {
            panic!("orders are plain values");
        };

        let order = &orders["items"][0];
        assert_eq!(order["number"], "100042");
        assert_eq!(order["total"]["total_tax"], json!({"value": 4.75, "currency": "EUR"}));
        assert_eq!(order["total"]["subtotal"]["value"], 25.0);
        assert_eq!(order["billing_address"]["street"], json!(["Main Street"]));
        assert_eq!(order["items"][0]["product_sku"], "TEE-1");
        assert_eq!(orders["total_count"], 1);
        assert_eq!(gateway.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_orders_filtered_by_number() {
        let (session, gateway) = session(vec![("Customer", backend_me())]);
        let customer = Customer::me(&session);
        let args: Args = serde_json::from_value(json!({"filter": {"number": {"eq": "100042"}}})).unwrap();

        resolve_field_with(&customer, "orders", &args).await.unwrap();

        let calls = gateway.calls.lock().unwrap();
        assert_eq!(calls[0].1["where"], r#"orderNumber="100042""#);
    }

    #[tokio::test]
    async fn test_anonymous_customer_is_not_found() {
        let (session, _) = session(vec![(
            "Customer",
            json!({"data": {"me": {"customer": null, "orders": null}}}),
        )]);
        let err = resolve_whole(&Customer::me(&session)).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_update_is_version_guarded() {
        let (session, gateway) = session(vec![
            ("CustomerVersion", json!({"data": {"me": {"customer": {"id": "cu1", "version": 12}}}})),
            (
                "UpdateMyCustomer",
                json!({"data": {"updateMyCustomer": {"id": "cu1", "version": 13, "firstName": "Augusta"}}}),
            ),
        ]);
        let mutation = CustomerMutation::new(
            session,
            CustomerMutationKind::Update(vec![CustomerAction::SetFirstName {
                first_name: "Augusta".into(),
            }]),
        );

        let Resolved::Object(customer) = resolve_field(&mutation, "customer").await.unwrap() else {
            panic!("customer is an object");
        };
        let shaped = resolve_whole(customer.as_ref()).await.unwrap();
        assert_eq!(shaped["firstname"], "Augusta");

        let calls = gateway.calls.lock().unwrap();
        assert_eq!(calls[0].0, "CustomerVersion");
        assert_eq!(calls[1].1["version"], 12);
        assert_eq!(calls[1].1["actions"], json!([{"setFirstName": {"firstName": "Augusta"}}]));
    }

    #[tokio::test]
    async fn test_add_address_returns_new_entry() {
        let (session, _) = session(vec![
            ("CustomerVersion", json!({"data": {"me": {"customer": {"id": "cu1", "version": 1}}}})),
            (
                "UpdateMyCustomer",
                json!({"data": {"updateMyCustomer": {"id": "cu1", "addresses": [
                    {"id": "a1", "city": "Berlin", "country": "DE"},
                    {"id": "a2", "city": "London", "country": "GB"}
                ]}}}),
            ),
        ]);
        let mutation = CustomerMutation::new(
            session,
            CustomerMutationKind::AddAddress(AddressDraft {
                city: Some("London".into()),
                country: "GB".into(),
                ..AddressDraft::default()
            }),
        );

        let shaped = resolve_whole(&mutation).await.unwrap();
        assert_eq!(shaped["id"], 1);
        assert_eq!(shaped["city"], "London");
    }

    #[test]
    fn test_password_is_not_debug_printed() {
        let kind = CustomerMutationKind::ChangePassword {
            current: "hunter2".into(),
            new: "hunter3".into(),
        };
        assert!(!format!("{kind:?}").contains("hunter"));
    }

    #[tokio::test]
    async fn test_sign_up_validates_email_first() {
        let (session, gateway) = session(vec![]);
        let err = sign_up(
            &session,
            SignUp {
                email: "not-an-email".into(),
                password: Some("secret".into()),
                ..SignUp::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CifError::Validation(_)));
        assert!(gateway.calls.lock().unwrap().is_empty());
    }
}
