//! Customer resolvers (`/graphql/customer`).

use std::sync::LazyLock;

use async_graphql::dynamic::Schema;
use cif_core::Email;
use serde::Deserialize;
use serde_json::json;

use super::Input;
use crate::domain::address::CustomerAddressInput;
use crate::domain::country::Countries;
use crate::domain::customer::{
    Customer, CustomerAction, CustomerMutation, CustomerMutationKind, SignUp, customer_fields,
    sign_up,
};
use crate::error::CifError;
use crate::resolve::Resolved;
use crate::schema::{NoArgs, RootFields, SchemaBuildError, SchemaBuilder};

const QUERIES: &[&str] = &["customer", "countries", "country"];

const MUTATIONS: &[&str] = &[
    "createCustomer",
    "createCustomerV2",
    "updateCustomer",
    "changeCustomerPassword",
    "createCustomerAddress",
    "revokeCustomerToken",
];

pub(super) static SCHEMA: LazyLock<Result<Schema, SchemaBuildError>> = LazyLock::new(|| {
    SchemaBuilder::new()
        .filter_query_fields(QUERIES.iter().copied())
        .filter_mutation_fields(MUTATIONS.iter().copied())
        .build(roots())
});

fn roots() -> RootFields {
    RootFields::new()
        .query("customer", |session, _: NoArgs| async move {
            Ok(Resolved::object(Customer::me(&session)))
        })
        .query("countries", |session, _: NoArgs| async move {
            Ok(Countries::new(&session, None).all().await?.into())
        })
        .query("country", |session, args: CountryArgs| async move {
            Ok(Countries::new(&session, args.id).find().await?.into())
        })
        .mutation("createCustomer", |session, args: Input<CustomerInput>| async move {
            let raw = sign_up(&session, args.input.into_sign_up()?).await?;
            Ok(Resolved::Value(json!({"customer": customer_fields(&raw)})))
        })
        .mutation("createCustomerV2", |session, args: Input<CustomerCreateInput>| async move {
            let raw = sign_up(&session, args.input.into()).await?;
            Ok(Resolved::Value(json!({"customer": customer_fields(&raw)})))
        })
        .mutation("updateCustomer", |session, args: Input<CustomerInput>| async move {
            let actions = args.input.into_actions()?;
            Ok(Resolved::object(CustomerMutation::new(
                session,
                CustomerMutationKind::Update(actions),
            )))
        })
        .mutation("changeCustomerPassword", |session, args: ChangePasswordArgs| async move {
            Ok(Resolved::object(CustomerMutation::new(
                session,
                CustomerMutationKind::ChangePassword {
                    current: args.current_password,
                    new: args.new_password,
                },
            )))
        })
        .mutation(
            "createCustomerAddress",
            |session, args: Input<CustomerAddressInput>| async move {
                let draft = args.input.into_draft(&session.settings().country);
                Ok(Resolved::object(CustomerMutation::new(
                    session,
                    CustomerMutationKind::AddAddress(draft),
                )))
            },
        )
        // Tokens live in the storefront's cookie; there is nothing to revoke
        // on the backend.
        .mutation("revokeCustomerToken", |_, _: NoArgs| async move {
            Ok(Resolved::Value(json!({"result": true})))
        })
}

// =============================================================================
// Inputs
// =============================================================================

#[derive(Debug, Deserialize)]
struct CountryArgs {
    id: Option<String>,
}

/// Storefront `CustomerInput`. No `Debug`: it carries a password.
#[derive(Default, Deserialize)]
struct CustomerInput {
    firstname: Option<String>,
    lastname: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

impl CustomerInput {
    fn into_sign_up(self) -> Result<SignUp, CifError> {
        let email = self
            .email
            .ok_or_else(|| CifError::Validation("Required parameter \"email\" is missing.".to_string()))?;
        Ok(SignUp {
            email,
            password: self.password,
            first_name: self.firstname,
            last_name: self.lastname,
        })
    }

    /// Profile update actions; the email is validated before anything is sent.
    fn into_actions(self) -> Result<Vec<CustomerAction>, CifError> {
        let mut actions = Vec::new();
        if let Some(first_name) = self.firstname {
            actions.push(CustomerAction::SetFirstName { first_name });
        }
        if let Some(last_name) = self.lastname {
            actions.push(CustomerAction::SetLastName { last_name });
        }
        if let Some(email) = self.email {
            let email = Email::parse(&email)?;
            actions.push(CustomerAction::ChangeEmail {
                email: email.into_inner(),
            });
        }
        if actions.is_empty() {
            return Err(CifError::Validation("Nothing to update.".to_string()));
        }
        Ok(actions)
    }
}

/// Storefront `CustomerCreateInput`.
#[derive(Deserialize)]
struct CustomerCreateInput {
    firstname: String,
    lastname: String,
    email: String,
    password: Option<String>,
}

impl From<CustomerCreateInput> for SignUp {
    fn from(input: CustomerCreateInput) -> Self {
        Self {
            email: input.email,
            password: input.password,
            first_name: Some(input.firstname),
            last_name: Some(input.lastname),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordArgs {
    current_password: String,
    new_password: String,
}
