//! Storefront resolver modules.
//!
//! Each module serves one slice of the storefront schema: its allow-listed
//! root fields, bound to resolver functions that build domain objects. The
//! executable schema of a module is built once per process, on first use or
//! at [`warm_up`].

pub mod cart;
pub mod category;
pub mod customer;

use std::fmt;
use std::str::FromStr;

use async_graphql::dynamic::Schema;
use serde::Deserialize;
use tracing::{info, instrument};

use crate::backend::Session;
use crate::schema::SchemaBuildError;

/// A storefront resolver module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolverModule {
    Cart,
    Category,
    Customer,
}

impl ResolverModule {
    /// Every module.
    pub const ALL: [Self; 3] = [Self::Cart, Self::Category, Self::Customer];

    /// Module name, as used in routes and on the command line.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Cart => "cart",
            Self::Category => "category",
            Self::Customer => "customer",
        }
    }

    /// The module's executable schema.
    ///
    /// # Errors
    ///
    /// Returns the error the schema build failed with; the build is not
    /// retried.
    pub fn schema(self) -> Result<&'static Schema, SchemaBuildError> {
        let schema = match self {
            Self::Cart => &*cart::SCHEMA,
            Self::Category => &*category::SCHEMA,
            Self::Customer => &*customer::SCHEMA,
        };
        schema.as_ref().map_err(Clone::clone)
    }

    /// The module's schema as SDL.
    ///
    /// # Errors
    ///
    /// Returns the schema build error.
    pub fn sdl(self) -> Result<String, SchemaBuildError> {
        Ok(self.schema()?.sdl())
    }
}

impl fmt::Display for ResolverModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for an unknown resolver module name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown resolver module: {0}")]
pub struct UnknownModule(String);

impl FromStr for ResolverModule {
    type Err = UnknownModule;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|module| module.name() == s)
            .ok_or_else(|| UnknownModule(s.to_string()))
    }
}

/// Build every module's schema.
///
/// Called once at startup so a typo in an allow-list stops the process
/// instead of failing the first request.
///
/// # Errors
///
/// Returns the first schema build error; the failing module is logged.
pub fn warm_up() -> Result<(), SchemaBuildError> {
    for module in ResolverModule::ALL {
        let schema = module.schema().inspect_err(|error| {
            tracing::error!(module = module.name(), error = %error, "Schema build failed");
        })?;
        info!(
            module = module.name(),
            types = schema.sdl().matches("\ntype ").count(),
            "Schema ready"
        );
    }
    Ok(())
}

/// Execute a storefront request against a module's schema.
///
/// # Errors
///
/// Returns the schema build error; GraphQL errors are part of the response.
#[instrument(skip(request, session), fields(module = module.name()))]
pub async fn execute(
    module: ResolverModule,
    request: async_graphql::Request,
    session: Session,
) -> Result<async_graphql::Response, SchemaBuildError> {
    let schema = module.schema()?;
    Ok(schema.execute(request.data(session)).await)
}

// =============================================================================
// Shared inputs
// =============================================================================

/// Wrapper for root fields taking a single `input` argument.
#[derive(Debug, Deserialize)]
pub(crate) struct Input<T> {
    pub input: T,
}

/// Storefront `FilterEqualTypeInput`.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct EqualFilter {
    pub eq: Option<String>,
    #[serde(rename = "in")]
    pub any: Option<Vec<Option<String>>>,
}

impl EqualFilter {
    /// Every value the filter accepts.
    pub(crate) fn values(&self) -> Vec<String> {
        self.eq
            .iter()
            .cloned()
            .chain(self.any.iter().flatten().flatten().cloned())
            .collect()
    }
}

/// Storefront `FilterMatchTypeInput`.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct MatchFilter {
    #[serde(rename = "match")]
    pub term: Option<String>,
}
