//! Executable schemas built from the storefront SDL.
//!
//! The storefront document is parsed once per process. Each resolver module
//! narrows it to the root fields it serves with [`SchemaBuilder`] and binds
//! those fields to resolver functions with [`RootFields`]. Only the types
//! reachable from the kept root fields are registered, so the printed SDL of
//! a module contains exactly what it serves.
//!
//! Non-root fields need no registration: they resolve from their parent
//! value, either a lazily loaded domain object or a plain JSON object.
//!
//! Build problems (an allow-listed field the document does not define, a
//! kept root field without a resolver) surface as [`SchemaBuildError`] when
//! the schema is built, which happens at process warm-up.

mod value;

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, LazyLock};

use async_graphql::dynamic::{
    Enum, Field, FieldFuture, InputObject, InputValue, Interface, InterfaceField, Object, Scalar,
    Schema, TypeRef, Union,
};
use async_graphql::parser::parse_schema;
use async_graphql::parser::types::{
    BaseType, FieldDefinition, InputValueDefinition, ServiceDocument, Type, TypeDefinition,
    TypeKind, TypeSystemDefinition,
};
use futures::future::{BoxFuture, FutureExt, ready};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::backend::Session;
use crate::error::CifError;
use crate::resolve::Resolved;

pub(crate) use value::{OutputShape, Parent};
use value::{arguments, to_field_value};

/// The storefront schema document.
pub const STOREFRONT_SDL: &str = include_str!("../../graphql/storefront.graphql");

static STOREFRONT: LazyLock<Result<ServiceDocument, SchemaBuildError>> =
    LazyLock::new(|| parse_schema(STOREFRONT_SDL).map_err(|e| SchemaBuildError::Parse(e.to_string())));

const BUILTIN_SCALARS: &[&str] = &["Int", "Float", "String", "Boolean", "ID"];

/// Errors raised while building an executable schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaBuildError {
    #[error("Invalid schema document: {0}")]
    Parse(String),

    #[error("Type {0} is not defined")]
    UnknownType(String),

    #[error("{type_name} has no field {field}")]
    UnknownField { type_name: String, field: String },

    #[error("No resolver registered for {type_name}.{field}")]
    MissingResolver { type_name: String, field: String },

    #[error("Schema rejected: {0}")]
    Invalid(String),
}

// =============================================================================
// Root resolvers
// =============================================================================

/// Resolver for a root field, taking the session and the field arguments.
pub type RootResolver =
    Arc<dyn Fn(Session, Value) -> BoxFuture<'static, Result<Resolved, CifError>> + Send + Sync>;

/// Arguments of a root field that takes none.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct NoArgs {}

/// Resolvers for the root fields of one resolver module.
#[derive(Clone, Default)]
pub struct RootFields {
    query: HashMap<String, RootResolver>,
    mutation: HashMap<String, RootResolver>,
}

impl RootFields {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a `Query` field.
    ///
    /// The field arguments are deserialized into `A`; arguments that do not
    /// fit fail the field with [`CifError::Validation`].
    #[must_use]
    pub fn query<A, F, Fut>(mut self, name: &str, resolver: F) -> Self
    where
        A: DeserializeOwned + Send + 'static,
        F: Fn(Session, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resolved, CifError>> + Send + 'static,
    {
        self.query.insert(name.to_string(), typed(resolver));
        self
    }

    /// Register a `Mutation` field.
    #[must_use]
    pub fn mutation<A, F, Fut>(mut self, name: &str, resolver: F) -> Self
    where
        A: DeserializeOwned + Send + 'static,
        F: Fn(Session, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resolved, CifError>> + Send + 'static,
    {
        self.mutation.insert(name.to_string(), typed(resolver));
        self
    }
}

fn typed<A, F, Fut>(resolver: F) -> RootResolver
where
    A: DeserializeOwned + Send + 'static,
    F: Fn(Session, A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Resolved, CifError>> + Send + 'static,
{
    Arc::new(
        move |session: Session, args: Value| -> BoxFuture<'static, Result<Resolved, CifError>> {
            match serde_json::from_value::<A>(args) {
                Ok(args) => resolver(session, args).boxed(),
                Err(e) => ready(Err(CifError::Validation(e.to_string()))).boxed(),
            }
        },
    )
}

// =============================================================================
// Builder
// =============================================================================

/// Narrows the storefront document to an executable schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    document: Option<ServiceDocument>,
    query_fields: Option<HashSet<String>>,
    mutation_fields: Option<HashSet<String>>,
    remove_mutation: bool,
}

impl SchemaBuilder {
    /// Start from the storefront document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from another schema document.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaBuildError::Parse`] if `sdl` is not a valid document.
    pub fn from_sdl(sdl: &str) -> Result<Self, SchemaBuildError> {
        let document = parse_schema(sdl).map_err(|e| SchemaBuildError::Parse(e.to_string()))?;
        Ok(Self {
            document: Some(document),
            ..Self::default()
        })
    }

    /// Keep only these `Query` fields.
    #[must_use]
    pub fn filter_query_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Keep only these `Mutation` fields.
    #[must_use]
    pub fn filter_mutation_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mutation_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Drop the `Mutation` type entirely.
    #[must_use]
    pub fn remove_mutation_type(mut self) -> Self {
        self.remove_mutation = true;
        self
    }

    /// Build the executable schema.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaBuildError`] if an allow-listed field does not exist,
    /// a kept root field has no resolver, a referenced type is undefined, or
    /// the resulting schema is invalid.
    pub fn build(self, roots: RootFields) -> Result<Schema, SchemaBuildError> {
        let document = match &self.document {
            Some(document) => document,
            None => STOREFRONT.as_ref().map_err(Clone::clone)?,
        };
        let catalog = Catalog::new(document)?;

        let query = RootType::select(&catalog, catalog.query, self.query_fields.as_ref())?;
        let mutation = match catalog.mutation {
            Some(name) if !self.remove_mutation => {
                Some(RootType::select(&catalog, name, self.mutation_fields.as_ref())?)
                    .filter(|root| !root.fields.is_empty())
            }
            _ => None,
        };

        query.check_resolvers(&roots.query)?;
        if let Some(mutation) = &mutation {
            mutation.check_resolvers(&roots.mutation)?;
        }

        let reachable = catalog.reachable(
            query
                .fields
                .iter()
                .chain(mutation.iter().flat_map(|root| root.fields.iter()))
                .copied(),
        )?;

        let mut builder = Schema::build(query.name, mutation.as_ref().map(|root| root.name), None);
        builder = builder.register(query.object(&catalog, &reachable, &roots.query)?);
        if let Some(mutation) = &mutation {
            builder = builder.register(mutation.object(&catalog, &reachable, &roots.mutation)?);
        }
        for name in &reachable {
            if *name == query.name || mutation.as_ref().is_some_and(|root| root.name == *name) {
                continue;
            }
            if let Some(definition) = catalog.types.get(name) {
                builder = catalog.register(builder, definition, &reachable)?;
            }
        }

        builder
            .finish()
            .map_err(|e| SchemaBuildError::Invalid(e.to_string()))
    }
}

// =============================================================================
// Document catalog
// =============================================================================

/// Type definitions of a document, by name.
struct Catalog<'d> {
    types: HashMap<&'d str, &'d TypeDefinition>,
    query: &'d str,
    mutation: Option<&'d str>,
}

impl<'d> Catalog<'d> {
    fn new(document: &'d ServiceDocument) -> Result<Self, SchemaBuildError> {
        let mut types = HashMap::new();
        let mut query = "Query";
        let mut mutation = None;

        for definition in &document.definitions {
            match definition {
                TypeSystemDefinition::Type(ty) => {
                    types.insert(ty.node.name.node.as_str(), &ty.node);
                }
                TypeSystemDefinition::Schema(schema) => {
                    if let Some(name) = &schema.node.query {
                        query = name.node.as_str();
                    }
                    mutation = schema.node.mutation.as_ref().map(|name| name.node.as_str());
                }
                TypeSystemDefinition::Directive(_) => {}
            }
        }

        if mutation.is_none() && types.contains_key("Mutation") {
            mutation = Some("Mutation");
        }
        if !types.contains_key(query) {
            return Err(SchemaBuildError::UnknownType(query.to_string()));
        }

        Ok(Self {
            types,
            query,
            mutation,
        })
    }

    fn get(&self, name: &str) -> Result<&'d TypeDefinition, SchemaBuildError> {
        self.types
            .get(name)
            .copied()
            .ok_or_else(|| SchemaBuildError::UnknownType(name.to_string()))
    }

    /// Object types implementing `interface`, in no particular order.
    fn implementors(&self, interface: &str) -> Vec<&'d str> {
        self.types
            .values()
            .filter_map(|definition| match &definition.kind {
                TypeKind::Object(object)
                    if object
                        .implements
                        .iter()
                        .any(|name| name.node.as_str() == interface) =>
                {
                    Some(definition.name.node.as_str())
                }
                _ => None,
            })
            .collect()
    }

    /// Names of every type reachable from `fields`, including the roots'
    /// argument types and the implementors of reachable interfaces.
    fn reachable(
        &self,
        fields: impl Iterator<Item = &'d FieldDefinition>,
    ) -> Result<HashSet<&'d str>, SchemaBuildError> {
        let mut pending: Vec<&'d str> = Vec::new();
        for field in fields {
            push_field_types(&mut pending, field);
        }

        let mut seen = HashSet::new();
        while let Some(name) = pending.pop() {
            if BUILTIN_SCALARS.contains(&name) || !seen.insert(name) {
                continue;
            }
            let definition = self.get(name)?;
            match &definition.kind {
                TypeKind::Object(object) => {
                    pending.extend(object.implements.iter().map(|i| i.node.as_str()));
                    for field in &object.fields {
                        push_field_types(&mut pending, &field.node);
                    }
                }
                TypeKind::Interface(interface) => {
                    pending.extend(interface.implements.iter().map(|i| i.node.as_str()));
                    pending.extend(self.implementors(name));
                    for field in &interface.fields {
                        push_field_types(&mut pending, &field.node);
                    }
                }
                TypeKind::Union(union) => {
                    pending.extend(union.members.iter().map(|m| m.node.as_str()));
                }
                TypeKind::InputObject(input) => {
                    pending.extend(input.fields.iter().map(|f| base_name(&f.node.ty.node)));
                }
                TypeKind::Enum(_) | TypeKind::Scalar => {}
            }
        }
        Ok(seen)
    }

    fn shape(&self, ty: &Type) -> Result<OutputShape, SchemaBuildError> {
        match &ty.base {
            BaseType::List(inner) => Ok(OutputShape::List(Box::new(self.shape(inner)?))),
            BaseType::Named(name) => {
                if BUILTIN_SCALARS.contains(&name.as_str()) {
                    return Ok(OutputShape::Leaf { is_enum: false });
                }
                Ok(match &self.get(name)?.kind {
                    TypeKind::Scalar => OutputShape::Leaf { is_enum: false },
                    TypeKind::Enum(_) => OutputShape::Leaf { is_enum: true },
                    TypeKind::Object(_) => OutputShape::Object,
                    TypeKind::Interface(_) => {
                        let mut possible_types: Vec<String> =
                            self.implementors(name).into_iter().map(str::to_owned).collect();
                        possible_types.sort();
                        OutputShape::Abstract { possible_types }
                    }
                    TypeKind::Union(union) => OutputShape::Abstract {
                        possible_types: union.members.iter().map(|m| m.node.to_string()).collect(),
                    },
                    TypeKind::InputObject(_) => {
                        return Err(SchemaBuildError::Invalid(format!(
                            "input type {name} used as an output"
                        )));
                    }
                })
            }
        }
    }

    fn register(
        &self,
        builder: async_graphql::dynamic::SchemaBuilder,
        definition: &'d TypeDefinition,
        reachable: &HashSet<&'d str>,
    ) -> Result<async_graphql::dynamic::SchemaBuilder, SchemaBuildError> {
        let name = definition.name.node.as_str();
        Ok(match &definition.kind {
            TypeKind::Scalar => builder.register(Scalar::new(name)),
            TypeKind::Enum(enumeration) => builder.register(
                Enum::new(name).items(enumeration.values.iter().map(|v| v.node.value.node.as_str())),
            ),
            TypeKind::InputObject(input) => builder.register(
                input
                    .fields
                    .iter()
                    .fold(InputObject::new(name), |object, field| {
                        object.field(input_value(&field.node))
                    }),
            ),
            TypeKind::Union(union) => builder.register(
                union
                    .members
                    .iter()
                    .fold(Union::new(name), |union, member| union.possible_type(member.node.as_str())),
            ),
            TypeKind::Interface(interface) => {
                let mut dynamic = Interface::new(name);
                for implemented in &interface.implements {
                    if reachable.contains(implemented.node.as_str()) {
                        dynamic = dynamic.implement(implemented.node.as_str());
                    }
                }
                for field in &interface.fields {
                    let field = &field.node;
                    dynamic = dynamic.field(field.arguments.iter().fold(
                        InterfaceField::new(field.name.node.as_str(), type_ref(&field.ty.node)),
                        |dynamic, argument| dynamic.argument(input_value(&argument.node)),
                    ));
                }
                builder.register(dynamic)
            }
            TypeKind::Object(object) => {
                let mut dynamic = Object::new(name);
                for implemented in &object.implements {
                    dynamic = dynamic.implement(implemented.node.as_str());
                }
                for field in &object.fields {
                    dynamic = dynamic.field(self.object_field(&field.node)?);
                }
                builder.register(dynamic)
            }
        })
    }

    /// A non-root field, resolved from its parent value.
    fn object_field(&self, definition: &FieldDefinition) -> Result<Field, SchemaBuildError> {
        let shape = Arc::new(self.shape(&definition.ty.node)?);
        let name = definition.name.node.to_string();
        let field_name = name.clone();

        let field = Field::new(name, type_ref(&definition.ty.node), move |ctx| {
            let name = field_name.clone();
            let shape = Arc::clone(&shape);
            FieldFuture::new(async move {
                let args = arguments(&ctx)?;
                let parent = ctx.parent_value.try_downcast_ref::<Parent>()?;
                let resolved = parent
                    .resolve(&name, &args)
                    .await
                    .map_err(CifError::into_graphql)?;
                to_field_value(resolved, &shape)
            })
        });
        Ok(with_arguments(field, &definition.arguments))
    }

    /// A root field, resolved by its registered resolver.
    fn root_field(
        &self,
        definition: &FieldDefinition,
        resolver: RootResolver,
    ) -> Result<Field, SchemaBuildError> {
        let shape = Arc::new(self.shape(&definition.ty.node)?);
        let name = definition.name.node.to_string();
        let nullable = definition.ty.node.nullable;

        let field = Field::new(name, type_ref(&definition.ty.node), move |ctx| {
            let resolver = Arc::clone(&resolver);
            let shape = Arc::clone(&shape);
            FieldFuture::new(async move {
                let session = ctx.data::<Session>()?.clone();
                let args = arguments(&ctx)?;
                match resolver(session, Value::Object(args)).await {
                    Ok(resolved) => to_field_value(resolved, &shape),
                    // Serial mutation execution drops all data on a root
                    // error, so nullable roots report theirs and yield null.
                    Err(err) if nullable => {
                        let error = err.into_graphql().into_server_error(ctx.item.pos);
                        ctx.add_error(ctx.set_error_path(error));
                        Ok(None)
                    }
                    Err(err) => Err(err.into_graphql()),
                }
            })
        });
        Ok(with_arguments(field, &definition.arguments))
    }
}

/// A root type narrowed to its kept fields.
struct RootType<'d> {
    name: &'d str,
    fields: Vec<&'d FieldDefinition>,
}

impl<'d> RootType<'d> {
    fn select(
        catalog: &Catalog<'d>,
        name: &'d str,
        allowed: Option<&HashSet<String>>,
    ) -> Result<Self, SchemaBuildError> {
        let TypeKind::Object(object) = &catalog.get(name)?.kind else {
            return Err(SchemaBuildError::Invalid(format!("root type {name} is not an object")));
        };
        let all: Vec<&'d FieldDefinition> = object.fields.iter().map(|f| &f.node).collect();

        let Some(allowed) = allowed else {
            return Ok(Self { name, fields: all });
        };

        let mut unknown: Vec<&String> = allowed
            .iter()
            .filter(|field| !all.iter().any(|f| f.name.node.as_str() == field.as_str()))
            .collect();
        unknown.sort();
        if let Some(field) = unknown.first() {
            return Err(SchemaBuildError::UnknownField {
                type_name: name.to_string(),
                field: (*field).clone(),
            });
        }

        Ok(Self {
            name,
            fields: all
                .into_iter()
                .filter(|f| allowed.contains(f.name.node.as_str()))
                .collect(),
        })
    }

    fn check_resolvers(&self, resolvers: &HashMap<String, RootResolver>) -> Result<(), SchemaBuildError> {
        match self
            .fields
            .iter()
            .find(|field| !resolvers.contains_key(field.name.node.as_str()))
        {
            Some(field) => Err(SchemaBuildError::MissingResolver {
                type_name: self.name.to_string(),
                field: field.name.node.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn object(
        &self,
        catalog: &Catalog<'d>,
        reachable: &HashSet<&'d str>,
        resolvers: &HashMap<String, RootResolver>,
    ) -> Result<Object, SchemaBuildError> {
        let mut object = Object::new(self.name);
        for field in &self.fields {
            let resolver = resolvers.get(field.name.node.as_str()).cloned().ok_or_else(|| {
                SchemaBuildError::MissingResolver {
                    type_name: self.name.to_string(),
                    field: field.name.node.to_string(),
                }
            })?;
            object = object.field(catalog.root_field(field, resolver)?);
        }
        if let TypeKind::Object(definition) = &catalog.get(self.name)?.kind {
            for implemented in &definition.implements {
                if reachable.contains(implemented.node.as_str()) {
                    object = object.implement(implemented.node.as_str());
                }
            }
        }
        Ok(object)
    }
}

fn push_field_types<'d>(pending: &mut Vec<&'d str>, field: &'d FieldDefinition) {
    pending.push(base_name(&field.ty.node));
    pending.extend(field.arguments.iter().map(|a| base_name(&a.node.ty.node)));
}

fn base_name(ty: &Type) -> &str {
    match &ty.base {
        BaseType::Named(name) => name.as_str(),
        BaseType::List(inner) => base_name(inner),
    }
}

fn type_ref(ty: &Type) -> TypeRef {
    let base = match &ty.base {
        BaseType::Named(name) => TypeRef::Named(name.to_string().into()),
        BaseType::List(inner) => TypeRef::List(Box::new(type_ref(inner))),
    };
    if ty.nullable {
        base
    } else {
        TypeRef::NonNull(Box::new(base))
    }
}

fn input_value(definition: &InputValueDefinition) -> InputValue {
    let value = InputValue::new(definition.name.node.as_str(), type_ref(&definition.ty.node));
    match &definition.default_value {
        Some(default) => value.default_value(default.node.clone()),
        None => value,
    }
}

fn with_arguments(field: Field, arguments: &[async_graphql::Positioned<InputValueDefinition>]) -> Field {
    arguments
        .iter()
        .fold(field, |field, argument| field.argument(input_value(&argument.node)))
}
