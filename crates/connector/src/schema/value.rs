//! Bridge between resolved field values and the GraphQL executor.

use std::sync::Arc;

use async_graphql::dynamic::{FieldValue, ResolverContext};
use async_graphql::{Name, Value as GraphqlValue};
use serde_json::{Map, Value};

use crate::error::CifError;
use crate::resolve::{Args, Resolvable, Resolved, resolve_field_with};

/// Parent value handed to the resolvers of an object's fields.
pub(crate) enum Parent {
    /// Domain object resolved field by field.
    Lazy(Arc<dyn Resolvable>),
    /// Already shaped JSON object.
    Plain(Map<String, Value>),
}

impl Parent {
    pub(crate) async fn resolve(&self, field: &str, args: &Args) -> Result<Resolved, CifError> {
        match self {
            Self::Lazy(object) => resolve_field_with(object.as_ref(), field, args).await,
            Self::Plain(map) => Ok(map.get(field).cloned().map_or(Resolved::Null, Resolved::from)),
        }
    }
}

/// How a field's declared type is produced from a [`Resolved`] value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum OutputShape {
    /// Scalar or enum.
    Leaf { is_enum: bool },
    /// Concrete object type.
    Object,
    /// Interface or union; the concrete type must be named at runtime.
    Abstract { possible_types: Vec<String> },
    /// List of the inner shape.
    List(Box<OutputShape>),
}

/// Field arguments as JSON.
pub(crate) fn arguments(ctx: &ResolverContext<'_>) -> async_graphql::Result<Args> {
    ctx.args
        .as_index_map()
        .iter()
        .map(|(name, value)| Ok((name.to_string(), value.clone().into_json()?)))
        .collect()
}

/// Convert a resolved value into the executor's representation.
///
/// Objects become [`Parent`] values so their fields resolve through the same
/// path; abstract types are tagged with the concrete type name taken from the
/// domain object or a `__typename` key.
pub(crate) fn to_field_value<'a>(
    resolved: Resolved,
    shape: &OutputShape,
) -> async_graphql::Result<Option<FieldValue<'a>>> {
    let value = match (resolved, shape) {
        (Resolved::Null, _) => return Ok(None),
        (Resolved::List(items), OutputShape::List(inner)) => list(items, inner)?,
        (Resolved::Value(Value::Array(items)), OutputShape::List(inner)) => {
            list(items.into_iter().map(Resolved::from), inner)?
        }
        (Resolved::Value(value), OutputShape::Leaf { is_enum }) => leaf(value, *is_enum)?,
        (Resolved::Object(object), OutputShape::Object) => FieldValue::owned_any(Parent::Lazy(object)),
        (Resolved::Object(object), OutputShape::Abstract { .. }) => {
            let typename = object.typename();
            FieldValue::owned_any(Parent::Lazy(object)).with_type(typename)
        }
        (Resolved::Value(Value::Object(map)), OutputShape::Object) => {
            FieldValue::owned_any(Parent::Plain(map))
        }
        (Resolved::Value(Value::Object(map)), OutputShape::Abstract { possible_types }) => {
            let typename = map
                .get("__typename")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .or_else(|| possible_types.first().cloned())
                .ok_or_else(|| async_graphql::Error::new("abstract type has no possible types"))?;
            FieldValue::owned_any(Parent::Plain(map)).with_type(typename)
        }
        (resolved, shape) => {
            return Err(async_graphql::Error::new(format!(
                "cannot produce {shape:?} from {resolved:?}"
            )));
        }
    };
    Ok(Some(value))
}

fn list<'a>(
    items: impl IntoIterator<Item = Resolved>,
    inner: &OutputShape,
) -> async_graphql::Result<FieldValue<'a>> {
    let values = items
        .into_iter()
        .map(|item| Ok(to_field_value(item, inner)?.unwrap_or(FieldValue::NULL)))
        .collect::<async_graphql::Result<Vec<_>>>()?;
    Ok(FieldValue::list(values))
}

fn leaf<'a>(value: Value, is_enum: bool) -> async_graphql::Result<FieldValue<'a>> {
    let value = match value {
        Value::String(name) if is_enum => GraphqlValue::Enum(Name::new(name)),
        other => GraphqlValue::from_json(other)?,
    };
    Ok(FieldValue::value(value))
}
