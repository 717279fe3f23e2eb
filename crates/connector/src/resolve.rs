//! Lazy field resolution.
//!
//! Domain objects implement [`Resolvable`]: a `load` step that fetches the raw
//! backend payload (memoized by the object's loader) and a pure `convert` step
//! that reshapes that payload into the storefront's field names. Nothing is
//! fetched when an object is constructed; the first field read triggers the
//! load and every later field read reuses it.
//!
//! Fields that need more than a projection of the converted payload (extra
//! backend calls, nested domain objects, field arguments) are exposed through
//! [`Resolvable::computed`].

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{Map, Value};

use crate::error::CifError;

/// Field arguments, as JSON.
pub type Args = Map<String, Value>;

/// A lazily loaded storefront object.
pub trait Resolvable: Send + Sync + 'static {
    /// Concrete storefront type name, used for interface and union fields.
    fn typename(&self) -> &'static str;

    /// Fetch the raw backend payload through the object's loader.
    fn load(&self) -> BoxFuture<'_, Result<Value, CifError>>;

    /// Reshape a raw payload into storefront fields.
    ///
    /// Must be pure: the same payload always yields the same shape. Called
    /// once per field access.
    fn convert(&self, raw: &Value) -> Value;

    /// Resolve a field that is not a plain projection of [`Self::convert`].
    ///
    /// Returns `None` for fields read from the converted payload.
    fn computed<'a>(
        &'a self,
        _field: &str,
        _args: &'a Args,
    ) -> Option<BoxFuture<'a, Result<Resolved, CifError>>> {
        None
    }
}

/// A resolved field value.
#[derive(Clone)]
pub enum Resolved {
    /// Absent value.
    Null,
    /// Plain JSON value (scalars, enums, nested plain objects and lists).
    Value(Value),
    /// Nested lazily resolved object.
    Object(Arc<dyn Resolvable>),
    /// List of resolved values.
    List(Vec<Resolved>),
}

impl Resolved {
    /// Wrap a domain object.
    pub fn object(object: impl Resolvable) -> Self {
        Self::Object(Arc::new(object))
    }

    /// Wrap a list of domain objects.
    pub fn objects<R: Resolvable>(objects: impl IntoIterator<Item = R>) -> Self {
        Self::List(objects.into_iter().map(Self::object).collect())
    }
}

impl From<Value> for Resolved {
    fn from(value: Value) -> Self {
        if value.is_null() {
            Self::Null
        } else {
            Self::Value(value)
        }
    }
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Object(object) => f.debug_tuple("Object").field(&object.typename()).finish(),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
        }
    }
}

/// Resolve one field of `object` without arguments.
///
/// # Errors
///
/// Returns the object's load error; the payload is not converted then.
pub async fn resolve_field(object: &dyn Resolvable, field: &str) -> Result<Resolved, CifError> {
    resolve_field_with(object, field, &Args::new()).await
}

/// Resolve one field of `object`.
///
/// Computed fields take precedence. Other fields are projected from the
/// converted payload; a field the payload does not have resolves to
/// [`Resolved::Null`].
///
/// # Errors
///
/// Returns the computed field's error or the object's load error.
pub async fn resolve_field_with(
    object: &dyn Resolvable,
    field: &str,
    args: &Args,
) -> Result<Resolved, CifError> {
    if let Some(computed) = object.computed(field, args) {
        return computed.await;
    }

    let raw = object.load().await?;
    Ok(object
        .convert(&raw)
        .get(field)
        .cloned()
        .map_or(Resolved::Null, Resolved::from))
}

/// Load and convert the whole object.
///
/// # Errors
///
/// Returns the object's load error.
pub async fn resolve_whole(object: &dyn Resolvable) -> Result<Value, CifError> {
    let raw = object.load().await?;
    Ok(object.convert(&raw))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::FutureExt;
    use serde_json::json;

    use super::*;
    use crate::loader::Loader;

    struct Widget {
        id: &'static str,
        loader: Loader<&'static str, Value>,
        conversions: Arc<AtomicUsize>,
    }

    impl Widget {
        fn new(payload: Result<Value, CifError>) -> (Self, Arc<AtomicUsize>) {
            let fetches = Arc::new(AtomicUsize::new(0));
            let counter = Arc::clone(&fetches);
            let loader = Loader::per_key("widgets", move |_id| {
                counter.fetch_add(1, Ordering::SeqCst);
                let payload = payload.clone();
                async move { payload }
            });
            let widget = Self {
                id: "w1",
                loader,
                conversions: Arc::new(AtomicUsize::new(0)),
            };
            (widget, fetches)
        }
    }

    impl Resolvable for Widget {
        fn typename(&self) -> &'static str {
            "Widget"
        }

        fn load(&self) -> BoxFuture<'_, Result<Value, CifError>> {
            self.loader.load(self.id).boxed()
        }

        fn convert(&self, raw: &Value) -> Value {
            self.conversions.fetch_add(1, Ordering::SeqCst);
            json!({
                "uid": raw["id"],
                "label": raw["name"].as_str().map(str::to_uppercase),
            })
        }

        fn computed<'a>(
            &'a self,
            field: &str,
            args: &'a Args,
        ) -> Option<BoxFuture<'a, Result<Resolved, CifError>>> {
            match field {
                "greeting" => Some(
                    async move {
                        let raw = self.load().await?;
                        let name = raw["name"].as_str().unwrap_or_default();
                        let punctuation = args.get("punctuation").and_then(Value::as_str).unwrap_or(".");
                        Ok(Resolved::Value(json!(format!("Hello {name}{punctuation}"))))
                    }
                    .boxed(),
                ),
                _ => None,
            }
        }
    }

    #[tokio::test]
    async fn test_fields_share_one_load() {
        let (widget, fetches) = Widget::new(Ok(json!({"id": "w1", "name": "gear"})));

        let uid = resolve_field(&widget, "uid").await.unwrap();
        let label = resolve_field(&widget, "label").await.unwrap();

        assert!(matches!(uid, Resolved::Value(ref v) if v == "w1"));
        assert!(matches!(label, Resolved::Value(ref v) if v == "GEAR"));
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_conversion_runs_per_access() {
        let (widget, _) = Widget::new(Ok(json!({"id": "w1", "name": "gear"})));

        let first = resolve_whole(&widget).await.unwrap();
        let second = resolve_whole(&widget).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(widget.conversions.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_field_is_null() {
        let (widget, _) = Widget::new(Ok(json!({"id": "w1"})));

        assert!(matches!(resolve_field(&widget, "nope").await.unwrap(), Resolved::Null));
        // `label` converts to JSON null.
        assert!(matches!(resolve_field(&widget, "label").await.unwrap(), Resolved::Null));
    }

    #[tokio::test]
    async fn test_load_error_fails_every_field_without_converting() {
        let (widget, _) = Widget::new(Err(CifError::Transport("backend down".to_string())));

        for field in ["uid", "label", "greeting"] {
            let err = resolve_field(&widget, field).await.unwrap_err();
            assert_eq!(err.to_string(), "Backend request failed: backend down");
        }
        assert_eq!(widget.conversions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_computed_field_receives_arguments() {
        let (widget, _) = Widget::new(Ok(json!({"id": "w1", "name": "gear"})));

        let mut args = Args::new();
        args.insert("punctuation".to_string(), json!("!"));
        let greeting = resolve_field_with(&widget, "greeting", &args).await.unwrap();

        assert!(matches!(greeting, Resolved::Value(ref v) if v == "Hello gear!"));
    }

    #[test]
    fn test_null_value_becomes_null() {
        assert!(matches!(Resolved::from(Value::Null), Resolved::Null));
        assert!(matches!(Resolved::from(json!(0)), Resolved::Value(_)));
    }
}
