//! Countries, derived from the backend's shipping zones.

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::{Value, json};

use super::elements;
use crate::backend::{Session, operations};
use crate::error::CifError;
use crate::loader::Loader;
use crate::resolve::{Resolvable, resolve_whole};

/// Region entry as stored in a zone location's `state` field.
#[derive(Debug, Deserialize)]
struct Region {
    id: Value,
    code: Option<String>,
    name: Option<String>,
}

/// Every country the backend ships to, optionally narrowed to one.
pub struct Countries {
    id: Option<String>,
    loader: Loader<(), Value>,
}

impl Countries {
    #[must_use]
    pub fn new(session: &Session, id: Option<String>) -> Self {
        let session = session.clone();
        let loader = Loader::per_key("zones", move |(): ()| {
            let session = session.clone();
            async move {
                let data = session.execute(&operations::ZONES, Value::Null).await?;
                Ok(data["zones"]["results"].clone())
            }
        });
        Self { id, loader }
    }

    /// Every country.
    ///
    /// # Errors
    ///
    /// Returns the backend error of the zones query.
    pub async fn all(&self) -> Result<Value, CifError> {
        let mut shaped = resolve_whole(self).await?;
        Ok(shaped["countries"].take())
    }

    /// The requested country, or `null`.
    ///
    /// # Errors
    ///
    /// Returns the backend error of the zones query.
    pub async fn find(&self) -> Result<Value, CifError> {
        let mut shaped = resolve_whole(self).await?;
        Ok(shaped["country"].take())
    }
}

impl Resolvable for Countries {
    fn typename(&self) -> &'static str {
        "Country"
    }

    fn load(&self) -> BoxFuture<'_, Result<Value, CifError>> {
        self.loader.load(()).boxed()
    }

    fn convert(&self, raw: &Value) -> Value {
        let countries: Vec<Value> = elements(raw).filter_map(country).collect();
        let selected = self.id.as_deref().and_then(|id| {
            countries
                .iter()
                .find(|country| country["id"].as_str() == Some(id))
                .cloned()
        });
        json!({
            "countries": countries,
            "country": selected,
        })
    }
}

/// Storefront `Country` from a zone; the zone's first location with a
/// country decides the code.
fn country(zone: &Value) -> Option<Value> {
    let location = elements(&zone["locations"]).find(|location| location["country"].is_string())?;
    Some(json!({
        "id": location["country"],
        "two_letter_abbreviation": location["country"],
        "full_name_english": zone["name"],
        "full_name_locale": zone["name"],
        "available_regions": regions(&location["state"]),
    }))
}

/// Regions encoded as a JSON array in `state`; anything unparsable is none.
fn regions(state: &Value) -> Value {
    let regions: Vec<Region> = state
        .as_str()
        .and_then(|state| serde_json::from_str(state).ok())
        .unwrap_or_default();
    regions
        .into_iter()
        .map(|region| {
            json!({
                "id": region.id,
                "code": region.code,
                "name": region.name,
            })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_country_from_zone() {
        let zone = json!({
            "name": "Germany",
            "locations": [
                {"country": "DE", "state": r#"[{"id": 82, "code": "BER", "name": "Berlin"}]"#}
            ]
        });
        let shaped = country(&zone).unwrap();
        assert_eq!(shaped["id"], "DE");
        assert_eq!(shaped["full_name_english"], "Germany");
        assert_eq!(
            shaped["available_regions"],
            json!([{"id": 82, "code": "BER", "name": "Berlin"}])
        );
    }

    #[test]
    fn test_unparsable_state_has_no_regions() {
        assert_eq!(regions(&json!("not json")), json!([]));
        assert_eq!(regions(&Value::Null), json!([]));
    }

    #[test]
    fn test_zone_without_country_is_skipped() {
        assert!(country(&json!({"name": "Nowhere", "locations": []})).is_none());
    }
}
