//! Products and product searches.

use cif_core::CategoryId;
use futures::FutureExt;
use futures::future::{BoxFuture, ready};
use serde_json::{Value, json};

use super::category::{CategoryKey, category_loader};
use super::{Page, elements, money, quote, zero};
use crate::backend::{Session, operations};
use crate::error::CifError;
use crate::loader::Loader;
use crate::resolve::{Args, Resolvable, Resolved};

/// A single product, built from an already fetched backend payload.
#[derive(Debug, Clone)]
pub struct Product {
    data: Value,
}

impl Product {
    #[must_use]
    pub const fn new(data: Value) -> Self {
        Self { data }
    }
}

impl Resolvable for Product {
    fn typename(&self) -> &'static str {
        "SimpleProduct"
    }

    fn load(&self) -> BoxFuture<'_, Result<Value, CifError>> {
        ready(Ok(self.data.clone())).boxed()
    }

    fn convert(&self, raw: &Value) -> Value {
        let current = &raw["masterData"]["current"];
        let variant = &current["masterVariant"];
        let image = json!({
            "url": variant["images"][0]["url"].as_str().unwrap_or_default(),
            "label": current["name"],
        });
        let price = Some(money(&variant["price"]["value"]))
            .filter(|price| !price.is_null())
            .unwrap_or_else(|| zero(&Value::Null));

        json!({
            "uid": raw["id"],
            "id": variant["id"],
            "sku": variant["sku"],
            "name": current["name"],
            "url_key": current["slug"],
            "staged": false,
            "thumbnail": image,
            "small_image": image,
            "price_range": price_range(&price),
            "description": {"html": current["description"].as_str().unwrap_or_default()},
            "media_gallery": elements(&variant["images"])
                .enumerate()
                .map(|(position, image)| json!({
                    "__typename": "ProductImage",
                    "url": image["url"],
                    "label": image["label"],
                    "position": position,
                    "disabled": false,
                }))
                .collect::<Vec<_>>(),
        })
    }
}

/// Storefront `PriceRange` with a single, undiscounted price.
pub(crate) fn price_range(price: &Value) -> Value {
    json!({
        "minimum_price": {
            "regular_price": price,
            "final_price": price,
            "discount": {"amount_off": 0, "percent_off": 0},
        }
    })
}

/// How a product list is selected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProductFilter {
    /// Products of the category with this storefront uid (backend external id).
    CategoryUid(String),
    /// Products of the category with this backend id.
    CategoryId(CategoryId),
    /// The product with this url key (backend slug).
    UrlKey(String),
    /// Products with any of these SKUs.
    Skus(Vec<String>),
    /// Products with exactly this name.
    Name(String),
    /// Every product.
    All,
}

/// Key of a backend product query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProductsKey {
    pub predicate: Option<String>,
    pub limit: u64,
    pub offset: u64,
}

/// Loader running the backend products query.
#[must_use]
pub fn products_loader(session: &Session) -> Loader<ProductsKey, Value> {
    let session = session.clone();
    Loader::per_key("products", move |key: ProductsKey| {
        let session = session.clone();
        async move {
            let settings = session.settings();
            let data = session
                .execute(
                    &operations::PRODUCTS,
                    json!({
                        "where": key.predicate,
                        "limit": key.limit,
                        "offset": key.offset,
                        "locale": settings.locale,
                        "currency": settings.currency,
                    }),
                )
                .await?;
            Ok(data["products"].clone())
        }
    })
}

/// A page of products matching a filter.
pub struct Products {
    session: Session,
    filter: ProductFilter,
    page: Page,
    products: Loader<ProductsKey, Value>,
    categories: Loader<CategoryKey, Option<Value>>,
}

impl Products {
    /// Products with their own loaders.
    #[must_use]
    pub fn new(session: Session, filter: ProductFilter, page: Page) -> Self {
        let categories = category_loader(&session);
        Self::with_categories(session, filter, page, categories)
    }

    /// Products resolving category uids through an existing category loader.
    #[must_use]
    pub fn with_categories(
        session: Session,
        filter: ProductFilter,
        page: Page,
        categories: Loader<CategoryKey, Option<Value>>,
    ) -> Self {
        Self {
            products: products_loader(&session),
            session,
            filter,
            page,
            categories,
        }
    }

    /// Backend `where` predicate; `None` inside means the category does not
    /// exist and nothing can match.
    async fn predicate(&self) -> Result<Option<Option<String>>, CifError> {
        let locale = self.session.locale();
        let predicate = match &self.filter {
            ProductFilter::CategoryUid(uid) => {
                let category = self
                    .categories
                    .load(CategoryKey::ExternalId(uid.clone()))
                    .await?;
                let Some(id) = category.as_ref().and_then(|c| c["id"].as_str()) else {
                    return Ok(None);
                };
                Some(in_category(id))
            }
            ProductFilter::CategoryId(id) => Some(in_category(id.as_str())),
            ProductFilter::UrlKey(slug) => {
                Some(format!("masterData(current(slug({locale}={})))", quote(slug)))
            }
            ProductFilter::Skus(skus) => {
                let quoted: Vec<String> = skus.iter().map(|sku| quote(sku)).collect();
                Some(format!(
                    "masterData(current(masterVariant(sku in ({}))))",
                    quoted.join(", ")
                ))
            }
            ProductFilter::Name(name) => {
                Some(format!("masterData(current(name({locale}={})))", quote(name)))
            }
            ProductFilter::All => None,
        };
        Ok(Some(predicate))
    }
}

fn in_category(id: &str) -> String {
    format!("masterData(current(categories(id={})))", quote(id))
}

impl Resolvable for Products {
    fn typename(&self) -> &'static str {
        "Products"
    }

    fn load(&self) -> BoxFuture<'_, Result<Value, CifError>> {
        async move {
            let Some(predicate) = self.predicate().await? else {
                return Ok(Value::Null);
            };
            self.products
                .load(ProductsKey {
                    predicate,
                    limit: self.page.size,
                    offset: self.page.offset(),
                })
                .await
        }
        .boxed()
    }

    fn convert(&self, raw: &Value) -> Value {
        let total = raw["total"].as_u64().unwrap_or_default();
        json!({
            "total_count": total,
            "page_info": self.page.info(total),
        })
    }

    fn computed<'a>(
        &'a self,
        field: &str,
        _args: &'a Args,
    ) -> Option<BoxFuture<'a, Result<Resolved, CifError>>> {
        match field {
            "items" => Some(
                async move {
                    let raw = self.load().await?;
                    Ok(Resolved::objects(
                        elements(&raw["results"]).cloned().map(Product::new),
                    ))
                }
                .boxed(),
            ),
            _ => None,
        }
    }
}
