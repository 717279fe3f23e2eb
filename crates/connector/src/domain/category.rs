//! Category trees and category search.

use cif_core::CategoryId;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::{Value, json};

use super::product::{ProductFilter, Products};
use super::{Page, elements, quote};
use crate::backend::{Session, operations};
use crate::error::CifError;
use crate::loader::Loader;
use crate::resolve::{Args, Resolvable, Resolved};

/// External id of the category tree root used when no filter is given.
pub const ROOT_CATEGORY: &str = "1";

/// How a single category is looked up.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CategoryKey {
    /// Backend `externalId`, which is the storefront category uid.
    ExternalId(String),
    /// Backend slug in the session locale.
    Slug(String),
}

/// Loader returning one category (with two levels of children) per key.
#[must_use]
pub fn category_loader(session: &Session) -> Loader<CategoryKey, Option<Value>> {
    let session = session.clone();
    Loader::per_key("categories", move |key: CategoryKey| {
        let session = session.clone();
        async move {
            let locale = session.locale();
            let predicate = match &key {
                CategoryKey::ExternalId(id) => format!("externalId={}", quote(id)),
                CategoryKey::Slug(slug) => format!("slug({locale}={})", quote(slug)),
            };
            let data = session
                .execute(
                    &operations::CATEGORIES,
                    json!({"where": predicate, "limit": 1, "locale": locale}),
                )
                .await?;
            Ok(data.pointer("/categories/results/0").cloned())
        }
    })
}

/// Where a node sits in the tree, as seen from its parent.
#[derive(Debug, Clone)]
struct TreePosition {
    url_path: String,
    path: String,
}

/// A category and, lazily, its subtree.
///
/// Every node of one tree shares the same loader; expanding `children`
/// primes it with the child payloads, so a whole tree costs one backend
/// call per level that the backend did not already return inline.
pub struct CategoryTree {
    session: Session,
    key: CategoryKey,
    loader: Loader<CategoryKey, Option<Value>>,
    level: u32,
    position: Option<TreePosition>,
    page: Page,
}

impl CategoryTree {
    /// Root of a new tree with its own loader.
    #[must_use]
    pub fn root(session: Session, key: CategoryKey, page: Page) -> Self {
        Self {
            loader: category_loader(&session),
            session,
            key,
            level: 1,
            position: None,
            page,
        }
    }

    /// Whether the category exists.
    ///
    /// # Errors
    ///
    /// Returns the backend error of the lookup.
    pub async fn exists(&self) -> Result<bool, CifError> {
        Ok(self.loader.load(self.key.clone()).await?.is_some())
    }

    /// `url_path` and `path` of this node; roots derive both from their own data.
    fn paths(&self, raw: &Value) -> (String, String) {
        match &self.position {
            Some(position) => (position.url_path.clone(), position.path.clone()),
            None => (
                raw["slug"].as_str().unwrap_or_default().to_string(),
                raw["externalId"].as_str().unwrap_or_default().to_string(),
            ),
        }
    }

    async fn children(&self) -> Result<Vec<Self>, CifError> {
        let raw = self.load().await?;
        let (url_path, path) = self.paths(&raw);

        let mut children = Vec::new();
        for child in elements(&raw["children"]) {
            let Some(external_id) = child["externalId"].as_str() else {
                continue;
            };
            let key = CategoryKey::ExternalId(external_id.to_string());
            self.loader.prime(key.clone(), Some(child.clone()));

            let slug = child["slug"].as_str().unwrap_or_default();
            children.push(Self {
                session: self.session.clone(),
                key,
                loader: self.loader.clone(),
                level: self.level + 1,
                position: Some(TreePosition {
                    url_path: format!("{url_path}/{slug}"),
                    path: format!("{path}/{external_id}"),
                }),
                page: self.page,
            });
        }
        Ok(children)
    }
}

impl Resolvable for CategoryTree {
    fn typename(&self) -> &'static str {
        "CategoryTree"
    }

    fn load(&self) -> BoxFuture<'_, Result<Value, CifError>> {
        async move { Ok(self.loader.load(self.key.clone()).await?.unwrap_or_default()) }.boxed()
    }

    fn convert(&self, raw: &Value) -> Value {
        let found = !raw.is_null();
        let children = elements(&raw["children"]).count();
        let children_count = raw["childCount"].as_u64().unwrap_or(children as u64);
        let (url_path, path) = self.paths(raw);

        json!({
            "uid": raw["externalId"],
            "id": raw["externalId"],
            "name": raw["name"],
            "description": raw["description"],
            "url_key": raw["slug"],
            "url_path": url_path,
            "path": path,
            "level": self.level,
            "position": 1,
            "include_in_menu": 1,
            "children_count": children_count.to_string(),
            "meta_title": raw["metaTitle"],
            "meta_description": raw["metaDescription"],
            "meta_keywords": raw["metaKeywords"],
            "staged": false,
            "total_count": children,
            "page_info": {
                "current_page": self.page.current,
                "page_size": self.page.size,
                "total_pages": u64::from(found),
            },
        })
    }

    fn computed<'a>(
        &'a self,
        field: &str,
        args: &'a Args,
    ) -> Option<BoxFuture<'a, Result<Resolved, CifError>>> {
        match field {
            "children" | "items" => {
                Some(async move { Ok(Resolved::objects(self.children().await?)) }.boxed())
            }
            "products" => Some(
                async move {
                    let raw = self.load().await?;
                    let Some(id) = raw["id"].as_str() else {
                        return Ok(Resolved::Null);
                    };
                    Ok(Resolved::object(Products::with_categories(
                        self.session.clone(),
                        ProductFilter::CategoryId(CategoryId::new(id)),
                        Page::from_args(args),
                        self.loader.clone(),
                    )))
                }
                .boxed(),
            ),
            _ => None,
        }
    }
}

/// Categories whose name contains a search term, at any of the first three
/// tree levels.
pub struct CategorySearch {
    term: String,
    page: Page,
    loader: Loader<(), Value>,
}

impl CategorySearch {
    #[must_use]
    pub fn new(session: Session, term: &str, page: Page) -> Self {
        let loader = Loader::per_key("category_search", move |(): ()| {
            let session = session.clone();
            async move {
                let data = session
                    .execute(
                        &operations::CATEGORIES,
                        json!({"where": "parent is not defined", "locale": session.locale()}),
                    )
                    .await?;
                Ok(data["categories"].clone())
            }
        });
        Self {
            term: title_case(term),
            page,
            loader,
        }
    }

    fn matches(&self, raw: &Value) -> Vec<Value> {
        let roots: Vec<&Value> = elements(&raw["results"]).collect();
        let children: Vec<&Value> = roots
            .iter()
            .flat_map(|category| elements(&category["children"]))
            .collect();
        let grandchildren: Vec<&Value> = children
            .iter()
            .flat_map(|category| elements(&category["children"]))
            .collect();

        let mut seen = std::collections::HashSet::new();
        roots
            .into_iter()
            .chain(children)
            .chain(grandchildren)
            .filter(|category| {
                category["name"]
                    .as_str()
                    .is_some_and(|name| name.contains(&self.term))
            })
            .filter(|category| seen.insert(category["externalId"].to_string()))
            .cloned()
            .collect()
    }
}

/// Upper-case the first letter of every word.
fn title_case(term: &str) -> String {
    term.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

impl Resolvable for CategorySearch {
    fn typename(&self) -> &'static str {
        "CategoryResult"
    }

    fn load(&self) -> BoxFuture<'_, Result<Value, CifError>> {
        self.loader.load(()).boxed()
    }

    fn convert(&self, raw: &Value) -> Value {
        let matches = self.matches(raw);
        let total = matches.len() as u64;
        let items: Vec<Value> = matches
            .iter()
            .map(|category| {
                json!({
                    "__typename": "CategoryTree",
                    "uid": category["externalId"],
                    "id": category["externalId"],
                    "name": category["name"],
                    "url_key": category["slug"],
                    "url_path": category["slug"],
                    "children_count": total.to_string(),
                    "staged": false,
                })
            })
            .collect();

        json!({
            "items": items,
            "total_count": total,
            "page_info": self.page.info(total),
        })
    }
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
    use crate::resolve::{resolve_field, resolve_whole};

    struct CategoriesGateway {
        response: Value,
        calls: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl Gateway for CategoriesGateway {
        async fn send(
            &self,
            body: QueryBody<Value>,
            _authorization: Option<&SecretString>,
        ) -> Result<Response<Value>, CifError> {
            self.calls.lock().unwrap().push(body.variables.clone());
            Ok(serde_json::from_value(json!({"data": self.response}))?)
        }
    }

    fn category(external_id: &str, name: &str, slug: &str, children: &[Value]) -> Value {
        json!({
            "id": format!("uuid-{external_id}"),
            "externalId": external_id,
            "name": name,
            "slug": slug,
            "children": children,
        })
    }

    fn session(results: Vec<Value>) -> (Session, Arc<CategoriesGateway>) {
        let gateway = Arc::new(CategoriesGateway {
            response: json!({"categories": {"total": results.len(), "results": results}}),
            calls: Mutex::new(Vec::new()),
        });
        let settings = RequestSettings::anonymous("en", "EUR", "DE");
        (Session::new(gateway.clone(), settings), gateway)
    }

    fn trees(resolved: Resolved) -> Vec<Arc<dyn Resolvable>> {
        let Resolved::List(items) = resolved else {
            panic!("expected a list, got {resolved:?}");
        };
        items
            .into_iter()
            .map(|item| match item {
                Resolved::Object(object) => object,
                other => panic!("expected an object, got {other:?}"),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_root_paths_and_level() {
        let (session, gateway) = session(vec![category("1", "New", "new", &[])]);
        let tree = CategoryTree::root(session, CategoryKey::ExternalId("1".into()), Page::default());

        let shaped = resolve_whole(&tree).await.unwrap();
        assert_eq!(shaped["url_path"], "new");
        assert_eq!(shaped["path"], "1");
        assert_eq!(shaped["level"], 1);
        assert_eq!(shaped["children_count"], "0");
        assert_eq!(gateway.calls.lock().unwrap()[0]["where"], r#"externalId="1""#);
    }

    #[tokio::test]
    async fn test_children_are_primed() {
        let women = category("3", "Women", "women", &[category("4", "Tops", "tops", &[])]);
        let (session, gateway) = session(vec![category(
            "1",
            "New",
            "new",
            &[category("2", "Men", "men", &[]), women],
        )]);
        let tree = CategoryTree::root(session, CategoryKey::ExternalId("1".into()), Page::default());

        let children = trees(resolve_field(&tree, "children").await.unwrap());
        assert_eq!(children.len(), 2);

        let women = resolve_whole(children[1].as_ref()).await.unwrap();
        assert_eq!(women["url_path"], "new/women");
        assert_eq!(women["path"], "1/3");
        assert_eq!(women["level"], 2);

        let tops = trees(resolve_field(children[1].as_ref(), "children").await.unwrap());
        let tops = resolve_whole(tops[0].as_ref()).await.unwrap();
        assert_eq!(tops["url_path"], "new/women/tops");
        assert_eq!(tops["level"], 3);

        assert_eq!(gateway.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_category() {
        let (session, _) = session(vec![]);
        let tree = CategoryTree::root(session, CategoryKey::Slug("gone".into()), Page::default());

        assert!(!tree.exists().await.unwrap());
        let shaped = resolve_whole(&tree).await.unwrap();
        assert!(shaped["uid"].is_null());
        assert_eq!(shaped["page_info"]["total_pages"], 0);
        assert!(trees(resolve_field(&tree, "items").await.unwrap()).is_empty());
        assert!(matches!(
            resolve_field(&tree, "products").await.unwrap(),
            Resolved::Null
        ));
    }

    #[tokio::test]
    async fn test_search_matches_every_level_once() {
        let shirts = category("5", "Shirts", "shirts", &[]);
        let (session, _) = session(vec![
            category("1", "Men", "men", &[category("2", "Men Shirts", "men-shirts", &[shirts.clone()])]),
            category("3", "Sale", "sale", &[shirts]),
        ]);
        let search = CategorySearch::new(session, "shirts", Page::default());

        let shaped = resolve_whole(&search).await.unwrap();
        assert_eq!(shaped["total_count"], 2);
        let names: Vec<&str> = shaped["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["Men Shirts", "Shirts"]);
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("summer dresses"), "Summer Dresses");
        assert_eq!(title_case(""), "");
    }
}
