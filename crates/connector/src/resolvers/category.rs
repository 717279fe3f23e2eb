//! Catalog resolvers (`/graphql/category`). Read-only: the module has no
//! `Mutation` type.

use std::sync::LazyLock;

use async_graphql::dynamic::Schema;
use cif_core::CategoryId;
use serde::Deserialize;

use super::{EqualFilter, MatchFilter};
use crate::domain::Page;
use crate::domain::category::{CategoryKey, CategorySearch, CategoryTree, ROOT_CATEGORY};
use crate::domain::product::{ProductFilter, Products};
use crate::resolve::Resolved;
use crate::schema::{RootFields, SchemaBuildError, SchemaBuilder};

const QUERIES: &[&str] = &["products", "categoryList", "categories"];

pub(super) static SCHEMA: LazyLock<Result<Schema, SchemaBuildError>> = LazyLock::new(|| {
    SchemaBuilder::new()
        .filter_query_fields(QUERIES.iter().copied())
        .remove_mutation_type()
        .build(roots())
});

fn roots() -> RootFields {
    RootFields::new()
        .query("products", |session, args: ProductsArgs| async move {
            let page = Page::new(args.page_size, args.current_page);
            let filter = args.filter.unwrap_or_default().into_filter(args.search);
            Ok(Resolved::object(Products::new(session, filter, page)))
        })
        .query("categoryList", |session, args: CategoryListArgs| async move {
            let key = args.filters.unwrap_or_default().key();
            let tree = CategoryTree::root(session, key, Page::default());
            if tree.exists().await? {
                Ok(Resolved::List(vec![Resolved::object(tree)]))
            } else {
                Ok(Resolved::List(Vec::new()))
            }
        })
        .query("categories", |session, args: CategoriesArgs| async move {
            let page = Page::new(args.page_size, args.current_page);
            let filters = args.filters.unwrap_or_default();
            if let Some(term) = filters.name.as_ref().and_then(|name| name.term.as_deref()) {
                return Ok(Resolved::object(CategorySearch::new(session, term, page)));
            }
            Ok(Resolved::object(CategoryTree::root(session, filters.key(), page)))
        })
}

// =============================================================================
// Inputs
// =============================================================================

#[derive(Debug, Default, Deserialize)]
struct ProductAttributeFilter {
    category_uid: Option<EqualFilter>,
    category_id: Option<EqualFilter>,
    url_key: Option<EqualFilter>,
    sku: Option<EqualFilter>,
    name: Option<MatchFilter>,
}

impl ProductAttributeFilter {
    /// The first filter that is set wins; `search` is the last resort before
    /// listing everything.
    fn into_filter(self, search: Option<String>) -> ProductFilter {
        let first = |filter: Option<EqualFilter>| filter.and_then(|f| f.values().into_iter().next());

        if let Some(skus) = self.sku.map(|f| f.values()).filter(|skus| !skus.is_empty()) {
            return ProductFilter::Skus(skus);
        }
        if let Some(url_key) = first(self.url_key) {
            return ProductFilter::UrlKey(url_key);
        }
        if let Some(uid) = first(self.category_uid) {
            return ProductFilter::CategoryUid(uid);
        }
        if let Some(id) = first(self.category_id) {
            return ProductFilter::CategoryId(CategoryId::new(id));
        }
        if let Some(name) = self.name.and_then(|f| f.term) {
            return ProductFilter::Name(name);
        }
        match search.filter(|term| !term.is_empty()) {
            Some(term) => ProductFilter::Name(term),
            None => ProductFilter::All,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductsArgs {
    search: Option<String>,
    filter: Option<ProductAttributeFilter>,
    page_size: Option<i64>,
    current_page: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct CategoryFilter {
    category_uid: Option<EqualFilter>,
    parent_category_uid: Option<EqualFilter>,
    ids: Option<EqualFilter>,
    url_key: Option<EqualFilter>,
    name: Option<MatchFilter>,
}

impl CategoryFilter {
    /// Category the tree starts at; the catalog root when nothing is given.
    fn key(&self) -> CategoryKey {
        let first = |filter: &Option<EqualFilter>| {
            filter.as_ref().and_then(|f| f.values().into_iter().next())
        };

        if let Some(id) = first(&self.category_uid)
            .or_else(|| first(&self.ids))
            .or_else(|| first(&self.parent_category_uid))
        {
            return CategoryKey::ExternalId(id);
        }
        if let Some(slug) = first(&self.url_key) {
            return CategoryKey::Slug(slug);
        }
        CategoryKey::ExternalId(ROOT_CATEGORY.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct CategoryListArgs {
    filters: Option<CategoryFilter>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategoriesArgs {
    filters: Option<CategoryFilter>,
    page_size: Option<i64>,
    current_page: Option<i64>,
}
