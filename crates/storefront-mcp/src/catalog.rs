use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use storefront_common::model::{HistorySnapshot, Product, ProductId};

/// Sentinel category that disables category filtering.
pub const ALL_CATEGORIES: &str = "All";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, JsonSchema)]
pub struct CatalogFilter {
    /// Category to show, or "All" (default).
    #[serde(default = "all_categories")]
    pub category: String,
    /// Case-insensitive substring matched against name or description.
    #[serde(default)]
    pub search: String,
}

fn all_categories() -> String {
    ALL_CATEGORIES.to_string()
}

impl Default for CatalogFilter {
    fn default() -> Self {
        Self {
            category: all_categories(),
            search: String::new(),
        }
    }
}

impl CatalogFilter {
    pub fn matches(&self, product: &Product) -> bool {
        let category_ok = self.category == ALL_CATEGORIES || product.category == self.category;
        if !category_ok {
            return false;
        }
        let term = self.search.to_lowercase();
        product.name.to_lowercase().contains(&term)
            || product.description.to_lowercase().contains(&term)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct CatalogCard {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    pub brand: String,
    /// Price with two decimals, e.g. "19.90".
    pub price: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
    pub description: String,
    pub in_history: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct CatalogView {
    pub categories: Vec<String>,
    pub selected_category: String,
    pub search: String,
    pub products: Vec<CatalogCard>,
}

/// "All" followed by each distinct category in first-seen order.
pub fn category_options(products: &[Product]) -> Vec<String> {
    let mut out = vec![ALL_CATEGORIES.to_string()];
    out.extend(distinct(products.iter().map(|p| p.category.as_str())));
    out
}

pub fn filter_products<'a>(products: &'a [Product], filter: &CatalogFilter) -> Vec<&'a Product> {
    products.iter().filter(|p| filter.matches(p)).collect()
}

pub fn build_view(
    products: &[Product],
    filter: &CatalogFilter,
    history: &HistorySnapshot,
) -> CatalogView {
    let cards = filter_products(products, filter)
        .into_iter()
        .map(|p| CatalogCard {
            id: p.id.clone(),
            name: p.name.clone(),
            category: p.category.clone(),
            brand: p.brand.clone(),
            price: format!("{:.2}", p.price),
            rating: p.rating.map(|r| format!("{r}/5")),
            description: p.description.clone(),
            in_history: history.contains(&p.id),
        })
        .collect();

    CatalogView {
        categories: category_options(products),
        selected_category: filter.category.clone(),
        search: filter.search.clone(),
        products: cards,
    }
}

/// Distinct values in first-seen order.
pub(crate) fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for v in values {
        if !out.iter().any(|seen| seen == v) {
            out.push(v.to_string());
        }
    }
    out
}

#[cfg(test)]
pub(crate) fn product(id: &str, name: &str, category: &str, price: f64) -> Product {
    Product {
        id: id.to_string(),
        name: name.to_string(),
        description: format!("{name} description"),
        category: category.to_string(),
        brand: "Acme".to_string(),
        price,
        rating: None,
        tags: None,
        features: None,
    }
}
