use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub type ProductId = String;

/// Catalog item. Owned by the backend and never modified by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub brand: String,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

impl Default for PriceRange {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 1000.0,
        }
    }
}

/// User preferences as stored by the backend.
///
/// The backend accepts an open object, so every known field is optional and
/// unknown keys are carried through untouched. An object with no keys at all
/// means the user has not set anything yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_categories: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_brands: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_range: Option<PriceRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_preferences: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Preferences {
    /// True when at least one field, known or unknown, is present.
    pub fn has_any_field(&self) -> bool {
        self.preferred_categories.is_some()
            || self.preferred_brands.is_some()
            || self.price_range.is_some()
            || self.style_preferences.is_some()
            || !self.extra.is_empty()
    }
}

/// Browsing history as returned by the backend: the clicked ids in click
/// order, plus the products those ids resolve to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HistorySnapshot {
    #[serde(default)]
    pub browsing_history: Vec<ProductId>,
    #[serde(default)]
    pub products: Vec<Product>,
}

impl HistorySnapshot {
    pub fn contains(&self, product_id: &str) -> bool {
        self.browsing_history.iter().any(|id| id == product_id)
    }

    pub fn is_empty(&self) -> bool {
        self.browsing_history.is_empty() && self.products.is_empty()
    }
}

/// Score used when the backend omits the confidence score or sends something
/// that is not a number.
pub const DEFAULT_CONFIDENCE_SCORE: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Recommendation {
    pub product: Product,
    /// Passed through from the recommendation model, which may send a number,
    /// a numeric string or nothing usable.
    #[serde(default = "default_confidence_score", deserialize_with = "lenient_score")]
    #[schemars(with = "f64")]
    pub confidence_score: f64,
    #[serde(default)]
    pub explanation: String,
}

fn default_confidence_score() -> f64 {
    DEFAULT_CONFIDENCE_SCORE
}

fn lenient_score<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    let score = match raw {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(score
        .filter(|s| s.is_finite())
        .unwrap_or(DEFAULT_CONFIDENCE_SCORE))
}

/// Generic `{status, message}` acknowledgement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StatusResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ProductListEnvelope {
    #[serde(default)]
    pub products: Vec<Product>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ProductEnvelope {
    pub product: Product,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CategoriesEnvelope {
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct BrandsEnvelope {
    #[serde(default)]
    pub brands: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct PreferencesEnvelope {
    #[serde(default)]
    pub preferences: Preferences,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct RecommendationsEnvelope {
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Serialize)]
pub(crate) struct HistoryAppendRequest<'a> {
    pub product_id: &'a str,
}
