use schemars::JsonSchema;
use serde::Serialize;

use storefront_common::model::{HistorySnapshot, ProductId, Recommendation};

pub const CONFIDENCE_SEGMENTS: usize = 10;
const MAX_FEATURES_SHOWN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    Empty,
    Low,
    Medium,
    High,
}

impl Segment {
    fn glyph(self) -> char {
        match self {
            Segment::Empty => '.',
            Segment::Low => '-',
            Segment::Medium => '=',
            Segment::High => '#',
        }
    }
}

/// Ten segments; segment `i` is filled when `i < floor(score)`.
pub fn confidence_bar(score: f64) -> [Segment; CONFIDENCE_SEGMENTS] {
    let filled = if score.is_finite() {
        score.clamp(0.0, CONFIDENCE_SEGMENTS as f64).floor() as usize
    } else {
        0
    };
    std::array::from_fn(|i| match i {
        i if i >= filled => Segment::Empty,
        0..=2 => Segment::Low,
        3..=6 => Segment::Medium,
        _ => Segment::High,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct RecommendationCard {
    pub product_id: ProductId,
    pub name: String,
    pub category: String,
    pub brand: String,
    pub price: String,
    pub features: Vec<String>,
    pub explanation: String,
    pub confidence_score: f64,
    pub confidence_bar: String,
    pub segments: Vec<Segment>,
}

impl From<&Recommendation> for RecommendationCard {
    fn from(rec: &Recommendation) -> Self {
        let segments = confidence_bar(rec.confidence_score);
        Self {
            product_id: rec.product.id.clone(),
            name: rec.product.name.clone(),
            category: rec.product.category.clone(),
            brand: rec.product.brand.clone(),
            price: format!("{:.2}", rec.product.price),
            features: rec
                .product
                .features
                .iter()
                .flatten()
                .take(MAX_FEATURES_SHOWN)
                .cloned()
                .collect(),
            explanation: rec.explanation.clone(),
            confidence_score: rec.confidence_score,
            confidence_bar: segments.iter().map(|s| s.glyph()).collect(),
            segments: segments.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RecommendationsView {
    Loading,
    Empty { hint: String },
    Populated { items: Vec<RecommendationCard> },
}

pub fn recommendations_view(recs: &[Recommendation], loading: bool) -> RecommendationsView {
    if loading {
        return RecommendationsView::Loading;
    }
    if recs.is_empty() {
        return RecommendationsView::Empty {
            hint: "Set your preferences and browse some products to get personalized recommendations!"
                .to_string(),
        };
    }
    RecommendationsView::Populated {
        items: recs.iter().map(RecommendationCard::from).collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct HistoryItem {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    pub price: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum HistoryView {
    Empty,
    Populated {
        ids: Vec<ProductId>,
        items: Vec<HistoryItem>,
    },
}

pub fn history_view(history: &HistorySnapshot) -> HistoryView {
    if history.browsing_history.is_empty() {
        return HistoryView::Empty;
    }
    HistoryView::Populated {
        ids: history.browsing_history.clone(),
        items: history
            .products
            .iter()
            .map(|p| HistoryItem {
                id: p.id.clone(),
                name: p.name.clone(),
                category: p.category.clone(),
                price: format!("{:.2}", p.price),
            })
            .collect(),
    }
}
