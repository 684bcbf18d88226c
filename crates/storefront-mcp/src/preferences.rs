use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use storefront_common::model::{PriceRange, Preferences, Product};

use crate::catalog::distinct;
use crate::error::AppError;

pub const MAX_BRAND_OPTIONS: usize = 12;
pub const MAX_STYLE_OPTIONS: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceField {
    Category,
    Brand,
    Style,
}

/// Local, editable copy of the user's preferences.
///
/// Every edit returns the full draft as a `Preferences` object ready to send;
/// there is no deferred save step.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct PreferencesDraft {
    pub preferred_categories: Vec<String>,
    pub preferred_brands: Vec<String>,
    pub price_range: PriceRange,
    pub style_preferences: Vec<String>,
    #[serde(skip)]
    extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for PreferencesDraft {
    fn default() -> Self {
        Self::from_preferences(&Preferences::default())
    }
}

impl PreferencesDraft {
    pub fn from_preferences(prefs: &Preferences) -> Self {
        Self {
            preferred_categories: prefs.preferred_categories.clone().unwrap_or_default(),
            preferred_brands: prefs.preferred_brands.clone().unwrap_or_default(),
            price_range: prefs.price_range.unwrap_or_default(),
            style_preferences: prefs.style_preferences.clone().unwrap_or_default(),
            extra: prefs.extra.clone(),
        }
    }

    /// Replaces the draft with the server's copy.
    pub fn resync(&mut self, prefs: &Preferences) {
        *self = Self::from_preferences(prefs);
    }

    pub fn toggle(&mut self, field: PreferenceField, value: &str, checked: bool) -> Preferences {
        let list = match field {
            PreferenceField::Category => &mut self.preferred_categories,
            PreferenceField::Brand => &mut self.preferred_brands,
            PreferenceField::Style => &mut self.style_preferences,
        };
        if checked {
            if !list.iter().any(|v| v == value) {
                list.push(value.to_string());
            }
        } else {
            list.retain(|v| v != value);
        }
        self.to_preferences()
    }

    /// Edits one or both price bounds. The resulting range must satisfy
    /// `0 <= min <= max`; otherwise the draft is left untouched.
    pub fn set_price_range(
        &mut self,
        min: Option<f64>,
        max: Option<f64>,
    ) -> Result<Preferences, AppError> {
        for value in [min, max].into_iter().flatten() {
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::InvalidInput(format!(
                    "price must be a non-negative number, got {value}"
                )));
            }
        }
        let range = PriceRange {
            min: min.unwrap_or(self.price_range.min),
            max: max.unwrap_or(self.price_range.max),
        };
        if range.min > range.max {
            return Err(AppError::InvalidInput(format!(
                "price range min {} exceeds max {}",
                range.min, range.max
            )));
        }
        self.price_range = range;
        Ok(self.to_preferences())
    }

    pub fn to_preferences(&self) -> Preferences {
        Preferences {
            preferred_categories: Some(self.preferred_categories.clone()),
            preferred_brands: Some(self.preferred_brands.clone()),
            price_range: Some(self.price_range),
            style_preferences: Some(self.style_preferences.clone()),
            extra: self.extra.clone(),
        }
    }
}

/// A capped option list with its untruncated size.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct OptionList {
    pub shown: Vec<String>,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disclosure: Option<String>,
}

impl OptionList {
    fn capped(all: Vec<String>, cap: usize, noun: &str) -> Self {
        let total = all.len();
        let disclosure = (total > cap).then(|| format!("Showing {cap} of {total} {noun}"));
        let shown = all.into_iter().take(cap).collect();
        Self {
            shown,
            total,
            disclosure,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct PreferenceOptions {
    pub categories: Vec<String>,
    pub brands: OptionList,
    pub styles: OptionList,
}

pub fn preference_options(products: &[Product]) -> PreferenceOptions {
    let categories = distinct(products.iter().map(|p| p.category.as_str()));
    let brands = distinct(products.iter().map(|p| p.brand.as_str()));
    let tags = distinct(
        products
            .iter()
            .flat_map(|p| p.tags.iter().flatten())
            .map(String::as_str),
    );

    PreferenceOptions {
        categories,
        brands: OptionList::capped(brands, MAX_BRAND_OPTIONS, "brands"),
        styles: OptionList::capped(tags, MAX_STYLE_OPTIONS, "style options"),
    }
}
