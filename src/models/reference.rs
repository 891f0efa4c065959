//! Reference catalog entries
//!
//! Food records as published by the nutrition catalog, with their standard
//! portions and raw (not yet normalized) nutrient records.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque catalog identifier (the FoodData Central `fdcId`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntryId {
    fn from(id: u64) -> Self {
        EntryId(id)
    }
}

fn default_portion_amount() -> f64 {
    1.0
}

/// A named serving size with its gram weight ("1 cup, chopped" = 91 g)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portion {
    /// Measure unit as published ("cup", "tbsp", "medium")
    pub unit: String,
    /// How many `unit`s the gram weight covers (usually 1)
    #[serde(default = "default_portion_amount")]
    pub amount: f64,
    /// Grams in `amount` `unit`s
    pub gram_weight: f64,
    /// Preparation note ("chopped", "sliced")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier: Option<String>,
}

impl Portion {
    pub fn new(unit: impl Into<String>, gram_weight: f64) -> Self {
        Self {
            unit: unit.into(),
            amount: 1.0,
            gram_weight,
            modifier: None,
        }
    }

    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_modifier(mut self, modifier: impl Into<String>) -> Self {
        self.modifier = Some(modifier.into());
        self
    }

    /// Grams in a single `unit`, if the portion data is usable
    pub fn grams_per_unit(&self) -> Option<f64> {
        let grams = self.gram_weight / self.amount;
        (self.gram_weight > 0.0 && self.amount > 0.0 && grams.is_finite()).then_some(grams)
    }

    /// Human readable form used in warnings, e.g. "1 cup, chopped (91 g)"
    pub fn describe(&self) -> String {
        match &self.modifier {
            Some(m) => format!("{} {}, {} ({} g)", self.amount, self.unit, m, self.gram_weight),
            None => format!("{} {} ({} g)", self.amount, self.unit, self.gram_weight),
        }
    }
}

/// One nutrient record exactly as the catalog returned it.
///
/// Every field is optional because catalog records are frequently
/// incomplete; the extractor decides what is usable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNutrient {
    /// Catalog nutrient number (1008 = Energy in kcal)
    pub source_id: Option<u32>,
    pub name: Option<String>,
    pub unit: Option<String>,
    /// Amount per 100 g of food
    pub amount: Option<f64>,
}

impl RawNutrient {
    pub fn new(source_id: u32, name: &str, unit: &str, amount: f64) -> Self {
        Self {
            source_id: Some(source_id),
            name: Some(name.to_string()),
            unit: Some(unit.to_string()),
            amount: Some(amount),
        }
    }

    /// Whether the record carries everything needed to become a nutrient value
    pub fn is_complete(&self) -> bool {
        self.name.as_deref().is_some_and(|n| !n.trim().is_empty())
            && self.unit.as_deref().is_some_and(|u| !u.trim().is_empty())
            && self.amount.is_some_and(|a| a.is_finite() && a >= 0.0)
    }
}

/// A full catalog record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub id: EntryId,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default)]
    pub portions: Vec<Portion>,
    #[serde(default)]
    pub nutrients: Vec<RawNutrient>,
}

impl ReferenceEntry {
    pub fn new(id: impl Into<EntryId>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            category: None,
            data_type: None,
            portions: Vec::new(),
            nutrients: Vec::new(),
        }
    }

    pub fn with_portion(mut self, portion: Portion) -> Self {
        self.portions.push(portion);
        self
    }

    pub fn with_nutrient(mut self, nutrient: RawNutrient) -> Self {
        self.nutrients.push(nutrient);
        self
    }

    /// Number of nutrient records that carry a usable amount
    pub fn complete_nutrient_count(&self) -> usize {
        self.nutrients.iter().filter(|n| n.is_complete()).count()
    }

    /// The search-result view of this entry
    pub fn summary(&self) -> ReferenceEntrySummary {
        ReferenceEntrySummary {
            id: self.id,
            description: self.description.clone(),
            data_type: self.data_type.clone(),
            nutrient_count: self.complete_nutrient_count(),
        }
    }
}

/// Search hit: enough to rank candidates without fetching full detail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEntrySummary {
    pub id: EntryId,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    /// Number of nutrients reported for this entry in the search hit
    #[serde(default)]
    pub nutrient_count: usize,
}
