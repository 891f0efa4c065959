//! Ingredient and recipe nutrition results
//!
//! Per-ingredient outcomes carry their own warnings; the recipe keeps every
//! ingredient in input order alongside the totals.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{IngredientRequest, NutrientMap, ReferenceEntry};
use crate::nutrition::ResolutionMethod;

/// How much a warning affects the reliability of the numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningLevel {
    /// A correction was applied; numbers are still usable
    Warning,
    /// The ingredient's numbers are missing or zeroed
    Error,
}

/// A message attached to one ingredient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub level: WarningLevel,
    pub message: String,
}

impl Warning {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: WarningLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: WarningLevel::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level {
            WarningLevel::Warning => write!(f, "warning: {}", self.message),
            WarningLevel::Error => write!(f, "error: {}", self.message),
        }
    }
}

/// Nutrition contributed by one ingredient line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientNutrition {
    pub request: IngredientRequest,
    pub matched_entry: Option<ReferenceEntry>,
    /// Similarity score of the matched entry (0-100)
    pub match_score: Option<f64>,
    /// Number of 100 g nutrient bases in the requested quantity
    pub conversion_factor: Option<f64>,
    pub resolution: Option<ResolutionMethod>,
    pub nutrients: NutrientMap,
    pub warnings: Vec<Warning>,
}

impl IngredientNutrition {
    /// An ingredient that contributes nothing, e.g. no catalog match
    pub fn empty(request: IngredientRequest, warnings: Vec<Warning>) -> Self {
        Self {
            request,
            matched_entry: None,
            match_score: None,
            conversion_factor: None,
            resolution: None,
            nutrients: NutrientMap::new(),
            warnings,
        }
    }

    /// Whether any attached warning is error level
    pub fn has_errors(&self) -> bool {
        self.warnings.iter().any(|w| w.level == WarningLevel::Error)
    }
}

/// Recipe-level result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipeNutrition {
    /// Ingredients in input order
    pub ingredients: Vec<IngredientNutrition>,
    pub totals: NutrientMap,
}

impl RecipeNutrition {
    /// Number of ingredients with at least one warning
    pub fn ingredients_with_warnings(&self) -> usize {
        self.ingredients
            .iter()
            .filter(|i| !i.warnings.is_empty())
            .count()
    }

    /// Number of ingredients whose numbers could not be computed
    pub fn failed_ingredients(&self) -> usize {
        self.ingredients.iter().filter(|i| i.has_errors()).count()
    }
}
