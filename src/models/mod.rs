//! Data models
//!
//! Requests, catalog records and nutrition results flowing through the pipeline.

mod ingredient;
mod nutrient;
mod recipe;
mod reference;

pub use ingredient::{IngredientRequest, RequestError};
pub use nutrient::{nutrient_unit_ratio, NutrientId, NutrientMap, NutrientValue};
pub use recipe::{IngredientNutrition, RecipeNutrition, Warning, WarningLevel};
pub use reference::{EntryId, Portion, RawNutrient, ReferenceEntry, ReferenceEntrySummary};
