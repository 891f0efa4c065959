//! Unit types and conversion constants
//!
//! Provides the unit families (weight, volume, count) and the standard
//! conversion factors between members of the same family.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category of a measurement unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitCategory {
    /// Weight/mass units (g, oz, lb, kg)
    Weight,
    /// Volume units (ml, tbsp, cup, etc.)
    Volume,
    /// Count/discrete units (each, piece, clove, slice)
    Count,
    /// Anything not in the tables above ("medium", "stalk", "container")
    Custom,
}

/// A parsed unit with optional gram weight annotation
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedUnit {
    /// The canonical base unit (e.g., "tbsp" from "Tablespoons (20g)")
    pub base_unit: String,
    /// Gram weight if annotated (e.g., 20.0 from "(20g)")
    pub gram_weight: Option<f64>,
    /// Milliliter amount if annotated (e.g., 15.0 from "(15ml)")
    pub ml_amount: Option<f64>,
    /// The category of this unit
    pub category: UnitCategory,
}

/// Unit conversion error
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnitError {
    #[error("unrecognized unit '{0}'")]
    UnknownUnit(String),

    #[error("cannot convert '{from}' to '{to}': incompatible unit families")]
    Incompatible { from: String, to: String },

    #[error("cannot convert '{from}' to '{to}': no density available")]
    MissingDensity { from: String, to: String },

    #[error("invalid amount {0}: must be finite and non-negative")]
    InvalidAmount(f64),
}

impl UnitError {
    /// Whether the failure only means the catalog lacks data for this
    /// conversion (as opposed to a nonsensical request)
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, UnitError::MissingDensity { .. })
    }
}

// ============================================================================
// Volume Conversion Constants (to milliliters)
// ============================================================================

/// Milliliters per teaspoon
pub const ML_PER_TSP: f64 = 4.92892;
/// Milliliters per tablespoon
pub const ML_PER_TBSP: f64 = 14.7868;
/// Milliliters per fluid ounce
pub const ML_PER_FL_OZ: f64 = 29.5735;
/// Milliliters per cup (US)
pub const ML_PER_CUP: f64 = 236.588;
/// Milliliters per pint (US)
pub const ML_PER_PINT: f64 = 473.176;
/// Milliliters per quart (US)
pub const ML_PER_QUART: f64 = 946.353;
/// Milliliters per liter
pub const ML_PER_LITER: f64 = 1000.0;
/// Milliliters per gallon (US)
pub const ML_PER_GALLON: f64 = 3785.41;

// ============================================================================
// Weight Conversion Constants (to grams)
// ============================================================================

/// Grams per milligram
pub const G_PER_MG: f64 = 0.001;
/// Grams per kilogram
pub const G_PER_KG: f64 = 1000.0;
/// Grams per ounce
pub const G_PER_OZ: f64 = 28.3495;
/// Grams per pound
pub const G_PER_LB: f64 = 453.592;

/// Count units that all mean "one item" and are interchangeable
const GENERIC_COUNT_UNITS: &[&str] = &["each", "piece", "item", "unit", "count", "whole"];

/// Count units naming a specific kind of item
const SPECIFIC_COUNT_UNITS: &[&str] = &[
    "clove", "slice", "stick", "leaf", "sprig", "head", "bunch", "stalk", "pinch", "dash",
    "can", "fruit", "egg",
];

// ============================================================================
// Unit Recognition
// ============================================================================

/// Reduce a unit string to a canonical spelling.
///
/// Lowercases, trims, drops trailing periods, collapses whitespace and maps
/// abbreviations and plurals onto one symbol ("Tablespoons" -> "tbsp",
/// "cloves" -> "clove"). Unknown words are singularized but otherwise kept.
pub fn normalize_unit(unit: &str) -> String {
    let lower = unit.trim().to_lowercase();
    let cleaned = lower
        .split_whitespace()
        .map(|w| w.trim_end_matches('.'))
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    match cleaned.as_str() {
        "g" | "gr" | "gram" | "grams" | "gramme" | "grammes" => "g".to_string(),
        "mg" | "milligram" | "milligrams" => "mg".to_string(),
        "kg" | "kilo" | "kilos" | "kilogram" | "kilograms" => "kg".to_string(),
        "oz" | "ounce" | "ounces" => "oz".to_string(),
        "lb" | "lbs" | "pound" | "pounds" => "lb".to_string(),
        "ml" | "milliliter" | "milliliters" | "millilitre" | "millilitres" => "ml".to_string(),
        "l" | "liter" | "liters" | "litre" | "litres" => "l".to_string(),
        "tsp" | "tsps" | "teaspoon" | "teaspoons" => "tsp".to_string(),
        "tbsp" | "tbsps" | "tbs" | "tbl" | "tablespoon" | "tablespoons" => "tbsp".to_string(),
        "fl oz" | "floz" | "fluid ounce" | "fluid ounces" => "fl oz".to_string(),
        "c" | "cup" | "cups" => "cup".to_string(),
        "pt" | "pint" | "pints" => "pint".to_string(),
        "qt" | "quart" | "quarts" => "quart".to_string(),
        "gal" | "gallon" | "gallons" => "gallon".to_string(),
        "ea" | "each" => "each".to_string(),
        "pc" | "pcs" => "piece".to_string(),
        other => other
            .split(' ')
            .map(singularize)
            .collect::<Vec<_>>()
            .join(" "),
    }
}

/// Canonical unit symbol, or the singularized word for unknown units
pub fn canonical_unit(unit: &str) -> String {
    normalize_unit(unit)
}

/// Strip a regular English plural suffix from a single word
fn singularize(word: &str) -> String {
    if word.len() <= 3 || word.ends_with("ss") {
        return word.to_string();
    }
    match word {
        "leaves" => return "leaf".to_string(),
        "halves" => return "half".to_string(),
        "loaves" => return "loaf".to_string(),
        _ => {}
    }
    if let Some(stem) = word.strip_suffix("ies") {
        return format!("{}y", stem);
    }
    for suffix in ["ches", "shes", "xes", "oes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    match word.strip_suffix('s') {
        Some(stem) => stem.to_string(),
        None => word.to_string(),
    }
}

/// Get the conversion factor to grams for a weight unit
pub fn grams_per_unit(unit: &str) -> Option<f64> {
    match normalize_unit(unit).as_str() {
        "g" => Some(1.0),
        "mg" => Some(G_PER_MG),
        "kg" => Some(G_PER_KG),
        "oz" => Some(G_PER_OZ),
        "lb" => Some(G_PER_LB),
        _ => None,
    }
}

/// Get the conversion factor to milliliters for a volume unit
pub fn ml_per_unit(unit: &str) -> Option<f64> {
    match normalize_unit(unit).as_str() {
        "ml" => Some(1.0),
        "l" => Some(ML_PER_LITER),
        "tsp" => Some(ML_PER_TSP),
        "tbsp" => Some(ML_PER_TBSP),
        "fl oz" => Some(ML_PER_FL_OZ),
        "cup" => Some(ML_PER_CUP),
        "pint" => Some(ML_PER_PINT),
        "quart" => Some(ML_PER_QUART),
        "gallon" => Some(ML_PER_GALLON),
        _ => None,
    }
}

/// Whether a count unit is one of the interchangeable "one item" units
pub fn is_generic_count_unit(unit: &str) -> bool {
    GENERIC_COUNT_UNITS.contains(&normalize_unit(unit).as_str())
}

/// Determine the category of a unit string
pub fn categorize_unit(unit: &str) -> UnitCategory {
    if grams_per_unit(unit).is_some() {
        return UnitCategory::Weight;
    }

    if ml_per_unit(unit).is_some() {
        return UnitCategory::Volume;
    }

    let normalized = normalize_unit(unit);
    if GENERIC_COUNT_UNITS.contains(&normalized.as_str())
        || SPECIFIC_COUNT_UNITS.contains(&normalized.as_str())
    {
        return UnitCategory::Count;
    }

    UnitCategory::Custom
}
