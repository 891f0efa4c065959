//! Unit conversion functions
//!
//! Provides functions for parsing unit strings and converting between units,
//! bridging volume and count to weight through a catalog-derived density.

use super::units::{
    canonical_unit, categorize_unit, grams_per_unit, is_generic_count_unit, ml_per_unit,
    ParsedUnit, UnitCategory, UnitError,
};
use crate::models::Portion;

/// Food-specific bridge between unit families
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Density {
    /// Grams per milliliter (volume -> weight)
    pub grams_per_ml: Option<f64>,
    /// Grams per generic item such as "each" or "piece" (count -> weight)
    pub grams_per_each: Option<f64>,
}

impl Density {
    pub fn from_grams_per_ml(grams_per_ml: f64) -> Self {
        Self {
            grams_per_ml: Some(grams_per_ml),
            grams_per_each: None,
        }
    }

    /// Derive a density from a food's standard portions.
    ///
    /// The first portion in a volume unit gives grams per milliliter, the
    /// first portion in a generic count unit gives grams per item. Portions
    /// without a usable gram weight are ignored.
    pub fn from_portions(portions: &[Portion]) -> Self {
        let grams_per_ml = portions.iter().find_map(|p| {
            let ml = ml_per_unit(&p.unit)?;
            p.grams_per_unit().map(|g| g / ml)
        });

        let grams_per_each = portions
            .iter()
            .filter(|p| is_generic_count_unit(&p.unit))
            .find_map(Portion::grams_per_unit);

        Self {
            grams_per_ml,
            grams_per_each,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.grams_per_ml.is_none() && self.grams_per_each.is_none()
    }
}

/// Parse a unit string, extracting any gram or ml annotation
///
/// Examples:
/// - "g" -> ParsedUnit { base_unit: "g", gram_weight: None, ... }
/// - "tbsp (20g)" -> ParsedUnit { base_unit: "tbsp", gram_weight: Some(20.0), ... }
/// - "cup (240ml)" -> ParsedUnit { base_unit: "cup", ml_amount: Some(240.0), ... }
/// - "Slices (28g)" -> ParsedUnit { base_unit: "slice", gram_weight: Some(28.0), ... }
pub fn parse_unit(unit_str: &str) -> ParsedUnit {
    let trimmed = unit_str.trim();

    // Try to extract parenthetical annotation like "(20g)" or "(240ml)"
    if let (Some(paren_start), Some(paren_end)) = (trimmed.find('('), trimmed.find(')')) {
        if paren_start < paren_end {
            let base_unit = canonical_unit(&trimmed[..paren_start]);
            let annotation = &trimmed[paren_start + 1..paren_end];

            return ParsedUnit {
                category: categorize_unit(&base_unit),
                gram_weight: parse_annotation(annotation, &["g", "gram", "grams"]),
                ml_amount: parse_annotation(
                    annotation,
                    &["ml", "milliliter", "milliliters", "millilitre", "millilitres"],
                ),
                base_unit,
            };
        }
    }

    let base_unit = canonical_unit(trimmed);
    ParsedUnit {
        category: categorize_unit(&base_unit),
        base_unit,
        gram_weight: None,
        ml_amount: None,
    }
}

/// Parse an annotation like "20g", "20 g" or "240 ml" given the accepted suffixes
fn parse_annotation(s: &str, suffixes: &[&str]) -> Option<f64> {
    let lower = s.to_lowercase();
    let trimmed = lower.trim();

    // Longest suffixes first so "20 grams" is not read as "20 gram" + "s"
    let mut ordered = suffixes.to_vec();
    ordered.sort_by_key(|s| std::cmp::Reverse(s.len()));

    for suffix in ordered {
        if let Some(num_part) = trimmed.strip_suffix(suffix) {
            if let Ok(val) = num_part.trim().parse::<f64>() {
                if val.is_finite() && val > 0.0 {
                    return Some(val);
                }
            }
        }
    }

    None
}

/// Convert a quantity in the given unit to grams
///
/// Returns None if conversion is not possible (e.g., volume to grams without density)
pub fn to_grams(quantity: f64, unit: &str) -> Option<f64> {
    let parsed = parse_unit(unit);

    // If the unit itself has a gram annotation, use that
    if let Some(grams_per) = parsed.gram_weight {
        return Some(quantity * grams_per);
    }

    grams_per_unit(&parsed.base_unit).map(|factor| quantity * factor)
}

/// Convert a quantity in the given unit to milliliters
///
/// Returns None if conversion is not possible
pub fn to_ml(quantity: f64, unit: &str) -> Option<f64> {
    let parsed = parse_unit(unit);

    if let Some(ml_per) = parsed.ml_amount {
        return Some(quantity * ml_per);
    }

    ml_per_unit(&parsed.base_unit).map(|factor| quantity * factor)
}

/// Convert `amount` from one unit to another.
///
/// Same-family conversions use the constant tables. Crossing families goes
/// through grams and needs `density`; when the density lacks the required
/// bridge the error is [`UnitError::MissingDensity`], which callers treat
/// as "insufficient data" rather than a bad request.
pub fn convert(
    amount: f64,
    from_unit: &str,
    to_unit: &str,
    density: Option<&Density>,
) -> Result<f64, UnitError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(UnitError::InvalidAmount(amount));
    }

    let from_category = categorize_unit(from_unit);
    let to_category = categorize_unit(to_unit);

    if from_category == UnitCategory::Custom {
        return Err(UnitError::UnknownUnit(from_unit.to_string()));
    }
    if to_category == UnitCategory::Custom {
        return Err(UnitError::UnknownUnit(to_unit.to_string()));
    }

    match (from_category, to_category) {
        (UnitCategory::Weight, UnitCategory::Weight) => {
            let (from, to) = (grams_per_unit(from_unit), grams_per_unit(to_unit));
            Ok(amount * ratio(from, to, from_unit, to_unit)?)
        }
        (UnitCategory::Volume, UnitCategory::Volume) => {
            let (from, to) = (ml_per_unit(from_unit), ml_per_unit(to_unit));
            Ok(amount * ratio(from, to, from_unit, to_unit)?)
        }
        (UnitCategory::Count, UnitCategory::Count) => {
            let same = canonical_unit(from_unit) == canonical_unit(to_unit);
            if same || (is_generic_count_unit(from_unit) && is_generic_count_unit(to_unit)) {
                Ok(amount)
            } else {
                Err(UnitError::Incompatible {
                    from: from_unit.to_string(),
                    to: to_unit.to_string(),
                })
            }
        }
        _ => {
            let missing = || UnitError::MissingDensity {
                from: from_unit.to_string(),
                to: to_unit.to_string(),
            };
            let grams_per_from = grams_per_one(from_unit, from_category, density).ok_or_else(missing)?;
            let grams_per_to = grams_per_one(to_unit, to_category, density).ok_or_else(missing)?;
            Ok(amount * grams_per_from / grams_per_to)
        }
    }
}

fn ratio(from: Option<f64>, to: Option<f64>, from_unit: &str, to_unit: &str) -> Result<f64, UnitError> {
    match (from, to) {
        (Some(f), Some(t)) => Ok(f / t),
        (None, _) => Err(UnitError::UnknownUnit(from_unit.to_string())),
        (_, None) => Err(UnitError::UnknownUnit(to_unit.to_string())),
    }
}

/// Grams in one `unit`, using the density to bridge volume and count
fn grams_per_one(unit: &str, category: UnitCategory, density: Option<&Density>) -> Option<f64> {
    match category {
        UnitCategory::Weight => grams_per_unit(unit),
        UnitCategory::Volume => {
            let ml = ml_per_unit(unit)?;
            density?.grams_per_ml.map(|gpm| ml * gpm)
        }
        UnitCategory::Count if is_generic_count_unit(unit) => density?.grams_per_each,
        UnitCategory::Count | UnitCategory::Custom => None,
    }
}
