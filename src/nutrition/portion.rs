//! Portion resolution
//!
//! Turns a requested (amount, unit) into the number of 100 g nutrient bases
//! it represents for a given catalog entry.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::converter::{convert, parse_unit, Density};
use super::units::{canonical_unit, UnitCategory, UnitError};
use crate::models::{Portion, ReferenceEntry, Warning};

/// Catalog nutrient amounts are expressed per this many grams
pub const NUTRIENT_BASE_GRAMS: f64 = 100.0;

/// Scale from per-100 g nutrient data to a requested quantity.
///
/// Always finite and strictly positive; zero or NaN is a resolution
/// failure, never a valid quantity.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct ConversionFactor(f64);

/// Invalid scale factor
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ComputationError {
    #[error("conversion factor {0} must be finite and greater than 0")]
    InvalidFactor(f64),
}

impl ConversionFactor {
    pub fn new(value: f64) -> Result<Self, ComputationError> {
        if value.is_finite() && value > 0.0 {
            Ok(Self(value))
        } else {
            Err(ComputationError::InvalidFactor(value))
        }
    }

    /// Factor for a quantity already expressed in grams
    pub fn from_grams(grams: f64) -> Result<Self, ComputationError> {
        Self::new(grams / NUTRIENT_BASE_GRAMS)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for ConversionFactor {
    type Error = ComputationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ConversionFactor> for f64 {
    fn from(factor: ConversionFactor) -> f64 {
        factor.0
    }
}

/// Which rule produced the factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    /// The requested unit matched one of the entry's standard portions
    StandardPortion,
    /// The request was converted to grams via the unit tables
    UnitConversion,
    /// The first standard portion was used although the unit did not match
    FallbackPortion,
}

/// Whether an unmatched unit may fall back to the first standard portion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    #[default]
    FirstPortion,
    Strict,
}

/// Portion resolution failure; the ingredient's nutrition becomes zero
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PortionError {
    #[error("requested amount {0} must be finite and greater than 0")]
    InvalidAmount(f64),

    #[error("cannot resolve '{unit}' for '{description}': no standard portions and no unit conversion")]
    Unresolvable { unit: String, description: String },

    #[error("unit '{unit}' matches no standard portion of '{description}' and fallback portions are disabled")]
    NoMatchingPortion { unit: String, description: String },

    #[error("standard portion {0} yields an invalid factor")]
    InvalidPortion(String),
}

/// A resolved factor plus the corrections made on the way
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub factor: ConversionFactor,
    pub method: ResolutionMethod,
    pub warnings: Vec<Warning>,
}

/// Compute the conversion factor for `amount` `unit` of `entry`.
///
/// 1. A standard portion in the same unit (case and plural insensitive)
///    gives `amount * gram_weight / (portion.amount * 100)`.
/// 2. A recognized weight, volume or count unit is converted to grams,
///    bridging with the density implied by the entry's portions.
/// 3. Otherwise the first standard portion is used with a warning, unless
///    the policy is [`FallbackPolicy::Strict`].
/// 4. With no portions and no conversion the ingredient cannot be resolved.
pub fn resolve_factor(
    entry: &ReferenceEntry,
    amount: f64,
    unit: &str,
    policy: FallbackPolicy,
) -> Result<Resolution, PortionError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(PortionError::InvalidAmount(amount));
    }

    let mut warnings = Vec::new();
    let parsed = parse_unit(unit);

    // Step 1: exact standard portion
    if let Some(portion) = entry
        .portions
        .iter()
        .find(|p| canonical_unit(&p.unit) == parsed.base_unit && p.grams_per_unit().is_some())
    {
        let factor = portion_factor(amount, portion)?;
        tracing::info!(
            "Matched standard portion {} for {} {} (factor {:.4})",
            portion.describe(),
            amount,
            unit,
            factor.value()
        );
        return Ok(Resolution {
            factor,
            method: ResolutionMethod::StandardPortion,
            warnings,
        });
    }

    // Step 2: unit conversion, including explicit annotations like "slice (28g)"
    if let Some(grams_per) = parsed.gram_weight {
        let factor = ConversionFactor::from_grams(amount * grams_per)
            .map_err(|_| PortionError::InvalidAmount(amount))?;
        return Ok(Resolution {
            factor,
            method: ResolutionMethod::UnitConversion,
            warnings,
        });
    }

    // An ml annotation ("cup (240ml)") overrides the unit table volume
    let (amount_in, unit_in) = match parsed.ml_amount {
        Some(ml_per) => (amount * ml_per, "ml".to_string()),
        None => (amount, parsed.base_unit.clone()),
    };

    if parsed.ml_amount.is_some() || parsed.category != UnitCategory::Custom {
        let density = Density::from_portions(&entry.portions);
        match convert(amount_in, &unit_in, "g", Some(&density)) {
            Ok(grams) => {
                let factor = ConversionFactor::from_grams(grams)
                    .map_err(|_| PortionError::InvalidAmount(amount))?;
                tracing::info!(
                    "Converted {} {} to {:.2} g for '{}' (factor {:.4})",
                    amount,
                    unit,
                    grams,
                    entry.description,
                    factor.value()
                );
                return Ok(Resolution {
                    factor,
                    method: ResolutionMethod::UnitConversion,
                    warnings,
                });
            }
            Err(e @ UnitError::MissingDensity { .. }) => {
                tracing::warn!("Insufficient data for '{}': {}", entry.description, e);
                warnings.push(Warning::warning(format!(
                    "no density data for '{}' to convert {}",
                    entry.description, unit
                )));
            }
            Err(e) => {
                tracing::warn!("Unit conversion failed for '{}': {}", entry.description, e);
                warnings.push(Warning::warning(e.to_string()));
            }
        }
    }

    // Step 3: fall back to the first standard portion
    let Some(first) = entry.portions.first() else {
        return Err(PortionError::Unresolvable {
            unit: unit.to_string(),
            description: entry.description.clone(),
        });
    };

    if policy == FallbackPolicy::Strict {
        return Err(PortionError::NoMatchingPortion {
            unit: unit.to_string(),
            description: entry.description.clone(),
        });
    }

    let factor = portion_factor(amount, first)?;
    tracing::warn!(
        "Used fallback portion {} instead of unmatched unit '{}' for '{}'",
        first.describe(),
        unit,
        entry.description
    );
    warnings.push(Warning::warning(format!(
        "used fallback portion {} instead of unmatched unit '{}'",
        first.describe(),
        unit
    )));

    Ok(Resolution {
        factor,
        method: ResolutionMethod::FallbackPortion,
        warnings,
    })
}

fn portion_factor(amount: f64, portion: &Portion) -> Result<ConversionFactor, PortionError> {
    let grams_per = portion
        .grams_per_unit()
        .ok_or_else(|| PortionError::InvalidPortion(portion.describe()))?;
    ConversionFactor::from_grams(amount * grams_per)
        .map_err(|_| PortionError::InvalidPortion(portion.describe()))
}
