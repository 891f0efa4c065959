//! Ingredient nutrition calculation
//!
//! Scales per-100 g nutrient data by a conversion factor.

use super::portion::{ComputationError, ConversionFactor};
use crate::models::NutrientMap;

/// Nutrients present in `factor` nutrient bases.
///
/// Every output amount is the input amount times `factor`. Zero, negative
/// and non-finite factors are rejected.
pub fn compute(nutrients: &NutrientMap, factor: f64) -> Result<NutrientMap, ComputationError> {
    let factor = ConversionFactor::new(factor)?;
    Ok(nutrients.scale(factor.value()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NutrientId, NutrientValue};

    fn broccoli_per_100g() -> NutrientMap {
        [
            ("energy", "Energy", 34.0, "kcal"),
            ("protein", "Protein", 2.82, "g"),
            ("sodium", "Sodium, Na", 33.0, "mg"),
        ]
        .into_iter()
        .map(|(id, name, amount, unit)| (NutrientId::new(id), NutrientValue::new(name, amount, unit)))
        .collect()
    }

    #[test]
    fn test_compute_broccoli_two_cups() {
        let result = compute(&broccoli_per_100g(), 1.82).unwrap();
        assert!((result.get("energy").unwrap().amount - 61.88).abs() < 1e-9);
    }

    #[test]
    fn test_compute_is_linear() {
        let base = broccoli_per_100g();
        for factor in [0.01, 0.5, 1.0, 2.3659, 17.0] {
            let result = compute(&base, factor).unwrap();
            assert_eq!(result.len(), base.len());
            for (id, value) in base.iter() {
                let scaled = result.get(id.as_str()).unwrap();
                assert!((scaled.amount - value.amount * factor).abs() < 1e-9);
                assert_eq!(scaled.unit, value.unit);
            }
        }
    }

    #[test]
    fn test_compute_rejects_invalid_factors() {
        let base = broccoli_per_100g();
        assert_eq!(compute(&base, -1.0), Err(ComputationError::InvalidFactor(-1.0)));
        assert!(compute(&base, f64::NAN).is_err());
        assert!(compute(&base, 0.0).is_err());
    }

    #[test]
    fn test_compute_empty_map() {
        assert!(compute(&NutrientMap::new(), 2.0).unwrap().is_empty());
    }
}
