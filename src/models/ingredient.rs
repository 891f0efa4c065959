//! Ingredient request model
//!
//! One recipe line: what the cook asked for, before any catalog lookup.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why an ingredient line cannot become a request
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    #[error("ingredient name is empty")]
    EmptyName,

    #[error("amount {0} must be a finite number greater than 0")]
    InvalidAmount(f64),

    #[error("unit is empty")]
    EmptyUnit,
}

/// A requested ingredient quantity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientRequest {
    pub name: String,
    pub amount: f64,
    pub unit: String,
}

impl IngredientRequest {
    /// Validate and build a request; surrounding whitespace is trimmed
    pub fn new(name: &str, amount: f64, unit: &str) -> Result<Self, RequestError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RequestError::EmptyName);
        }

        if !amount.is_finite() || amount <= 0.0 {
            return Err(RequestError::InvalidAmount(amount));
        }

        let unit = unit.trim();
        if unit.is_empty() {
            return Err(RequestError::EmptyUnit);
        }

        Ok(Self {
            name: name.to_string(),
            amount,
            unit: unit.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims_fields() {
        let req = IngredientRequest::new("  Broccoli ", 2.0, " cups ").unwrap();
        assert_eq!(req.name, "Broccoli");
        assert_eq!(req.unit, "cups");
    }

    #[test]
    fn test_new_rejects_bad_input() {
        assert_eq!(IngredientRequest::new(" ", 1.0, "g"), Err(RequestError::EmptyName));
        assert_eq!(
            IngredientRequest::new("salt", 0.0, "g"),
            Err(RequestError::InvalidAmount(0.0))
        );
        assert!(IngredientRequest::new("salt", f64::NAN, "g").is_err());
        assert_eq!(IngredientRequest::new("salt", 1.0, ""), Err(RequestError::EmptyUnit));
    }
}
