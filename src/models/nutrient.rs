//! Normalized nutrient values
//!
//! Shared by single ingredients and recipe totals.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical nutrient key ("energy", "protein", "vitamin_c_total_ascorbic_acid")
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NutrientId(pub String);

impl NutrientId {
    pub fn new(id: impl Into<String>) -> Self {
        NutrientId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NutrientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A nutrient amount in a canonical unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutrientValue {
    /// Display name as published by the catalog
    pub name: String,
    pub amount: f64,
    /// Canonical unit ("g", "mg", "µg", "kcal", "kJ", "IU")
    pub unit: String,
}

impl NutrientValue {
    pub fn new(name: impl Into<String>, amount: f64, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            amount,
            unit: unit.into(),
        }
    }

    /// The same value with zero amount
    pub fn zeroed(&self) -> Self {
        Self {
            amount: 0.0,
            ..self.clone()
        }
    }
}

/// Ratio turning an amount in `from` into an amount in `to`, for the
/// nutrient units that share a dimension (mass, energy)
pub fn nutrient_unit_ratio(from: &str, to: &str) -> Option<f64> {
    if from == to {
        return Some(1.0);
    }

    fn grams(unit: &str) -> Option<f64> {
        match unit {
            "g" => Some(1.0),
            "mg" => Some(1e-3),
            "µg" => Some(1e-6),
            _ => None,
        }
    }

    fn kcal(unit: &str) -> Option<f64> {
        match unit {
            "kcal" => Some(1.0),
            "kJ" => Some(1.0 / 4.184),
            _ => None,
        }
    }

    if let (Some(f), Some(t)) = (grams(from), grams(to)) {
        return Some(f / t);
    }
    if let (Some(f), Some(t)) = (kcal(from), kcal(to)) {
        return Some(f / t);
    }
    None
}

/// Nutrient values keyed by nutrient id, iterated in id order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NutrientMap(BTreeMap<NutrientId, NutrientValue>);

impl NutrientMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: NutrientId, value: NutrientValue) -> Option<NutrientValue> {
        self.0.insert(id, value)
    }

    pub fn get(&self, id: &str) -> Option<&NutrientValue> {
        self.0.get(&NutrientId::new(id))
    }

    pub fn contains(&self, id: &NutrientId) -> bool {
        self.0.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NutrientId, &NutrientValue)> {
        self.0.iter()
    }

    /// Scale every amount by a multiplier
    pub fn scale(&self, multiplier: f64) -> Self {
        NutrientMap(
            self.0
                .iter()
                .map(|(id, v)| {
                    (
                        id.clone(),
                        NutrientValue {
                            amount: v.amount * multiplier,
                            ..v.clone()
                        },
                    )
                })
                .collect(),
        )
    }

    /// Add another map into this one.
    ///
    /// Ids missing on either side count as zero. When both sides carry the
    /// same id in different units, the incoming amount is converted to the
    /// unit already held. Amounts that cannot be converted are left out and
    /// their ids returned so the caller can report them.
    pub fn accumulate(&mut self, other: &NutrientMap) -> Vec<NutrientId> {
        let mut dropped = Vec::new();
        for (id, incoming) in other.iter() {
            match self.0.get_mut(id) {
                Some(existing) => match nutrient_unit_ratio(&incoming.unit, &existing.unit) {
                    Some(ratio) => existing.amount += incoming.amount * ratio,
                    None => {
                        tracing::warn!(
                            "Dropping {} {} of '{}': incompatible with total unit {}",
                            incoming.amount,
                            incoming.unit,
                            id,
                            existing.unit
                        );
                        dropped.push(id.clone());
                    }
                },
                None => {
                    self.0.insert(id.clone(), incoming.clone());
                }
            }
        }
        dropped
    }

    /// Add another map to this one, returning the sum
    pub fn add(&self, other: &NutrientMap) -> Self {
        let mut sum = self.clone();
        let _ = sum.accumulate(other);
        sum
    }

    /// Same keys and units, all amounts zero
    pub fn zeroed(&self) -> Self {
        NutrientMap(
            self.0
                .iter()
                .map(|(id, v)| (id.clone(), v.zeroed()))
                .collect(),
        )
    }
}

impl FromIterator<(NutrientId, NutrientValue)> for NutrientMap {
    fn from_iter<I: IntoIterator<Item = (NutrientId, NutrientValue)>>(iter: I) -> Self {
        NutrientMap(iter.into_iter().collect())
    }
}

impl std::ops::Add for NutrientMap {
    type Output = NutrientMap;

    fn add(mut self, other: NutrientMap) -> NutrientMap {
        let _ = self.accumulate(&other);
        self
    }
}

impl std::ops::Mul<f64> for NutrientMap {
    type Output = NutrientMap;

    fn mul(self, multiplier: f64) -> NutrientMap {
        self.scale(multiplier)
    }
}

impl std::iter::Sum for NutrientMap {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(NutrientMap::new(), |acc, n| acc + n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(values: &[(&str, f64, &str)]) -> NutrientMap {
        values
            .iter()
            .map(|(id, amount, unit)| {
                (NutrientId::new(*id), NutrientValue::new(*id, *amount, *unit))
            })
            .collect()
    }

    #[test]
    fn test_scale() {
        let scaled = map(&[("energy", 34.0, "kcal"), ("protein", 2.8, "g")]).scale(1.82);
        assert!((scaled.get("energy").unwrap().amount - 61.88).abs() < 1e-9);
        assert!((scaled.get("protein").unwrap().amount - 5.096).abs() < 1e-9);
        assert_eq!(scaled.get("protein").unwrap().unit, "g");
    }

    #[test]
    fn test_add_treats_missing_keys_as_zero() {
        let a = map(&[("energy", 10.0, "kcal"), ("protein", 1.0, "g")]);
        let b = map(&[("energy", 5.0, "kcal"), ("fiber", 2.0, "g")]);

        let sum = a + b;
        assert_eq!(sum.len(), 3);
        assert!((sum.get("energy").unwrap().amount - 15.0).abs() < 1e-9);
        assert!((sum.get("protein").unwrap().amount - 1.0).abs() < 1e-9);
        assert!((sum.get("fiber").unwrap().amount - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_add_converts_compatible_units() {
        let a = map(&[("sodium", 1.0, "g")]);
        let b = map(&[("sodium", 250.0, "mg")]);

        let sum = a.add(&b);
        let sodium = sum.get("sodium").unwrap();
        assert_eq!(sodium.unit, "g");
        assert!((sodium.amount - 1.25).abs() < 1e-9);
    }

    #[test]
    fn test_add_drops_incompatible_units() {
        let a = map(&[("vitamin_a", 10.0, "µg")]);
        let b = map(&[("vitamin_a", 100.0, "IU")]);

        let sum = a.add(&b);
        assert!((sum.get("vitamin_a").unwrap().amount - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_accumulate_reports_dropped_ids() {
        let mut total = map(&[("vitamin_a", 10.0, "µg"), ("sodium", 1.0, "g")]);
        let incoming = map(&[
            ("vitamin_a", 100.0, "IU"),
            ("sodium", 500.0, "mg"),
            ("fiber", 2.0, "g"),
        ]);

        let dropped = total.accumulate(&incoming);
        assert_eq!(dropped, vec![NutrientId::new("vitamin_a")]);
        assert!((total.get("sodium").unwrap().amount - 1.5).abs() < 1e-9);
        assert!((total.get("fiber").unwrap().amount - 2.0).abs() < 1e-9);
        assert_eq!(total.get("vitamin_a").unwrap().unit, "µg");

        assert!(total.accumulate(&map(&[("sodium", 1.0, "g")])).is_empty());
    }

    #[test]
    fn test_sum_of_nothing_is_empty() {
        let total: NutrientMap = Vec::<NutrientMap>::new().into_iter().sum();
        assert!(total.is_empty());
    }

    #[test]
    fn test_iteration_is_ordered_by_id() {
        let m = map(&[("zinc", 1.0, "mg"), ("calcium", 2.0, "mg"), ("iron", 3.0, "mg")]);
        let ids: Vec<&str> = m.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["calcium", "iron", "zinc"]);
    }

    #[test]
    fn test_energy_ratio() {
        let ratio = nutrient_unit_ratio("kJ", "kcal").unwrap();
        assert!((418.4 * ratio - 100.0).abs() < 1e-9);
        assert_eq!(nutrient_unit_ratio("IU", "µg"), None);
    }
}
