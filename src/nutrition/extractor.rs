//! Nutrient extraction
//!
//! Normalizes a catalog entry's raw nutrient records into a [`NutrientMap`]
//! keyed by canonical nutrient id, with canonical unit spellings.

use crate::models::{NutrientId, NutrientMap, NutrientValue, RawNutrient, ReferenceEntry, Warning};

/// Normalized nutrients plus anything skipped or corrected on the way
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub nutrients: NutrientMap,
    pub warnings: Vec<Warning>,
}

/// Catalog names that denote the same nutrient
const NUTRIENT_ALIASES: &[(&str, &str)] = &[
    ("energy", "energy"),
    ("energy (atwater general factors)", "energy"),
    ("energy (atwater specific factors)", "energy"),
    ("protein", "protein"),
    ("total lipid (fat)", "fat"),
    ("total fat (nlea)", "fat"),
    ("carbohydrate, by difference", "carbohydrate"),
    ("carbohydrate, by summation", "carbohydrate"),
    ("fiber, total dietary", "fiber"),
    ("total dietary fiber (aoac 2011.25)", "fiber"),
    ("sugars, total including nlea", "sugars"),
    ("sugars, total", "sugars"),
    ("total sugars", "sugars"),
    ("sodium, na", "sodium"),
    ("cholesterol", "cholesterol"),
    ("fatty acids, total saturated", "saturated_fat"),
    ("water", "water"),
];

/// Canonical id for a catalog nutrient name.
///
/// Known aliases map onto one id ("Total lipid (fat)" -> "fat"); other names
/// become lowercase snake case ("Vitamin C, total ascorbic acid" ->
/// "vitamin_c_total_ascorbic_acid").
pub fn canonical_nutrient_id(name: &str) -> NutrientId {
    let lower = name.trim().to_lowercase();
    if let Some((_, id)) = NUTRIENT_ALIASES.iter().find(|(alias, _)| *alias == lower) {
        return NutrientId::new(*id);
    }

    let slug = lower
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    NutrientId::new(slug)
}

/// Canonical spelling of a nutrient unit.
///
/// Returns the canonical unit and whether the input was more than a case
/// variant of it ("milligram" -> "mg" is a correction, "MG" -> "mg" is not).
/// Unrecognized units are kept as given, trimmed.
pub fn normalize_nutrient_unit(unit: &str) -> (String, bool) {
    let trimmed = unit.trim();
    let canonical = match trimmed.to_lowercase().as_str() {
        "g" | "gram" | "grams" => "g",
        "mg" | "milligram" | "milligrams" => "mg",
        "ug" | "µg" | "μg" | "mcg" | "microgram" | "micrograms" => "µg",
        "kcal" | "cal" | "calorie" | "calories" | "kilocalorie" | "kilocalories" => "kcal",
        "kj" | "kilojoule" | "kilojoules" => "kJ",
        "iu" => "IU",
        "mg_ate" => "mg ATE",
        "sp_gr" => "sp gr",
        _ => return (trimmed.to_string(), false),
    };
    let corrected = !trimmed.eq_ignore_ascii_case(canonical);
    (canonical.to_string(), corrected)
}

/// Normalize `entry`'s nutrient records.
///
/// Records are visited in ascending catalog nutrient number (records
/// without one go last, in their original order) and the first record for
/// each canonical id wins. Incomplete or negative records are skipped with a
/// warning. Unit spellings that needed more than a case change are recorded
/// as warnings too.
pub fn extract(entry: &ReferenceEntry) -> Extraction {
    let mut records: Vec<&RawNutrient> = entry.nutrients.iter().collect();
    records.sort_by_key(|n| (n.source_id.is_none(), n.source_id));

    let mut extraction = Extraction::default();

    for record in records {
        let (Some(name), Some(unit), Some(amount)) =
            (record.name.as_deref(), record.unit.as_deref(), record.amount)
        else {
            tracing::warn!(
                "Skipping incomplete nutrient record {:?} for '{}'",
                record,
                entry.description
            );
            extraction.warnings.push(Warning::warning(format!(
                "skipped incomplete nutrient record '{}'",
                record.name.as_deref().unwrap_or("unnamed")
            )));
            continue;
        };

        if name.trim().is_empty() || unit.trim().is_empty() || !amount.is_finite() || amount < 0.0 {
            tracing::warn!(
                "Skipping malformed nutrient '{}' = {} {} for '{}'",
                name,
                amount,
                unit,
                entry.description
            );
            extraction.warnings.push(Warning::warning(format!(
                "skipped malformed nutrient '{}' ({} {})",
                name, amount, unit
            )));
            continue;
        }

        let id = canonical_nutrient_id(name);
        if extraction.nutrients.contains(&id) {
            tracing::debug!("Ignoring duplicate nutrient '{}' as {}", name, id);
            continue;
        }

        let (canonical_unit, corrected) = normalize_nutrient_unit(unit);
        if corrected {
            extraction.warnings.push(Warning::warning(format!(
                "normalized unit '{}' to '{}' for nutrient '{}'",
                unit, canonical_unit, name
            )));
        }

        extraction
            .nutrients
            .insert(id, NutrientValue::new(name.trim(), amount, canonical_unit));
    }

    tracing::debug!(
        "Extracted {} nutrients for '{}' ({} warnings)",
        extraction.nutrients.len(),
        entry.description,
        extraction.warnings.len()
    );

    extraction
}
