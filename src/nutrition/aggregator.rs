//! Recipe aggregation
//!
//! Sums ingredient contributions into recipe totals.

use crate::models::{IngredientNutrition, NutrientMap, RecipeNutrition, Warning};

/// Total the ingredients of a recipe.
///
/// Ingredients keep their input order. A nutrient missing from an
/// ingredient contributes zero to its total; failed ingredients simply add
/// nothing. An empty list yields empty totals. An amount whose unit cannot
/// be converted to the unit of its running total is left out and the
/// ingredient that carried it gets a warning.
pub fn aggregate(mut ingredients: Vec<IngredientNutrition>) -> RecipeNutrition {
    let mut totals = NutrientMap::new();
    for ingredient in ingredients.iter_mut() {
        for id in totals.accumulate(&ingredient.nutrients) {
            let (Some(value), Some(total)) =
                (ingredient.nutrients.get(id.as_str()), totals.get(id.as_str()))
            else {
                continue;
            };
            ingredient.warnings.push(Warning::warning(format!(
                "'{}' in {} could not be added to the recipe total in {}",
                id, value.unit, total.unit
            )));
        }
    }

    tracing::info!(
        "Aggregated {} ingredients into {} nutrient totals",
        ingredients.len(),
        totals.len()
    );

    RecipeNutrition {
        ingredients,
        totals,
    }
}

impl FromIterator<IngredientNutrition> for RecipeNutrition {
    fn from_iter<I: IntoIterator<Item = IngredientNutrition>>(iter: I) -> Self {
        aggregate(iter.into_iter().collect())
    }
}
