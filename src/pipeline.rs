//! Recipe calculation pipeline
//!
//! For each ingredient: search the catalog, pick the best candidate, fetch
//! only the winner, normalize its nutrients, resolve the requested quantity
//! into a conversion factor and scale. Problems with one ingredient become
//! warnings on that ingredient, including a catalog that stops answering
//! mid-run. Only a failed pre-flight check or a rejected API key stops the
//! run.

use thiserror::Error;

use crate::catalog::{CatalogError, CatalogSearchService};
use crate::config::PipelineOptions;
use crate::io::{IngredientSource, SourceError};
use crate::models::{IngredientNutrition, IngredientRequest, RecipeNutrition, Warning};
use crate::nutrition::{aggregate, compute, extract, resolve_factor, CatalogMatcher};

/// Errors that abort the whole run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("catalog unavailable: {0}")]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Computes recipe nutrition against a catalog
pub struct RecipeCalculator<S> {
    catalog: S,
    matcher: CatalogMatcher,
    options: PipelineOptions,
}

impl<S: CatalogSearchService> RecipeCalculator<S> {
    pub fn new(catalog: S, options: PipelineOptions) -> Self {
        Self {
            catalog,
            matcher: CatalogMatcher::new(options.match_threshold),
            options,
        }
    }

    pub fn catalog(&self) -> &S {
        &self.catalog
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Compute one ingredient. Never fails: every problem is recorded as a
    /// warning and the ingredient contributes zero or nothing.
    pub fn process_ingredient(&self, request: IngredientRequest) -> IngredientNutrition {
        match self.try_process(&request) {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Catalog failure while processing '{}': {}", request.name, e);
                IngredientNutrition::empty(request, vec![Warning::error(e.to_string())])
            }
        }
    }

    /// Compute every ingredient in order and total them
    pub fn calculate<I>(&self, requests: I) -> RecipeNutrition
    where
        I: IntoIterator<Item = IngredientRequest>,
    {
        requests
            .into_iter()
            .map(|request| self.process_ingredient(request))
            .collect()
    }

    /// Run a whole recipe from a source.
    ///
    /// The catalog is checked before the first row is read and any failure
    /// there aborts. Malformed rows are logged and skipped. After the check,
    /// only a rejected API key aborts; outages and timeouts fail the
    /// ingredient at hand.
    pub fn run(&self, source: &dyn IngredientSource) -> Result<RecipeNutrition, PipelineError> {
        self.catalog.ping().map_err(|e| {
            tracing::error!("Catalog pre-flight check failed: {}", e);
            e
        })?;

        let mut results = Vec::new();
        let mut skipped = 0usize;

        for row in source.ingredients()? {
            let request = match row {
                Ok(request) => request,
                Err(e) => {
                    tracing::warn!("Skipping invalid row: {}", e);
                    skipped += 1;
                    continue;
                }
            };

            match self.try_process(&request) {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::error!("Aborting run at '{}': {}", request.name, e);
                    return Err(PipelineError::Catalog(e));
                }
            }
        }

        if skipped > 0 {
            tracing::warn!("Skipped {} malformed ingredient rows", skipped);
        }

        Ok(aggregate(results))
    }

    /// Per-ingredient flow; only `CatalogError::is_fatal` errors escape
    fn try_process(&self, request: &IngredientRequest) -> Result<IngredientNutrition, CatalogError> {
        tracing::info!(
            "Processing ingredient: {} {} {}",
            request.amount,
            request.unit,
            request.name
        );

        let fail = |message: String| -> Result<IngredientNutrition, CatalogError> {
            tracing::error!("{}", message);
            Ok(IngredientNutrition::empty(
                request.clone(),
                vec![Warning::error(message)],
            ))
        };

        let candidates = match self.catalog.search_candidates(&request.name) {
            Ok(candidates) => candidates,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => return fail(format!("search for '{}' failed: {}", request.name, e)),
        };

        let matched = match self.matcher.best_match(&request.name, &candidates) {
            Ok(matched) => matched,
            Err(no_match) => return fail(no_match.to_string()),
        };
        let match_score = matched.score;
        tracing::info!(
            "Matched '{}' to {} '{}' (score {:.1})",
            request.name,
            matched.entry.id,
            matched.entry.description,
            match_score
        );

        let entry = match self.catalog.fetch_entry(matched.entry.id) {
            Ok(entry) => entry,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => return fail(format!("fetching entry {} failed: {}", matched.entry.id, e)),
        };

        if tracing::enabled!(tracing::Level::DEBUG) {
            if let Ok(dump) = serde_yaml::to_string(&entry) {
                tracing::debug!("Fetched entry for '{}':\n{}", request.name, dump);
            }
        }

        let extraction = extract(&entry);
        let mut warnings = extraction.warnings;

        let resolution = match resolve_factor(&entry, request.amount, &request.unit, self.options.fallback) {
            Ok(resolution) => resolution,
            Err(e) => {
                tracing::error!("Could not resolve quantity for '{}': {}", request.name, e);
                warnings.push(Warning::error(e.to_string()));
                return Ok(IngredientNutrition {
                    request: request.clone(),
                    matched_entry: Some(entry),
                    match_score: Some(match_score),
                    conversion_factor: None,
                    resolution: None,
                    nutrients: extraction.nutrients.zeroed(),
                    warnings,
                });
            }
        };
        warnings.extend(resolution.warnings);

        let factor = resolution.factor.value();
        let nutrients = match compute(&extraction.nutrients, factor) {
            Ok(nutrients) => nutrients,
            Err(e) => {
                tracing::error!("Could not scale nutrients for '{}': {}", request.name, e);
                warnings.push(Warning::error(e.to_string()));
                extraction.nutrients.zeroed()
            }
        };

        tracing::info!(
            "'{}': factor {:.4} via {:?}, {} nutrients, {} warnings",
            request.name,
            factor,
            resolution.method,
            nutrients.len(),
            warnings.len()
        );

        Ok(IngredientNutrition {
            request: request.clone(),
            matched_entry: Some(entry),
            match_score: Some(match_score),
            conversion_factor: Some(factor),
            resolution: Some(resolution.method),
            nutrients,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::models::{EntryId, Portion, RawNutrient, ReferenceEntry, WarningLevel};
    use crate::nutrition::{FallbackPolicy, ResolutionMethod};

    fn broccoli() -> ReferenceEntry {
        ReferenceEntry::new(747447u64, "Broccoli, raw")
            .with_portion(Portion::new("cup", 91.0).with_modifier("chopped"))
            .with_portion(Portion::new("stalk", 151.0))
            .with_nutrient(RawNutrient::new(1008, "Energy", "KCAL", 34.0))
            .with_nutrient(RawNutrient::new(1003, "Protein", "G", 2.57))
    }

    fn broccoli_frozen() -> ReferenceEntry {
        ReferenceEntry::new(169967u64, "Broccoli, frozen, chopped, unprepared")
            .with_portion(Portion::new("package (10 oz)", 284.0))
            .with_nutrient(RawNutrient::new(1008, "Energy", "KCAL", 29.0))
    }

    fn olive_oil() -> ReferenceEntry {
        ReferenceEntry::new(748608u64, "Oil, olive, extra virgin")
            .with_portion(Portion::new("tbsp", 13.5))
            .with_nutrient(RawNutrient::new(1008, "Energy", "KCAL", 884.0))
            .with_nutrient(RawNutrient::new(1004, "Total lipid (fat)", "G", 100.0))
    }

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::new(vec![broccoli(), broccoli_frozen(), olive_oil()])
    }

    fn request(name: &str, amount: f64, unit: &str) -> IngredientRequest {
        IngredientRequest::new(name, amount, unit).unwrap()
    }

    #[test]
    fn test_broccoli_two_cups() {
        let calculator = RecipeCalculator::new(catalog(), PipelineOptions::default());
        let result = calculator.process_ingredient(request("Broccoli, raw", 2.0, "cups"));

        assert_eq!(result.matched_entry.as_ref().unwrap().id, EntryId(747447));
        assert_eq!(result.resolution, Some(ResolutionMethod::StandardPortion));
        assert!((result.conversion_factor.unwrap() - 1.82).abs() < 1e-9);
        assert!((result.nutrients.get("energy").unwrap().amount - 61.88).abs() < 1e-9);
        assert_eq!(result.nutrients.get("energy").unwrap().unit, "kcal");
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_only_winner_is_fetched() {
        let calculator = RecipeCalculator::new(catalog(), PipelineOptions::default());
        calculator.process_ingredient(request("broccoli raw", 1.0, "cup"));

        assert_eq!(calculator.catalog().search_count(), 1);
        assert_eq!(calculator.catalog().fetched_ids(), vec![EntryId(747447)]);
    }

    #[test]
    fn test_no_match_then_success() {
        let calculator = RecipeCalculator::new(catalog(), PipelineOptions::default());
        let recipe = calculator.calculate(vec![
            request("unobtainium", 1.0, "g"),
            request("olive oil extra virgin", 2.0, "tbsp"),
        ]);

        assert_eq!(recipe.ingredients.len(), 2);
        let missing = &recipe.ingredients[0];
        assert_eq!(missing.request.name, "unobtainium");
        assert!(missing.nutrients.is_empty());
        assert_eq!(missing.warnings[0].level, WarningLevel::Error);

        // 2 tbsp x 13.5 g = 27 g -> 0.27 x 884 kcal
        let energy = recipe.totals.get("energy").unwrap().amount;
        assert!((energy - 238.68).abs() < 1e-9);
        assert!((recipe.totals.get("fat").unwrap().amount - 27.0).abs() < 1e-9);
        assert_eq!(recipe.failed_ingredients(), 1);
    }

    #[test]
    fn test_fallback_portion_warns() {
        let calculator = RecipeCalculator::new(catalog(), PipelineOptions::default());
        let result = calculator.process_ingredient(request("broccoli raw", 1.0, "handful"));

        assert_eq!(result.resolution, Some(ResolutionMethod::FallbackPortion));
        assert!((result.conversion_factor.unwrap() - 0.91).abs() < 1e-9);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.level == WarningLevel::Warning && w.message.contains("fallback portion")));
        assert!(!result.has_errors());
    }

    #[test]
    fn test_strict_policy_zeroes_ingredient() {
        let options = PipelineOptions::new(60.0, FallbackPolicy::Strict).unwrap();
        let calculator = RecipeCalculator::new(catalog(), options);
        let result = calculator.process_ingredient(request("broccoli raw", 1.0, "handful"));

        assert!(result.has_errors());
        assert!(result.matched_entry.is_some());
        assert_eq!(result.conversion_factor, None);
        assert_eq!(result.nutrients.get("energy").unwrap().amount, 0.0);
    }

    #[test]
    fn test_weight_units_convert_directly() {
        let calculator = RecipeCalculator::new(catalog(), PipelineOptions::default());
        let result = calculator.process_ingredient(request("broccoli raw", 250.0, "g"));

        assert_eq!(result.resolution, Some(ResolutionMethod::UnitConversion));
        assert!((result.nutrients.get("energy").unwrap().amount - 85.0).abs() < 1e-9);
    }

    #[test]
    fn test_run_skips_malformed_rows() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"broccoli raw, 2, cup\nsalt, a pinch\nolive oil extra virgin, 1, tbsp\n")
            .unwrap();
        let source = crate::io::CsvIngredientSource::new(file.path());

        let calculator = RecipeCalculator::new(catalog(), PipelineOptions::default());
        let recipe = calculator.run(&source).unwrap();

        assert_eq!(recipe.ingredients.len(), 2);
        assert_eq!(recipe.ingredients[0].request.name, "broccoli raw");
        assert_eq!(recipe.ingredients[1].request.name, "olive oil extra virgin");
        assert_eq!(calculator.catalog().search_count(), 2);
    }

    #[test]
    fn test_run_from_request_list() {
        let calculator = RecipeCalculator::new(catalog(), PipelineOptions::default());
        let source = vec![request("broccoli raw", 2.0, "cup")];

        let recipe = calculator.run(&source).unwrap();
        assert!((recipe.totals.get("energy").unwrap().amount - 61.88).abs() < 1e-9);
    }

    #[test]
    fn test_run_aborts_when_catalog_unavailable() {
        let catalog = catalog();
        catalog.set_unavailable(true);
        let calculator = RecipeCalculator::new(catalog, PipelineOptions::default());

        let source = vec![request("broccoli raw", 2.0, "cup")];
        assert!(matches!(
            calculator.run(&source),
            Err(PipelineError::Catalog(CatalogError::Unreachable(_)))
        ));
        assert_eq!(calculator.catalog().search_count(), 0);
    }

    fn three_rows() -> Vec<IngredientRequest> {
        vec![
            request("broccoli raw", 2.0, "cup"),
            request("frozen broccoli", 1.0, "package"),
            request("olive oil extra virgin", 1.0, "tbsp"),
        ]
    }

    fn assert_failed_then_recovered(recipe: &RecipeNutrition) {
        assert_eq!(recipe.ingredients.len(), 3);
        assert!(!recipe.ingredients[0].has_errors());

        let failed = &recipe.ingredients[1];
        assert!(failed.nutrients.is_empty());
        assert_eq!(failed.warnings.len(), 1);
        assert_eq!(failed.warnings[0].level, WarningLevel::Error);

        let oil = &recipe.ingredients[2];
        assert!(!oil.has_errors());
        assert!((oil.nutrients.get("energy").unwrap().amount - 119.34).abs() < 1e-9);

        // 61.88 kcal broccoli + 119.34 kcal oil
        let energy = recipe.totals.get("energy").unwrap().amount;
        assert!((energy - 181.22).abs() < 1e-9);
        assert_eq!(recipe.failed_ingredients(), 1);
    }

    #[test]
    fn test_run_continues_after_mid_run_outage() {
        let catalog = catalog();
        catalog.fail_search(
            "frozen broccoli",
            CatalogError::Unreachable("connection reset by peer".into()),
        );
        let calculator = RecipeCalculator::new(catalog, PipelineOptions::default());

        let recipe = calculator.run(&three_rows()).unwrap();
        assert_failed_then_recovered(&recipe);
        assert!(recipe.ingredients[1].warnings[0].message.contains("connection reset"));
        assert_eq!(calculator.catalog().search_count(), 3);
    }

    #[test]
    fn test_run_continues_after_timeout() {
        let catalog = catalog();
        catalog.fail_fetch(EntryId(169967), CatalogError::Timeout("operation timed out".into()));
        let calculator = RecipeCalculator::new(catalog, PipelineOptions::default());

        let recipe = calculator.run(&three_rows()).unwrap();
        assert_failed_then_recovered(&recipe);
        assert!(recipe.ingredients[1].warnings[0].message.contains("timed out"));
    }

    #[test]
    fn test_run_continues_after_server_error_on_search() {
        let catalog = catalog();
        catalog.fail_search(
            "frozen broccoli",
            CatalogError::Http {
                status: 500,
                message: "Internal Server Error".into(),
            },
        );
        let calculator = RecipeCalculator::new(catalog, PipelineOptions::default());

        let recipe = calculator.run(&three_rows()).unwrap();
        assert_failed_then_recovered(&recipe);
        assert!(recipe.ingredients[1].warnings[0].message.contains("HTTP 500"));
        assert!(recipe.ingredients[1].matched_entry.is_none());
    }

    #[test]
    fn test_run_continues_after_missing_entry() {
        let catalog = catalog();
        catalog.fail_fetch(EntryId(169967), CatalogError::NotFound(EntryId(169967)));
        let calculator = RecipeCalculator::new(catalog, PipelineOptions::default());

        let recipe = calculator.run(&three_rows()).unwrap();
        assert_failed_then_recovered(&recipe);
        assert!(recipe.ingredients[1].warnings[0].message.contains("169967"));
        assert_eq!(
            calculator.catalog().fetched_ids(),
            vec![EntryId(747447), EntryId(169967), EntryId(748608)]
        );
    }

    #[test]
    fn test_process_ingredient_records_search_failure() {
        let catalog = catalog();
        catalog.fail_search("broccoli raw", CatalogError::Decode("unexpected end of input".into()));
        let calculator = RecipeCalculator::new(catalog, PipelineOptions::default());

        let result = calculator.process_ingredient(request("broccoli raw", 1.0, "cup"));
        assert!(result.has_errors());
        assert!(result.nutrients.is_empty());
        assert_eq!(calculator.catalog().fetch_count(), 0);
    }

    #[test]
    fn test_run_aborts_on_rejected_key_mid_run() {
        let catalog = catalog();
        catalog.fail_search("frozen broccoli", CatalogError::Unauthorized("HTTP 403".into()));
        let calculator = RecipeCalculator::new(catalog, PipelineOptions::default());

        assert!(matches!(
            calculator.run(&three_rows()),
            Err(PipelineError::Catalog(CatalogError::Unauthorized(_)))
        ));
        // Nothing after the rejected request is attempted
        assert_eq!(calculator.catalog().search_count(), 2);
    }

    #[test]
    fn test_empty_recipe() {
        let calculator = RecipeCalculator::new(catalog(), PipelineOptions::default());
        let recipe = calculator.calculate(Vec::new());
        assert!(recipe.ingredients.is_empty());
        assert!(recipe.totals.is_empty());
    }
}
