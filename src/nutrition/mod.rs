//! Nutrition calculation module
//!
//! Catalog matching, unit conversion, portion resolution, nutrient
//! normalization and aggregation.

pub mod aggregator;
pub mod calculator;
pub mod converter;
pub mod extractor;
pub mod matcher;
pub mod portion;
pub mod units;

pub use aggregator::aggregate;
pub use calculator::compute;
pub use converter::{convert, parse_unit, to_grams, to_ml, Density};
pub use extractor::{canonical_nutrient_id, extract, normalize_nutrient_unit, Extraction};
pub use matcher::{similarity, Candidate, CatalogMatcher, MatchResult, NoMatch, DEFAULT_MATCH_THRESHOLD};
pub use portion::{
    resolve_factor, ComputationError, ConversionFactor, FallbackPolicy, PortionError, Resolution,
    ResolutionMethod, NUTRIENT_BASE_GRAMS,
};
pub use units::{
    canonical_unit, categorize_unit, grams_per_unit, ml_per_unit, normalize_unit, ParsedUnit,
    UnitCategory, UnitError,
};
