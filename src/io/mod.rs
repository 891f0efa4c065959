//! Recipe input and report output
//!
//! Ingredient lines are read through [`IngredientSource`] and finished
//! recipes are persisted through [`ReportSink`].

pub mod report;
pub mod source;

pub use report::{export_entry, render_yaml, slugify, ReportError, ReportSink, YamlReportSink};
pub use source::{parse_amount, CsvIngredientSource, IngredientSource, RowError, SourceError};
