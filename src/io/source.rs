//! Ingredient sources
//!
//! Recipe lines come from an [`IngredientSource`]. The CSV source reads
//! `name, amount, unit` rows without a header; rows that cannot become a
//! request are reported with their row number and skipped by the caller.

use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim};
use thiserror::Error;

use crate::models::IngredientRequest;

/// The source as a whole cannot be read
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("could not open ingredient file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// One record could not be turned into a request
#[derive(Debug, Clone, PartialEq, Error)]
#[error("row {row}: {reason}")]
pub struct RowError {
    /// 1-based record number
    pub row: usize,
    pub reason: String,
}

/// Lazy, finite sequence of ingredient requests
///
/// Each call to [`IngredientSource::ingredients`] re-reads the source from
/// the start.
pub trait IngredientSource {
    fn ingredients(
        &self,
    ) -> Result<Box<dyn Iterator<Item = Result<IngredientRequest, RowError>> + '_>, SourceError>;
}

impl IngredientSource for Vec<IngredientRequest> {
    fn ingredients(
        &self,
    ) -> Result<Box<dyn Iterator<Item = Result<IngredientRequest, RowError>> + '_>, SourceError> {
        Ok(Box::new(self.iter().cloned().map(Ok)))
    }
}

/// Headerless `name, amount, unit` CSV file
#[derive(Debug, Clone)]
pub struct CsvIngredientSource {
    path: PathBuf,
}

impl CsvIngredientSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IngredientSource for CsvIngredientSource {
    fn ingredients(
        &self,
    ) -> Result<Box<dyn Iterator<Item = Result<IngredientRequest, RowError>> + '_>, SourceError> {
        tracing::info!("Loading ingredients from {}", self.path.display());

        let reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .comment(Some(b'#'))
            .from_path(&self.path)
            .map_err(|source| SourceError::Open {
                path: self.path.clone(),
                source,
            })?;

        let rows = reader
            .into_records()
            .enumerate()
            .map(|(index, record)| {
                let row = index + 1;
                record
                    .map_err(|e| RowError {
                        row,
                        reason: e.to_string(),
                    })
                    .and_then(|record| parse_record(row, &record))
            });

        Ok(Box::new(rows))
    }
}

fn parse_record(row: usize, record: &StringRecord) -> Result<IngredientRequest, RowError> {
    let fail = |reason: String| RowError { row, reason };

    if record.len() != 3 {
        return Err(fail(format!(
            "expected 3 fields (ingredient, quantity, unit), found {}: {:?}",
            record.len(),
            record.iter().collect::<Vec<_>>()
        )));
    }

    let amount = parse_amount(&record[1])
        .ok_or_else(|| fail(format!("quantity '{}' is not a number", &record[1])))?;

    IngredientRequest::new(&record[0], amount, &record[2]).map_err(|e| fail(e.to_string()))
}

/// Parse a recipe quantity: `2`, `0.5`, `1/2` or `1 1/2`
pub fn parse_amount(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let value = match text.split_once(' ') {
        Some((whole, fraction)) => {
            let whole: f64 = whole.trim().parse().ok()?;
            if whole < 0.0 {
                return None;
            }
            whole + parse_fraction(fraction.trim())?
        }
        None => match parse_fraction(text) {
            Some(fraction) => fraction,
            None => text.parse().ok()?,
        },
    };

    value.is_finite().then_some(value)
}

fn parse_fraction(text: &str) -> Option<f64> {
    let (num, den) = text.split_once('/')?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    (num >= 0.0 && den > 0.0).then(|| num / den)
}
