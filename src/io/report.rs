//! Report output
//!
//! A [`ReportSink`] persists a finished [`RecipeNutrition`]. The YAML sink
//! writes one document with per-ingredient detail followed by the totals;
//! nutrient keys come out in id order so reports diff cleanly.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::build_info::BuildInfo;
use crate::models::{
    EntryId, IngredientNutrition, IngredientRequest, NutrientMap, Portion, RecipeNutrition,
    ReferenceEntry, Warning,
};
use crate::nutrition::ResolutionMethod;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("could not write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not serialize report: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

/// Destination for a computed recipe
pub trait ReportSink {
    fn write_report(&self, recipe: &RecipeNutrition) -> Result<(), ReportError>;
}

// ============================================================================
// Report document
// ============================================================================

#[derive(Debug, Serialize)]
struct ReportDocument<'a> {
    generator: BuildInfo,
    generated_at: DateTime<Utc>,
    ingredients: Vec<IngredientReport<'a>>,
    totals: &'a NutrientMap,
}

#[derive(Debug, Serialize)]
struct IngredientReport<'a> {
    request: &'a IngredientRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    matched_entry: Option<MatchedEntry<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    match_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    conversion_factor: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolution: Option<ResolutionMethod>,
    nutrients: &'a NutrientMap,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
}

/// Entry summary for the report; raw nutrient records are left out
#[derive(Debug, Serialize)]
struct MatchedEntry<'a> {
    id: EntryId,
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data_type: Option<&'a str>,
    portions: &'a [Portion],
}

impl<'a> From<&'a ReferenceEntry> for MatchedEntry<'a> {
    fn from(entry: &'a ReferenceEntry) -> Self {
        Self {
            id: entry.id,
            description: &entry.description,
            category: entry.category.as_deref(),
            data_type: entry.data_type.as_deref(),
            portions: &entry.portions,
        }
    }
}

impl<'a> From<&'a IngredientNutrition> for IngredientReport<'a> {
    fn from(item: &'a IngredientNutrition) -> Self {
        Self {
            request: &item.request,
            matched_entry: item.matched_entry.as_ref().map(MatchedEntry::from),
            match_score: item.match_score.map(round2),
            conversion_factor: item.conversion_factor.map(round4),
            resolution: item.resolution,
            nutrients: &item.nutrients,
            warnings: item.warnings.iter().map(Warning::to_string).collect(),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Render a recipe as a YAML document
pub fn render_yaml(recipe: &RecipeNutrition) -> Result<String, ReportError> {
    let document = ReportDocument {
        generator: BuildInfo::current(),
        generated_at: Utc::now(),
        ingredients: recipe.ingredients.iter().map(IngredientReport::from).collect(),
        totals: &recipe.totals,
    };
    Ok(serde_yaml::to_string(&document)?)
}

fn write_file(path: &Path, contents: &str) -> Result<(), ReportError> {
    let io_err = |source: std::io::Error| ReportError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
    }

    let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
    writer.write_all(contents.as_bytes()).map_err(io_err)?;
    writer.flush().map_err(io_err)
}

/// Writes the report to a YAML file, replacing any previous report
#[derive(Debug, Clone)]
pub struct YamlReportSink {
    path: PathBuf,
}

impl YamlReportSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReportSink for YamlReportSink {
    fn write_report(&self, recipe: &RecipeNutrition) -> Result<(), ReportError> {
        let yaml = render_yaml(recipe)?;
        write_file(&self.path, &yaml)?;
        tracing::info!(
            "Wrote report for {} ingredients to {}",
            recipe.ingredients.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// File-name-safe form of an ingredient name ("Olive Oil" -> "olive_oil")
pub fn slugify(name: &str) -> String {
    let slug: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    let slug = slug
        .split('_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    if slug.is_empty() {
        "ingredient".to_string()
    } else {
        slug
    }
}

/// Write a full catalog entry to `<dir>/<slug of name>.yaml`
pub fn export_entry(dir: &Path, name: &str, entry: &ReferenceEntry) -> Result<PathBuf, ReportError> {
    let path = dir.join(format!("{}.yaml", slugify(name)));
    let yaml = serde_yaml::to_string(entry)?;
    write_file(&path, &yaml)?;
    tracing::debug!("Exported entry {} to {}", entry.id, path.display());
    Ok(path)
}
