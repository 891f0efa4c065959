//! Recipe Nutrition
//!
//! Reads a recipe CSV (`ingredient, quantity, unit`), looks each ingredient
//! up in USDA FoodData Central and writes per-ingredient and total
//! nutrition to a YAML report.

use std::fs::OpenOptions;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use recipe_nutrition::build_info;
use recipe_nutrition::catalog::{CachedCatalog, CatalogSearchService, FdcClient};
use recipe_nutrition::config::{
    default_cache_path, CacheConfig, EnvCredentialProvider, FdcConfig, PipelineOptions,
};
use recipe_nutrition::db::Database;
use recipe_nutrition::io::{export_entry, CsvIngredientSource, ReportSink, YamlReportSink};
use recipe_nutrition::models::RecipeNutrition;
use recipe_nutrition::nutrition::{FallbackPolicy, DEFAULT_MATCH_THRESHOLD};
use recipe_nutrition::RecipeCalculator;

#[derive(Parser, Debug)]
#[command(
    name = "recipe-nutrition",
    version,
    about = "Compute recipe nutrition from USDA FoodData Central",
    long_about = "Reads a headerless CSV of `ingredient, quantity, unit` rows, matches each \
                  ingredient against FoodData Central and writes per-ingredient and total \
                  nutrients to a YAML report. The API key is read from API_FoodData_Central."
)]
struct Cli {
    /// Recipe CSV file; prompted for when omitted
    csv: Option<PathBuf>,

    /// Report output path
    #[arg(long, short = 'o', default_value = "recipe_nutrition.yaml")]
    output: PathBuf,

    /// Minimum match score (0-100) for accepting a catalog entry
    #[arg(long, default_value_t = DEFAULT_MATCH_THRESHOLD)]
    threshold: f64,

    /// Candidates requested per search
    #[arg(long, default_value_t = 5)]
    page_size: u32,

    /// FoodData Central data type to search
    #[arg(long, default_value = "Foundation")]
    data_type: String,

    /// Fail ingredients whose unit matches no portion instead of using the
    /// entry's first portion
    #[arg(long)]
    strict_portions: bool,

    /// Also write each matched catalog entry to <dir>/<ingredient>.yaml
    #[arg(long)]
    entries_dir: Option<PathBuf>,

    /// Response cache database (default: data/fdc_cache.db or
    /// RECIPE_NUTRITION_CACHE_PATH)
    #[arg(long, conflicts_with = "no_cache")]
    cache: Option<PathBuf>,

    /// Disable the response cache
    #[arg(long)]
    no_cache: bool,

    /// Hours before a cached response is refetched
    #[arg(long, default_value_t = 24)]
    cache_ttl_hours: u64,

    /// Log file
    #[arg(long, default_value = "recipe_nutrition.log")]
    log_file: PathBuf,

    /// Debug-level file logging, including fetched entries
    #[arg(long, short = 'v')]
    verbose: bool,
}

/// Console gets warnings and up (RUST_LOG overrides); the log file gets
/// info, or debug when verbose
fn init_logging(cli: &Cli) -> Result<()> {
    let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(console_filter);

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&cli.log_file)
        .with_context(|| format!("opening log file {}", cli.log_file.display()))?;
    let file_level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .with_filter(file_level);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("initializing logging")?;
    Ok(())
}

/// Ask for the CSV file name on stdin
fn prompt_for_csv() -> Result<PathBuf> {
    print!("Please enter the name of the CSV file: ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("reading CSV file name")?;

    let name = line.trim();
    if name.is_empty() {
        bail!("no CSV file given");
    }
    Ok(PathBuf::from(name))
}

fn build_catalog(cli: &Cli) -> Result<Box<dyn CatalogSearchService>> {
    let config = FdcConfig {
        data_type: cli.data_type.clone(),
        page_size: cli.page_size,
        ..FdcConfig::from_env()
    };
    config.validate()?;
    let scope = format!("{}:{}", config.data_type, config.page_size);

    let client = FdcClient::new(config, &EnvCredentialProvider::default())?;
    tracing::info!("Using FoodData Central at {}", client.config().base_url);

    if cli.no_cache {
        return Ok(Box::new(client));
    }

    let cache = CacheConfig::new(
        cli.cache.clone().unwrap_or_else(default_cache_path),
        cli.cache_ttl_hours,
    )?;
    match Database::open(&cache.path) {
        Ok(db) => Ok(Box::new(CachedCatalog::new(client, db, cache.ttl_hours, scope))),
        Err(e) => {
            tracing::warn!(
                "Response cache {} unavailable, continuing without it: {}",
                cache.path.display(),
                e
            );
            Ok(Box::new(client))
        }
    }
}

fn export_entries(dir: &std::path::Path, recipe: &RecipeNutrition) {
    for ingredient in &recipe.ingredients {
        if let Some(entry) = &ingredient.matched_entry {
            if let Err(e) = export_entry(dir, &ingredient.request.name, entry) {
                tracing::error!("Error exporting entry for '{}': {}", ingredient.request.name, e);
            }
        }
    }
}

fn print_summary(recipe: &RecipeNutrition, output: &std::path::Path) {
    println!(
        "Processed {} ingredients ({} with warnings, {} failed)",
        recipe.ingredients.len(),
        recipe.ingredients_with_warnings(),
        recipe.failed_ingredients()
    );
    for ingredient in recipe.ingredients.iter().filter(|i| !i.warnings.is_empty()) {
        for warning in &ingredient.warnings {
            println!("  {}: {}", ingredient.request.name, warning);
        }
    }
    if let Some(energy) = recipe.totals.get("energy") {
        println!("Total energy: {:.1} {}", energy.amount, energy.unit);
    }
    println!("Report written to {}", output.display());
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;
    build_info::print_startup_banner();

    let options = PipelineOptions::new(
        cli.threshold,
        if cli.strict_portions {
            FallbackPolicy::Strict
        } else {
            FallbackPolicy::FirstPortion
        },
    )?;

    // Credentials are checked before the recipe is read
    let catalog = build_catalog(&cli).context("setting up the FoodData Central client")?;

    let csv = match &cli.csv {
        Some(path) => path.clone(),
        None => prompt_for_csv()?,
    };
    let source = CsvIngredientSource::new(&csv);

    let calculator = RecipeCalculator::new(catalog, options);
    let recipe = calculator
        .run(&source)
        .with_context(|| format!("computing nutrition for {}", csv.display()))?;

    YamlReportSink::new(&cli.output)
        .write_report(&recipe)
        .context("writing the nutrition report")?;

    if let Some(dir) = &cli.entries_dir {
        export_entries(dir, &recipe);
    }

    print_summary(&recipe, &cli.output);
    Ok(())
}
