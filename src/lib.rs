//! Recipe Nutrition Library
//!
//! Resolves recipe ingredients against a nutrition catalog, converts the
//! requested quantities into catalog portions and totals the nutrients.

pub mod build_info;
pub mod catalog;
pub mod config;
pub mod db;
pub mod io;
pub mod models;
pub mod nutrition;
pub mod pipeline;

pub use pipeline::{PipelineError, RecipeCalculator};
