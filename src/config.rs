//! Runtime configuration
//!
//! Settings for the catalog client, the response cache and the pipeline,
//! plus the credential provider handed to the catalog client.

use std::path::PathBuf;

use thiserror::Error;

use crate::nutrition::{FallbackPolicy, DEFAULT_MATCH_THRESHOLD};

/// Environment variable holding the FoodData Central API key
pub const API_KEY_ENV: &str = "API_FoodData_Central";

/// Environment variable overriding the cache database location
pub const CACHE_PATH_ENV: &str = "RECIPE_NUTRITION_CACHE_PATH";

/// Environment variable overriding the FoodData Central base URL
pub const BASE_URL_ENV: &str = "FDC_BASE_URL";

/// Default FoodData Central API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.nal.usda.gov/fdc/v1";

/// Calls allowed per rate limit window
pub const DEFAULT_RATE_LIMIT: u32 = 1000;

/// Rate limit window in seconds
pub const DEFAULT_RATE_PERIOD_SECS: u64 = 3600;

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("match threshold {0} must be between 0 and 100")]
    InvalidThreshold(f64),

    #[error("page size {0} must be between 1 and 200")]
    InvalidPageSize(u32),

    #[error("rate limit must allow at least one call per window")]
    InvalidRateLimit,

    #[error("cache TTL must be at least one hour")]
    InvalidCacheTtl,
}

/// Credential errors; always fatal for a run
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("API key not found: set the {0} environment variable")]
    Missing(String),

    #[error("API key in {0} is empty")]
    Empty(String),
}

/// Source of the catalog API credential
pub trait CredentialProvider {
    fn api_key(&self) -> Result<String, CredentialError>;
}

/// Reads the API key from an environment variable
#[derive(Debug, Clone)]
pub struct EnvCredentialProvider {
    var: String,
}

impl EnvCredentialProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvCredentialProvider {
    fn default() -> Self {
        Self::new(API_KEY_ENV)
    }
}

impl CredentialProvider for EnvCredentialProvider {
    fn api_key(&self) -> Result<String, CredentialError> {
        let key = std::env::var(&self.var).map_err(|_| CredentialError::Missing(self.var.clone()))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(CredentialError::Empty(self.var.clone()));
        }
        Ok(key.to_string())
    }
}

/// A fixed API key, e.g. from a secrets manager or a test
#[derive(Debug, Clone)]
pub struct StaticCredentialProvider(String);

impl StaticCredentialProvider {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

impl CredentialProvider for StaticCredentialProvider {
    fn api_key(&self) -> Result<String, CredentialError> {
        if self.0.trim().is_empty() {
            return Err(CredentialError::Empty("static credential".to_string()));
        }
        Ok(self.0.trim().to_string())
    }
}

/// FoodData Central client configuration
#[derive(Debug, Clone, PartialEq)]
pub struct FdcConfig {
    /// Base URL for the API (default: <https://api.nal.usda.gov/fdc/v1>)
    pub base_url: String,
    /// Data type filter for searches ("Foundation", "SR Legacy", ...)
    pub data_type: String,
    /// Candidates requested per search (1-200)
    pub page_size: u32,
    /// Calls allowed per `rate_period_secs`
    pub rate_limit: u32,
    pub rate_period_secs: u64,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for FdcConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            data_type: "Foundation".to_string(),
            page_size: 5,
            rate_limit: DEFAULT_RATE_LIMIT,
            rate_period_secs: DEFAULT_RATE_PERIOD_SECS,
            timeout_secs: 30,
        }
    }
}

impl FdcConfig {
    /// Defaults, with the base URL taken from the environment if set
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                config.base_url = url.trim().trim_end_matches('/').to_string();
            }
        }
        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 || self.page_size > 200 {
            return Err(ConfigError::InvalidPageSize(self.page_size));
        }
        if self.rate_limit == 0 || self.rate_period_secs == 0 {
            return Err(ConfigError::InvalidRateLimit);
        }
        Ok(())
    }
}

/// Response cache configuration
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub path: PathBuf,
    pub ttl_hours: u64,
}

impl CacheConfig {
    pub fn new(path: PathBuf, ttl_hours: u64) -> Result<Self, ConfigError> {
        if ttl_hours == 0 {
            return Err(ConfigError::InvalidCacheTtl);
        }
        Ok(Self { path, ttl_hours })
    }
}

/// Get the cache database path from environment or use default
pub fn default_cache_path() -> PathBuf {
    std::env::var(CACHE_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let mut path = PathBuf::from("data");
            path.push("fdc_cache.db");
            path
        })
}

/// Pipeline behavior
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineOptions {
    /// Minimum similarity score (0-100) for accepting a catalog match
    pub match_threshold: f64,
    pub fallback: FallbackPolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            fallback: FallbackPolicy::FirstPortion,
        }
    }
}

impl PipelineOptions {
    pub fn new(match_threshold: f64, fallback: FallbackPolicy) -> Result<Self, ConfigError> {
        if !(0.0..=100.0).contains(&match_threshold) {
            return Err(ConfigError::InvalidThreshold(match_threshold));
        }
        Ok(Self {
            match_threshold,
            fallback,
        })
    }
}
