//! USDA FoodData Central client
//!
//! Blocking client for the FoodData Central API with a sliding-window rate
//! limiter. Search hits become [`ReferenceEntrySummary`]s; food details
//! become [`ReferenceEntry`]s with raw nutrient records and portions.
//!
//! API reference: <https://fdc.nal.usda.gov/api-guide.html>

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::Deserialize;

use super::{CatalogError, CatalogSearchService};
use crate::config::{CredentialError, CredentialProvider, FdcConfig};
use crate::models::{EntryId, Portion, RawNutrient, ReferenceEntry, ReferenceEntrySummary};

/// Measure unit name FDC uses when the unit lives in the modifier text
const UNDETERMINED_UNIT: &str = "undetermined";

// ============================================================================
// Wire formats
// ============================================================================

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    foods: Vec<SearchFood>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchFood {
    fdc_id: u64,
    description: String,
    data_type: Option<String>,
    #[serde(default)]
    food_nutrients: Vec<SearchNutrient>,
}

#[derive(Debug, Deserialize)]
struct SearchNutrient {
    value: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FoodDetailsResponse {
    fdc_id: u64,
    description: String,
    data_type: Option<String>,
    /// An object with a description for Foundation/SR foods, a plain
    /// string for branded foods
    food_category: Option<serde_json::Value>,
    #[serde(default)]
    food_nutrients: Vec<FoodNutrientResponse>,
    #[serde(default)]
    food_portions: Vec<FoodPortionResponse>,
}

#[derive(Debug, Deserialize)]
struct FoodNutrientResponse {
    nutrient: Option<NutrientInfo>,
    amount: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NutrientInfo {
    id: Option<u32>,
    name: Option<String>,
    unit_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FoodPortionResponse {
    amount: Option<f64>,
    gram_weight: Option<f64>,
    modifier: Option<String>,
    portion_description: Option<String>,
    measure_unit: Option<MeasureUnit>,
}

#[derive(Debug, Deserialize)]
struct MeasureUnit {
    name: Option<String>,
}

impl SearchFood {
    fn into_summary(self) -> ReferenceEntrySummary {
        ReferenceEntrySummary {
            id: EntryId(self.fdc_id),
            description: self.description,
            data_type: self.data_type,
            nutrient_count: self
                .food_nutrients
                .iter()
                .filter(|n| n.value.is_some())
                .count(),
        }
    }
}

impl FoodPortionResponse {
    /// Convert to a portion, taking the unit from the modifier when the
    /// measure unit is undetermined ("cup, chopped" -> unit "cup")
    fn into_portion(self) -> Option<Portion> {
        let gram_weight = self.gram_weight.filter(|g| g.is_finite() && *g > 0.0)?;
        let amount = self.amount.filter(|a| a.is_finite() && *a > 0.0).unwrap_or(1.0);

        let measure = self
            .measure_unit
            .and_then(|m| m.name)
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty() && !n.eq_ignore_ascii_case(UNDETERMINED_UNIT));

        let modifier = self
            .modifier
            .or(self.portion_description)
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());

        let (unit, modifier) = match (measure, modifier) {
            (Some(unit), modifier) => (unit, modifier),
            (None, Some(text)) => match text.split_once(',') {
                Some((unit, rest)) => {
                    let rest = rest.trim();
                    (unit.trim().to_string(), (!rest.is_empty()).then(|| rest.to_string()))
                }
                None => (text, None),
            },
            (None, None) => return None,
        };

        Some(Portion {
            unit,
            amount,
            gram_weight,
            modifier,
        })
    }
}

impl FoodDetailsResponse {
    fn into_entry(self) -> ReferenceEntry {
        let category = self.food_category.and_then(|c| match c {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Object(map) => map
                .get("description")
                .and_then(|d| d.as_str())
                .map(str::to_string),
            _ => None,
        });

        let nutrients = self
            .food_nutrients
            .into_iter()
            .map(|n| {
                let info = n.nutrient;
                RawNutrient {
                    source_id: info.as_ref().and_then(|i| i.id),
                    name: info.as_ref().and_then(|i| i.name.clone()),
                    unit: info.as_ref().and_then(|i| i.unit_name.clone()),
                    amount: n.amount,
                }
            })
            .collect();

        let description = self.description;
        let portions = self
            .food_portions
            .into_iter()
            .filter_map(|p| {
                let portion = p.into_portion();
                if portion.is_none() {
                    tracing::debug!("Skipping unusable portion for '{}'", description);
                }
                portion
            })
            .collect();

        ReferenceEntry {
            id: EntryId(self.fdc_id),
            description,
            category,
            data_type: self.data_type,
            portions,
            nutrients,
        }
    }
}

// ============================================================================
// Rate limiting
// ============================================================================

/// Sliding-window rate limiter that blocks the caller until a slot is free
#[derive(Debug)]
struct RateLimiter {
    requests: VecDeque<Instant>,
    limit: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(limit: u32, window: Duration) -> Self {
        Self {
            requests: VecDeque::new(),
            limit: limit.max(1) as usize,
            window,
        }
    }

    /// Wait until a request can be made, then record it
    fn acquire(&mut self) {
        loop {
            let now = Instant::now();
            while self
                .requests
                .front()
                .is_some_and(|&t| now.duration_since(t) >= self.window)
            {
                self.requests.pop_front();
            }

            if self.requests.len() < self.limit {
                self.requests.push_back(now);
                return;
            }

            if let Some(&oldest) = self.requests.front() {
                let wait = self.window.saturating_sub(now.duration_since(oldest));
                tracing::info!("Rate limit reached, sleeping {:?}", wait);
                std::thread::sleep(wait);
            }
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// FoodData Central API client
pub struct FdcClient {
    config: FdcConfig,
    api_key: String,
    http: Client,
    rate_limiter: Mutex<RateLimiter>,
}

impl FdcClient {
    /// Create a client; fails when the credential is unavailable
    pub fn new(config: FdcConfig, credentials: &dyn CredentialProvider) -> Result<Self, CredentialError> {
        let api_key = credentials.api_key()?;
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            });
        let rate_limiter = RateLimiter::new(config.rate_limit, Duration::from_secs(config.rate_period_secs));

        Ok(Self {
            config,
            api_key,
            http,
            rate_limiter: Mutex::new(rate_limiter),
        })
    }

    pub fn config(&self) -> &FdcConfig {
        &self.config
    }

    fn wait_for_slot(&self) {
        let mut limiter = self
            .rate_limiter
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        limiter.acquire();
    }

    fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Response, CatalogError> {
        self.wait_for_slot();

        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), path);
        tracing::info!("FDC request: GET {}", url);

        let mut params: Vec<(&str, String)> = query.to_vec();
        params.push(("api_key", self.api_key.clone()));

        let response = self
            .http
            .get(&url)
            .query(&params)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    CatalogError::Timeout(e.to_string())
                } else {
                    CatalogError::Unreachable(e.to_string())
                }
            })?;

        check_status(response)
    }
}

/// Map non-success statuses onto catalog errors
fn check_status(response: Response) -> Result<Response, CatalogError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    let message: String = body.chars().take(200).collect();

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(CatalogError::Unauthorized(format!("HTTP {}", status.as_u16())))
        }
        _ => Err(CatalogError::Http {
            status: status.as_u16(),
            message,
        }),
    }
}

impl CatalogSearchService for FdcClient {
    fn search_candidates(&self, name: &str) -> Result<Vec<ReferenceEntrySummary>, CatalogError> {
        let query = name.trim();
        if query.is_empty() {
            return Err(CatalogError::InvalidQuery("search query cannot be empty".to_string()));
        }

        tracing::info!("Searching FDC for '{}'", query);
        let response = self.get(
            "foods/search",
            &[
                ("query", query.to_string()),
                ("dataType", self.config.data_type.clone()),
                ("pageSize", self.config.page_size.to_string()),
            ],
        )?;

        let parsed: SearchResponse = response
            .json()
            .map_err(|e| CatalogError::Decode(e.to_string()))?;

        let summaries: Vec<ReferenceEntrySummary> =
            parsed.foods.into_iter().map(SearchFood::into_summary).collect();
        tracing::info!("FDC returned {} candidates for '{}'", summaries.len(), query);
        Ok(summaries)
    }

    fn fetch_entry(&self, id: EntryId) -> Result<ReferenceEntry, CatalogError> {
        tracing::info!("Fetching FDC entry {}", id);
        let response = self.get(&format!("food/{}", id), &[]).map_err(|e| match e {
            CatalogError::Http { status: 404, .. } => CatalogError::NotFound(id),
            other => other,
        })?;

        let parsed: FoodDetailsResponse = response
            .json()
            .map_err(|e| CatalogError::Decode(e.to_string()))?;

        Ok(parsed.into_entry())
    }

    fn ping(&self) -> Result<(), CatalogError> {
        self.get("foods/list", &[("pageSize", "1".to_string())])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticCredentialProvider;

    const DETAIL_JSON: &str = r#"{
        "fdcId": 747447,
        "description": "Broccoli, raw",
        "dataType": "Foundation",
        "foodCategory": { "description": "Vegetables and Vegetable Products" },
        "foodNutrients": [
            { "nutrient": { "id": 1008, "number": "208", "name": "Energy", "unitName": "kcal" }, "amount": 34.0 },
            { "nutrient": { "id": 1003, "number": "203", "name": "Protein", "unitName": "g" }, "amount": 2.57 },
            { "nutrient": { "id": 1004, "name": "Total lipid (fat)", "unitName": "g" } },
            { "type": "FoodNutrient" }
        ],
        "foodPortions": [
            { "amount": 1.0, "gramWeight": 91.0, "modifier": "chopped", "measureUnit": { "name": "cup", "abbreviation": "cup" } },
            { "amount": 1.0, "gramWeight": 151.0, "modifier": "stalk, large", "measureUnit": { "name": "undetermined" } },
            { "amount": 1.0, "modifier": "spear", "measureUnit": { "name": "undetermined" } }
        ]
    }"#;

    #[test]
    fn test_details_response_into_entry() {
        let parsed: FoodDetailsResponse = serde_json::from_str(DETAIL_JSON).unwrap();
        let entry = parsed.into_entry();

        assert_eq!(entry.id, EntryId(747447));
        assert_eq!(entry.category.as_deref(), Some("Vegetables and Vegetable Products"));
        assert_eq!(entry.nutrients.len(), 4);
        assert_eq!(entry.complete_nutrient_count(), 2);
        assert_eq!(entry.nutrients[0].source_id, Some(1008));
        assert_eq!(entry.nutrients[3].name, None);

        // The portion without a gram weight is dropped
        assert_eq!(entry.portions.len(), 2);
        assert_eq!(entry.portions[0].unit, "cup");
        assert_eq!(entry.portions[0].modifier.as_deref(), Some("chopped"));
        assert_eq!(entry.portions[1].unit, "stalk");
        assert_eq!(entry.portions[1].modifier.as_deref(), Some("large"));
    }

    #[test]
    fn test_branded_category_is_a_string() {
        let json = r#"{ "fdcId": 1, "description": "Granola", "foodCategory": "Cereal" }"#;
        let parsed: FoodDetailsResponse = serde_json::from_str(json).unwrap();
        let entry = parsed.into_entry();
        assert_eq!(entry.category.as_deref(), Some("Cereal"));
        assert!(entry.portions.is_empty());
    }

    #[test]
    fn test_search_response_into_summaries() {
        let json = r#"{
            "totalHits": 2,
            "foods": [
                { "fdcId": 747447, "description": "Broccoli, raw", "dataType": "Foundation",
                  "foodNutrients": [ { "nutrientId": 1008, "value": 34.0 }, { "nutrientId": 1003 } ] },
                { "fdcId": 2, "description": "Broccoli, frozen" }
            ]
        }"#;
        let parsed: SearchResponse = serde_json::from_str(json).unwrap();
        let summaries: Vec<_> = parsed.foods.into_iter().map(SearchFood::into_summary).collect();

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].nutrient_count, 1);
        assert_eq!(summaries[0].data_type.as_deref(), Some("Foundation"));
        assert_eq!(summaries[1].nutrient_count, 0);
    }

    #[test]
    fn test_portion_from_description_only() {
        let portion = FoodPortionResponse {
            amount: None,
            gram_weight: Some(28.0),
            modifier: None,
            portion_description: Some("slice".to_string()),
            measure_unit: None,
        }
        .into_portion()
        .unwrap();

        assert_eq!(portion.unit, "slice");
        assert_eq!(portion.amount, 1.0);
        assert_eq!(portion.modifier, None);
    }

    #[test]
    fn test_rate_limiter_blocks_when_window_full() {
        let mut limiter = RateLimiter::new(2, Duration::from_millis(60));
        let start = Instant::now();
        limiter.acquire();
        limiter.acquire();
        assert!(start.elapsed() < Duration::from_millis(60));

        limiter.acquire();
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn test_client_requires_credential() {
        let result = FdcClient::new(FdcConfig::default(), &StaticCredentialProvider::new(""));
        assert!(result.is_err());

        let client = FdcClient::new(FdcConfig::default(), &StaticCredentialProvider::new("key")).unwrap();
        assert_eq!(client.config().page_size, 5);
    }

    #[test]
    fn test_empty_query_rejected_without_request() {
        let client = FdcClient::new(FdcConfig::default(), &StaticCredentialProvider::new("key")).unwrap();
        assert!(matches!(
            client.search_candidates("   "),
            Err(CatalogError::InvalidQuery(_))
        ));
    }
}
