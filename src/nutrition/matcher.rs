//! Catalog matching
//!
//! Picks the catalog entry whose description best matches a free-text
//! ingredient name. Scores are on a 0-100 scale; anything below the
//! configured threshold is reported as no match rather than a guess.

use std::collections::BTreeSet;

use strsim::normalized_levenshtein;
use thiserror::Error;

use crate::models::{EntryId, ReferenceEntry, ReferenceEntrySummary};

/// Recommended minimum score for accepting a match
pub const DEFAULT_MATCH_THRESHOLD: f64 = 60.0;

/// Weight applied to the token-set score so that a subset match never
/// outranks an exact one
const TOKEN_SET_WEIGHT: f64 = 0.95;

/// Scores closer than this are considered tied
const SCORE_EPSILON: f64 = 1e-9;

/// Anything the matcher can rank
pub trait Candidate {
    fn id(&self) -> EntryId;
    fn description(&self) -> &str;
    /// How many usable nutrients the entry reports (tie-break)
    fn nutrient_count(&self) -> usize;
}

impl Candidate for ReferenceEntrySummary {
    fn id(&self) -> EntryId {
        self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn nutrient_count(&self) -> usize {
        self.nutrient_count
    }
}

impl Candidate for ReferenceEntry {
    fn id(&self) -> EntryId {
        self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn nutrient_count(&self) -> usize {
        self.complete_nutrient_count()
    }
}

/// The winning candidate and its score
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult<'a, C> {
    pub entry: &'a C,
    pub score: f64,
}

/// No candidate scored at or above the threshold
#[derive(Debug, Clone, PartialEq, Error)]
#[error("no catalog match for '{name}'{}", best_hint(.best))]
pub struct NoMatch {
    pub name: String,
    /// Best rejected candidate description and its score
    pub best: Option<(String, f64)>,
}

fn best_hint(best: &Option<(String, f64)>) -> String {
    match best {
        Some((description, score)) => {
            format!(" (best candidate '{}' scored {:.1})", description, score)
        }
        None => " (no candidates)".to_string(),
    }
}

/// Lowercase, replace punctuation with spaces and split into words
fn tokenize(s: &str) -> Vec<String> {
    s.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn ratio(a: &str, b: &str) -> f64 {
    normalized_levenshtein(a, b) * 100.0
}

/// Similarity of two tokenized strings after sorting their words
fn token_sort_ratio(a: &[String], b: &[String]) -> f64 {
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort();
    b.sort();
    ratio(&a.join(" "), &b.join(" "))
}

/// Similarity based on shared words: the intersection compared against
/// each side's full word set, best of the three pairings
fn token_set_ratio(a: &[String], b: &[String]) -> f64 {
    let a: BTreeSet<&str> = a.iter().map(String::as_str).collect();
    let b: BTreeSet<&str> = b.iter().map(String::as_str).collect();

    let common = a.intersection(&b).copied().collect::<Vec<_>>().join(" ");
    let only_a = a.difference(&b).copied().collect::<Vec<_>>().join(" ");
    let only_b = b.difference(&a).copied().collect::<Vec<_>>().join(" ");

    let with_a = format!("{} {}", common, only_a).trim().to_string();
    let with_b = format!("{} {}", common, only_b).trim().to_string();

    if common.is_empty() {
        return ratio(&with_a, &with_b);
    }

    ratio(&common, &with_a)
        .max(ratio(&common, &with_b))
        .max(ratio(&with_a, &with_b))
}

/// Case- and punctuation-insensitive similarity on a 0-100 scale.
///
/// The larger of the token-sort ratio and a slightly discounted token-set
/// ratio, so "Broccoli" scores high against "Broccoli, raw" while an exact
/// description still wins. Empty input scores 0.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = tokenize(a);
    let b = tokenize(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    token_sort_ratio(&a, &b).max(TOKEN_SET_WEIGHT * token_set_ratio(&a, &b))
}

/// Fuzzy matcher with a minimum acceptable score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CatalogMatcher {
    threshold: f64,
}

impl Default for CatalogMatcher {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }
}

impl CatalogMatcher {
    /// Create a matcher; the threshold is clamped to 0-100
    pub fn new(threshold: f64) -> Self {
        let threshold = if threshold.is_nan() {
            DEFAULT_MATCH_THRESHOLD
        } else {
            threshold.clamp(0.0, 100.0)
        };
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Find the best candidate for `name`.
    ///
    /// Highest score wins. Ties go to the candidate with more nutrient data,
    /// then to the lowest catalog id, so the result never depends on the
    /// order candidates arrive in.
    pub fn best_match<'a, C: Candidate>(
        &self,
        name: &str,
        candidates: &'a [C],
    ) -> Result<MatchResult<'a, C>, NoMatch> {
        let mut best: Option<MatchResult<'a, C>> = None;

        for candidate in candidates {
            let score = similarity(name, candidate.description());
            tracing::debug!(
                "Candidate {} '{}' scored {:.1} for '{}'",
                candidate.id(),
                candidate.description(),
                score,
                name
            );

            let replace = match &best {
                None => true,
                Some(current) => beats(score, candidate, current.score, current.entry),
            };
            if replace {
                best = Some(MatchResult {
                    entry: candidate,
                    score,
                });
            }
        }

        match best {
            Some(result) if result.score >= self.threshold => Ok(result),
            other => Err(NoMatch {
                name: name.to_string(),
                best: other.map(|r| (r.entry.description().to_string(), r.score)),
            }),
        }
    }
}

fn beats<C: Candidate>(score: f64, candidate: &C, best_score: f64, best: &C) -> bool {
    if score > best_score + SCORE_EPSILON {
        return true;
    }
    if (score - best_score).abs() > SCORE_EPSILON {
        return false;
    }
    match candidate.nutrient_count().cmp(&best.nutrient_count()) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => candidate.id() < best.id(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: u64, description: &str, nutrient_count: usize) -> ReferenceEntrySummary {
        ReferenceEntrySummary {
            id: EntryId(id),
            description: description.to_string(),
            data_type: None,
            nutrient_count,
        }
    }

    #[test]
    fn test_similarity_ignores_case_and_punctuation() {
        assert!((similarity("Broccoli, Raw", "broccoli raw") - 100.0).abs() < 1e-9);
        assert!((similarity("raw broccoli", "Broccoli, raw") - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_similarity_range_and_empty() {
        let s = similarity("apple", "pineapple juice");
        assert!((0.0..=100.0).contains(&s));
        assert_eq!(similarity("", "apple"), 0.0);
        assert_eq!(similarity("!!", "apple"), 0.0);
    }

    #[test]
    fn test_similarity_prefers_exact_over_subset() {
        let exact = similarity("broccoli raw", "Broccoli, raw");
        let subset = similarity("broccoli", "Broccoli, raw");
        assert!(exact > subset);
        assert!(subset >= DEFAULT_MATCH_THRESHOLD);
    }

    #[test]
    fn test_best_match_picks_highest_score() {
        let candidates = vec![
            summary(3, "Cheese, cheddar", 30),
            summary(2, "Broccoli, raw", 10),
            summary(1, "Brussels sprouts, raw", 50),
        ];

        let matcher = CatalogMatcher::default();
        let result = matcher.best_match("Broccoli", &candidates).unwrap();
        assert_eq!(result.entry.id, EntryId(2));
        assert!(result.score > 60.0);
    }

    #[test]
    fn test_best_match_below_threshold_is_no_match() {
        let candidates = vec![summary(1, "Cheese, cheddar", 30)];
        let err = CatalogMatcher::default()
            .best_match("Broccoli", &candidates)
            .unwrap_err();

        assert_eq!(err.name, "Broccoli");
        assert_eq!(err.best.as_ref().map(|b| b.0.as_str()), Some("Cheese, cheddar"));
        assert!(err.to_string().contains("best candidate 'Cheese, cheddar'"));
    }

    #[test]
    fn test_best_match_empty_candidates() {
        let candidates: Vec<ReferenceEntrySummary> = Vec::new();
        let err = CatalogMatcher::default().best_match("salt", &candidates).unwrap_err();
        assert_eq!(err.best, None);
    }

    #[test]
    fn test_tie_prefers_more_nutrients_then_lowest_id() {
        let candidates = vec![
            summary(30, "Broccoli, raw", 10),
            summary(20, "Broccoli, raw", 40),
            summary(10, "Broccoli, raw", 40),
        ];

        let matcher = CatalogMatcher::default();
        let result = matcher.best_match("broccoli raw", &candidates).unwrap();
        assert_eq!(result.entry.id, EntryId(10));

        let mut reversed = candidates.clone();
        reversed.reverse();
        let result = matcher.best_match("broccoli raw", &reversed).unwrap();
        assert_eq!(result.entry.id, EntryId(10));
    }

    #[test]
    fn test_threshold_is_clamped() {
        assert_eq!(CatalogMatcher::new(150.0).threshold(), 100.0);
        assert_eq!(CatalogMatcher::new(-5.0).threshold(), 0.0);
        assert_eq!(CatalogMatcher::new(f64::NAN).threshold(), DEFAULT_MATCH_THRESHOLD);
    }

    #[test]
    fn test_zero_threshold_accepts_anything() {
        let candidates = vec![summary(1, "Cheese, cheddar", 30)];
        let result = CatalogMatcher::new(0.0).best_match("Broccoli", &candidates).unwrap();
        assert_eq!(result.entry.id, EntryId(1));
    }
}
