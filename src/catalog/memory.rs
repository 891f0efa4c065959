//! In-memory catalog
//!
//! A fixed set of reference entries searched by shared words. Used for
//! offline runs and tests; it records every call so tests can assert on
//! what the pipeline actually requested.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use super::{CatalogError, CatalogSearchService};
use crate::models::{EntryId, ReferenceEntry, ReferenceEntrySummary};

#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    entries: Vec<ReferenceEntry>,
    page_size: usize,
    unavailable: Cell<bool>,
    searches: RefCell<Vec<String>>,
    fetched: RefCell<Vec<EntryId>>,
    search_failures: RefCell<HashMap<String, CatalogError>>,
    fetch_failures: RefCell<HashMap<EntryId, CatalogError>>,
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

impl InMemoryCatalog {
    pub fn new(entries: Vec<ReferenceEntry>) -> Self {
        Self {
            entries,
            page_size: 5,
            ..Self::default()
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Make every call fail as if the catalog were offline
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.set(unavailable);
    }

    /// Make every search for `name` (case-insensitive) fail with `error`
    pub fn fail_search(&self, name: &str, error: CatalogError) {
        self.search_failures
            .borrow_mut()
            .insert(name.trim().to_lowercase(), error);
    }

    /// Make every fetch of `id` fail with `error`
    pub fn fail_fetch(&self, id: EntryId, error: CatalogError) {
        self.fetch_failures.borrow_mut().insert(id, error);
    }

    pub fn search_count(&self) -> usize {
        self.searches.borrow().len()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetched.borrow().len()
    }

    pub fn fetched_ids(&self) -> Vec<EntryId> {
        self.fetched.borrow().clone()
    }

    fn check_available(&self) -> Result<(), CatalogError> {
        if self.unavailable.get() {
            return Err(CatalogError::Unreachable("in-memory catalog set unavailable".to_string()));
        }
        Ok(())
    }
}

impl CatalogSearchService for InMemoryCatalog {
    fn search_candidates(&self, name: &str) -> Result<Vec<ReferenceEntrySummary>, CatalogError> {
        self.check_available()?;
        self.searches.borrow_mut().push(name.to_string());
        if let Some(error) = self.search_failures.borrow().get(&name.trim().to_lowercase()) {
            return Err(error.clone());
        }

        let query = words(name);
        if query.is_empty() {
            return Err(CatalogError::InvalidQuery("search query cannot be empty".to_string()));
        }

        Ok(self
            .entries
            .iter()
            .filter(|entry| words(&entry.description).iter().any(|w| query.contains(w)))
            .take(self.page_size)
            .map(ReferenceEntry::summary)
            .collect())
    }

    fn fetch_entry(&self, id: EntryId) -> Result<ReferenceEntry, CatalogError> {
        self.check_available()?;
        self.fetched.borrow_mut().push(id);
        if let Some(error) = self.fetch_failures.borrow().get(&id) {
            return Err(error.clone());
        }

        self.entries
            .iter()
            .find(|entry| entry.id == id)
            .cloned()
            .ok_or(CatalogError::NotFound(id))
    }

    fn ping(&self) -> Result<(), CatalogError> {
        self.check_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawNutrient;

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::new(vec![
            ReferenceEntry::new(1u64, "Broccoli, raw")
                .with_nutrient(RawNutrient::new(1008, "Energy", "KCAL", 34.0)),
            ReferenceEntry::new(2u64, "Carrots, raw"),
            ReferenceEntry::new(3u64, "Broccoli raab, cooked"),
        ])
    }

    #[test]
    fn test_search_by_shared_word() {
        let catalog = catalog();
        let hits = catalog.search_candidates("Raw broccoli").unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![EntryId(1), EntryId(2), EntryId(3)]);
        assert_eq!(hits[0].nutrient_count, 1);

        assert!(catalog.search_candidates("quinoa").unwrap().is_empty());
        assert_eq!(catalog.search_count(), 2);
    }

    #[test]
    fn test_page_size_limits_hits() {
        let catalog = catalog().with_page_size(1);
        assert_eq!(catalog.search_candidates("raw").unwrap().len(), 1);
    }

    #[test]
    fn test_fetch_records_calls() {
        let catalog = catalog();
        assert_eq!(catalog.fetch_entry(EntryId(2)).unwrap().description, "Carrots, raw");
        assert_eq!(
            catalog.fetch_entry(EntryId(9)),
            Err(CatalogError::NotFound(EntryId(9)))
        );
        assert_eq!(catalog.fetched_ids(), vec![EntryId(2), EntryId(9)]);
    }

    #[test]
    fn test_unavailable_catalog() {
        let catalog = catalog();
        catalog.set_unavailable(true);
        assert!(matches!(catalog.ping(), Err(CatalogError::Unreachable(_))));
        assert!(matches!(
            catalog.search_candidates("broccoli"),
            Err(CatalogError::Unreachable(_))
        ));
        assert_eq!(catalog.search_count(), 0);
    }

    #[test]
    fn test_injected_failures() {
        let catalog = catalog();
        catalog.fail_search("Carrots", CatalogError::Decode("truncated body".into()));
        catalog.fail_fetch(EntryId(1), CatalogError::NotFound(EntryId(1)));

        assert_eq!(
            catalog.search_candidates(" carrots "),
            Err(CatalogError::Decode("truncated body".into()))
        );
        assert!(catalog.search_candidates("broccoli").is_ok());
        assert_eq!(
            catalog.fetch_entry(EntryId(1)),
            Err(CatalogError::NotFound(EntryId(1)))
        );
        assert!(catalog.fetch_entry(EntryId(2)).is_ok());
        assert_eq!(catalog.search_count(), 2);
        assert_eq!(catalog.fetch_count(), 2);
    }
}
