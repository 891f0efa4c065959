//! Reference catalog access
//!
//! The pipeline only sees [`CatalogSearchService`]; the FoodData Central
//! client, the in-memory catalog and the SQLite cache decorator all
//! implement it.

pub mod cache;
pub mod fdc;
pub mod memory;

use thiserror::Error;

use crate::models::{EntryId, ReferenceEntry, ReferenceEntrySummary};

pub use cache::CachedCatalog;
pub use fdc::FdcClient;
pub use memory::InMemoryCatalog;

/// Catalog access errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogError {
    #[error("catalog unreachable: {0}")]
    Unreachable(String),

    #[error("catalog request timed out: {0}")]
    Timeout(String),

    #[error("catalog rejected the API key: {0}")]
    Unauthorized(String),

    #[error("catalog returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("could not decode catalog response: {0}")]
    Decode(String),

    #[error("catalog entry {0} not found")]
    NotFound(EntryId),

    #[error("invalid search query: {0}")]
    InvalidQuery(String),
}

impl CatalogError {
    /// Errors that make every further request pointless and abort the run.
    /// A host that drops out mid-run only fails the ingredients it touches.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CatalogError::Unauthorized(_))
    }
}

/// Search and retrieval of reference entries
pub trait CatalogSearchService {
    /// Candidate summaries for a free-text ingredient name, best first as
    /// ranked by the catalog
    fn search_candidates(&self, name: &str) -> Result<Vec<ReferenceEntrySummary>, CatalogError>;

    /// Full nutrient and portion detail for one entry
    fn fetch_entry(&self, id: EntryId) -> Result<ReferenceEntry, CatalogError>;

    /// Cheap availability check run before any ingredient is processed
    fn ping(&self) -> Result<(), CatalogError> {
        Ok(())
    }
}

impl<T: CatalogSearchService + ?Sized> CatalogSearchService for Box<T> {
    fn search_candidates(&self, name: &str) -> Result<Vec<ReferenceEntrySummary>, CatalogError> {
        (**self).search_candidates(name)
    }

    fn fetch_entry(&self, id: EntryId) -> Result<ReferenceEntry, CatalogError> {
        (**self).fetch_entry(id)
    }

    fn ping(&self) -> Result<(), CatalogError> {
        (**self).ping()
    }
}

impl<T: CatalogSearchService + ?Sized> CatalogSearchService for &T {
    fn search_candidates(&self, name: &str) -> Result<Vec<ReferenceEntrySummary>, CatalogError> {
        (**self).search_candidates(name)
    }

    fn fetch_entry(&self, id: EntryId) -> Result<ReferenceEntry, CatalogError> {
        (**self).fetch_entry(id)
    }

    fn ping(&self) -> Result<(), CatalogError> {
        (**self).ping()
    }
}
