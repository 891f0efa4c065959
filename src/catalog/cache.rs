//! SQLite-backed response cache
//!
//! Wraps any [`CatalogSearchService`] and stores search hits and full
//! entries as JSON with a fetch timestamp. Entries older than the TTL are
//! refetched. Cache failures never fail a lookup; they are logged and the
//! inner service is asked directly.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension};

use super::{CatalogError, CatalogSearchService};
use crate::db::{Database, DbResult};
use crate::models::{EntryId, ReferenceEntry, ReferenceEntrySummary};

/// Ten years; longer TTLs are clamped
const MAX_TTL_HOURS: u64 = 24 * 365 * 10;

pub struct CachedCatalog<S> {
    inner: S,
    db: Database,
    ttl: Duration,
    scope: String,
}

fn cache_key(name: &str) -> String {
    name.trim().to_lowercase()
}

impl<S: CatalogSearchService> CachedCatalog<S> {
    /// `scope` separates search results taken with different search
    /// settings, e.g. "Foundation:5"
    pub fn new(inner: S, db: Database, ttl_hours: u64, scope: impl Into<String>) -> Self {
        Self {
            inner,
            db,
            ttl: Duration::hours(ttl_hours.min(MAX_TTL_HOURS) as i64),
            scope: scope.into(),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn is_fresh(&self, fetched_at: &str) -> bool {
        DateTime::parse_from_rfc3339(fetched_at)
            .map(|t| Utc::now().signed_duration_since(t.with_timezone(&Utc)) < self.ttl)
            .unwrap_or(false)
    }

    fn cached_search(&self, query: &str) -> DbResult<Option<Vec<ReferenceEntrySummary>>> {
        self.db.with_conn(|conn| {
            let row: Option<(String, String)> = conn
                .query_row(
                    "SELECT payload, fetched_at FROM search_cache WHERE query = ?1 AND scope = ?2",
                    params![query, self.scope],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            match row {
                Some((payload, fetched_at)) if self.is_fresh(&fetched_at) => {
                    Ok(Some(serde_json::from_str(&payload)?))
                }
                _ => Ok(None),
            }
        })
    }

    fn store_search(&self, query: &str, hits: &[ReferenceEntrySummary]) -> DbResult<()> {
        let payload = serde_json::to_string(hits)?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO search_cache (query, scope, payload, fetched_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![query, self.scope, payload, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
    }

    fn cached_entry(&self, id: EntryId) -> DbResult<Option<ReferenceEntry>> {
        self.db.with_conn(|conn| {
            let row: Option<(String, String)> = conn
                .query_row(
                    "SELECT payload, fetched_at FROM entry_cache WHERE entry_id = ?1",
                    params![id.0 as i64],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            match row {
                Some((payload, fetched_at)) if self.is_fresh(&fetched_at) => {
                    Ok(Some(serde_json::from_str(&payload)?))
                }
                _ => Ok(None),
            }
        })
    }

    fn store_entry(&self, entry: &ReferenceEntry) -> DbResult<()> {
        let payload = serde_json::to_string(entry)?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO entry_cache (entry_id, description, payload, fetched_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![entry.id.0 as i64, entry.description, payload, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
    }
}

impl<S: CatalogSearchService> CatalogSearchService for CachedCatalog<S> {
    fn search_candidates(&self, name: &str) -> Result<Vec<ReferenceEntrySummary>, CatalogError> {
        let key = cache_key(name);

        match self.cached_search(&key) {
            Ok(Some(hits)) => {
                tracing::debug!("Search cache hit for '{}'", key);
                return Ok(hits);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Search cache read failed for '{}': {}", key, e),
        }

        let hits = self.inner.search_candidates(name)?;
        if let Err(e) = self.store_search(&key, &hits) {
            tracing::warn!("Search cache write failed for '{}': {}", key, e);
        }
        Ok(hits)
    }

    fn fetch_entry(&self, id: EntryId) -> Result<ReferenceEntry, CatalogError> {
        match self.cached_entry(id) {
            Ok(Some(entry)) => {
                tracing::debug!("Entry cache hit for {}", id);
                return Ok(entry);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Entry cache read failed for {}: {}", id, e),
        }

        let entry = self.inner.fetch_entry(id)?;
        if let Err(e) = self.store_entry(&entry) {
            tracing::warn!("Entry cache write failed for {}: {}", id, e);
        }
        Ok(entry)
    }

    fn ping(&self) -> Result<(), CatalogError> {
        self.inner.ping()
    }
}
