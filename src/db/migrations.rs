//! Database migrations
//!
//! Schema creation and migration logic for the catalog response cache.

use rusqlite::Connection;

use super::connection::DbResult;

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// Run all migrations to bring the database up to the current schema version
pub fn run_migrations(conn: &Connection) -> DbResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version = get_schema_version(conn)?;

    if current_version < 1 {
        migrate_v1(conn)?;
        conn.execute("INSERT INTO schema_migrations (version) VALUES (1)", [])?;
    }

    Ok(())
}

/// Migration v1: search and entry caches
fn migrate_v1(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        r#"
        -- ============================================
        -- SEARCH CACHE
        -- Candidate summaries per (query, search scope)
        -- ============================================
        CREATE TABLE search_cache (
            query TEXT NOT NULL,                 -- lowercased, trimmed ingredient name
            scope TEXT NOT NULL,                 -- e.g., "Foundation:5" (data type and page size)
            payload TEXT NOT NULL,               -- JSON array of ReferenceEntrySummary
            fetched_at TEXT NOT NULL,            -- RFC 3339 UTC
            PRIMARY KEY (query, scope)
        );

        -- ============================================
        -- ENTRY CACHE
        -- Full reference entries by catalog id
        -- ============================================
        CREATE TABLE entry_cache (
            entry_id INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            payload TEXT NOT NULL,               -- JSON ReferenceEntry
            fetched_at TEXT NOT NULL             -- RFC 3339 UTC
        );

        CREATE INDEX idx_entry_cache_description ON entry_cache(description);
        "#,
    )?;

    Ok(())
}

/// Get the current schema version
pub fn get_schema_version(conn: &Connection) -> DbResult<i32> {
    let version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);
    Ok(version)
}

/// Check if the database needs migration
pub fn needs_migration(conn: &Connection) -> DbResult<bool> {
    let current = get_schema_version(conn)?;
    Ok(current < SCHEMA_VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
        assert!(!needs_migration(&conn).unwrap());

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('search_cache', 'entry_cache')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 2);
    }

    #[test]
    fn test_fresh_database_needs_migration() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE schema_migrations (version INTEGER PRIMARY KEY, applied_at TEXT)",
            [],
        )
        .unwrap();
        assert!(needs_migration(&conn).unwrap());
    }
}
