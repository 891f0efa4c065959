//! Database connection management
//!
//! Provides SQLite connection pooling for the catalog response cache.

use std::path::Path;
use std::sync::Arc;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;
use thiserror::Error;

/// Database error types
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database connection error: {0}")]
    Connection(#[from] r2d2::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Cached payload could not be (de)serialized: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Could not create cache directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for database operations
pub type DbResult<T> = Result<T, DbError>;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct Database {
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl Database {
    /// Create a new database connection pool
    pub fn new<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let manager = SqliteConnectionManager::file(path)
            .with_flags(
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_URI,
            )
            .with_init(|conn| {
                conn.execute_batch(
                    "PRAGMA journal_mode = WAL;
                     PRAGMA synchronous = NORMAL;
                     PRAGMA temp_store = MEMORY;",
                )?;
                Ok(())
            });

        // The pipeline is sequential; a small pool is plenty
        let pool = Pool::builder().max_size(2).build(manager)?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Open (creating parent directories if needed) and migrate a cache database
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let database = Self::new(&path)?;
        database.with_conn(|conn| {
            if super::migrations::needs_migration(conn)? {
                tracing::info!("Migrating cache database {}", path.as_ref().display());
            }
            super::migrations::run_migrations(conn)?;
            let version = super::migrations::get_schema_version(conn)?;
            tracing::info!(
                "Cache database {} at schema version {}",
                path.as_ref().display(),
                version
            );
            Ok(())
        })?;
        Ok(database)
    }

    /// Get a connection from the pool
    pub fn get_conn(&self) -> DbResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    /// Execute a closure with a database connection
    pub fn with_conn<F, T>(&self, f: F) -> DbResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> DbResult<T>,
    {
        let conn = self.get_conn()?;
        f(&conn)
    }
}
