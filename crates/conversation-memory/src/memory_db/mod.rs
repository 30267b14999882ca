//! Memory database module - SQLite-backed key-value store for messages, insights and their indexes
pub mod conversation_store;
pub mod kv;
pub mod migration;
pub mod schema;

pub use conversation_store::{ConversationStore, InsightParams, MessageParams, SearchScope};
pub use kv::{KvBatch, KvStore};
pub use migration::{migrate_existing_messages, MigrationManager, MigrationReport};
pub use schema::*;

use std::sync::Arc;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{MemoryError, MemoryResult};

pub type SqlitePool = Pool<SqliteConnectionManager>;

/// Explicitly opened handle on the store; share it with `Arc`.
pub struct MemoryDatabase {
    pub conversations: ConversationStore,
    pub kv: KvStore,
    pool: Arc<SqlitePool>,
}

impl MemoryDatabase {
    /// Open (creating if needed) the database described by `config`, apply
    /// schema migrations and check that it answers.
    pub fn open(config: &Config) -> MemoryResult<Self> {
        if config.is_in_memory() {
            return Self::in_memory_with_ttl(config.session_ttl());
        }

        let db_path = config.db_path.as_path();
        info!("Opening memory database at: {}", db_path.display());
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        let manager = SqliteConnectionManager::file(db_path)
            .with_flags(
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
            )
            .with_init(move |conn| {
                conn.busy_timeout(busy_timeout)?;
                conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA synchronous = NORMAL;")
            });
        let pool = Pool::builder()
            .max_size(config.pool_size)
            .connection_timeout(config.connect_timeout())
            .build(manager)
            .map_err(|e| {
                MemoryError::BackendUnavailable(format!("Failed to create connection pool: {}", e))
            })?;

        {
            let mut conn = pool.get()?;
            let journal_mode: String =
                conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
            debug!("Journal mode: {}", journal_mode);
            MigrationManager::new(&mut conn).initialize_database()?;
        }

        let db = Self::from_pool(Arc::new(pool), config.session_ttl());
        db.ping()
            .map_err(|e| MemoryError::BackendUnavailable(format!("Ping failed: {}", e)))?;

        let purged = db.kv.purge_expired()?;
        if purged > 0 {
            debug!("Purged {} expired keys", purged);
        }

        info!("Memory database initialized successfully");
        Ok(db)
    }

    /// Ephemeral single-connection database.
    pub fn new_in_memory() -> MemoryResult<Self> {
        Self::in_memory_with_ttl(Config::default().session_ttl())
    }

    fn in_memory_with_ttl(session_ttl: Duration) -> MemoryResult<Self> {
        // every in-memory connection is its own database, so the pool holds
        // exactly one and never recycles it
        let pool = Pool::builder()
            .max_size(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .build(SqliteConnectionManager::memory())
            .map_err(|e| {
                MemoryError::BackendUnavailable(format!("Failed to create connection pool: {}", e))
            })?;

        {
            let mut conn = pool.get()?;
            MigrationManager::new(&mut conn).initialize_database()?;
        }

        Ok(Self::from_pool(Arc::new(pool), session_ttl))
    }

    fn from_pool(pool: Arc<SqlitePool>, session_ttl: Duration) -> Self {
        let kv = KvStore::new(Arc::clone(&pool));
        Self {
            conversations: ConversationStore::new(kv.clone(), session_ttl),
            kv,
            pool,
        }
    }

    /// Round-trip the backend.
    pub fn ping(&self) -> MemoryResult<()> {
        self.kv.ping()
    }

    /// Delete every key. Administrative; there is no undo.
    pub fn clear_all(&self) -> MemoryResult<()> {
        warn!("Clearing all conversation data");
        self.kv.flush()
    }

    /// Backfill derived fields on records written by older versions.
    pub fn migrate_existing_messages(&self) -> MemoryResult<MigrationReport> {
        migrate_existing_messages(&self.kv)
    }

    /// Checkpoint the write-ahead log and release the pool.
    pub fn close(self) -> MemoryResult<()> {
        let conn = self.pool.get()?;
        conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
        drop(conn);
        info!("Memory database closed");
        Ok(())
    }
}

impl Drop for MemoryDatabase {
    fn drop(&mut self) {
        if let Ok(conn) = self.pool.get() {
            let _ = conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);");
        }
    }
}
