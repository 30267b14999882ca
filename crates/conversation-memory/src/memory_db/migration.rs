//! Schema migrations and the backfill of derived message fields

use rayon::prelude::*;
use rusqlite::{Connection, Result};
use serde::Serialize;
use tracing::{error, info};

use crate::error::MemoryResult;
use crate::memory_db::kv::{KvBatch, KvStore};
use crate::memory_db::schema::{
    encode_list, keys, ConversationMessage, IndexKey, MessageSummary, ENCODING_VERSION_FIELD,
    LIST_ENCODING_VERSION,
};
use crate::processing::{ContentProcessor, ProcessedContent};

/// Applies the embedded schema scripts in version order
pub struct MigrationManager<'a> {
    conn: &'a mut Connection,
}

impl<'a> MigrationManager<'a> {
    pub fn new(conn: &'a mut Connection) -> Self {
        Self { conn }
    }

    /// Create the version table and apply every pending migration
    pub fn initialize_database(&mut self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        let current_version = self.get_current_version()?;
        info!("Current key-value schema version: {}", current_version);

        self.apply_migrations(current_version)
    }

    fn apply_migrations(&mut self, current_version: i32) -> Result<()> {
        for (version, migration_sql) in get_migrations() {
            if version <= current_version {
                continue;
            }
            info!("Applying migration {}...", version);

            let tx = self.conn.transaction()?;
            if let Err(e) = tx.execute_batch(migration_sql) {
                error!("Failed to apply migration {}: {}", version, e);
                return Err(e);
            }
            tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
            tx.commit()?;

            info!("Migration {} applied successfully", version);
        }
        Ok(())
    }

    pub fn get_current_version(&self) -> Result<i32> {
        self.conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
    }
}

fn get_migrations() -> Vec<(i32, &'static str)> {
    vec![
        (1, include_str!("migrations/001_initial.sql")),
        (2, include_str!("migrations/002_string_expiry_index.sql")),
    ]
}

/// Outcome of [`migrate_existing_messages`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub scanned: usize,
    pub migrated: usize,
    pub skipped: usize,
}

/// Backfill the derived fields of every timeline message stored without them.
///
/// Records that already carry `compressed_content`, or have no content to
/// derive from, are skipped, so running this again changes nothing.
pub fn migrate_existing_messages(kv: &KvStore) -> MemoryResult<MigrationReport> {
    info!("Starting migration of existing messages...");

    let ids = kv.zrange_all(keys::TIMELINE)?;
    let mut report = MigrationReport {
        scanned: ids.len(),
        ..MigrationReport::default()
    };

    let mut pending = Vec::new();
    for id in ids {
        let record = kv.hgetall(&keys::message(&id))?;
        if record.is_empty() || ConversationMessage::is_enhanced(&record) {
            report.skipped += 1;
            continue;
        }
        match record.get("content").filter(|c| !c.is_empty()) {
            Some(content) => pending.push((id, content.clone())),
            None => report.skipped += 1,
        }
    }

    let processed: Vec<(String, ProcessedContent)> = pending
        .into_par_iter()
        .map(|(id, content)| {
            let derived = ContentProcessor::process(&content);
            (id, derived)
        })
        .collect();

    for (id, derived) in processed {
        kv.execute(&backfill_batch(&id, derived)?)?;
        report.migrated += 1;
        if report.migrated % 10 == 0 {
            info!("Migrated {} messages...", report.migrated);
        }
    }

    info!(
        "Migration completed: {} migrated, {} skipped of {} scanned",
        report.migrated, report.skipped, report.scanned
    );
    Ok(report)
}

fn backfill_batch(id: &str, derived: ProcessedContent) -> MemoryResult<KvBatch> {
    let summary = MessageSummary {
        short: derived.summary_short.clone(),
        medium: derived.summary_medium.clone(),
        key_points: derived.key_points.clone(),
        technical_terms: derived.technical_terms.clone(),
    };

    let mut batch = KvBatch::new();
    batch.hset(
        keys::message(id),
        [
            ("compressed_content", derived.compressed_content),
            ("summary_short", derived.summary_short),
            ("summary_medium", derived.summary_medium),
            ("key_points", encode_list(&derived.key_points)?),
            ("technical_terms", encode_list(&derived.technical_terms)?),
            ("context_hash", derived.context_hash),
            ("content_length", derived.content_length.to_string()),
            ("compression_ratio", derived.compression_ratio.to_string()),
            (ENCODING_VERSION_FIELD, LIST_ENCODING_VERSION.to_string()),
        ],
    );
    batch.hset(keys::message_summary(id), summary.to_record()?);
    for term in &summary.technical_terms {
        batch.sadd(IndexKey::Tech(term).key(), id);
    }
    Ok(batch)
}
