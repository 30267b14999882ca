//! Redis-shaped key-value primitives over SQLite tables.
//!
//! Writes are grouped in a [`KvBatch`] and applied by [`KvStore::execute`]
//! inside one `BEGIN IMMEDIATE` transaction, so a batch is visible to readers
//! either completely or not at all.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Transaction, TransactionBehavior};
use tracing::debug;

use super::SqlitePool;
use crate::error::{MemoryError, MemoryResult};

#[derive(Debug, Clone, PartialEq)]
enum KvOp {
    HSet { key: String, fields: Vec<(String, String)> },
    SAdd { key: String, member: String },
    ZAdd { key: String, member: String, score: f64 },
    IncrBy { key: String, delta: i64 },
    SetEx { key: String, value: String, ttl: Duration },
}

/// An ordered list of writes applied all-or-nothing.
#[derive(Debug, Clone, Default)]
pub struct KvBatch {
    ops: Vec<KvOp>,
}

impl KvBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hset<I, F, V>(&mut self, key: impl Into<String>, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = (F, V)>,
        F: Into<String>,
        V: Into<String>,
    {
        let fields = fields.into_iter().map(|(f, v)| (f.into(), v.into())).collect();
        self.ops.push(KvOp::HSet { key: key.into(), fields });
        self
    }

    pub fn sadd(&mut self, key: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.ops.push(KvOp::SAdd { key: key.into(), member: member.into() });
        self
    }

    /// Insert or re-score `member`.
    pub fn zadd(&mut self, key: impl Into<String>, member: impl Into<String>, score: f64) -> &mut Self {
        self.ops.push(KvOp::ZAdd { key: key.into(), member: member.into(), score });
        self
    }

    pub fn incr_by(&mut self, key: impl Into<String>, delta: i64) -> &mut Self {
        self.ops.push(KvOp::IncrBy { key: key.into(), delta });
        self
    }

    pub fn set_ex(&mut self, key: impl Into<String>, value: impl Into<String>, ttl: Duration) -> &mut Self {
        self.ops.push(KvOp::SetEx { key: key.into(), value: value.into(), ttl });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Handle on the key-value tables; cheap to clone.
#[derive(Clone)]
pub struct KvStore {
    pool: Arc<SqlitePool>,
}

impl KvStore {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    fn get_conn(&self) -> MemoryResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    /// Apply every write in `batch` inside one transaction.
    pub fn execute(&self, batch: &KvBatch) -> MemoryResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        for op in &batch.ops {
            apply(&tx, op)?;
        }
        tx.commit()?;

        debug!("Applied batch of {} operations", batch.len());
        Ok(())
    }

    pub fn hgetall(&self, key: &str) -> MemoryResult<HashMap<String, String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare_cached("SELECT field, value FROM kv_hashes WHERE key = ?1")?;
        let fields = stmt
            .query_map([key], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<HashMap<String, String>>>()?;
        Ok(fields)
    }

    /// Members of a set in lexical order.
    pub fn smembers(&self, key: &str) -> MemoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare_cached("SELECT member FROM kv_sets WHERE key = ?1 ORDER BY member")?;
        let members = stmt
            .query_map([key], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(members)
    }

    /// Cardinality of every set whose key starts with `prefix`, keyed by the
    /// remainder of the key.
    pub fn set_cardinalities(&self, prefix: &str) -> MemoryResult<Vec<(String, usize)>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT substr(key, length(?1) + 1), COUNT(*) FROM kv_sets
             WHERE substr(key, 1, length(?1)) = ?1
             GROUP BY key ORDER BY key",
        )?;
        let counts = stmt
            .query_map([prefix], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .map(|r| r.map(|(name, count)| (name, count as usize)))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(counts)
    }

    /// Up to `limit` members, highest score first; later insertions win ties.
    pub fn zrevrange(&self, key: &str, limit: usize) -> MemoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT member FROM kv_sorted_sets WHERE key = ?1
             ORDER BY score DESC, id DESC LIMIT ?2",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let members = stmt
            .query_map(params![key, limit], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(members)
    }

    /// All members, lowest score first.
    pub fn zrange_all(&self, key: &str) -> MemoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT member FROM kv_sorted_sets WHERE key = ?1 ORDER BY score ASC, id ASC",
        )?;
        let members = stmt
            .query_map([key], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(members)
    }

    pub fn zscore(&self, key: &str, member: &str) -> MemoryResult<Option<f64>> {
        let conn = self.get_conn()?;
        let score = conn
            .query_row(
                "SELECT score FROM kv_sorted_sets WHERE key = ?1 AND member = ?2",
                [key, member],
                |row| row.get(0),
            )
            .optional()?;
        Ok(score)
    }

    pub fn zcard(&self, key: &str) -> MemoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM kv_sorted_sets WHERE key = ?1",
            [key],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// String value of `key`; expired keys read as absent.
    pub fn get(&self, key: &str) -> MemoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM kv_strings
                 WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2)",
                params![key, now_millis()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> MemoryResult<()> {
        let mut batch = KvBatch::new();
        batch.set_ex(key, value, ttl);
        self.execute(&batch)
    }


    /// Integer value of a counter; a missing counter reads as zero.
    pub fn counter(&self, key: &str) -> MemoryResult<i64> {
        match self.get(key)? {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| MemoryError::corrupt(key, format!("counter holds {:?}", raw))),
            None => Ok(0),
        }
    }

    /// Drop string keys whose expiry has passed.
    pub fn purge_expired(&self) -> MemoryResult<usize> {
        let conn = self.get_conn()?;
        let purged = conn.execute(
            "DELETE FROM kv_strings WHERE expires_at IS NOT NULL AND expires_at <= ?1",
            [now_millis()],
        )?;
        Ok(purged)
    }

    /// Remove every key in one transaction.
    pub fn flush(&self) -> MemoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute_batch(
            "DELETE FROM kv_hashes;
             DELETE FROM kv_sets;
             DELETE FROM kv_sorted_sets;
             DELETE FROM kv_strings;",
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn ping(&self) -> MemoryResult<()> {
        let conn = self.get_conn()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}

fn apply(tx: &Transaction<'_>, op: &KvOp) -> rusqlite::Result<()> {
    match op {
        KvOp::HSet { key, fields } => {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO kv_hashes (key, field, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key, field) DO UPDATE SET value = excluded.value",
            )?;
            for (field, value) in fields {
                stmt.execute(params![key, field, value])?;
            }
        }
        KvOp::SAdd { key, member } => {
            tx.prepare_cached("INSERT OR IGNORE INTO kv_sets (key, member) VALUES (?1, ?2)")?
                .execute(params![key, member])?;
        }
        KvOp::ZAdd { key, member, score } => {
            tx.prepare_cached(
                "INSERT INTO kv_sorted_sets (key, member, score) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key, member) DO UPDATE SET score = excluded.score",
            )?
            .execute(params![key, member, score])?;
        }
        KvOp::IncrBy { key, delta } => {
            tx.prepare_cached(
                "INSERT INTO kv_strings (key, value, expires_at) VALUES (?1, CAST(?2 AS TEXT), NULL)
                 ON CONFLICT(key) DO UPDATE
                 SET value = CAST(CAST(kv_strings.value AS INTEGER) + ?2 AS TEXT)",
            )?
            .execute(params![key, delta])?;
        }
        KvOp::SetEx { key, value, ttl } => {
            let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
            let expires_at = now_millis().saturating_add(ttl_millis);
            tx.prepare_cached(
                "INSERT INTO kv_strings (key, value, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE
                 SET value = excluded.value, expires_at = excluded.expires_at",
            )?
            .execute(params![key, value, expires_at])?;
        }
    }
    Ok(())
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
