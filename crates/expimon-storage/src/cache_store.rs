use crate::error::Result;
use chrono::Utc;
use expimon_common::cache::CacheBackend;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const CACHE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS cache_entries (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    expires_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_cache_expires ON cache_entries(expires_at);
";

/// SQLite-backed TTL cache used for WHOIS lookups.
pub struct CacheStore {
    conn: Mutex<Connection>,
}

impl CacheStore {
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = data_dir.join("cache.db");
        let conn = Connection::open(&db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(CACHE_SCHEMA)?;
        tracing::info!(path = %db_path.display(), "Initialized cache store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let expires_at = Utc::now().timestamp() + ttl_secs as i64;
        self.conn().execute(
            "INSERT OR REPLACE INTO cache_entries (key, value, expires_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![key, value, expires_at],
        )?;
        Ok(())
    }

    /// Returns the value only while its TTL has not lapsed.
    pub fn get_unexpired(&self, key: &str) -> Result<Option<String>> {
        let now = Utc::now().timestamp();
        let conn = self.conn();
        let mut stmt = conn
            .prepare_cached("SELECT value FROM cache_entries WHERE key = ?1 AND expires_at > ?2")?;
        let mut rows = stmt.query(rusqlite::params![key, now])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    /// Removes lapsed rows. Reads already ignore them; this is
    /// housekeeping to keep the file small.
    pub fn purge_expired(&self) -> Result<usize> {
        let now = Utc::now().timestamp();
        let removed = self.conn().execute(
            "DELETE FROM cache_entries WHERE expires_at <= ?1",
            rusqlite::params![now],
        )?;
        if removed > 0 {
            tracing::debug!(removed, "Purged expired cache entries");
        }
        Ok(removed)
    }
}

impl CacheBackend for CacheStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.get_unexpired(key)?)
    }

    fn put(&self, key: &str, value: &str, ttl_secs: u64) -> anyhow::Result<()> {
        Ok(self.set_with_ttl(key, value, ttl_secs)?)
    }
}
