use crate::error::{Result, StorageError};
use chrono::{DateTime, Utc};
use expimon_common::types::{Subscription, SubscriptionStatus};
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SUBSCRIPTIONS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS subscriptions (
    key TEXT PRIMARY KEY,
    email TEXT NOT NULL,
    domains TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_subscriptions_status ON subscriptions(status);
";

/// Deterministic store key for a subscriber. Rows are keyed by the
/// SHA-256 of the normalized address, never by the plaintext.
pub fn subscriber_key(email: &str) -> String {
    let normalized = email.trim().to_lowercase();
    hex::encode(Sha256::digest(normalized.as_bytes()))
}

fn normalize_domains(domains: &[String]) -> BTreeSet<String> {
    domains
        .iter()
        .map(|d| d.trim().trim_end_matches('.').to_lowercase())
        .filter(|d| !d.is_empty())
        .collect()
}

/// Subscriber registry with soft delete.
pub struct SubscriptionStore {
    conn: Mutex<Connection>,
}

impl SubscriptionStore {
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = data_dir.join("subscriptions.db");
        let conn = Connection::open(&db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SUBSCRIPTIONS_SCHEMA)?;
        tracing::info!(path = %db_path.display(), "Initialized subscription store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers (or re-registers) a subscriber. Domains are merged into
    /// any existing set and the subscription is reactivated. Returns the
    /// merged set.
    pub fn register(&self, email: &str, domains: &[String]) -> Result<BTreeSet<String>> {
        let key = subscriber_key(email);
        let new_domains = normalize_domains(domains);
        let now = Utc::now();

        let existing = self.get_by_key(&key)?;
        let merged: BTreeSet<String> = match &existing {
            Some(sub) => sub.domains.union(&new_domains).cloned().collect(),
            None => new_domains,
        };

        let domains_json = serde_json::to_string(&merged)?;
        self.conn().execute(
            "INSERT INTO subscriptions (key, email, domains, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(key) DO UPDATE SET
                 email = excluded.email,
                 domains = excluded.domains,
                 status = excluded.status,
                 updated_at = excluded.updated_at",
            rusqlite::params![
                key,
                email.trim().to_lowercase(),
                domains_json,
                SubscriptionStatus::Active.to_string(),
                now.timestamp(),
            ],
        )?;

        tracing::info!(
            subscriber = %key,
            domains = merged.len(),
            "Registered subscription"
        );
        Ok(merged)
    }

    /// The subscriber's watched domains, or an empty set when the
    /// subscriber is unknown, inactive, or the store misbehaves. Lookup
    /// problems are logged, not surfaced.
    pub fn get_domains(&self, email: &str) -> BTreeSet<String> {
        let key = subscriber_key(email);
        match self.get_by_key(&key) {
            Ok(Some(sub)) if sub.status == SubscriptionStatus::Active => sub.domains,
            Ok(_) => BTreeSet::new(),
            Err(e) => {
                tracing::error!(subscriber = %key, error = %e, "Subscription lookup failed");
                BTreeSet::new()
            }
        }
    }

    pub fn get_subscription(&self, email: &str) -> Result<Option<Subscription>> {
        self.get_by_key(&subscriber_key(email))
    }

    /// Removes specific domains, or soft-deletes the whole subscription
    /// when `domains` is `None` (the domain set is retained for a later
    /// re-registration). Returns false when the subscriber is unknown.
    pub fn unregister(&self, email: &str, domains: Option<&[String]>) -> Result<bool> {
        let key = subscriber_key(email);
        let Some(existing) = self.get_by_key(&key)? else {
            return Ok(false);
        };
        let now = Utc::now().timestamp();

        match domains {
            Some(to_remove) => {
                let removal = normalize_domains(to_remove);
                let remaining: BTreeSet<String> = existing
                    .domains
                    .difference(&removal)
                    .cloned()
                    .collect();
                let domains_json = serde_json::to_string(&remaining)?;
                self.conn().execute(
                    "UPDATE subscriptions SET domains = ?1, updated_at = ?2 WHERE key = ?3",
                    rusqlite::params![domains_json, now, key],
                )?;
                tracing::info!(
                    subscriber = %key,
                    removed = removal.len(),
                    remaining = remaining.len(),
                    "Removed domains from subscription"
                );
            }
            None => {
                self.conn().execute(
                    "UPDATE subscriptions SET status = ?1, updated_at = ?2 WHERE key = ?3",
                    rusqlite::params![SubscriptionStatus::Inactive.to_string(), now, key],
                )?;
                tracing::info!(subscriber = %key, "Deactivated subscription");
            }
        }
        Ok(true)
    }

    /// All active subscriptions. The notification run aborts when this
    /// fails, so the error is surfaced rather than swallowed.
    pub fn list_active(&self) -> Result<Vec<Subscription>> {
        let conn = self.conn();
        let mut stmt = conn.prepare_cached(
            "SELECT email, domains, status, created_at, updated_at
             FROM subscriptions WHERE status = ?1 ORDER BY email",
        )?;
        let rows = stmt.query_map(
            rusqlite::params![SubscriptionStatus::Active.to_string()],
            row_to_subscription,
        )?;

        let mut subs = Vec::new();
        for row in rows {
            subs.push(row?);
        }
        Ok(subs)
    }

    fn get_by_key(&self, key: &str) -> Result<Option<Subscription>> {
        let conn = self.conn();
        let mut stmt = conn.prepare_cached(
            "SELECT email, domains, status, created_at, updated_at
             FROM subscriptions WHERE key = ?1",
        )?;
        let mut rows = stmt.query(rusqlite::params![key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_subscription(row).map_err(StorageError::from)?)),
            None => Ok(None),
        }
    }
}

fn row_to_subscription(row: &rusqlite::Row<'_>) -> rusqlite::Result<Subscription> {
    let email: String = row.get(0)?;
    let domains_json: String = row.get(1)?;
    let status_str: String = row.get(2)?;
    let created_ts: i64 = row.get(3)?;
    let updated_ts: i64 = row.get(4)?;

    let domains: BTreeSet<String> = serde_json::from_str(&domains_json).unwrap_or_default();
    let status = status_str.parse().unwrap_or(SubscriptionStatus::Inactive);

    Ok(Subscription {
        email,
        domains,
        status,
        created_at: DateTime::from_timestamp(created_ts, 0).unwrap_or_default(),
        updated_at: DateTime::from_timestamp(updated_ts, 0).unwrap_or_default(),
    })
}
