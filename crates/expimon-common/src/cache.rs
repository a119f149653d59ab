use anyhow::Result;

/// Key/value store with per-entry TTL used by the WHOIS expiry cache.
///
/// Implementations must be safe to call from multiple tasks. Errors are
/// surfaced so the caller can log and fall through to a fresh lookup;
/// a broken backend never blocks a check.
pub trait CacheBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn put(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;
}
