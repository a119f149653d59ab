use crate::error::Result;
use crate::resolver::{WhoisInfo, WhoisLookup};
use expimon_common::cache::CacheBackend;
use std::sync::Arc;

pub const DEFAULT_TTL_SECS: u64 = 86400;

/// Per-call cache behavior.
#[derive(Debug, Clone, Copy)]
pub struct CacheOptions {
    pub ttl_secs: u64,
    /// Skip the cache entirely: no read, no write.
    pub bypass_cache: bool,
    /// Skip the read but store the fresh result, renewing the TTL.
    pub force_refresh: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL_SECS,
            bypass_cache: false,
            force_refresh: false,
        }
    }
}

/// Read-through cache in front of WHOIS lookups.
///
/// Backend failures are logged and swallowed: a broken cache degrades
/// to fresh lookups, it never fails a check. Concurrent misses for the
/// same domain may each perform a lookup; the last write wins.
pub struct ExpiryCache {
    backend: Arc<dyn CacheBackend>,
    lookup: Arc<dyn WhoisLookup>,
}

impl ExpiryCache {
    pub fn new(backend: Arc<dyn CacheBackend>, lookup: Arc<dyn WhoisLookup>) -> Self {
        Self { backend, lookup }
    }

    fn cache_key(domain: &str) -> String {
        format!("whois:lookup:{domain}")
    }

    pub async fn get_or_lookup(&self, domain: &str, opts: CacheOptions) -> Result<WhoisInfo> {
        let key = Self::cache_key(domain);

        if !opts.bypass_cache && !opts.force_refresh {
            match self.backend.get(&key) {
                Ok(Some(json)) => match serde_json::from_str::<WhoisInfo>(&json) {
                    Ok(info) => {
                        tracing::debug!(domain, "WHOIS cache hit");
                        return Ok(info);
                    }
                    Err(e) => {
                        tracing::warn!(domain, error = %e, "Discarding undecodable cache entry");
                    }
                },
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(domain, error = %e, "Cache read failed, falling through");
                }
            }
        }

        let info = self.lookup.lookup(domain).await?;

        if !opts.bypass_cache {
            match serde_json::to_string(&info) {
                Ok(json) => {
                    if let Err(e) = self.backend.put(&key, &json, opts.ttl_secs) {
                        tracing::warn!(domain, error = %e, "Cache write failed");
                    }
                }
                Err(e) => {
                    tracing::warn!(domain, error = %e, "Failed to encode cache entry");
                }
            }
        }

        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolutionError;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MemoryBackend {
        entries: Mutex<HashMap<String, String>>,
        broken: bool,
    }

    impl MemoryBackend {
        fn new() -> Self {
            Self {
                entries: Mutex::new(HashMap::new()),
                broken: false,
            }
        }

        fn broken() -> Self {
            Self {
                entries: Mutex::new(HashMap::new()),
                broken: true,
            }
        }
    }

    impl CacheBackend for MemoryBackend {
        fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
            if self.broken {
                anyhow::bail!("backend down");
            }
            Ok(self.entries.lock().unwrap().get(key).cloned())
        }

        fn put(&self, key: &str, value: &str, _ttl_secs: u64) -> anyhow::Result<()> {
            if self.broken {
                anyhow::bail!("backend down");
            }
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }
    }

    struct CountingLookup {
        calls: AtomicUsize,
    }

    impl CountingLookup {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl WhoisLookup for CountingLookup {
        async fn lookup(&self, domain: &str) -> crate::error::Result<WhoisInfo> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(WhoisInfo {
                domain: domain.to_string(),
                expiration_dates: vec!["2026-12-31 00:00:00".to_string()],
                registrar: Some("Test Registrar".to_string()),
                registrant: None,
                creation_date: None,
                updated_date: None,
                last_updated: Utc::now(),
            })
        }
    }

    struct FailingLookup;

    #[async_trait]
    impl WhoisLookup for FailingLookup {
        async fn lookup(&self, domain: &str) -> crate::error::Result<WhoisInfo> {
            Err(ResolutionError::NoExpiry {
                domain: domain.to_string(),
            })
        }
    }

    #[tokio::test]
    async fn repeated_reads_hit_the_cache_once() {
        let lookup = Arc::new(CountingLookup::new());
        let cache = ExpiryCache::new(Arc::new(MemoryBackend::new()), lookup.clone());

        let first = cache
            .get_or_lookup("example.com", CacheOptions::default())
            .await
            .unwrap();
        let second = cache
            .get_or_lookup("example.com", CacheOptions::default())
            .await
            .unwrap();

        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn force_refresh_skips_read_and_rewrites() {
        let lookup = Arc::new(CountingLookup::new());
        let cache = ExpiryCache::new(Arc::new(MemoryBackend::new()), lookup.clone());

        let cached = cache
            .get_or_lookup("example.com", CacheOptions::default())
            .await
            .unwrap();
        let refreshed = cache
            .get_or_lookup(
                "example.com",
                CacheOptions {
                    force_refresh: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);
        assert!(refreshed.last_updated >= cached.last_updated);

        // The refreshed value must now serve subsequent reads.
        let after = cache
            .get_or_lookup("example.com", CacheOptions::default())
            .await
            .unwrap();
        assert_eq!(after.last_updated, refreshed.last_updated);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn bypass_leaves_cache_untouched() {
        let lookup = Arc::new(CountingLookup::new());
        let backend = Arc::new(MemoryBackend::new());
        let cache = ExpiryCache::new(backend.clone(), lookup.clone());

        cache
            .get_or_lookup(
                "example.com",
                CacheOptions {
                    bypass_cache: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
        assert!(backend.entries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn broken_backend_degrades_to_fresh_lookups() {
        let lookup = Arc::new(CountingLookup::new());
        let cache = ExpiryCache::new(Arc::new(MemoryBackend::broken()), lookup.clone());

        assert!(cache
            .get_or_lookup("example.com", CacheOptions::default())
            .await
            .is_ok());
        assert!(cache
            .get_or_lookup("example.com", CacheOptions::default())
            .await
            .is_ok());
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn lookup_errors_propagate() {
        let cache = ExpiryCache::new(Arc::new(MemoryBackend::new()), Arc::new(FailingLookup));
        let err = cache
            .get_or_lookup("example.com", CacheOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::NoExpiry { .. }));
    }
}
