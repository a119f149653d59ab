use crate::cache::{CacheOptions, ExpiryCache};
use crate::suffix::SuffixList;
use crate::validator::DomainValidator;
use chrono::Utc;
use expimon_common::types::{classify_days, DomainRecord, ExpiryStatus};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Full domain expiry check: validate, resolve through the cache,
/// classify. Produces a record per input, never an error.
pub struct DomainChecker {
    validator: DomainValidator,
    suffixes: Arc<SuffixList>,
    cache: ExpiryCache,
    ttl_secs: u64,
}

impl DomainChecker {
    pub fn new(
        validator: DomainValidator,
        suffixes: Arc<SuffixList>,
        cache: ExpiryCache,
        ttl_secs: u64,
    ) -> Self {
        Self {
            validator,
            suffixes,
            cache,
            ttl_secs,
        }
    }

    /// Checks each distinct domain in `domains`. Duplicates collapse to
    /// a single check; individual failures become `Error` records.
    pub async fn check_domains(&self, domains: &[String], threshold_days: i64) -> Vec<DomainRecord> {
        let unique: BTreeSet<String> = domains
            .iter()
            .map(|d| DomainValidator::normalize(d))
            .filter(|d| !d.is_empty())
            .collect();

        let mut records = Vec::with_capacity(unique.len());
        for domain in unique {
            records.push(self.check_domain(&domain, threshold_days).await);
        }
        records
    }

    pub async fn check_domain(&self, domain: &str, threshold_days: i64) -> DomainRecord {
        self.check_domain_with(domain, threshold_days, CacheOptions {
            ttl_secs: self.ttl_secs,
            ..Default::default()
        })
        .await
    }

    pub async fn check_domain_with(
        &self,
        domain: &str,
        threshold_days: i64,
        opts: CacheOptions,
    ) -> DomainRecord {
        let now = Utc::now();
        let registrable = self.suffixes.registrable_domain(domain);

        // Invalid domains never reach the wire.
        if !self.validator.validate(&registrable).await {
            tracing::info!(domain, "Domain failed validation");
            return DomainRecord {
                domain: domain.to_string(),
                expiry_date: None,
                days_left: -1,
                registrar: String::new(),
                owner: String::new(),
                status: ExpiryStatus::Invalid,
                checked_at: now,
            };
        }

        match self.cache.get_or_lookup(&registrable, opts).await {
            Ok(info) => match info.earliest_expiry() {
                Some(expiry) => {
                    let days_left = (expiry - now).num_days();
                    let status = classify_days(days_left, threshold_days);
                    tracing::info!(
                        domain = %registrable,
                        days_left,
                        status = %status,
                        "Domain checked"
                    );
                    DomainRecord {
                        domain: domain.to_string(),
                        expiry_date: Some(expiry),
                        days_left,
                        registrar: info.registrar.unwrap_or_default(),
                        owner: info.registrant.unwrap_or_default(),
                        status,
                        checked_at: now,
                    }
                }
                None => {
                    tracing::warn!(domain = %registrable, "WHOIS response had no expiry date");
                    DomainRecord {
                        domain: domain.to_string(),
                        expiry_date: None,
                        days_left: -1,
                        registrar: info.registrar.unwrap_or_default(),
                        owner: info.registrant.unwrap_or_default(),
                        status: ExpiryStatus::Error,
                        checked_at: now,
                    }
                }
            },
            Err(e) => {
                tracing::warn!(domain = %registrable, error = %e, "Domain check failed");
                DomainRecord {
                    domain: domain.to_string(),
                    expiry_date: None,
                    days_left: -1,
                    registrar: String::new(),
                    owner: String::new(),
                    status: ExpiryStatus::Error,
                    checked_at: now,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolutionError;
    use crate::resolver::{WhoisInfo, WhoisLookup};
    use async_trait::async_trait;
    use chrono::Duration;
    use expimon_common::cache::CacheBackend;
    use expimon_common::dns::{RecordKind, RecordResolver};
    use std::collections::HashMap;
    use std::net::IpAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MemoryBackend(Mutex<HashMap<String, String>>);

    impl CacheBackend for MemoryBackend {
        fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
            Ok(self.0.lock().unwrap().get(key).cloned())
        }

        fn put(&self, key: &str, value: &str, _ttl_secs: u64) -> anyhow::Result<()> {
            self.0
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }
    }

    struct ScriptedWhois {
        expiries: HashMap<String, i64>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WhoisLookup for ScriptedWhois {
        async fn lookup(&self, domain: &str) -> crate::error::Result<WhoisInfo> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.expiries.get(domain) {
                Some(days) => {
                    let expiry = Utc::now() + Duration::days(*days) + Duration::hours(1);
                    Ok(WhoisInfo {
                        domain: domain.to_string(),
                        expiration_dates: vec![expiry
                            .format("%Y-%m-%d %H:%M:%S")
                            .to_string()],
                        registrar: Some("Scripted Registrar".to_string()),
                        registrant: Some("Scripted Owner".to_string()),
                        creation_date: None,
                        updated_date: None,
                        last_updated: Utc::now(),
                    })
                }
                None => Err(ResolutionError::Other(format!("no data for {domain}"))),
            }
        }
    }

    struct AllResolvingDns;

    #[async_trait]
    impl RecordResolver for AllResolvingDns {
        async fn lookup_ips(&self, _host: &str) -> Vec<IpAddr> {
            vec!["192.0.2.1".parse().unwrap()]
        }

        async fn lookup_cname(&self, _host: &str) -> Vec<String> {
            Vec::new()
        }

        async fn has_record(&self, _host: &str, _kind: RecordKind) -> bool {
            false
        }

        async fn reverse_lookup(&self, _ip: IpAddr) -> Option<String> {
            None
        }
    }

    fn checker(expiries: &[(&str, i64)]) -> (DomainChecker, Arc<ScriptedWhois>) {
        let whois = Arc::new(ScriptedWhois {
            expiries: expiries
                .iter()
                .map(|(d, days)| (d.to_string(), *days))
                .collect(),
            calls: AtomicUsize::new(0),
        });
        let suffixes = Arc::new(SuffixList::embedded());
        let dns: Arc<dyn RecordResolver> = Arc::new(AllResolvingDns);
        let cache = ExpiryCache::new(
            Arc::new(MemoryBackend(Mutex::new(HashMap::new()))),
            whois.clone(),
        );
        let checker = DomainChecker::new(
            DomainValidator::new(dns),
            suffixes,
            cache,
            86400,
        );
        (checker, whois)
    }

    #[tokio::test]
    async fn classifies_expiring_domain() {
        let (checker, _) = checker(&[("example.com", 10)]);
        let record = checker.check_domain("example.com", 30).await;
        assert_eq!(record.status, ExpiryStatus::ExpiringSoon);
        assert_eq!(record.days_left, 10);
        assert_eq!(record.registrar, "Scripted Registrar");
    }

    #[tokio::test]
    async fn expired_domain_classifies_with_negative_days() {
        let (checker, _) = checker(&[("lapsed.com", -5)]);
        let record = checker.check_domain("lapsed.com", 30).await;
        assert_eq!(record.status, ExpiryStatus::Expired);
        assert!(record.days_left < 0);
        assert!(record.expiry_date.unwrap() < Utc::now());
    }

    #[tokio::test]
    async fn invalid_domain_short_circuits_without_lookup() {
        let (checker, whois) = checker(&[]);
        let record = checker.check_domain("not a domain", 30).await;
        assert_eq!(record.status, ExpiryStatus::Invalid);
        assert_eq!(record.days_left, -1);
        assert_eq!(whois.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn resolution_failure_becomes_error_record() {
        let (checker, _) = checker(&[]);
        let record = checker.check_domain("unknown-zone.com", 30).await;
        assert_eq!(record.status, ExpiryStatus::Error);
        assert_eq!(record.days_left, -1);
    }

    #[tokio::test]
    async fn batch_isolates_failures_and_dedups() {
        let (checker, whois) = checker(&[("good.com", 90)]);
        let records = checker
            .check_domains(
                &[
                    "good.com".to_string(),
                    "www.good.com".to_string(),
                    "bad-zone.com".to_string(),
                ],
                30,
            )
            .await;

        // www.good.com reduces to good.com after normalization upstream of
        // the cache, so the registry is asked about two distinct domains.
        assert_eq!(records.len(), 3);
        let good: Vec<_> = records
            .iter()
            .filter(|r| r.status == ExpiryStatus::Valid)
            .collect();
        let errors: Vec<_> = records
            .iter()
            .filter(|r| r.status == ExpiryStatus::Error)
            .collect();
        assert_eq!(good.len(), 2);
        assert_eq!(errors.len(), 1);
        assert_eq!(whois.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn subdomain_checks_registrable_domain() {
        let (checker, _) = checker(&[("example.co.uk", 45)]);
        let record = checker.check_domain("www.example.co.uk", 30).await;
        assert_eq!(record.status, ExpiryStatus::Valid);
    }
}
