use expimon_common::dns::RecordResolver;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Service prefixes probed when expanding a domain to the hostnames
/// likely to serve TLS.
pub const PROBE_PREFIXES: [&str; 10] = [
    "www", "mail", "webmail", "blog", "shop", "dev", "api", "admin", "portal", "staging",
];

/// DNS-based hostname discovery for certificate checks.
pub struct HostDiscovery {
    dns: Arc<dyn RecordResolver>,
}

impl HostDiscovery {
    pub fn new(dns: Arc<dyn RecordResolver>) -> Self {
        Self { dns }
    }

    /// Expands `domain` to the set of hostnames worth checking: the root
    /// itself (always, even when nothing resolves), CNAME targets of the
    /// root, and any common service prefix with a live record.
    pub async fn discover(&self, domain: &str) -> Vec<String> {
        let domain = domain.trim_end_matches('.').to_lowercase();
        let mut hosts = BTreeSet::new();
        hosts.insert(domain.clone());

        for target in self.dns.lookup_cname(&domain).await {
            let target = target.trim_end_matches('.').to_lowercase();
            if !target.is_empty() {
                hosts.insert(target);
            }
        }

        for prefix in PROBE_PREFIXES {
            let candidate = format!("{prefix}.{domain}");
            if !self.dns.lookup_ips(&candidate).await.is_empty()
                || !self.dns.lookup_cname(&candidate).await.is_empty()
            {
                hosts.insert(candidate);
            }
        }

        tracing::debug!(domain = %domain, count = hosts.len(), "Discovered hostnames");
        hosts.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use expimon_common::dns::RecordKind;
    use std::collections::{HashMap, HashSet};
    use std::net::IpAddr;

    struct FakeDns {
        ips: HashSet<String>,
        cnames: HashMap<String, Vec<String>>,
    }

    #[async_trait]
    impl RecordResolver for FakeDns {
        async fn lookup_ips(&self, host: &str) -> Vec<IpAddr> {
            if self.ips.contains(host) {
                vec!["192.0.2.10".parse().unwrap()]
            } else {
                Vec::new()
            }
        }

        async fn lookup_cname(&self, host: &str) -> Vec<String> {
            self.cnames.get(host).cloned().unwrap_or_default()
        }

        async fn has_record(&self, _host: &str, _kind: RecordKind) -> bool {
            false
        }

        async fn reverse_lookup(&self, _ip: IpAddr) -> Option<String> {
            None
        }
    }

    fn discovery(ips: &[&str], cnames: &[(&str, &str)]) -> HostDiscovery {
        HostDiscovery::new(Arc::new(FakeDns {
            ips: ips.iter().map(|s| s.to_string()).collect(),
            cnames: cnames
                .iter()
                .map(|(k, v)| (k.to_string(), vec![v.to_string()]))
                .collect(),
        }))
    }

    #[tokio::test]
    async fn root_is_always_included() {
        let d = discovery(&[], &[]);
        let hosts = d.discover("example.com").await;
        assert_eq!(hosts, vec!["example.com".to_string()]);
    }

    #[tokio::test]
    async fn resolving_prefixes_are_added() {
        let d = discovery(&["www.example.com", "api.example.com"], &[]);
        let hosts = d.discover("example.com").await;
        assert!(hosts.contains(&"example.com".to_string()));
        assert!(hosts.contains(&"www.example.com".to_string()));
        assert!(hosts.contains(&"api.example.com".to_string()));
        assert!(!hosts.contains(&"mail.example.com".to_string()));
    }

    #[tokio::test]
    async fn cname_targets_are_added() {
        let d = discovery(
            &[],
            &[
                ("example.com", "edge.cdn-provider.net."),
                ("shop.example.com", "shopfront.example.com"),
            ],
        );
        let hosts = d.discover("example.com").await;
        assert!(hosts.contains(&"edge.cdn-provider.net".to_string()));
        assert!(hosts.contains(&"shop.example.com".to_string()));
    }

    #[tokio::test]
    async fn normalizes_case_and_trailing_dot() {
        let d = discovery(&[], &[]);
        let hosts = d.discover("Example.COM.").await;
        assert_eq!(hosts, vec!["example.com".to_string()]);
    }
}
