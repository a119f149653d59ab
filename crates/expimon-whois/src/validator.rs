use expimon_common::dns::{RecordKind, RecordResolver};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static DOMAIN_RE: Lazy<Regex> = Lazy::new(|| {
    // Labels of 1-63 alphanumeric/hyphen chars, no edge hyphens, two labels minimum.
    Regex::new(r"^(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?$")
        .unwrap()
});

/// Structural plus DNS-level domain validation.
pub struct DomainValidator {
    dns: Arc<dyn RecordResolver>,
}

impl DomainValidator {
    pub fn new(dns: Arc<dyn RecordResolver>) -> Self {
        Self { dns }
    }

    /// Strips URL artifacts and lowercases so `HTTPS://Example.COM/path`
    /// and `example.com` validate identically.
    pub fn normalize(input: &str) -> String {
        let trimmed = input.trim();
        let without_scheme = match trimmed.find("://") {
            Some(idx) => &trimmed[idx + 3..],
            None => trimmed,
        };
        let host = without_scheme
            .split(['/', '?', '#'])
            .next()
            .unwrap_or_default();
        let host = host.rsplit('@').next().unwrap_or_default();
        host.trim_end_matches('.').to_lowercase()
    }

    /// Returns true when the input is a well-formed domain that has at
    /// least one live DNS record (A, AAAA, MX or NS). Never errors.
    pub async fn validate(&self, input: &str) -> bool {
        let host = Self::normalize(input);
        if host.is_empty() {
            tracing::debug!(input, "Rejected empty domain");
            return false;
        }

        let ascii = if host.is_ascii() {
            host.clone()
        } else {
            match idna::domain_to_ascii(&host) {
                Ok(a) => a,
                Err(e) => {
                    tracing::debug!(domain = %host, error = %e, "IDNA encoding failed");
                    return false;
                }
            }
        };

        if !DOMAIN_RE.is_match(&ascii) {
            tracing::debug!(domain = %host, "Rejected malformed domain");
            return false;
        }

        // System resolver first; it answers for the overwhelming majority
        // of live domains without extra round trips.
        if let Ok(mut addrs) = tokio::net::lookup_host((ascii.as_str(), 443)).await {
            if addrs.next().is_some() {
                return true;
            }
        }

        if !self.dns.lookup_ips(&ascii).await.is_empty() {
            return true;
        }
        if self.dns.has_record(&ascii, RecordKind::Mx).await {
            return true;
        }
        if self.dns.has_record(&ascii, RecordKind::Ns).await {
            return true;
        }

        tracing::debug!(domain = %host, "No DNS records found");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::net::IpAddr;

    struct FakeResolver {
        with_ips: HashSet<String>,
        with_mx: HashSet<String>,
    }

    #[async_trait]
    impl RecordResolver for FakeResolver {
        async fn lookup_ips(&self, host: &str) -> Vec<IpAddr> {
            if self.with_ips.contains(host) {
                vec!["192.0.2.1".parse().unwrap()]
            } else {
                Vec::new()
            }
        }

        async fn lookup_cname(&self, _host: &str) -> Vec<String> {
            Vec::new()
        }

        async fn has_record(&self, host: &str, kind: RecordKind) -> bool {
            kind == RecordKind::Mx && self.with_mx.contains(host)
        }

        async fn reverse_lookup(&self, _ip: IpAddr) -> Option<String> {
            None
        }
    }

    fn validator(ips: &[&str], mx: &[&str]) -> DomainValidator {
        DomainValidator::new(Arc::new(FakeResolver {
            with_ips: ips.iter().map(|s| s.to_string()).collect(),
            with_mx: mx.iter().map(|s| s.to_string()).collect(),
        }))
    }

    #[test]
    fn normalize_strips_url_artifacts() {
        assert_eq!(
            DomainValidator::normalize("HTTPS://Example.COM/path?q=1"),
            "example.com"
        );
        assert_eq!(DomainValidator::normalize("example.com."), "example.com");
        assert_eq!(DomainValidator::normalize("  example.com  "), "example.com");
    }

    #[tokio::test]
    async fn rejects_malformed_domains() {
        let v = validator(&[], &[]);
        assert!(!v.validate("").await);
        assert!(!v.validate("no-dots").await);
        assert!(!v.validate("-bad.example.com").await);
        assert!(!v.validate("exa mple.com").await);
    }

    #[tokio::test]
    async fn rejects_well_formed_domain_without_records() {
        let v = validator(&[], &[]);
        assert!(!v.validate("definitely-unresolvable.invalid").await);
    }

    #[tokio::test]
    async fn accepts_domain_with_explicit_a_record() {
        let v = validator(&["resolvable.test"], &[]);
        assert!(v.validate("resolvable.test").await);
    }

    #[tokio::test]
    async fn accepts_mail_only_domain() {
        let v = validator(&[], &["mail-only.test"]);
        assert!(v.validate("mail-only.test").await);
    }
}
