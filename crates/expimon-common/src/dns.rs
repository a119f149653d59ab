use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::proto::rr::{RData, RecordType};
use hickory_resolver::TokioAsyncResolver;
use std::net::IpAddr;

/// Record types the checks probe for beyond plain address lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Mx,
    Ns,
}

impl RecordKind {
    fn record_type(self) -> RecordType {
        match self {
            RecordKind::Mx => RecordType::MX,
            RecordKind::Ns => RecordType::NS,
        }
    }
}

/// DNS lookups used by the validator and the hostname discovery.
///
/// Failures are treated as "no records": callers decide what an empty
/// answer means, and the implementation logs the underlying cause.
#[async_trait]
pub trait RecordResolver: Send + Sync {
    async fn lookup_ips(&self, host: &str) -> Vec<IpAddr>;
    async fn lookup_cname(&self, host: &str) -> Vec<String>;
    async fn has_record(&self, host: &str, kind: RecordKind) -> bool;
    async fn reverse_lookup(&self, ip: IpAddr) -> Option<String>;
}

/// Production resolver backed by hickory with system-like defaults.
pub struct SystemDnsResolver {
    inner: TokioAsyncResolver,
}

impl SystemDnsResolver {
    pub fn new() -> Self {
        let resolver = match TokioAsyncResolver::tokio_from_system_conf() {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "System resolver config unavailable, using defaults");
                TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
            }
        };
        Self { inner: resolver }
    }
}

impl Default for SystemDnsResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordResolver for SystemDnsResolver {
    async fn lookup_ips(&self, host: &str) -> Vec<IpAddr> {
        match self.inner.lookup_ip(host).await {
            Ok(lookup) => lookup.iter().collect(),
            Err(e) => {
                tracing::debug!(host, error = %e, "Address lookup failed");
                Vec::new()
            }
        }
    }

    async fn lookup_cname(&self, host: &str) -> Vec<String> {
        match self.inner.lookup(host, RecordType::CNAME).await {
            Ok(lookup) => lookup
                .iter()
                .filter_map(|rdata| match rdata {
                    RData::CNAME(name) => {
                        Some(name.to_utf8().trim_end_matches('.').to_string())
                    }
                    _ => None,
                })
                .collect(),
            Err(e) => {
                tracing::debug!(host, error = %e, "CNAME lookup failed");
                Vec::new()
            }
        }
    }

    async fn has_record(&self, host: &str, kind: RecordKind) -> bool {
        match self.inner.lookup(host, kind.record_type()).await {
            Ok(lookup) => lookup.iter().next().is_some(),
            Err(e) => {
                tracing::debug!(host, kind = ?kind, error = %e, "Record lookup failed");
                false
            }
        }
    }

    async fn reverse_lookup(&self, ip: IpAddr) -> Option<String> {
        match self.inner.reverse_lookup(ip).await {
            Ok(lookup) => lookup
                .iter()
                .next()
                .map(|name| name.to_utf8().trim_end_matches('.').to_string()),
            Err(e) => {
                tracing::debug!(ip = %ip, error = %e, "Reverse lookup failed");
                None
            }
        }
    }
}
