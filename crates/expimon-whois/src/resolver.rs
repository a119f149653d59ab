use crate::client::WhoisClient;
use crate::error::{ResolutionError, Result};
use crate::parser::{self, ParsedWhois};
use crate::suffix::SuffixList;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use expimon_common::dns::RecordResolver;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;

/// Registration data for one domain, as cached and consumed downstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WhoisInfo {
    pub domain: String,
    /// Normalized `YYYY-MM-DD HH:MM:SS` strings; possibly more than one
    /// when registry and registrar disagree.
    pub expiration_dates: Vec<String>,
    pub registrar: Option<String>,
    pub registrant: Option<String>,
    pub creation_date: Option<String>,
    pub updated_date: Option<String>,
    /// When this record was fetched from the registry.
    pub last_updated: DateTime<Utc>,
}

impl WhoisInfo {
    /// The earliest of the reported expiry dates. Registries and
    /// registrars occasionally disagree; the conservative one wins.
    pub fn earliest_expiry(&self) -> Option<DateTime<Utc>> {
        self.expiration_dates
            .iter()
            .filter_map(|s| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                    .ok()
                    .map(|dt| dt.and_utc())
            })
            .min()
    }
}

/// Seam for registration lookups so the cache and the scheduler can be
/// exercised without touching port 43.
#[async_trait]
pub trait WhoisLookup: Send + Sync {
    async fn lookup(&self, domain: &str) -> Result<WhoisInfo>;
}

/// Canonicalizes the input, queries the responsible server and parses
/// the response, retrying with a registry-specific parser when the
/// generic field extraction comes up empty.
pub struct WhoisResolver {
    client: WhoisClient,
    suffixes: Arc<SuffixList>,
    dns: Arc<dyn RecordResolver>,
}

impl WhoisResolver {
    pub fn new(
        client: WhoisClient,
        suffixes: Arc<SuffixList>,
        dns: Arc<dyn RecordResolver>,
    ) -> Self {
        Self {
            client,
            suffixes,
            dns,
        }
    }

    async fn canonicalize(&self, input: &str) -> Result<String> {
        // IP literals are reverse-resolved so "what expires at 192.0.2.7"
        // still gets a sensible answer; on PTR failure the literal passes
        // through and the query will surface its own error.
        let host = if let Ok(ip) = input.parse::<IpAddr>() {
            match self.dns.reverse_lookup(ip).await {
                Some(name) => {
                    tracing::debug!(ip = %ip, host = %name, "Reverse-resolved IP literal");
                    name
                }
                None => input.to_string(),
            }
        } else {
            input.to_string()
        };

        let registrable = self.suffixes.registrable_domain(&host);
        if registrable.is_ascii() {
            Ok(registrable)
        } else {
            idna::domain_to_ascii(&registrable).map_err(|e| ResolutionError::InvalidHost {
                host: registrable.clone(),
                reason: e.to_string(),
            })
        }
    }
}

#[async_trait]
impl WhoisLookup for WhoisResolver {
    async fn lookup(&self, input: &str) -> Result<WhoisInfo> {
        let domain = self.canonicalize(input).await?;
        let raw = self.client.query(&domain).await.map_err(|e| {
            tracing::warn!(domain = %domain, error = %e, "WHOIS query failed");
            e
        })?;

        let mut parsed = parser::parse_base(&raw);

        if parsed.expiration_dates.is_empty() {
            let tld = domain.rsplit('.').next().unwrap_or_default();
            if let Some(specific) = parser::parse_for_tld(tld, &raw) {
                tracing::debug!(domain = %domain, tld, "Base parse empty, using TLD parser");
                adopt_tld_fields(&mut parsed, specific);
            }
        }

        Ok(WhoisInfo {
            domain,
            expiration_dates: parsed.expiration_dates,
            registrar: parsed.registrar,
            registrant: parsed.registrant,
            creation_date: parsed.creation_date,
            updated_date: parsed.updated_date,
            last_updated: Utc::now(),
        })
    }
}

fn adopt_tld_fields(base: &mut ParsedWhois, specific: ParsedWhois) {
    base.expiration_dates = specific.expiration_dates;
    if base.creation_date.is_none() {
        base.creation_date = specific.creation_date;
    }
    if base.updated_date.is_none() {
        base.updated_date = specific.updated_date;
    }
    if base.registrar.is_none() {
        base.registrar = specific.registrar;
    }
    if base.registrant.is_none() {
        base.registrant = specific.registrant;
    }
}
