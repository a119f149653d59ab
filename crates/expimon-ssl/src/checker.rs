use crate::discovery::HostDiscovery;
use crate::fetcher::{CertFetchError, PeerCertFetcher, PeerCertificate};
use chrono::Utc;
use expimon_common::types::{classify_cert_days, CertStatus, CertificateRecord};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Batch certificate checks across the hostnames of one domain.
pub struct CertificateChecker {
    discovery: HostDiscovery,
    fetcher: Arc<dyn PeerCertFetcher>,
    max_concurrent: usize,
}

impl CertificateChecker {
    pub fn new(
        discovery: HostDiscovery,
        fetcher: Arc<dyn PeerCertFetcher>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            discovery,
            fetcher,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Discovers the domain's hostnames and checks each certificate under
    /// bounded concurrency. One record per hostname; fetch failures become
    /// error records and never abort the batch.
    pub async fn check_domain_certificates(
        &self,
        domain: &str,
        threshold_days: i64,
    ) -> Vec<CertificateRecord> {
        let hostnames = self.discovery.discover(domain).await;

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::with_capacity(hostnames.len());

        for hostname in hostnames {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(p) => p,
                Err(_) => break,
            };
            let fetcher = self.fetcher.clone();
            let domain = domain.to_string();

            handles.push(tokio::spawn(async move {
                let record = match fetcher.fetch(&hostname).await {
                    Ok(cert) => success_record(&hostname, &domain, cert, threshold_days),
                    Err(e) => failure_record(&hostname, &domain, e),
                };
                drop(permit);
                record
            }));
        }

        let mut records = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::error!(domain, error = %e, "Certificate check task panicked");
                }
            }
        }

        records.sort_by(|a, b| {
            a.days_to_expire
                .cmp(&b.days_to_expire)
                .then_with(|| a.hostname.cmp(&b.hostname))
        });
        records
    }
}

fn success_record(
    hostname: &str,
    domain: &str,
    cert: PeerCertificate,
    threshold_days: i64,
) -> CertificateRecord {
    let now = Utc::now();
    let days_to_expire = (cert.not_after - now).num_days();
    let status = classify_cert_days(days_to_expire, threshold_days);
    tracing::info!(
        hostname,
        days_left = days_to_expire,
        status = %status,
        "Certificate checked"
    );
    CertificateRecord {
        hostname: hostname.to_string(),
        domain: domain.to_string(),
        issuer: cert.issuer_org.unwrap_or(cert.issuer),
        subject: cert.subject_cn.unwrap_or(cert.subject),
        serial_number: cert.serial_hex,
        version: cert.version,
        not_before: Some(cert.not_before),
        not_after: Some(cert.not_after),
        days_to_expire,
        status,
        error: None,
        checked_at: now,
    }
}

fn failure_record(hostname: &str, domain: &str, error: CertFetchError) -> CertificateRecord {
    let status = match &error {
        CertFetchError::Connection { .. } => CertStatus::ConnectionError,
        CertFetchError::Tls { .. } => CertStatus::TlsError,
        CertFetchError::Other(_) => CertStatus::Unknown,
    };
    tracing::warn!(hostname, error = %error, "Certificate check failed");
    CertificateRecord {
        hostname: hostname.to_string(),
        domain: domain.to_string(),
        issuer: String::new(),
        subject: String::new(),
        serial_number: String::new(),
        version: 0,
        not_before: None,
        not_after: None,
        days_to_expire: -1,
        status,
        error: Some(error.to_string()),
        checked_at: Utc::now(),
    }
}
