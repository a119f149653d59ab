use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rustls::ClientConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use x509_parser::prelude::*;

pub const HTTPS_PORT: u16 = 443;

/// How a certificate fetch failed. Connection and TLS problems are kept
/// apart because they classify differently downstream.
#[derive(Debug, thiserror::Error)]
pub enum CertFetchError {
    #[error("connect to {host}:{port} failed: {reason}")]
    Connection {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("TLS handshake with {host} failed: {reason}")]
    Tls { host: String, reason: String },

    #[error("{0}")]
    Other(String),
}

/// Leaf certificate fields as served by a host.
#[derive(Debug, Clone)]
pub struct PeerCertificate {
    pub issuer: String,
    pub issuer_org: Option<String>,
    pub subject: String,
    pub subject_cn: Option<String>,
    pub serial_hex: String,
    pub version: u32,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

/// Seam for retrieving the certificate a host presents, so batch checks
/// can be tested without sockets.
#[async_trait]
pub trait PeerCertFetcher: Send + Sync {
    async fn fetch(&self, hostname: &str) -> Result<PeerCertificate, CertFetchError>;
}

/// Real fetcher: bounded-timeout TCP connect, verifying rustls handshake
/// against the webpki roots, leaf parsed with x509-parser.
pub struct TlsPeerFetcher {
    connector: TlsConnector,
    timeout_secs: u64,
}

impl TlsPeerFetcher {
    pub fn new(timeout_secs: u64) -> Self {
        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();
        Self {
            connector: TlsConnector::from(Arc::new(config)),
            timeout_secs,
        }
    }

    /// Punycode-encodes IDN hostnames. Labels with underscores are left
    /// alone; they are not IDNs and the encoder would reject them.
    fn ascii_hostname(hostname: &str) -> Result<String, CertFetchError> {
        if hostname.is_ascii() || hostname.contains('_') {
            return Ok(hostname.to_string());
        }
        idna::domain_to_ascii(hostname).map_err(|e| {
            CertFetchError::Other(format!("IDNA encoding of '{hostname}' failed: {e}"))
        })
    }
}

#[async_trait]
impl PeerCertFetcher for TlsPeerFetcher {
    async fn fetch(&self, hostname: &str) -> Result<PeerCertificate, CertFetchError> {
        let host = Self::ascii_hostname(hostname)?;
        let deadline = Duration::from_secs(self.timeout_secs);

        let server_name = rustls::pki_types::ServerName::try_from(host.clone()).map_err(|e| {
            CertFetchError::Other(format!("invalid server name '{host}': {e}"))
        })?;

        let addr = format!("{host}:{HTTPS_PORT}");
        let tcp = tokio::time::timeout(deadline, TcpStream::connect(&addr))
            .await
            .map_err(|_| CertFetchError::Connection {
                host: host.clone(),
                port: HTTPS_PORT,
                reason: format!("timed out after {}s", self.timeout_secs),
            })?
            .map_err(|e| CertFetchError::Connection {
                host: host.clone(),
                port: HTTPS_PORT,
                reason: e.to_string(),
            })?;

        let tls_stream = tokio::time::timeout(deadline, self.connector.connect(server_name, tcp))
            .await
            .map_err(|_| CertFetchError::Tls {
                host: host.clone(),
                reason: format!("handshake timed out after {}s", self.timeout_secs),
            })?
            .map_err(|e| CertFetchError::Tls {
                host: host.clone(),
                reason: e.to_string(),
            })?;

        let (_io, conn) = tls_stream.into_inner();
        let certs = conn.peer_certificates().ok_or_else(|| {
            CertFetchError::Tls {
                host: host.clone(),
                reason: "no peer certificates".to_string(),
            }
        })?;
        let leaf_der = certs.first().ok_or_else(|| CertFetchError::Tls {
            host: host.clone(),
            reason: "empty certificate chain".to_string(),
        })?;

        let (_, cert) = X509Certificate::from_der(leaf_der.as_ref()).map_err(|e| {
            CertFetchError::Other(format!("failed to parse X.509 certificate: {e}"))
        })?;

        let not_before = cert.validity().not_before.to_datetime();
        let not_after = cert.validity().not_after.to_datetime();
        let not_before =
            DateTime::from_timestamp(not_before.unix_timestamp(), 0).unwrap_or_default();
        let not_after =
            DateTime::from_timestamp(not_after.unix_timestamp(), 0).unwrap_or_default();

        let issuer_org = cert
            .issuer()
            .iter_organization()
            .next()
            .and_then(|attr| attr.as_str().ok())
            .map(str::to_string);
        let subject_cn = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|attr| attr.as_str().ok())
            .map(str::to_string);

        Ok(PeerCertificate {
            issuer: cert.issuer().to_string(),
            issuer_org,
            subject: cert.subject().to_string(),
            subject_cn,
            serial_hex: cert.raw_serial_as_string(),
            version: cert.version().0,
            not_before,
            not_after,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_hostnames_pass_through() {
        assert_eq!(
            TlsPeerFetcher::ascii_hostname("www.example.com").unwrap(),
            "www.example.com"
        );
    }

    #[test]
    fn idn_hostnames_are_punycoded() {
        assert_eq!(
            TlsPeerFetcher::ascii_hostname("münchen.example").unwrap(),
            "xn--mnchen-3ya.example"
        );
    }

    #[test]
    fn underscore_labels_are_left_alone() {
        assert_eq!(
            TlsPeerFetcher::ascii_hostname("_dmarc.example.com").unwrap(),
            "_dmarc.example.com"
        );
    }
}
