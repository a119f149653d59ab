use crate::error::{ResolutionError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const WHOIS_PORT: u16 = 43;
const IANA_SERVER: &str = "whois.iana.org";

static REFER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\s*refer:\s*(\S+)").unwrap());
static REGISTRAR_SERVER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*(?:Registrar WHOIS Server|Whois Server):\s*(\S+)").unwrap()
});

/// Registry servers for the TLDs seen most often; everything else goes
/// through the IANA referral.
static TLD_SERVERS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("com", "whois.verisign-grs.com"),
        ("net", "whois.verisign-grs.com"),
        ("org", "whois.pir.org"),
        ("info", "whois.nic.info"),
        ("biz", "whois.nic.biz"),
        ("io", "whois.nic.io"),
        ("co", "whois.nic.co"),
        ("me", "whois.nic.me"),
        ("dev", "whois.nic.google"),
        ("app", "whois.nic.google"),
        ("ai", "whois.nic.ai"),
        ("uk", "whois.nic.uk"),
        ("de", "whois.denic.de"),
        ("fr", "whois.nic.fr"),
        ("nl", "whois.domain-registry.nl"),
        ("eu", "whois.eu"),
        ("ru", "whois.tcinet.ru"),
        ("su", "whois.tcinet.ru"),
        ("jp", "whois.jprs.jp"),
        ("kr", "whois.kr"),
        ("cn", "whois.cnnic.cn"),
        ("br", "whois.registro.br"),
        ("au", "whois.auda.org.au"),
        ("nz", "whois.srs.net.nz"),
        ("ca", "whois.cira.ca"),
        ("us", "whois.nic.us"),
        ("za", "whois.registry.net.za"),
        ("in", "whois.registry.in"),
        ("it", "whois.nic.it"),
        ("es", "whois.nic.es"),
        ("ch", "whois.nic.ch"),
        ("se", "whois.iis.se"),
        ("no", "whois.norid.no"),
        ("pl", "whois.dns.pl"),
    ])
});

/// Raw WHOIS transport: TCP port 43, one query per connection.
pub struct WhoisClient {
    timeout_secs: u64,
}

impl WhoisClient {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }

    /// Queries the registry for `domain`, following at most one registrar
    /// referral. Returns the response that carried the most data.
    pub async fn query(&self, domain: &str) -> Result<String> {
        let tld = domain
            .rsplit('.')
            .next()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ResolutionError::InvalidHost {
                host: domain.to_string(),
                reason: "missing TLD".to_string(),
            })?;

        let server = match TLD_SERVERS.get(tld) {
            Some(s) => s.to_string(),
            None => self.resolve_server_via_iana(tld).await?,
        };

        let registry_response = self.query_server(&server, domain).await?;

        // Thin registries point at the registrar's server for the real data.
        if let Some(cap) = REGISTRAR_SERVER_RE.captures(&registry_response) {
            let referral = cap[1].trim().trim_end_matches('/').to_string();
            let referral = referral
                .strip_prefix("https://")
                .or_else(|| referral.strip_prefix("http://"))
                .unwrap_or(&referral)
                .to_string();
            if !referral.is_empty() && !referral.eq_ignore_ascii_case(&server) {
                match self.query_server(&referral, domain).await {
                    Ok(registrar_response)
                        if registrar_response.len() > registry_response.len() =>
                    {
                        return Ok(registrar_response);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(
                            domain,
                            server = %referral,
                            error = %e,
                            "Registrar referral failed, keeping registry response"
                        );
                    }
                }
            }
        }

        Ok(registry_response)
    }

    async fn resolve_server_via_iana(&self, tld: &str) -> Result<String> {
        let response = self.query_server(IANA_SERVER, tld).await?;
        REFER_RE
            .captures(&response)
            .map(|cap| cap[1].trim().to_string())
            .ok_or_else(|| ResolutionError::NoServer(tld.to_string()))
    }

    async fn query_server(&self, server: &str, query: &str) -> Result<String> {
        // JPRS replies in Japanese unless asked otherwise.
        let payload = if server == "whois.jprs.jp" {
            format!("{query}/e\r\n")
        } else {
            format!("{query}\r\n")
        };

        let io_err = |source| ResolutionError::Io {
            server: server.to_string(),
            source,
        };
        let timed_out = || ResolutionError::Timeout {
            server: server.to_string(),
            secs: self.timeout_secs,
        };
        let deadline = Duration::from_secs(self.timeout_secs);

        let mut stream = tokio::time::timeout(
            deadline,
            TcpStream::connect((server, WHOIS_PORT)),
        )
        .await
        .map_err(|_| timed_out())?
        .map_err(io_err)?;

        stream.write_all(payload.as_bytes()).await.map_err(io_err)?;

        let mut buf = Vec::new();
        tokio::time::timeout(deadline, stream.read_to_end(&mut buf))
            .await
            .map_err(|_| timed_out())?
            .map_err(io_err)?;

        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}
