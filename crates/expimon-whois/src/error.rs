/// Errors raised while resolving a domain's registration data.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("whois: no server known for TLD '{0}'")]
    NoServer(String),

    #[error("whois: query to {server} failed: {source}")]
    Io {
        server: String,
        #[source]
        source: std::io::Error,
    },

    #[error("whois: query to {server} timed out after {secs}s")]
    Timeout { server: String, secs: u64 },

    #[error("whois: invalid hostname '{host}': {reason}")]
    InvalidHost { host: String, reason: String },

    #[error("whois: no expiration date found for {domain}")]
    NoExpiry { domain: String },

    #[error("whois: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ResolutionError>;
