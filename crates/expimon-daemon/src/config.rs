use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_results_dir")]
    pub results_dir: String,
    /// Days-left boundary below which a domain or certificate is flagged.
    #[serde(default = "default_threshold_days")]
    pub threshold_days: i64,
    /// UTC hour of day after which the daily check fires.
    #[serde(default = "default_check_hour")]
    pub check_hour: u32,
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_whois_timeout_secs")]
    pub whois_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_max_concurrent_hosts")]
    pub max_concurrent_hosts: usize,
    #[serde(default = "default_max_concurrent_subscribers")]
    pub max_concurrent_subscribers: usize,
    /// Optional public suffix list file; the embedded snapshot is used
    /// when absent.
    #[serde(default)]
    pub suffix_file: Option<String>,

    #[serde(default)]
    pub smtp: SmtpConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            results_dir: default_results_dir(),
            threshold_days: default_threshold_days(),
            check_hour: default_check_hour(),
            tick_secs: default_tick_secs(),
            cache_ttl_secs: default_cache_ttl_secs(),
            whois_timeout_secs: default_whois_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_concurrent_hosts: default_max_concurrent_hosts(),
            max_concurrent_subscribers: default_max_concurrent_subscribers(),
            suffix_file: None,
            smtp: SmtpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_smtp_from")]
    pub from: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_smtp_port(),
            username: None,
            password: None,
            from: default_smtp_from(),
        }
    }
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_results_dir() -> String {
    "data/results".to_string()
}

fn default_threshold_days() -> i64 {
    30
}

fn default_check_hour() -> u32 {
    8
}

fn default_tick_secs() -> u64 {
    60
}

fn default_cache_ttl_secs() -> u64 {
    86400
}

fn default_whois_timeout_secs() -> u64 {
    10
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_max_concurrent_hosts() -> usize {
    10
}

fn default_max_concurrent_subscribers() -> usize {
    4
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_from() -> String {
    "expimon@localhost".to_string()
}

impl DaemonConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}
