use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Classification of a domain registration relative to its expiry date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryStatus {
    Valid,
    ExpiringToday,
    ExpiringSoon,
    Expired,
    Invalid,
    Error,
}

impl fmt::Display for ExpiryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExpiryStatus::Valid => "Valid domain",
            ExpiryStatus::ExpiringToday => "Expiring today!",
            ExpiryStatus::ExpiringSoon => "Expiring soon!",
            ExpiryStatus::Expired => "Expired",
            ExpiryStatus::Invalid => "Invalid domain",
            ExpiryStatus::Error => "Error",
        };
        write!(f, "{s}")
    }
}

impl ExpiryStatus {
    /// True for the states that warrant attention in a digest.
    pub fn is_expiring(&self) -> bool {
        matches!(
            self,
            ExpiryStatus::Expired | ExpiryStatus::ExpiringToday | ExpiryStatus::ExpiringSoon
        )
    }
}

/// Classification of a served TLS certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertStatus {
    Valid,
    ExpiringToday,
    ExpiringSoon,
    Expired,
    ConnectionError,
    TlsError,
    Unknown,
}

impl fmt::Display for CertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CertStatus::Valid => "Valid SSL",
            CertStatus::ExpiringToday => "Expiring today!",
            CertStatus::ExpiringSoon => "Expiring soon!",
            CertStatus::Expired => "Expired",
            CertStatus::ConnectionError => "Connection error",
            CertStatus::TlsError => "TLS error",
            CertStatus::Unknown => "Unknown",
        };
        write!(f, "{s}")
    }
}

impl CertStatus {
    pub fn is_expiring(&self) -> bool {
        matches!(
            self,
            CertStatus::Expired | CertStatus::ExpiringToday | CertStatus::ExpiringSoon
        )
    }
}

/// Day-based classification shared by domain and certificate checks.
///
/// Total over all inputs: negative days are expired, zero expires today,
/// anything below the threshold is expiring soon, and `days_left` equal to
/// the threshold is already considered valid.
pub fn classify_days(days_left: i64, threshold_days: i64) -> ExpiryStatus {
    if days_left < 0 {
        ExpiryStatus::Expired
    } else if days_left == 0 {
        ExpiryStatus::ExpiringToday
    } else if days_left < threshold_days {
        ExpiryStatus::ExpiringSoon
    } else {
        ExpiryStatus::Valid
    }
}

pub fn classify_cert_days(days_left: i64, threshold_days: i64) -> CertStatus {
    match classify_days(days_left, threshold_days) {
        ExpiryStatus::Expired => CertStatus::Expired,
        ExpiryStatus::ExpiringToday => CertStatus::ExpiringToday,
        ExpiryStatus::ExpiringSoon => CertStatus::ExpiringSoon,
        _ => CertStatus::Valid,
    }
}

/// Result of one domain registration expiry check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainRecord {
    pub domain: String,
    pub expiry_date: Option<DateTime<Utc>>,
    /// Days until the registration lapses. `-1` when unknown.
    pub days_left: i64,
    #[serde(default)]
    pub registrar: String,
    #[serde(default)]
    pub owner: String,
    pub status: ExpiryStatus,
    pub checked_at: DateTime<Utc>,
}

/// Result of one TLS certificate check against a single hostname.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateRecord {
    pub hostname: String,
    /// The registrable domain this hostname was discovered under.
    pub domain: String,
    #[serde(default)]
    pub issuer: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub serial_number: String,
    pub version: u32,
    pub not_before: Option<DateTime<Utc>>,
    pub not_after: Option<DateTime<Utc>>,
    /// Days until `not_after`. `-1` when the check failed.
    pub days_to_expire: i64,
    pub status: CertStatus,
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Inactive,
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionStatus::Active => write!(f, "active"),
            SubscriptionStatus::Inactive => write!(f, "inactive"),
        }
    }
}

impl FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SubscriptionStatus::Active),
            "inactive" => Ok(SubscriptionStatus::Inactive),
            other => Err(format!("unknown subscription status '{other}'")),
        }
    }
}

/// A subscriber and the set of domains they watch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub email: String,
    pub domains: BTreeSet<String>,
    pub status: SubscriptionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-subscriber outcome within a notification run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationResult {
    pub email: String,
    pub sent: bool,
    pub expiring_domains_count: usize,
    pub expiring_certs_count: usize,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Summary artifact of one scheduled notification cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRun {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: f64,
    pub threshold_days: i64,
    pub notifications_sent: usize,
    pub results: Vec<NotificationResult>,
}
