use chrono::Utc;
use expimon_common::types::{CertStatus, CertificateRecord, DomainRecord, ExpiryStatus};

/// Render parameters for one subscriber's digest.
pub struct DigestParams<'a> {
    /// Report date, e.g. "2026-08-23".
    pub report_date: &'a str,
    pub threshold_days: i64,
    /// Full check results, not pre-filtered; the renderer highlights
    /// the rows under threshold.
    pub domains: &'a [DomainRecord],
    pub certificates: &'a [CertificateRecord],
}

pub struct DigestRenderer;

impl DigestRenderer {
    pub fn render_html(params: &DigestParams<'_>) -> String {
        let template = include_str!("templates/expiry_digest.html");

        let expiring_domains = params
            .domains
            .iter()
            .filter(|r| r.status.is_expiring())
            .count();
        let expiring_certs = params
            .certificates
            .iter()
            .filter(|r| r.status.is_expiring())
            .count();

        let generated_at = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();

        template
            .replace("{{title}}", "Domain & Certificate Expiry Digest")
            .replace("{{report_date}}", params.report_date)
            .replace("{{threshold_days}}", &params.threshold_days.to_string())
            .replace("{{domain_count}}", &params.domains.len().to_string())
            .replace("{{cert_count}}", &params.certificates.len().to_string())
            .replace("{{expiring_domains}}", &expiring_domains.to_string())
            .replace("{{expiring_certs}}", &expiring_certs.to_string())
            .replace(
                "{{domain_alert_class}}",
                if expiring_domains > 0 { "is-danger" } else { "" },
            )
            .replace(
                "{{cert_alert_class}}",
                if expiring_certs > 0 { "is-danger" } else { "" },
            )
            .replace(
                "{{domain_rows}}",
                &Self::domain_rows(params.domains, params.threshold_days),
            )
            .replace(
                "{{cert_rows}}",
                &Self::cert_rows(params.certificates, params.threshold_days),
            )
            .replace("{{generated_at}}", &generated_at)
    }

    /// Subject line carrying the headline numbers so a full inbox still
    /// communicates urgency.
    pub fn subject(report_date: &str, expiring_domains: usize, expiring_certs: usize) -> String {
        if expiring_domains == 0 && expiring_certs == 0 {
            format!("[expimon] All clear - expiry digest {report_date}")
        } else {
            format!(
                "[expimon] {expiring_domains} domain(s), {expiring_certs} certificate(s) need attention - {report_date}"
            )
        }
    }

    fn domain_rows(records: &[DomainRecord], threshold_days: i64) -> String {
        if records.is_empty() {
            return "<tr><td colspan=\"5\" class=\"empty\">No domains checked</td></tr>"
                .to_string();
        }

        let mut sorted: Vec<&DomainRecord> = records.iter().collect();
        sorted.sort_by(|a, b| {
            // Failed checks at the bottom, most urgent expiry on top.
            let a_failed = a.expiry_date.is_none();
            let b_failed = b.expiry_date.is_none();
            a_failed
                .cmp(&b_failed)
                .then(a.days_left.cmp(&b.days_left))
                .then_with(|| a.domain.cmp(&b.domain))
        });

        let mut html = String::new();
        for record in sorted {
            let days_display = if record.expiry_date.is_none() {
                "-".to_string()
            } else {
                highlight_days(record.days_left, threshold_days)
            };
            let expiry = record
                .expiry_date
                .map(|dt| dt.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "-".to_string());
            let badge_class = match record.status {
                ExpiryStatus::Valid => "is-ok",
                ExpiryStatus::ExpiringSoon => "is-warn",
                ExpiryStatus::ExpiringToday | ExpiryStatus::Expired => "is-danger",
                ExpiryStatus::Invalid | ExpiryStatus::Error => "is-muted",
            };
            let registrar = if record.registrar.is_empty() {
                "-"
            } else {
                &record.registrar
            };

            html.push_str(&format!(
                "<tr>\
                  <td><code>{domain}</code></td>\
                  <td class=\"num\">{days}</td>\
                  <td>{expiry}</td>\
                  <td><span class=\"badge {badge_class}\">{status}</span></td>\
                  <td>{registrar}</td>\
                </tr>",
                domain = html_escape(&record.domain),
                days = days_display,
                expiry = html_escape(&expiry),
                badge_class = badge_class,
                status = html_escape(&record.status.to_string()),
                registrar = html_escape(registrar),
            ));
        }
        html
    }

    fn cert_rows(records: &[CertificateRecord], threshold_days: i64) -> String {
        if records.is_empty() {
            return "<tr><td colspan=\"5\" class=\"empty\">No certificates checked</td></tr>"
                .to_string();
        }

        let mut html = String::new();
        for record in records {
            let days_display = if record.not_after.is_none() {
                "-".to_string()
            } else {
                highlight_days(record.days_to_expire, threshold_days)
            };
            let expiry = record
                .not_after
                .map(|dt| dt.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "-".to_string());
            let badge_class = match record.status {
                CertStatus::Valid => "is-ok",
                CertStatus::ExpiringSoon => "is-warn",
                CertStatus::ExpiringToday | CertStatus::Expired => "is-danger",
                _ => "is-muted",
            };
            let detail = match &record.error {
                Some(e) => e.as_str(),
                None if record.issuer.is_empty() => "-",
                None => record.issuer.as_str(),
            };

            html.push_str(&format!(
                "<tr>\
                  <td><code>{hostname}</code></td>\
                  <td class=\"num\">{days}</td>\
                  <td>{expiry}</td>\
                  <td><span class=\"badge {badge_class}\">{status}</span></td>\
                  <td>{detail}</td>\
                </tr>",
                hostname = html_escape(&record.hostname),
                days = days_display,
                expiry = html_escape(&expiry),
                badge_class = badge_class,
                status = html_escape(&record.status.to_string()),
                detail = html_escape(detail),
            ));
        }
        html
    }
}

fn highlight_days(days: i64, threshold_days: i64) -> String {
    if days < 0 {
        format!("<span style='color:#b91c1c;font-weight:700'>expired {}d ago</span>", -days)
    } else if days <= 7 {
        format!("<span style='color:#b91c1c;font-weight:700'>{days}</span>")
    } else if days < threshold_days {
        format!("<span style='color:#8a6a00;font-weight:700'>{days}</span>")
    } else {
        days.to_string()
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
