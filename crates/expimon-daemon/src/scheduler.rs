use anyhow::{Context, Result};
use chrono::{NaiveDate, Timelike, Utc};
use expimon_common::types::{NotificationResult, NotificationRun, Subscription};
use expimon_notify::{DigestParams, DigestRenderer, EmailTransport};
use expimon_ssl::CertificateChecker;
use expimon_storage::{RunStore, SubscriptionStore};
use expimon_whois::DomainChecker;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::{interval, Duration};
use uuid::Uuid;

/// Drives the daily expiry digest: fans the active subscribers out over
/// the domain and certificate checkers, mails each a digest, and
/// persists a run artifact.
pub struct NotificationScheduler {
    subscriptions: Arc<SubscriptionStore>,
    runs: Arc<RunStore>,
    domain_checker: Arc<DomainChecker>,
    cert_checker: Arc<CertificateChecker>,
    mailer: Arc<dyn EmailTransport>,
    threshold_days: i64,
    check_hour: u32,
    tick_secs: u64,
    max_concurrent: usize,
    shutdown: Arc<AtomicBool>,
}

impl NotificationScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        subscriptions: Arc<SubscriptionStore>,
        runs: Arc<RunStore>,
        domain_checker: Arc<DomainChecker>,
        cert_checker: Arc<CertificateChecker>,
        mailer: Arc<dyn EmailTransport>,
        threshold_days: i64,
        check_hour: u32,
        tick_secs: u64,
        max_concurrent: usize,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            subscriptions,
            runs,
            domain_checker,
            cert_checker,
            mailer,
            threshold_days,
            check_hour,
            tick_secs,
            max_concurrent: max_concurrent.max(1),
            shutdown,
        }
    }

    /// Daily timer loop. A run is due once the configured hour has
    /// passed and no run happened today yet, so a daemon that was asleep
    /// at the trigger hour runs late instead of skipping the day.
    pub async fn run(&self) {
        tracing::info!(
            check_hour = self.check_hour,
            tick_secs = self.tick_secs,
            threshold_days = self.threshold_days,
            "Notification scheduler started"
        );

        let mut last_run_day: Option<NaiveDate> = None;
        let mut tick = interval(Duration::from_secs(self.tick_secs));
        loop {
            tick.tick().await;
            if self.shutdown.load(Ordering::SeqCst) {
                tracing::info!("Notification scheduler stopping");
                return;
            }

            let now = Utc::now();
            let today = now.date_naive();
            if now.hour() >= self.check_hour && last_run_day != Some(today) {
                last_run_day = Some(today);
                match self.run_scheduled_check(self.threshold_days).await {
                    Ok(run) => {
                        tracing::info!(
                            run_id = %run.id,
                            sent = run.notifications_sent,
                            subscribers = run.results.len(),
                            "Notification run finished"
                        );
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Notification run failed");
                    }
                }
                // A shutdown requested mid-run takes effect now rather
                // than at the next tick.
                if self.shutdown.load(Ordering::SeqCst) {
                    tracing::info!("Notification scheduler stopping");
                    return;
                }
            }
        }
    }

    /// One full notification cycle. Only a failure to list subscribers
    /// aborts; everything downstream is captured per subscriber. The run
    /// artifact is persisted even when the cycle was cancelled midway.
    pub async fn run_scheduled_check(&self, threshold_days: i64) -> Result<NotificationRun> {
        let start_time = Utc::now();
        let subscribers = self
            .subscriptions
            .list_active()
            .context("cannot list active subscriptions")?;

        tracing::info!(
            subscribers = subscribers.len(),
            threshold_days,
            "Starting notification run"
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::new();
        let mut cancelled = false;

        for sub in subscribers {
            if self.shutdown.load(Ordering::SeqCst) {
                tracing::warn!("Shutdown requested, stopping subscriber fan-out");
                cancelled = true;
                break;
            }
            if sub.domains.is_empty() {
                tracing::debug!(email = %sub.email, "Skipping subscriber without domains");
                continue;
            }

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(p) => p,
                Err(_) => break,
            };
            let domain_checker = self.domain_checker.clone();
            let cert_checker = self.cert_checker.clone();
            let mailer = self.mailer.clone();

            handles.push(tokio::spawn(async move {
                let result =
                    process_subscriber(&domain_checker, &cert_checker, &*mailer, &sub, threshold_days)
                        .await;
                drop(permit);
                result
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::error!(error = %e, "Subscriber task panicked");
                }
            }
        }

        let end_time = Utc::now();
        let run = NotificationRun {
            id: Uuid::new_v4().to_string(),
            start_time,
            end_time,
            duration_seconds: (end_time - start_time).num_milliseconds() as f64 / 1000.0,
            threshold_days,
            notifications_sent: results.iter().filter(|r| r.sent).count(),
            results,
        };

        if cancelled {
            tracing::warn!(run_id = %run.id, "Run cancelled, persisting partial results");
        }
        if let Err(e) = self.runs.save(&run) {
            tracing::error!(run_id = %run.id, error = %e, "Failed to persist notification run");
        }

        Ok(run)
    }
}

async fn process_subscriber(
    domain_checker: &DomainChecker,
    cert_checker: &CertificateChecker,
    mailer: &dyn EmailTransport,
    sub: &Subscription,
    threshold_days: i64,
) -> NotificationResult {
    let domain_list: Vec<String> = sub.domains.iter().cloned().collect();

    let domain_records = domain_checker
        .check_domains(&domain_list, threshold_days)
        .await;

    let mut cert_records = Vec::new();
    for domain in &domain_list {
        cert_records.extend(
            cert_checker
                .check_domain_certificates(domain, threshold_days)
                .await,
        );
    }

    let expiring_domains_count = domain_records
        .iter()
        .filter(|r| r.status.is_expiring())
        .count();
    let expiring_certs_count = cert_records
        .iter()
        .filter(|r| r.status.is_expiring())
        .count();

    let report_date = Utc::now().format("%Y-%m-%d").to_string();
    let html = DigestRenderer::render_html(&DigestParams {
        report_date: &report_date,
        threshold_days,
        domains: &domain_records,
        certificates: &cert_records,
    });
    let subject = DigestRenderer::subject(&report_date, expiring_domains_count, expiring_certs_count);

    let (sent, error) = match mailer.send_html(&sub.email, &subject, &html).await {
        Ok(sent) => (sent, None),
        Err(e) => {
            tracing::warn!(email = %sub.email, error = %e, "Digest delivery failed");
            (false, Some(e.to_string()))
        }
    };

    NotificationResult {
        email: sub.email.clone(),
        sent,
        expiring_domains_count,
        expiring_certs_count,
        error,
        timestamp: Utc::now(),
    }
}
