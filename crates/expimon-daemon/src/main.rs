use anyhow::Result;
use expimon_common::dns::SystemDnsResolver;
use expimon_notify::SmtpMailer;
use expimon_ssl::{CertificateChecker, HostDiscovery, TlsPeerFetcher};
use expimon_storage::{CacheStore, RunStore, SubscriptionStore};
use expimon_whois::client::WhoisClient;
use expimon_whois::{DomainChecker, DomainValidator, ExpiryCache, SuffixList, WhoisResolver};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use expimon_daemon::config::DaemonConfig;
use expimon_daemon::scheduler::NotificationScheduler;

/// Minimum time a shutting-down daemon waits for an in-flight run.
const SHUTDOWN_GRACE_SECS: u64 = 30;

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  expimon-daemon [config.toml]                                 Run the daemon");
    eprintln!("  expimon-daemon run-check <config.toml> [--threshold N]      Run one check now and print the result");
    eprintln!("  expimon-daemon register <config.toml> <email> <domain>...   Subscribe an address to domains");
    eprintln!("  expimon-daemon unregister <config.toml> <email> [domain]... Remove domains, or the whole subscription");
    eprintln!("  expimon-daemon list-domains <config.toml> <email>           Print a subscriber's watched domains");
}

#[tokio::main]
async fn main() -> Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|e| anyhow::anyhow!("Failed to install default CryptoProvider: {e:?}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("expimon=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("run-check") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("run-check requires a <config.toml> argument")
            })?;
            let threshold = parse_threshold_flag(&args[3..])?;
            run_check(config_path, threshold).await
        }
        Some("register") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("register requires <config.toml>, <email> and <domain> arguments")
            })?;
            let email = args.get(3).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("register requires an <email> argument")
            })?;
            if args.len() < 5 {
                print_usage();
                anyhow::bail!("register requires at least one <domain>");
            }
            run_register(config_path, email, &args[4..])
        }
        Some("unregister") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("unregister requires <config.toml> and <email> arguments")
            })?;
            let email = args.get(3).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("unregister requires an <email> argument")
            })?;
            run_unregister(config_path, email, &args[4..])
        }
        Some("list-domains") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("list-domains requires <config.toml> and <email> arguments")
            })?;
            let email = args.get(3).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("list-domains requires an <email> argument")
            })?;
            run_list_domains(config_path, email)
        }
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        _ => {
            let config_path = args
                .get(1)
                .map(|s| s.as_str())
                .unwrap_or("config/expimon.toml");
            run_daemon(config_path).await
        }
    }
}

fn parse_threshold_flag(rest: &[String]) -> Result<Option<i64>> {
    match rest.first().map(|s| s.as_str()) {
        Some("--threshold") => {
            let value = rest
                .get(1)
                .ok_or_else(|| anyhow::anyhow!("--threshold requires a value"))?;
            Ok(Some(value.parse()?))
        }
        Some(other) => anyhow::bail!("unknown argument '{other}'"),
        None => Ok(None),
    }
}

fn load_config(config_path: &str) -> DaemonConfig {
    match DaemonConfig::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(path = config_path, error = %e, "Config not loaded, using defaults");
            DaemonConfig::default()
        }
    }
}

struct Components {
    subscriptions: Arc<SubscriptionStore>,
    runs: Arc<RunStore>,
    domain_checker: Arc<DomainChecker>,
    cert_checker: Arc<CertificateChecker>,
    mailer: Arc<SmtpMailer>,
}

fn build_components(config: &DaemonConfig) -> Result<Components> {
    let data_dir = Path::new(&config.data_dir);
    let subscriptions = Arc::new(SubscriptionStore::new(data_dir)?);
    let runs = Arc::new(RunStore::new(Path::new(&config.results_dir))?);
    let cache_store = Arc::new(CacheStore::new(data_dir)?);

    let dns = Arc::new(SystemDnsResolver::new());
    let suffixes = Arc::new(match &config.suffix_file {
        Some(path) => SuffixList::from_file(path),
        None => SuffixList::embedded(),
    });

    let resolver = WhoisResolver::new(
        WhoisClient::new(config.whois_timeout_secs),
        suffixes.clone(),
        dns.clone(),
    );
    let cache = ExpiryCache::new(cache_store, Arc::new(resolver));
    let domain_checker = Arc::new(DomainChecker::new(
        DomainValidator::new(dns.clone()),
        suffixes,
        cache,
        config.cache_ttl_secs,
    ));

    let cert_checker = Arc::new(CertificateChecker::new(
        HostDiscovery::new(dns),
        Arc::new(TlsPeerFetcher::new(config.connect_timeout_secs)),
        config.max_concurrent_hosts,
    ));

    let mailer = Arc::new(SmtpMailer::new(
        &config.smtp.host,
        config.smtp.port,
        config.smtp.username.as_deref(),
        config.smtp.password.as_deref(),
        &config.smtp.from,
    )?);

    Ok(Components {
        subscriptions,
        runs,
        domain_checker,
        cert_checker,
        mailer,
    })
}

fn build_scheduler(
    config: &DaemonConfig,
    components: &Components,
    shutdown: Arc<AtomicBool>,
) -> NotificationScheduler {
    NotificationScheduler::new(
        components.subscriptions.clone(),
        components.runs.clone(),
        components.domain_checker.clone(),
        components.cert_checker.clone(),
        components.mailer.clone(),
        config.threshold_days,
        config.check_hour,
        config.tick_secs,
        config.max_concurrent_subscribers,
        shutdown,
    )
}

async fn run_daemon(config_path: &str) -> Result<()> {
    let config = load_config(config_path);
    let components = build_components(&config)?;
    let shutdown = Arc::new(AtomicBool::new(false));
    let scheduler = Arc::new(build_scheduler(&config, &components, shutdown.clone()));

    let mut handle = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.run().await }
    });

    tracing::info!("expimon daemon started");
    signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    shutdown.store(true, Ordering::SeqCst);

    // Give an in-flight run a chance to drain and persist its partial
    // results before the task is cancelled outright.
    let grace = Duration::from_secs(config.tick_secs.max(SHUTDOWN_GRACE_SECS));
    match tokio::time::timeout(grace, &mut handle).await {
        Ok(Err(e)) => tracing::error!(error = %e, "Scheduler task failed"),
        Ok(Ok(())) => {}
        Err(_) => {
            tracing::warn!(grace_secs = grace.as_secs(), "Scheduler did not stop in time, aborting");
            handle.abort();
        }
    }
    Ok(())
}

async fn run_check(config_path: &str, threshold: Option<i64>) -> Result<()> {
    let config = load_config(config_path);
    let components = build_components(&config)?;
    let shutdown = Arc::new(AtomicBool::new(false));
    let scheduler = build_scheduler(&config, &components, shutdown);

    let run = scheduler
        .run_scheduled_check(threshold.unwrap_or(config.threshold_days))
        .await?;
    println!("{}", serde_json::to_string_pretty(&run)?);
    Ok(())
}

fn run_register(config_path: &str, email: &str, domains: &[String]) -> Result<()> {
    let config = load_config(config_path);
    let store = SubscriptionStore::new(Path::new(&config.data_dir))?;
    let merged = store.register(email, domains)?;
    println!("Subscribed {email} to {} domain(s):", merged.len());
    for domain in merged {
        println!("  {domain}");
    }
    Ok(())
}

fn run_unregister(config_path: &str, email: &str, domains: &[String]) -> Result<()> {
    let config = load_config(config_path);
    let store = SubscriptionStore::new(Path::new(&config.data_dir))?;
    let domains_arg = if domains.is_empty() {
        None
    } else {
        Some(domains)
    };
    if store.unregister(email, domains_arg)? {
        if domains.is_empty() {
            println!("Deactivated subscription for {email}");
        } else {
            println!("Removed {} domain(s) from {email}", domains.len());
        }
    } else {
        println!("No subscription found for {email}");
    }
    Ok(())
}

fn run_list_domains(config_path: &str, email: &str) -> Result<()> {
    let config = load_config(config_path);
    let store = SubscriptionStore::new(Path::new(&config.data_dir))?;
    let domains = store.get_domains(email);
    if domains.is_empty() {
        println!("No watched domains for {email}");
    } else {
        for domain in domains {
            println!("{domain}");
        }
    }
    Ok(())
}
