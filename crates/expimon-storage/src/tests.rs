use crate::cache_store::CacheStore;
use crate::run_store::RunStore;
use crate::subscription_store::{subscriber_key, SubscriptionStore};
use chrono::{Duration, Utc};
use expimon_common::types::{NotificationResult, NotificationRun, SubscriptionStatus};
use tempfile::TempDir;

fn setup_cache() -> (TempDir, CacheStore) {
    let dir = TempDir::new().unwrap();
    let store = CacheStore::new(dir.path()).unwrap();
    (dir, store)
}

fn setup_subscriptions() -> (TempDir, SubscriptionStore) {
    let dir = TempDir::new().unwrap();
    let store = SubscriptionStore::new(dir.path()).unwrap();
    (dir, store)
}

fn domains(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn cache_set_and_get() {
    let (_dir, store) = setup_cache();
    store.set_with_ttl("whois:lookup:example.com", "{}", 3600).unwrap();
    let value = store.get_unexpired("whois:lookup:example.com").unwrap();
    assert_eq!(value.as_deref(), Some("{}"));
    assert!(store.get_unexpired("missing").unwrap().is_none());
}

#[test]
fn cache_entries_expire() {
    let (_dir, store) = setup_cache();
    store.set_with_ttl("short-lived", "v", 0).unwrap();
    assert!(store.get_unexpired("short-lived").unwrap().is_none());
}

#[test]
fn cache_overwrite_renews_ttl() {
    let (_dir, store) = setup_cache();
    store.set_with_ttl("key", "old", 0).unwrap();
    store.set_with_ttl("key", "new", 3600).unwrap();
    assert_eq!(store.get_unexpired("key").unwrap().as_deref(), Some("new"));
}

#[test]
fn cache_purge_removes_only_expired() {
    let (_dir, store) = setup_cache();
    store.set_with_ttl("dead", "v", 0).unwrap();
    store.set_with_ttl("alive", "v", 3600).unwrap();
    let removed = store.purge_expired().unwrap();
    assert_eq!(removed, 1);
    assert!(store.get_unexpired("alive").unwrap().is_some());
}

#[test]
fn subscriber_key_is_hash_not_plaintext() {
    let key = subscriber_key("User@Example.com");
    assert_eq!(key.len(), 64);
    assert!(!key.contains('@'));
    // Normalization: case and surrounding whitespace do not change the key.
    assert_eq!(key, subscriber_key("  user@example.com "));
    assert_ne!(key, subscriber_key("other@example.com"));
}

#[test]
fn register_creates_and_merges() {
    let (_dir, store) = setup_subscriptions();

    let first = store
        .register("user@example.com", &domains(&["example.com"]))
        .unwrap();
    assert_eq!(first.len(), 1);

    let merged = store
        .register("user@example.com", &domains(&["example.org", "Example.COM"]))
        .unwrap();
    assert_eq!(merged.len(), 2);
    assert!(merged.contains("example.org"));

    let current = store.get_domains("user@example.com");
    assert_eq!(current, merged);
}

#[test]
fn register_is_idempotent() {
    let (_dir, store) = setup_subscriptions();
    store
        .register("user@example.com", &domains(&["example.com"]))
        .unwrap();
    let again = store
        .register("user@example.com", &domains(&["example.com"]))
        .unwrap();
    assert_eq!(again.len(), 1);
}

#[test]
fn unregister_removes_named_domains() {
    let (_dir, store) = setup_subscriptions();
    store
        .register("user@example.com", &domains(&["a.com", "b.com", "c.com"]))
        .unwrap();

    let found = store
        .unregister("user@example.com", Some(&domains(&["b.com"])))
        .unwrap();
    assert!(found);

    let remaining = store.get_domains("user@example.com");
    assert_eq!(remaining.len(), 2);
    assert!(!remaining.contains("b.com"));
}

#[test]
fn unregister_all_is_soft_delete() {
    let (_dir, store) = setup_subscriptions();
    store
        .register("user@example.com", &domains(&["example.com"]))
        .unwrap();

    store.unregister("user@example.com", None).unwrap();

    // Inactive subscribers report no domains and are excluded from runs.
    assert!(store.get_domains("user@example.com").is_empty());
    assert!(store.list_active().unwrap().is_empty());

    // The row and its domain set survive for re-registration.
    let sub = store.get_subscription("user@example.com").unwrap().unwrap();
    assert_eq!(sub.status, SubscriptionStatus::Inactive);
    assert!(sub.domains.contains("example.com"));
}

#[test]
fn reregistration_reactivates() {
    let (_dir, store) = setup_subscriptions();
    store
        .register("user@example.com", &domains(&["example.com"]))
        .unwrap();
    store.unregister("user@example.com", None).unwrap();

    let merged = store
        .register("user@example.com", &domains(&["example.org"]))
        .unwrap();
    assert_eq!(merged.len(), 2);
    assert_eq!(store.list_active().unwrap().len(), 1);
}

#[test]
fn unregister_unknown_subscriber_reports_missing() {
    let (_dir, store) = setup_subscriptions();
    assert!(!store.unregister("nobody@example.com", None).unwrap());
}

#[test]
fn list_active_excludes_inactive() {
    let (_dir, store) = setup_subscriptions();
    store
        .register("a@example.com", &domains(&["a.com"]))
        .unwrap();
    store
        .register("b@example.com", &domains(&["b.com"]))
        .unwrap();
    store.unregister("a@example.com", None).unwrap();

    let active = store.list_active().unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].email, "b@example.com");
}

#[test]
fn run_store_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = RunStore::new(dir.path()).unwrap();

    let start = Utc::now();
    let run = NotificationRun {
        id: "run-1".to_string(),
        start_time: start,
        end_time: start + Duration::seconds(42),
        duration_seconds: 42.0,
        threshold_days: 30,
        notifications_sent: 1,
        results: vec![NotificationResult {
            email: "user@example.com".to_string(),
            sent: true,
            expiring_domains_count: 2,
            expiring_certs_count: 1,
            error: None,
            timestamp: start,
        }],
    };

    let path = store.save(&run).unwrap();
    assert!(path
        .file_name()
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("notification_check_"));

    let runs = store.list_runs().unwrap();
    assert_eq!(runs.len(), 1);

    let loaded = store.load(&runs[0]).unwrap();
    assert_eq!(loaded.id, "run-1");
    assert_eq!(loaded.results.len(), 1);
    assert_eq!(loaded.results[0].expiring_domains_count, 2);
}

#[test]
fn runs_in_same_second_get_distinct_files() {
    let dir = TempDir::new().unwrap();
    let store = RunStore::new(dir.path()).unwrap();

    let start = Utc::now();
    let run = |id: &str| NotificationRun {
        id: id.to_string(),
        start_time: start,
        end_time: start,
        duration_seconds: 0.0,
        threshold_days: 30,
        notifications_sent: 0,
        results: Vec::new(),
    };

    let first = store.save(&run("run-a")).unwrap();
    let second = store.save(&run("run-b")).unwrap();
    assert_ne!(first, second);

    let runs = store.list_runs().unwrap();
    assert_eq!(runs.len(), 2);
    let ids: Vec<String> = runs
        .iter()
        .map(|p| store.load(p).unwrap().id)
        .collect();
    assert!(ids.contains(&"run-a".to_string()));
    assert!(ids.contains(&"run-b".to_string()));
}
