//! Batch expiration check and severity classification.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache::{Cache, CacheStore};
use crate::lookup::{ExpirationRecord, ExpirationResolver, ExpirationSource, LookupOutcome};
use crate::policy::{days_remaining, needs_refresh};

pub const DEFAULT_WARNING_DAYS: i64 = 15;
pub const DEFAULT_CRITICAL_DAYS: i64 = 5;

/// Day thresholds for the warning and critical states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub warning_days: i64,
    pub critical_days: i64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warning_days: DEFAULT_WARNING_DAYS,
            critical_days: DEFAULT_CRITICAL_DAYS,
        }
    }
}

/// Monitoring-plugin state, ordered by exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl Severity {
    pub fn exit_code(self) -> i32 {
        match self {
            Severity::Ok => 0,
            Severity::Warning => 1,
            Severity::Critical => 2,
            Severity::Unknown => 3,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Ok => "OK",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
            Severity::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Outcome of a batch check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckReport {
    /// Domains under the warning threshold with their days remaining,
    /// in processing order.
    pub expiring: Vec<(String, i64)>,
    /// Domains that could not be resolved.
    pub unknown: Vec<String>,
    /// Every domain an expiration is known for.
    pub records: Vec<ExpirationRecord>,
    pub severity: Severity,
    pub message: String,
}

impl CheckReport {
    pub fn exit_code(&self) -> i32 {
        self.severity.exit_code()
    }

    /// Reports names that were never checked (e.g. invalid names) as unknown.
    pub fn add_unknown(&mut self, names: &[String], thresholds: Thresholds) {
        if names.is_empty() {
            return;
        }
        self.unknown.extend(names.iter().cloned());
        (self.severity, self.message) = classify(&self.expiring, &self.unknown, thresholds);
    }
}

/// Computes the overall state and the one-line status message.
///
/// The message lists `domain (days)` pairs joined by commas, or `OK` when
/// nothing is close to expiring. Unknown domains are appended as
/// `-- unknown domains: a,b` and turn an otherwise OK result into UNKNOWN.
pub fn classify(
    expiring: &[(String, i64)],
    unknown: &[String],
    thresholds: Thresholds,
) -> (Severity, String) {
    let mut severity = match expiring.iter().map(|(_, days)| *days).min() {
        Some(m) if m < thresholds.critical_days => Severity::Critical,
        Some(m) if m < thresholds.warning_days => Severity::Warning,
        _ => Severity::Ok,
    };

    let mut message = if expiring.is_empty() {
        "OK".to_string()
    } else {
        expiring
            .iter()
            .map(|(domain, days)| format!("{} ({})", domain, days))
            .collect::<Vec<_>>()
            .join(",")
    };

    if !unknown.is_empty() {
        if severity == Severity::Ok {
            severity = Severity::Unknown;
        }
        message.push_str("-- unknown domains: ");
        message.push_str(&unknown.join(","));
    }

    (severity, message)
}

/// Drives the per-domain cache/lookup loop.
pub struct ExpirationChecker {
    resolver: ExpirationResolver,
    thresholds: Thresholds,
    store: Option<CacheStore>,
}

impl ExpirationChecker {
    pub fn new(resolver: ExpirationResolver, thresholds: Thresholds) -> Self {
        Self {
            resolver,
            thresholds,
            store: None,
        }
    }

    /// Persist the cache after every successful lookup.
    pub fn with_store(mut self, store: CacheStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Checks `domains` in order and returns the report with the updated cache.
    ///
    /// Cached dates outside the warning window are used as-is. Anything else
    /// is looked up; a failed lookup marks the domain unknown and leaves its
    /// cache entry alone, but a previously cached date still counts toward
    /// the report.
    pub async fn run(
        &self,
        domains: &[String],
        mut cache: Cache,
        now: DateTime<Utc>,
    ) -> (CheckReport, Cache) {
        let warning = self.thresholds.warning_days;
        let mut expiring = Vec::new();
        let mut unknown = Vec::new();
        let mut records = Vec::new();

        for domain in domains {
            info!(domain = %domain, "Processing");
            let cached = cache.domain_expiration(domain);

            let record = match cached {
                Some(expiration) if !needs_refresh(expiration, now, warning) => {
                    info!(domain = %domain, "Taking date from cache");
                    Some(cached_record(domain, expiration))
                }
                _ => match self.resolver.resolve(domain).await {
                    LookupOutcome::Success(record) => {
                        cache.set_domain_expiration(domain, record.expiration);
                        cache.touch(now);
                        self.persist(&cache);
                        Some(record)
                    }
                    LookupOutcome::NotFound(_) => {
                        unknown.push(domain.clone());
                        cached.map(|expiration| cached_record(domain, expiration))
                    }
                    LookupOutcome::Error(e) => {
                        warn!(domain = %domain, error = %e, "Lookup failed");
                        unknown.push(domain.clone());
                        cached.map(|expiration| cached_record(domain, expiration))
                    }
                },
            };

            if let Some(record) = record {
                let days = days_remaining(record.expiration, now);
                info!(domain = %domain, days = days, source = %record.source, "Expiration known");
                if days < warning {
                    expiring.push((domain.clone(), days));
                }
                records.push(record);
            }
        }

        info!(processed = domains.len(), "Domains processed");

        let (severity, message) = classify(&expiring, &unknown, self.thresholds);
        let report = CheckReport {
            expiring,
            unknown,
            records,
            severity,
            message,
        };
        (report, cache)
    }

    fn persist(&self, cache: &Cache) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(cache) {
                warn!(path = %store.path().display(), error = %e, "Could not save cache");
            }
        }
    }
}

fn cached_record(domain: &str, expiration: DateTime<Utc>) -> ExpirationRecord {
    ExpirationRecord {
        domain: domain.to_string(),
        expiration,
        source: ExpirationSource::Cache,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DomexpError, Result};
    use crate::lookup::{LookupStrategy, StrategyOutcome};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Strategy answering from a fixed table and recording every call.
    #[derive(Clone, Default)]
    struct TableStrategy {
        answers: HashMap<String, DateTime<Utc>>,
        calls: Arc<Mutex<Vec<String>>>,
        /// When set, the domains on disk are recorded at every call.
        watched: Option<CacheStore>,
        on_disk: Arc<Mutex<Vec<Vec<String>>>>,
    }

    impl TableStrategy {
        fn with(mut self, domain: &str, expiration: DateTime<Utc>) -> Self {
            self.answers.insert(domain.to_string(), expiration);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn watching(mut self, store: &CacheStore) -> Self {
            self.watched = Some(store.clone());
            self
        }
    }

    #[async_trait]
    impl LookupStrategy for TableStrategy {
        fn source(&self) -> ExpirationSource {
            ExpirationSource::WhoisProtocol
        }

        async fn try_resolve(&self, domain: &str) -> Result<StrategyOutcome> {
            self.calls.lock().unwrap().push(domain.to_string());
            if let Some(store) = &self.watched {
                let seen = store.load().domains().map(str::to_string).collect();
                self.on_disk.lock().unwrap().push(seen);
            }
            if domain.starts_with("broken") {
                return Err(DomexpError::Timeout("Read timed out".to_string()));
            }
            Ok(match self.answers.get(domain) {
                Some(d) => StrategyOutcome::Resolved(*d),
                None => StrategyOutcome::NotFound,
            })
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
    }

    fn checker(strategy: &TableStrategy) -> ExpirationChecker {
        let resolver = ExpirationResolver::with_strategies(vec![Box::new(strategy.clone())]);
        ExpirationChecker::new(resolver, Thresholds::default())
    }

    fn domains(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_classify_critical() {
        let (severity, message) = classify(&[("x".to_string(), 3)], &[], Thresholds::default());
        assert_eq!(severity, Severity::Critical);
        assert_eq!(severity.exit_code(), 2);
        assert_eq!(message, "x (3)");
    }

    #[test]
    fn test_classify_warning_at_critical_boundary() {
        let expiring = vec![("a.com".to_string(), 5), ("b.com".to_string(), 10)];
        let (severity, message) = classify(&expiring, &[], Thresholds::default());
        assert_eq!(severity, Severity::Warning);
        assert_eq!(message, "a.com (5),b.com (10)");
    }

    #[test]
    fn test_classify_ok() {
        let (severity, message) = classify(&[], &[], Thresholds::default());
        assert_eq!(severity, Severity::Ok);
        assert_eq!(message, "OK");
    }

    #[test]
    fn test_classify_unknown_only() {
        let (severity, message) = classify(&[], &["z.com".to_string()], Thresholds::default());
        assert_eq!(severity.exit_code(), 3);
        assert_eq!(message, "OK-- unknown domains: z.com");
    }

    #[test]
    fn test_classify_unknown_does_not_lower_severity() {
        let expiring = vec![("a.com".to_string(), 1)];
        let unknown = vec!["y.com".to_string(), "z.com".to_string()];
        let (severity, message) = classify(&expiring, &unknown, Thresholds::default());
        assert_eq!(severity, Severity::Critical);
        assert_eq!(message, "a.com (1)-- unknown domains: y.com,z.com");
    }

    #[tokio::test]
    async fn test_unchecked_names_turn_ok_into_unknown() {
        let now = now();
        let strategy = TableStrategy::default().with("fine.com", now + Duration::days(90));

        let (mut report, _) = checker(&strategy)
            .run(&domains(&["fine.com"]), Cache::new(), now)
            .await;
        report.add_unknown(&domains(&["my_shop.com", "intranet"]), Thresholds::default());

        assert_eq!(report.exit_code(), 3);
        assert_eq!(report.message, "OK-- unknown domains: my_shop.com,intranet");
    }

    #[tokio::test]
    async fn test_buckets_only_domains_under_warning() {
        let now = now();
        let strategy = TableStrategy::default()
            .with("x.com", now + Duration::days(3))
            .with("y.com", now + Duration::days(20));

        let (report, cache) = checker(&strategy)
            .run(&domains(&["x.com", "y.com"]), Cache::new(), now)
            .await;

        assert_eq!(report.expiring, vec![("x.com".to_string(), 3)]);
        assert_eq!(report.exit_code(), 2);
        assert_eq!(report.message, "x.com (3)");
        assert_eq!(report.records.len(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_fresh_cache_entry_skips_lookup() {
        let now = now();
        let strategy = TableStrategy::default().with("fresh.com", now + Duration::days(1));
        let mut cache = Cache::new();
        cache.set_domain_expiration("fresh.com", now + Duration::days(200));

        let (report, cache) = checker(&strategy)
            .run(&domains(&["fresh.com"]), cache, now)
            .await;

        assert!(strategy.calls().is_empty());
        assert_eq!(report.severity, Severity::Ok);
        assert_eq!(report.message, "OK");
        assert_eq!(report.records[0].source, ExpirationSource::Cache);
        assert_eq!(cache.domain_expiration("fresh.com"), Some(now + Duration::days(200)));
    }

    #[tokio::test]
    async fn test_stale_cache_entry_is_refreshed() {
        let now = now();
        let renewed = now + Duration::days(365);
        let strategy = TableStrategy::default().with("renewed.com", renewed);
        let mut cache = Cache::new();
        cache.set_domain_expiration("renewed.com", now + Duration::days(2));

        let (report, cache) = checker(&strategy)
            .run(&domains(&["renewed.com"]), cache, now)
            .await;

        assert_eq!(strategy.calls(), vec!["renewed.com".to_string()]);
        assert_eq!(report.severity, Severity::Ok);
        assert_eq!(cache.domain_expiration("renewed.com"), Some(renewed));
    }

    #[tokio::test]
    async fn test_not_found_leaves_cache_untouched() {
        let now = now();
        let strategy = TableStrategy::default();
        let stale = now + Duration::days(4);
        let mut cache = Cache::new();
        cache.set_domain_expiration("lapsed.com", stale);

        let (report, cache) = checker(&strategy)
            .run(&domains(&["lapsed.com", "never.com"]), cache, now)
            .await;

        assert_eq!(report.unknown, vec!["lapsed.com".to_string(), "never.com".to_string()]);
        // the last known date still reports the domain as critical
        assert_eq!(report.expiring, vec![("lapsed.com".to_string(), 4)]);
        assert_eq!(report.exit_code(), 2);
        assert_eq!(cache.domain_expiration("lapsed.com"), Some(stale));
        assert_eq!(cache.domain_expiration("never.com"), None);
    }

    #[tokio::test]
    async fn test_failure_does_not_abort_batch() {
        let now = now();
        let strategy = TableStrategy::default().with("after.com", now + Duration::days(100));

        let (report, _) = checker(&strategy)
            .run(&domains(&["broken.com", "after.com"]), Cache::new(), now)
            .await;

        assert_eq!(strategy.calls().len(), 2);
        assert_eq!(report.unknown, vec!["broken.com".to_string()]);
        assert_eq!(report.exit_code(), 3);
        assert_eq!(report.message, "OK-- unknown domains: broken.com");
    }

    #[tokio::test]
    async fn test_cache_is_persisted_per_domain() {
        let now = now();
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path().join(".expcache"));
        let strategy = TableStrategy::default()
            .with("a.com", now + Duration::days(50))
            .with("b.com", now + Duration::days(60))
            .watching(&store);

        let checker = checker(&strategy).with_store(store.clone());
        let (_, cache) = checker
            .run(&domains(&["a.com", "b.com", "missing.com"]), Cache::new(), now)
            .await;

        // each lookup sees every earlier success already written out
        let seen = strategy.on_disk.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                vec![],
                vec!["a.com".to_string()],
                vec!["a.com".to_string(), "b.com".to_string()],
            ]
        );

        let on_disk = store.load();
        assert_eq!(on_disk.domain_expiration("missing.com"), None);
        assert_eq!(on_disk, cache);
    }
}
