//! TLS certificate expiration checks.
//!
//! Works like the registration check: cached `notAfter` dates outside the
//! warning window are reused, everything else is fetched with a handshake.
//! Failed handshakes are never cached, so they are retried on every run;
//! the last cached date still counts toward the report when a probe fails.

mod client;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache::{Cache, CacheStore};
use crate::check::{classify, Severity, Thresholds};
use crate::policy::{days_remaining, needs_refresh};

pub use client::{CertificateProbe, TlsProbe};

/// Reported in place of days when the certificate is for another name.
pub const HOSTNAME_MISMATCH: i64 = -1;
/// Reported in place of days for any other TLS or connection failure.
pub const CONNECTION_ERROR: i64 = -2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateOutcome {
    Expires(DateTime<Utc>),
    HostnameMismatch,
    Failed(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateReport {
    /// Days until expiry per domain, or one of [`HOSTNAME_MISMATCH`] and
    /// [`CONNECTION_ERROR`].
    pub days: BTreeMap<String, i64>,
    pub expiring: Vec<(String, i64)>,
    pub unknown: Vec<String>,
    pub severity: Severity,
    pub message: String,
}

impl CertificateReport {
    pub fn exit_code(&self) -> i32 {
        self.severity.exit_code()
    }

    /// Reports names that were never probed as unknown.
    pub fn add_unknown(&mut self, names: &[String], thresholds: Thresholds) {
        if names.is_empty() {
            return;
        }
        self.unknown.extend(names.iter().cloned());
        (self.severity, self.message) = classify(&self.expiring, &self.unknown, thresholds);
    }
}

pub struct CertificateChecker<P> {
    probe: P,
    thresholds: Thresholds,
    store: Option<CacheStore>,
}

impl<P: CertificateProbe> CertificateChecker<P> {
    pub fn new(probe: P, thresholds: Thresholds) -> Self {
        Self {
            probe,
            thresholds,
            store: None,
        }
    }

    pub fn with_store(mut self, store: CacheStore) -> Self {
        self.store = Some(store);
        self
    }

    pub async fn run(
        &self,
        domains: &[String],
        mut cache: Cache,
        now: DateTime<Utc>,
    ) -> (CertificateReport, Cache) {
        let warning = self.thresholds.warning_days;
        let mut days_by_domain = BTreeMap::new();
        let mut expiring = Vec::new();
        let mut unknown = Vec::new();

        for domain in domains {
            let cached = cache.certificate_expiration(domain);

            let not_after = match cached {
                Some(cached) if !needs_refresh(cached, now, warning) => {
                    info!(domain = %domain, "Taking certificate date from cache");
                    Some(cached)
                }
                _ => match self.probe.probe(domain).await {
                    CertificateOutcome::Expires(not_after) => {
                        cache.set_certificate_expiration(domain, not_after);
                        cache.touch(now);
                        self.persist(&cache);
                        Some(not_after)
                    }
                    CertificateOutcome::HostnameMismatch => {
                        warn!(domain = %domain, "Certificate does not match hostname");
                        days_by_domain.insert(domain.clone(), HOSTNAME_MISMATCH);
                        unknown.push(domain.clone());
                        cached
                    }
                    CertificateOutcome::Failed(reason) => {
                        warn!(domain = %domain, reason = %reason, "Certificate check failed");
                        days_by_domain.insert(domain.clone(), CONNECTION_ERROR);
                        unknown.push(domain.clone());
                        cached
                    }
                },
            };

            // a failed probe keeps its error code, but a known date still counts
            if let Some(not_after) = not_after {
                let days = days_remaining(not_after, now);
                info!(domain = %domain, days = days, "Certificate expiration known");
                days_by_domain.entry(domain.clone()).or_insert(days);
                if days < warning {
                    expiring.push((domain.clone(), days));
                }
            }
        }

        let (severity, message) = classify(&expiring, &unknown, self.thresholds);
        let report = CertificateReport {
            days: days_by_domain,
            expiring,
            unknown,
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
