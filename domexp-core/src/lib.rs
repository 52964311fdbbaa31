pub mod cache;
pub mod certs;
pub mod check;
pub mod config;
pub mod error;
pub mod lookup;
pub mod policy;
pub mod validation;
pub mod whois;
pub mod zones;

pub use error::{DomexpError, Result};
pub use validation::{filter_domains, normalize_domain, DomainSelection};

pub use cache::{Cache, CacheStore};
pub use certs::{CertificateChecker, CertificateReport, TlsProbe};
pub use check::{classify, CheckReport, ExpirationChecker, Severity, Thresholds};
pub use config::{Settings, ZoneMethod};
pub use lookup::{ExpirationRecord, ExpirationResolver, ExpirationSource, LookupOutcome};
pub use policy::{days_remaining, needs_refresh};
pub use whois::{WhoisClient, WhoisResponse};
pub use zones::{FileZoneSource, Route53ZoneSource, StaticZones, ZoneSource};
