//! Persistent expiration cache.
//!
//! The cache maps each domain to the last expiration date that was resolved
//! for it, so that domains far from expiring are not queried on every run.
//! It is stored as a small JSON document:
//!
//! ```json
//! {"domain_expiration_dates": {"example.com": 1767225600.0}, "updated": 1760000000.0}
//! ```
//!
//! Timestamps are unix seconds as floats, which keeps files written by older
//! versions of the checker readable.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{DomexpError, Result};

/// Default cache file name, resolved next to the executable by the CLI.
pub const DEFAULT_CACHE_FILE: &str = ".expcache";

/// In-memory view of the cache file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cache {
    #[serde(default)]
    domain_expiration_dates: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    certificate_expiration_dates: BTreeMap<String, f64>,
    #[serde(default)]
    updated: f64,
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache {
    /// Creates an empty cache stamped with the current time.
    pub fn new() -> Self {
        Self {
            domain_expiration_dates: BTreeMap::new(),
            certificate_expiration_dates: BTreeMap::new(),
            updated: to_timestamp(Utc::now()),
        }
    }

    pub fn domain_expiration(&self, domain: &str) -> Option<DateTime<Utc>> {
        self.domain_expiration_dates
            .get(domain)
            .and_then(|ts| from_timestamp(*ts))
    }

    /// Records the most recently resolved expiration for `domain`,
    /// replacing any previous value.
    pub fn set_domain_expiration(&mut self, domain: &str, expiration: DateTime<Utc>) {
        self.domain_expiration_dates
            .insert(domain.to_string(), to_timestamp(expiration));
    }

    pub fn certificate_expiration(&self, domain: &str) -> Option<DateTime<Utc>> {
        self.certificate_expiration_dates
            .get(domain)
            .and_then(|ts| from_timestamp(*ts))
    }

    pub fn set_certificate_expiration(&mut self, domain: &str, expiration: DateTime<Utc>) {
        self.certificate_expiration_dates
            .insert(domain.to_string(), to_timestamp(expiration));
    }

    /// Domains with a cached registration expiration, sorted.
    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.domain_expiration_dates.keys().map(String::as_str)
    }

    pub fn updated(&self) -> Option<DateTime<Utc>> {
        from_timestamp(self.updated)
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated = to_timestamp(now);
    }

    pub fn len(&self) -> usize {
        self.domain_expiration_dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domain_expiration_dates.is_empty()
    }
}

fn to_timestamp(dt: DateTime<Utc>) -> f64 {
    dt.timestamp_millis() as f64 / 1000.0
}

fn from_timestamp(ts: f64) -> Option<DateTime<Utc>> {
    if !ts.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis((ts * 1000.0).round() as i64)
}

/// File-backed store for [`Cache`].
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path a malformed cache file is moved to before starting over.
    pub fn corrupt_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".corrupt");
        PathBuf::from(name)
    }

    /// Loads the cache, returning an empty one if the file is absent or
    /// unreadable.
    ///
    /// A file that does not parse is kept as [`corrupt_path`](Self::corrupt_path)
    /// and a warning is logged; it never fails the run.
    pub fn load(&self) -> Cache {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No cache file, starting empty");
                return Cache::new();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Cache file is unreadable, starting empty");
                return Cache::new();
            }
        };

        match serde_json::from_str::<Cache>(&content) {
            Ok(cache) => {
                debug!(entries = cache.len(), "Loaded expiration cache");
                cache
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Cache file is invalid, starting empty");
                let corrupt = self.corrupt_path();
                if let Err(e) = fs::rename(&self.path, &corrupt) {
                    warn!(error = %e, "Could not preserve invalid cache file");
                }
                Cache::new()
            }
        }
    }

    /// Writes the cache to a temporary file next to the target and renames
    /// it into place, so readers see either the old or the new document.
    pub fn save(&self, cache: &Cache) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer(&mut tmp, cache)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .map_err(|e| DomexpError::CacheWrite(e.to_string()))?;

        debug!(path = %self.path.display(), entries = cache.len(), "Saved expiration cache");
        Ok(())
    }
}
