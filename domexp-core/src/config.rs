//! Settings file handling.
//!
//! ```toml
//! [MAIN]
//! WARNING = 15
//! CRITICAL = 5
//! METHOD = "ROUTE53"
//!
//! [ROUTE53]
//! KEYID = ""
//! KEY = ""
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::check::{Thresholds, DEFAULT_CRITICAL_DAYS, DEFAULT_WARNING_DAYS};
use crate::error::{DomexpError, Result};
use crate::validation::DEFAULT_RESERVED_SUFFIXES;
use crate::zones::Route53Credentials;

pub const DEFAULT_SETTINGS_FILE: &str = "settings.toml";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Where the domain list comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ZoneMethod {
    #[default]
    Route53,
    File,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MainSettings {
    #[serde(rename = "WARNING", default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<i64>,
    #[serde(rename = "CRITICAL", default, skip_serializing_if = "Option::is_none")]
    pub critical: Option<i64>,
    #[serde(rename = "METHOD", default)]
    pub method: ZoneMethod,
    #[serde(rename = "FILTER", default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Vec<String>>,
    #[serde(rename = "DOMAINS_FILE", default, skip_serializing_if = "Option::is_none")]
    pub domains_file: Option<PathBuf>,
    /// Seconds allowed for each WHOIS query or `whois` run.
    #[serde(rename = "TIMEOUT", default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Route53Settings {
    #[serde(rename = "KEYID", default)]
    pub key_id: String,
    #[serde(rename = "KEY", default)]
    pub key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(rename = "MAIN", default)]
    pub main: MainSettings,
    #[serde(rename = "ROUTE53", default)]
    pub route53: Route53Settings,
}

impl Settings {
    /// The file written when no settings exist yet.
    pub fn template() -> Self {
        Self {
            main: MainSettings {
                warning: Some(DEFAULT_WARNING_DAYS),
                critical: Some(DEFAULT_CRITICAL_DAYS),
                method: ZoneMethod::Route53,
                filter: Some(DEFAULT_RESERVED_SUFFIXES.iter().map(|s| s.to_string()).collect()),
                domains_file: None,
                timeout: Some(DEFAULT_TIMEOUT_SECS),
            },
            route53: Route53Settings::default(),
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Reads the settings file.
    ///
    /// When it does not exist a template is written in its place and
    /// [`DomexpError::SettingsCreated`] is returned, so the operator can fill
    /// in credentials before the first real run.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            Self::write_template(path)?;
            return Err(DomexpError::SettingsCreated {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path)
            .map_err(|e| DomexpError::InvalidSettings(format!("{}: {}", path.display(), e)))?;
        let settings = Self::parse(&content)?;
        debug!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(&Self::template())?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Warning and critical thresholds, defaulting missing values.
    pub fn thresholds(&self) -> Result<Thresholds> {
        let warning = self.main.warning.unwrap_or_else(|| {
            warn!(default = DEFAULT_WARNING_DAYS, "WARNING not set, using default");
            DEFAULT_WARNING_DAYS
        });
        let critical = self.main.critical.unwrap_or_else(|| {
            warn!(default = DEFAULT_CRITICAL_DAYS, "CRITICAL not set, using default");
            DEFAULT_CRITICAL_DAYS
        });

        if warning < 0 || critical < 0 {
            return Err(DomexpError::InvalidSettings(
                "WARNING and CRITICAL must not be negative".to_string(),
            ));
        }
        if critical > warning {
            return Err(DomexpError::InvalidSettings(format!(
                "CRITICAL ({}) must not exceed WARNING ({})",
                critical, warning
            )));
        }

        Ok(Thresholds {
            warning_days: warning,
            critical_days: critical,
        })
    }

    pub fn reserved_suffixes(&self) -> Vec<String> {
        match &self.main.filter {
            Some(filter) => filter.clone(),
            None => DEFAULT_RESERVED_SUFFIXES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.main.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS).max(1))
    }

    /// Domain list path for the `FILE` method, relative paths resolved
    /// against `base`.
    pub fn domains_file(&self, base: &Path) -> Result<PathBuf> {
        let file = self.main.domains_file.as_ref().ok_or_else(|| {
            DomexpError::InvalidSettings("METHOD = \"FILE\" requires DOMAINS_FILE".to_string())
        })?;
        Ok(if file.is_absolute() {
            file.clone()
        } else {
            base.join(file)
        })
    }

    pub fn route53_credentials(&self) -> Route53Credentials {
        Route53Credentials {
            access_key_id: self.route53.key_id.clone(),
            secret_access_key: self.route53.key.clone(),
        }
    }
}
