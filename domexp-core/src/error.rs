use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomexpError {
    #[error("WHOIS lookup failed: {0}")]
    WhoisError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("whois command failed: {0}")]
    WhoisCommandFailed(String),

    #[error("Invalid domain name: {0}")]
    InvalidDomain(String),

    #[error("Certificate error: {0}")]
    CertificateError(String),

    #[error("Zone listing failed: {0}")]
    ZoneSourceError(String),

    #[error("Settings file {} not found, a template was written; please edit it", path.display())]
    SettingsCreated { path: PathBuf },

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Settings parse error: {0}")]
    SettingsParse(#[from] toml::de::Error),

    #[error("Settings serialization error: {0}")]
    SettingsWrite(#[from] toml::ser::Error),

    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Cache write failed: {0}")]
    CacheWrite(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}

pub type Result<T> = std::result::Result<T, DomexpError>;
