//! Domain name normalization and reserved-suffix filtering

use tracing::{info, warn};

use crate::error::{DomexpError, Result};

/// Suffixes reserved for testing and documentation (RFC 2606 / RFC 6761).
/// Names under them are never registered, so they have no expiration.
pub const DEFAULT_RESERVED_SUFFIXES: &[&str] = &[".test", ".example", ".invalid", ".localhost"];

/// Normalize and validate a domain name
///
/// This function:
/// - Trims whitespace and converts to lowercase
/// - Strips the trailing root dot that zone listings carry (`example.com.`)
/// - Validates format (must contain dots, only alphanumeric/hyphens/dots)
pub fn normalize_domain(domain: &str) -> Result<String> {
    let domain = domain.trim().to_lowercase();
    let domain = domain.strip_suffix('.').unwrap_or(&domain);

    if domain.is_empty() || !domain.contains('.') {
        return Err(DomexpError::InvalidDomain(domain.to_string()));
    }

    let valid = domain
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    if !valid {
        return Err(DomexpError::InvalidDomain(domain.to_string()));
    }

    if domain.contains("..") || domain.starts_with('.') || domain.ends_with('.') {
        return Err(DomexpError::InvalidDomain(domain.to_string()));
    }

    for label in domain.split('.') {
        if label.starts_with('-') || label.ends_with('-') {
            return Err(DomexpError::InvalidDomain(domain.to_string()));
        }
    }

    Ok(domain.to_string())
}

/// Returns true if `domain` ends with one of `suffixes`.
pub fn is_reserved(domain: &str, suffixes: &[String]) -> bool {
    suffixes.iter().any(|s| domain.ends_with(s.as_str()))
}

/// Names left after filtering a zone listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainSelection {
    /// Normalized names to check, in input order without duplicates.
    pub domains: Vec<String>,
    /// Names that are not valid domain names. They cannot be looked up and
    /// must be reported as unknown.
    pub invalid: Vec<String>,
}

/// Builds a new list without reserved names, setting invalid names aside.
pub fn filter_domains<I, S>(domains: I, suffixes: &[String]) -> DomainSelection
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut selection = DomainSelection::default();

    for raw in domains {
        let domain = match normalize_domain(raw.as_ref()) {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "Invalid domain name");
                let name = raw.as_ref().trim().to_string();
                if !selection.invalid.contains(&name) {
                    selection.invalid.push(name);
                }
                continue;
            }
        };

        if is_reserved(&domain, suffixes) {
            info!(domain = %domain, "Domain is filtered");
            continue;
        }

        if !selection.domains.contains(&domain) {
            selection.domains.push(domain);
        }
    }

    selection
}

pub fn default_reserved_suffixes() -> Vec<String> {
    DEFAULT_RESERVED_SUFFIXES.iter().map(|s| s.to_string()).collect()
}
