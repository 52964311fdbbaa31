use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Structured registration data extracted from a WHOIS response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WhoisResponse {
    pub domain: String,
    pub registrar: Option<String>,
    /// Every expiration date found, in response order. Some registries
    /// repeat the field (registry and registrar values).
    pub expiration_dates: Vec<DateTime<Utc>>,
    pub status: Vec<String>,
    pub whois_server: String,
    pub raw_response: String,
}

static EXPIRATION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?im)^\s*(?:Registry |Registrar Registration )?Expir(?:y|ation) Date:\s*(.+)$",
        r"(?im)^\s*Expires On:\s*(.+)$",
        r"(?im)^\s*Expires:\s*(.+)$",
        r"(?im)^\s*paid-till:\s*(.+)$",
        r"(?im)^\s*Valid Until:\s*(.+)$",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static STATUS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?im)^\s*Domain Status:\s*(.+)$",
        r"(?im)^\s*Status:\s*(.+)$",
        r"(?im)^\s*state:\s*(.+)$",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static REGISTRAR_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?im)^\s*(?:Sponsoring )?Registrar(?: Name)?:\s*(.+)$").ok());

static SHELL_EXPIRATION: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"Expir.+ Date:\s*(\d{4}-\d{2}-\d{2})T").ok());

/// Registry "no such domain" answers. Anchored to the start of a line so
/// legal notices that merely mention "not found" do not match.
static NOT_FOUND_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"(?im)^[\s%#>]*(?:no match for|not found|no data found|no entries found|no object found|status:\s*(?:free|available)\b)",
    )
    .ok()
});

impl WhoisResponse {
    pub fn parse(domain: &str, whois_server: &str, raw: &str) -> Self {
        let expiration_dates = EXPIRATION_PATTERNS
            .iter()
            .flat_map(|re| re.captures_iter(raw))
            .filter_map(|caps| caps.get(1))
            .filter_map(|m| parse_date(m.as_str()))
            .fold(Vec::new(), |mut dates, d| {
                if !dates.contains(&d) {
                    dates.push(d);
                }
                dates
            });

        let registrar = REGISTRAR_PATTERN
            .as_ref()
            .and_then(|re| re.captures(raw))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("redacted"));

        WhoisResponse {
            domain: domain.to_string(),
            registrar,
            expiration_dates,
            status: extract_status(raw),
            whois_server: whois_server.to_string(),
            raw_response: raw.to_string(),
        }
    }

    /// The authoritative expiration: the last one reported.
    pub fn expiration_date(&self) -> Option<DateTime<Utc>> {
        self.expiration_dates.last().copied()
    }

    /// True when the registry answered that it has no such domain.
    ///
    /// A response carrying an expiration date is never treated as not found.
    pub fn is_not_found(&self) -> bool {
        self.expiration_dates.is_empty() && is_not_found_text(&self.raw_response)
    }
}

pub(crate) fn is_not_found_text(raw: &str) -> bool {
    NOT_FOUND_PATTERN
        .as_ref()
        .is_some_and(|re| re.is_match(raw))
}

/// Pulls the expiration out of free-form `whois` command output.
///
/// Only the calendar date is kept; time of day and zone are dropped and the
/// result is midnight UTC.
pub fn parse_shell_expiration(output: &str) -> Option<DateTime<Utc>> {
    let caps = SHELL_EXPIRATION.as_ref()?.captures(output)?;
    let date = NaiveDate::parse_from_str(caps.get(1)?.as_str(), "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let formats = [
        "%Y-%m-%dT%H:%M:%SZ",
        "%Y-%m-%dT%H:%M:%S%.fZ",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d",
        "%d-%b-%Y",
        "%d-%B-%Y",
        "%Y.%m.%d",
        "%Y/%m/%d",
        "%d.%m.%Y",
        "%d/%m/%Y",
    ];

    let cleaned = date_str
        .trim()
        .replace(" (UTC)", "")
        .replace(" UTC", "Z")
        .replace(" +0000", "Z");

    if let Ok(dt) = DateTime::parse_from_rfc3339(&cleaned) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in &formats {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(&cleaned, fmt) {
            return Some(dt.and_utc());
        }
        if let Ok(d) = NaiveDate::parse_from_str(&cleaned, fmt) {
            return Some(d.and_hms_opt(0, 0, 0)?.and_utc());
        }
    }

    None
}

fn extract_status(text: &str) -> Vec<String> {
    let mut statuses = Vec::new();

    for re in STATUS_PATTERNS.iter() {
        for caps in re.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                // "clientTransferProhibited https://icann.org/epp#..." -> first token
                let status = m.as_str().split_whitespace().next().unwrap_or("").to_string();
                if !status.is_empty() && !statuses.contains(&status) {
                    statuses.push(status);
                }
            }
        }
    }

    statuses
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const VERISIGN: &str = "   Domain Name: EXAMPLE.COM\r
   Registrar WHOIS Server: whois.example-registrar.com\r
   Updated Date: 2024-08-14T07:01:34Z\r
   Creation Date: 1995-08-14T04:00:00Z\r
   Registry Expiry Date: 2027-08-13T04:00:00Z\r
   Registrar: RESERVED-Internet Assigned Numbers Authority\r
   Domain Status: clientDeleteProhibited https://icann.org/epp#clientDeleteProhibited\r
   Domain Status: clientTransferProhibited https://icann.org/epp#clientTransferProhibited\r
";

    #[test]
    fn test_parse_verisign_record() {
        let resp = WhoisResponse::parse("example.com", "whois.verisign-grs.com", VERISIGN);

        assert_eq!(
            resp.expiration_date(),
            Some(Utc.with_ymd_and_hms(2027, 8, 13, 4, 0, 0).unwrap())
        );
        assert_eq!(
            resp.status,
            vec!["clientDeleteProhibited", "clientTransferProhibited"]
        );
        assert_eq!(
            resp.registrar.as_deref(),
            Some("RESERVED-Internet Assigned Numbers Authority")
        );
        assert!(!resp.is_not_found());
    }

    #[test]
    fn test_repeated_expiration_keeps_all_in_order() {
        let raw = "Registry Expiry Date: 2026-01-01T00:00:00Z\n\
                   Registrar Registration Expiration Date: 2027-01-01T00:00:00Z\n\
                   Domain Status: ok\n";
        let resp = WhoisResponse::parse("example.net", "whois.verisign-grs.com", raw);

        assert_eq!(resp.expiration_dates.len(), 2);
        assert_eq!(
            resp.expiration_date(),
            Some(Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_not_found_detection() {
        let resp = WhoisResponse::parse(
            "nope-unregistered.com",
            "whois.verisign-grs.com",
            "No match for \"NOPE-UNREGISTERED.COM\".\r\n>>> Last update of whois database",
        );
        assert!(resp.is_not_found());
        assert!(resp.expiration_date().is_none());
    }

    #[test]
    fn test_notice_mentioning_not_found_is_not_a_miss() {
        let raw = "Domain Name: EXAMPLE.COM\n\
                   Registry Expiry Date: 2030-01-01T00:00:00Z\n\
                   Domain Status: ok\n\
                   NOTICE: if a record is not found in this database, contact the registrar.\n";
        let resp = WhoisResponse::parse("example.com", "whois.verisign-grs.com", raw);
        assert!(!resp.is_not_found());
        assert!(resp.expiration_date().is_some());
    }

    #[test]
    fn test_not_found_line_variants() {
        assert!(is_not_found_text("% No entries found for the selected source(s).\n"));
        assert!(is_not_found_text("\nNOT FOUND\n"));
        assert!(is_not_found_text("Domain: free.de\nStatus: free\n"));
        assert!(!is_not_found_text("Terms: data not found here is not guaranteed\n"));
    }

    #[test]
    fn test_shell_expiration_is_date_only() {
        let out = "Domain Name: EXAMPLE.ORG\r\nRegistry Expiry Date: 2026-11-30T23:59:59.0Z\r\n";
        assert_eq!(
            parse_shell_expiration(out),
            Some(Utc.with_ymd_and_hms(2026, 11, 30, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_shell_expiration_unparseable() {
        assert!(parse_shell_expiration("Expiration Date: soon").is_none());
        assert!(parse_shell_expiration("").is_none());
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).unwrap();
        assert_eq!(parse_date("2026-03-15"), Some(expected));
        assert_eq!(parse_date("15-Mar-2026"), Some(expected));
        assert_eq!(parse_date("2026.03.15"), Some(expected));
        assert_eq!(parse_date("2026-03-15T00:00:00+00:00"), Some(expected));
        assert_eq!(parse_date("garbage"), None);
    }
}
