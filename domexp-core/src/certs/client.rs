use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use native_tls::TlsConnector;
use tokio::net::TcpStream;
use tracing::{debug, instrument};

use super::CertificateOutcome;
use crate::error::{DomexpError, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const HTTPS_PORT: u16 = 443;

/// Fetches the certificate a host presents.
#[async_trait]
pub trait CertificateProbe: Send + Sync {
    async fn probe(&self, domain: &str) -> CertificateOutcome;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verification {
    Full,
    SkipHostname,
    None,
}

/// TLS handshake against port 443 using the system trust store.
#[derive(Debug, Clone)]
pub struct TlsProbe {
    timeout: Duration,
    port: u16,
}

impl Default for TlsProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl TlsProbe {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            port: HTTPS_PORT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    async fn handshake(&self, domain: &str, verify: Verification) -> Result<Vec<u8>> {
        let connector = TlsConnector::builder()
            .danger_accept_invalid_hostnames(verify != Verification::Full)
            .danger_accept_invalid_certs(verify == Verification::None)
            .build()
            .map_err(|e| DomexpError::CertificateError(e.to_string()))?;
        let connector = tokio_native_tls::TlsConnector::from(connector);

        let addr = format!("{}:{}", domain, self.port);
        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| DomexpError::Timeout(format!("Connection to {} timed out", domain)))??;

        let tls_stream = tokio::time::timeout(self.timeout, connector.connect(domain, stream))
            .await
            .map_err(|_| DomexpError::Timeout(format!("TLS handshake with {} timed out", domain)))?
            .map_err(|e| DomexpError::CertificateError(e.to_string()))?;

        let cert = tls_stream
            .get_ref()
            .peer_certificate()
            .map_err(|e| DomexpError::CertificateError(e.to_string()))?
            .ok_or_else(|| DomexpError::CertificateError("No certificate found".to_string()))?;

        cert.to_der()
            .map_err(|e| DomexpError::CertificateError(e.to_string()))
    }
}

#[async_trait]
impl CertificateProbe for TlsProbe {
    #[instrument(skip(self), fields(domain = %domain))]
    async fn probe(&self, domain: &str) -> CertificateOutcome {
        let der = match self.handshake(domain, Verification::Full).await {
            Ok(der) => der,
            Err(DomexpError::CertificateError(reason)) => {
                // Look at the rejected certificate to tell expiry apart from
                // a name mismatch or an untrusted chain.
                let not_after = self
                    .handshake(domain, Verification::None)
                    .await
                    .ok()
                    .and_then(|der| validity_from_der(&der))
                    .map(|(_, not_after)| not_after);
                let hostname_only = self.handshake(domain, Verification::SkipHostname).await.is_ok();
                return rejected_outcome(not_after, hostname_only, Utc::now(), reason);
            }
            Err(e) => return CertificateOutcome::Failed(e.to_string()),
        };

        match validity_from_der(&der) {
            Some((_, not_after)) => CertificateOutcome::Expires(not_after),
            None => CertificateOutcome::Failed("Could not parse certificate validity".to_string()),
        }
    }
}

/// Outcome for a certificate the verified handshake rejected.
///
/// An expired certificate reports its `notAfter` so it is counted in days.
/// A handshake that only succeeds without the hostname check means the
/// certificate is valid but for another name.
fn rejected_outcome(
    not_after: Option<DateTime<Utc>>,
    hostname_only: bool,
    now: DateTime<Utc>,
    reason: String,
) -> CertificateOutcome {
    match not_after {
        Some(not_after) if not_after <= now => {
            debug!(%not_after, "Certificate has expired");
            CertificateOutcome::Expires(not_after)
        }
        _ if hostname_only => {
            debug!("Certificate does not match hostname");
            CertificateOutcome::HostnameMismatch
        }
        _ => CertificateOutcome::Failed(format!("Certificate error: {}", reason)),
    }
}

/// Finds the X.509 `Validity` sequence: two consecutive times
/// (`notBefore`, `notAfter`) whose lengths add up to the enclosing SEQUENCE.
pub(crate) fn validity_from_der(der: &[u8]) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    (0..der.len()).find_map(|i| validity_at(der, i))
}

fn validity_at(der: &[u8], i: usize) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    if *der.get(i)? != 0x30 {
        return None;
    }
    let seq_len = *der.get(i + 1)? as usize;
    let (not_before, next) = read_time(der, i + 2)?;
    let (not_after, end) = read_time(der, next)?;
    if end != i + 2 + seq_len {
        return None;
    }
    Some((not_before, not_after))
}

fn read_time(der: &[u8], at: usize) -> Option<(DateTime<Utc>, usize)> {
    let tag = *der.get(at)?;
    let len = *der.get(at + 1)? as usize;
    let end = at + 2 + len;
    let text = std::str::from_utf8(der.get(at + 2..end)?).ok()?;

    let time = match tag {
        0x17 => parse_utc_time(text)?,
        0x18 => parse_generalized_time(text)?,
        _ => return None,
    };
    Some((time, end))
}

/// UTCTime, `YYMMDDHHMMSSZ`; years below 50 are 20xx (RFC 5280).
fn parse_utc_time(s: &str) -> Option<DateTime<Utc>> {
    let s = s.strip_suffix('Z')?;
    if s.len() != 12 {
        return None;
    }
    let year: i32 = s[0..2].parse().ok()?;
    let year = if year >= 50 { 1900 + year } else { 2000 + year };
    build_time(year, &s[2..])
}

/// GeneralizedTime, `YYYYMMDDHHMMSSZ`.
fn parse_generalized_time(s: &str) -> Option<DateTime<Utc>> {
    let s = s.strip_suffix('Z')?;
    if s.len() != 14 {
        return None;
    }
    let year: i32 = s[0..4].parse().ok()?;
    build_time(year, &s[4..])
}

fn build_time(year: i32, rest: &str) -> Option<DateTime<Utc>> {
    let field = |range: std::ops::Range<usize>| -> Option<u32> { rest.get(range)?.parse().ok() };
    NaiveDate::from_ymd_opt(year, field(0..2)?, field(2..4)?)?
        .and_hms_opt(field(4..6)?, field(6..8)?, field(8..10)?)
        .map(|dt| dt.and_utc())
}
