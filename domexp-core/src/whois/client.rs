use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use super::parser::WhoisResponse;
use super::servers::{get_tld, get_whois_server};
use crate::error::{DomexpError, Result};
use crate::validation::normalize_domain;

const WHOIS_PORT: u16 = 43;
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_RESPONSE_SIZE: usize = 1024 * 1024; // 1MB
const MAX_REFERRAL_DEPTH: u8 = 3;

static REFERRAL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)Registrar WHOIS Server:\s*(.+)",
        r"(?i)ReferralServer:\s*whois://(.+)",
        r"(?i)refer:\s*(.+)",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Source of structured WHOIS data.
///
/// `Ok` is returned whenever a registry answered, including "no match"
/// answers; callers check [`WhoisResponse::is_not_found`].
#[async_trait]
pub trait WhoisQuery: Send + Sync {
    async fn query(&self, domain: &str) -> Result<WhoisResponse>;
}

/// WHOIS client speaking the port-43 protocol directly.
#[derive(Debug, Clone)]
pub struct WhoisClient {
    timeout: Duration,
}

impl Default for WhoisClient {
    fn default() -> Self {
        Self::new()
    }
}

impl WhoisClient {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[instrument(skip(self), fields(domain = %domain))]
    pub async fn lookup(&self, domain: &str) -> Result<WhoisResponse> {
        let domain = normalize_domain(domain)?;
        let tld = get_tld(&domain).ok_or_else(|| DomexpError::InvalidDomain(domain.clone()))?;
        let whois_server = get_whois_server(tld);

        let mut visited = HashSet::new();
        self.lookup_with_referrals(&domain, &whois_server, 0, &mut visited)
            .await
    }

    fn lookup_with_referrals<'a>(
        &'a self,
        domain: &'a str,
        whois_server: &'a str,
        depth: u8,
        visited: &'a mut HashSet<String>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<WhoisResponse>> + Send + 'a>>
    {
        Box::pin(async move {
            if depth >= MAX_REFERRAL_DEPTH {
                warn!(depth = depth, server = %whois_server, "Max referral depth exceeded");
                return Err(DomexpError::WhoisError(
                    "Maximum WHOIS referral depth exceeded".to_string(),
                ));
            }

            let server_lower = whois_server.to_lowercase();
            if visited.contains(&server_lower) {
                warn!(server = %whois_server, "Circular WHOIS referral detected");
                return Err(DomexpError::WhoisError(
                    "Circular WHOIS referral detected".to_string(),
                ));
            }
            visited.insert(server_lower);

            debug!(whois_server = %whois_server, depth = depth, "Querying WHOIS server");

            let raw_response = self.query_server(whois_server, domain).await?;
            let response = WhoisResponse::parse(domain, whois_server, &raw_response);

            if response.is_not_found() {
                return Ok(response);
            }

            if let Some(referral) = extract_referral(&raw_response) {
                if !visited.contains(&referral) {
                    debug!(referral = %referral, "Following referral");
                    match self
                        .lookup_with_referrals(domain, &referral, depth + 1, visited)
                        .await
                    {
                        // Registrar records often omit the registry status
                        // lines, so keep whatever the registry already gave us.
                        Ok(mut referred) if !referred.is_not_found() => {
                            if referred.expiration_dates.is_empty() {
                                referred.expiration_dates = response.expiration_dates.clone();
                            }
                            if referred.status.is_empty() {
                                referred.status = response.status.clone();
                            }
                            return Ok(referred);
                        }
                        Ok(_) => {}
                        Err(e) => {
                            debug!(error = %e, "Referral lookup failed, using registry answer");
                        }
                    }
                }
            }

            Ok(response)
        })
    }

    async fn query_server(&self, server: &str, query: &str) -> Result<String> {
        let addr = format!("{}:{}", server, WHOIS_PORT);

        let mut stream = timeout(self.timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| DomexpError::Timeout(format!("Connection to {} timed out", server)))?
            .map_err(|e| DomexpError::WhoisError(format!("Failed to connect to {}: {}", server, e)))?;

        let query_bytes = format!("{}\r\n", query);
        timeout(self.timeout, stream.write_all(query_bytes.as_bytes()))
            .await
            .map_err(|_| DomexpError::Timeout("Write timed out".to_string()))?
            .map_err(|e| DomexpError::WhoisError(format!("Failed to send query: {}", e)))?;

        let mut response = Vec::new();
        let mut buf = [0u8; 4096];

        loop {
            match timeout(self.timeout, stream.read(&mut buf)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => {
                    response.extend_from_slice(&buf[..n]);
                    if response.len() > MAX_RESPONSE_SIZE {
                        return Err(DomexpError::WhoisError("Response too large".to_string()));
                    }
                }
                Ok(Err(e)) => {
                    return Err(DomexpError::WhoisError(format!("Read error: {}", e)));
                }
                Err(_) => {
                    // Some servers keep the socket open after answering.
                    if !response.is_empty() {
                        break;
                    }
                    return Err(DomexpError::Timeout("Read timed out".to_string()));
                }
            }
        }

        Ok(decode_response(response))
    }
}

#[async_trait]
impl WhoisQuery for WhoisClient {
    async fn query(&self, domain: &str) -> Result<WhoisResponse> {
        self.lookup(domain).await
    }
}

/// UTF-8, falling back to Latin-1 for older registries.
fn decode_response(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => e.into_bytes().iter().map(|&c| c as char).collect(),
    }
}

fn extract_referral(response: &str) -> Option<String> {
    for re in REFERRAL_PATTERNS.iter() {
        if let Some(m) = re.captures(response).and_then(|caps| caps.get(1)) {
            let server = m.as_str().trim().to_lowercase();
            let server = server.split(':').next().unwrap_or("").to_string();
            if !server.is_empty() && server.contains('.') {
                return Some(server);
            }
        }
    }

    None
}
