//! Expiration lookup with ordered fallback strategies.
//!
//! Each [`LookupStrategy`] either resolves a date, reports the domain as not
//! registered, or hands over to the next strategy. The default chain asks a
//! WHOIS server directly and falls back to the system `whois` command when
//! the structured answer is incomplete.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::{DomexpError, Result};
use crate::whois::{
    parse_shell_expiration, SystemWhois, WhoisClient, WhoisCommand, WhoisQuery, DEFAULT_TIMEOUT,
};

/// Where an expiration date came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExpirationSource {
    Cache,
    WhoisProtocol,
    WhoisShell,
}

impl fmt::Display for ExpirationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExpirationSource::Cache => "cache",
            ExpirationSource::WhoisProtocol => "whois-protocol",
            ExpirationSource::WhoisShell => "whois-shell",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpirationRecord {
    pub domain: String,
    pub expiration: DateTime<Utc>,
    pub source: ExpirationSource,
}

/// Result of resolving one domain.
#[derive(Debug)]
pub enum LookupOutcome {
    Success(ExpirationRecord),
    NotFound(String),
    Error(DomexpError),
}

impl LookupOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LookupOutcome::Success(_))
    }

    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        match self {
            LookupOutcome::Success(record) => Some(record.expiration),
            _ => None,
        }
    }
}

/// What a single strategy concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyOutcome {
    Resolved(DateTime<Utc>),
    NotFound,
    /// The answer was usable but lacked what we need; try the next strategy.
    Incomplete(String),
}

#[async_trait]
pub trait LookupStrategy: Send + Sync {
    fn source(&self) -> ExpirationSource;

    async fn try_resolve(&self, domain: &str) -> Result<StrategyOutcome>;
}

/// Structured WHOIS query over the network.
///
/// The whole query, referrals included, is bounded by one deadline.
pub struct StructuredWhois<Q> {
    client: Q,
    timeout: Duration,
}

impl<Q: WhoisQuery> StructuredWhois<Q> {
    pub fn new(client: Q) -> Self {
        Self {
            client,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl<Q: WhoisQuery> LookupStrategy for StructuredWhois<Q> {
    fn source(&self) -> ExpirationSource {
        ExpirationSource::WhoisProtocol
    }

    async fn try_resolve(&self, domain: &str) -> Result<StrategyOutcome> {
        let response = tokio::time::timeout(self.timeout, self.client.query(domain))
            .await
            .map_err(|_| DomexpError::Timeout(format!("WHOIS lookup for {} timed out", domain)))??;

        if response.is_not_found() {
            return Ok(StrategyOutcome::NotFound);
        }

        match response.expiration_date() {
            Some(_) if response.status.is_empty() => {
                Ok(StrategyOutcome::Incomplete("no status in WHOIS response".to_string()))
            }
            Some(expiration) => Ok(StrategyOutcome::Resolved(expiration)),
            None => Ok(StrategyOutcome::Incomplete(
                "no expiration date in WHOIS response".to_string(),
            )),
        }
    }
}

/// Free-text output of a WHOIS command-line tool.
pub struct ShellWhois<C> {
    command: C,
}

impl<C: WhoisCommand> ShellWhois<C> {
    pub fn new(command: C) -> Self {
        Self { command }
    }
}

#[async_trait]
impl<C: WhoisCommand> LookupStrategy for ShellWhois<C> {
    fn source(&self) -> ExpirationSource {
        ExpirationSource::WhoisShell
    }

    async fn try_resolve(&self, domain: &str) -> Result<StrategyOutcome> {
        let output = match self.command.run(domain).await {
            Ok(output) => output,
            Err(e @ DomexpError::Timeout(_)) => return Err(e),
            Err(e) => {
                warn!(error = %e, "Error using system whois");
                return Ok(StrategyOutcome::NotFound);
            }
        };

        match parse_shell_expiration(&output) {
            Some(expiration) => Ok(StrategyOutcome::Resolved(expiration)),
            None => {
                debug!("No expiration date in whois command output");
                Ok(StrategyOutcome::NotFound)
            }
        }
    }
}

/// Tries each strategy in order until one gives a definite answer.
pub struct ExpirationResolver {
    strategies: Vec<Box<dyn LookupStrategy>>,
}

impl Default for ExpirationResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpirationResolver {
    /// WHOIS protocol first, then the `whois` command.
    pub fn new() -> Self {
        Self::with_strategies(vec![
            Box::new(StructuredWhois::new(WhoisClient::new())),
            Box::new(ShellWhois::new(SystemWhois::new())),
        ])
    }

    /// Default chain with a per-lookup timeout on every network or
    /// subprocess step.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_strategies(vec![
            Box::new(
                StructuredWhois::new(WhoisClient::new().with_timeout(timeout)).with_timeout(timeout),
            ),
            Box::new(ShellWhois::new(SystemWhois::new().with_timeout(timeout))),
        ])
    }

    pub fn with_strategies(strategies: Vec<Box<dyn LookupStrategy>>) -> Self {
        Self { strategies }
    }

    #[instrument(skip(self), fields(domain = %domain))]
    pub async fn resolve(&self, domain: &str) -> LookupOutcome {
        let mut last_error = None;

        for strategy in &self.strategies {
            let source = strategy.source();
            match strategy.try_resolve(domain).await {
                Ok(StrategyOutcome::Resolved(expiration)) => {
                    debug!(%source, %expiration, "Expiration resolved");
                    return LookupOutcome::Success(ExpirationRecord {
                        domain: domain.to_string(),
                        expiration,
                        source,
                    });
                }
                Ok(StrategyOutcome::NotFound) => {
                    info!(%source, "Domain not found");
                    return LookupOutcome::NotFound(domain.to_string());
                }
                Ok(StrategyOutcome::Incomplete(reason)) => {
                    info!(%source, reason = %reason, "Incomplete answer, falling back");
                    last_error = None;
                }
                Err(e) => {
                    warn!(%source, error = %e, "Lookup strategy failed");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => LookupOutcome::Error(e),
            None => LookupOutcome::NotFound(domain.to_string()),
        }
    }
}
