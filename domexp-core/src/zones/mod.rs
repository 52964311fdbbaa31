//! Sources of the domain list to check.
//!
//! Every source returns names as the provider lists them; callers run them
//! through [`filter_domains`](crate::validation::filter_domains) before use.

mod file;
mod route53;

use async_trait::async_trait;

use crate::error::Result;

pub use file::{parse_domains_from_file, FileZoneSource};
pub use route53::{Route53Credentials, Route53ZoneSource};

#[async_trait]
pub trait ZoneSource: Send + Sync {
    /// Lists every domain the source knows about, following pagination.
    async fn list_domains(&self) -> Result<Vec<String>>;
}

/// A fixed list, used for domains given on the command line.
#[derive(Debug, Clone, Default)]
pub struct StaticZones(pub Vec<String>);

#[async_trait]
impl ZoneSource for StaticZones {
    async fn list_domains(&self) -> Result<Vec<String>> {
        Ok(self.0.clone())
    }
}
