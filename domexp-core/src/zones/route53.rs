use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_route53::config::{Credentials, Region};
use aws_sdk_route53::error::DisplayErrorContext;
use aws_sdk_route53::Client;
use tracing::{debug, info, instrument};

use super::ZoneSource;
use crate::error::{DomexpError, Result};

/// Route 53 is a global service; its API lives in us-east-1.
const ROUTE53_REGION: &str = "us-east-1";

#[derive(Debug, Clone, Default)]
pub struct Route53Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl Route53Credentials {
    fn is_set(&self) -> bool {
        !self.access_key_id.is_empty() && !self.secret_access_key.is_empty()
    }
}

/// Lists hosted zones of an AWS account.
#[derive(Debug, Clone)]
pub struct Route53ZoneSource {
    credentials: Route53Credentials,
}

impl Route53ZoneSource {
    /// Empty credentials fall back to the default AWS provider chain
    /// (environment, profile, instance role).
    pub fn new(credentials: Route53Credentials) -> Self {
        Self { credentials }
    }

    async fn client(&self) -> Client {
        let shared = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let mut builder =
            aws_sdk_route53::config::Builder::from(&shared).region(Region::new(ROUTE53_REGION));

        if self.credentials.is_set() {
            builder = builder.credentials_provider(Credentials::new(
                self.credentials.access_key_id.clone(),
                self.credentials.secret_access_key.clone(),
                None,
                None,
                "domexp-settings",
            ));
        }

        Client::from_conf(builder.build())
    }
}

#[async_trait]
impl ZoneSource for Route53ZoneSource {
    #[instrument(skip(self))]
    async fn list_domains(&self) -> Result<Vec<String>> {
        let client = self.client().await;
        let mut domains = Vec::new();
        let mut marker: Option<String> = None;

        info!("Gathering domain list");
        loop {
            let resp = client
                .list_hosted_zones()
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| DomexpError::ZoneSourceError(DisplayErrorContext(&e).to_string()))?;

            for zone in resp.hosted_zones() {
                domains.push(zone.name().trim_end_matches('.').to_string());
            }
            debug!(total = domains.len(), "Fetched hosted zone page");

            if !resp.is_truncated() {
                break;
            }
            marker = resp.next_marker().map(String::from);
            if marker.is_none() {
                return Err(DomexpError::ZoneSourceError(
                    "truncated zone listing without a next marker".to_string(),
                ));
            }
        }

        Ok(domains)
    }
}
