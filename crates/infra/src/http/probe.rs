//! Reachability probe over HTTP `HEAD`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use sealgate_core::ReachabilityProbe;
use sealgate_domain::{InterceptError, Result};
use tracing::debug;
use url::Url;

/// Treats any HTTP answer from the probe URL as reachable, whatever its
/// status. Only connection failures and timeouts count as unreachable.
#[derive(Debug, Clone)]
pub struct HttpReachabilityProbe {
    client: ReqwestClient,
    url: Url,
}

impl HttpReachabilityProbe {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| InterceptError::Config(format!("invalid probe URL '{url}': {e}")))?;
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
            .map_err(|e| InterceptError::Config(format!("failed to build probe client: {e}")))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl ReachabilityProbe for HttpReachabilityProbe {
    async fn is_reachable(&self) -> bool {
        match self.client.head(self.url.clone()).send().await {
            Ok(response) => {
                debug!(url = %self.url, status = %response.status(), "probe answered");
                true
            }
            Err(e) => {
                debug!(url = %self.url, error = %e, "probe failed");
                false
            }
        }
    }
}
