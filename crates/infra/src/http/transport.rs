use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client as ReqwestClient, Method};
use sealgate_core::{Transport, TransportError};
use sealgate_domain::constants::DEFAULT_HTTP_TIMEOUT_MS;
use sealgate_domain::{HttpMethod, InterceptError, Request, Response, Result, TransportConfig};
use tracing::debug;

use crate::errors::IntoTransportError;

/// [`Transport`] over a shared `reqwest` client.
///
/// Sends each request exactly once; retries belong to the pipeline.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: ReqwestClient,
}

impl ReqwestTransport {
    /// Start building a new transport.
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::default()
    }

    /// Transport configured from the `[transport]` section.
    pub fn from_config(config: &TransportConfig) -> Result<Self> {
        Self::builder().timeout(config.timeout).user_agent(config.user_agent.clone()).build()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &Request) -> std::result::Result<Response, TransportError> {
        let method = match request.method() {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
        };
        let url = request.target().clone();
        debug!(%method, %url, "sending HTTP request");

        let mut builder = self.client.request(method.clone(), url.clone());
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body() {
            builder = builder.header(CONTENT_TYPE, request.content_type()).body(body.to_vec());
        }

        let upstream = builder.send().await.map_err(IntoTransportError::into_transport_error)?;
        let status = upstream.status();
        debug!(%method, %url, %status, "received HTTP response");

        let headers: Vec<(String, String)> = upstream
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = upstream.bytes().await.map_err(IntoTransportError::into_transport_error)?;

        let mut response = Response::new(status.as_u16());
        for (name, value) in headers {
            response = response.with_header(name, value);
        }
        if !body.is_empty() {
            response = response.with_body(body.to_vec());
        }
        Ok(response)
    }
}

/// Builder for [`ReqwestTransport`].
#[derive(Debug)]
pub struct ReqwestTransportBuilder {
    timeout: Duration,
    user_agent: Option<String>,
    default_headers: Option<reqwest::header::HeaderMap>,
}

impl Default for ReqwestTransportBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_HTTP_TIMEOUT_MS),
            user_agent: None,
            default_headers: None,
        }
    }
}

impl ReqwestTransportBuilder {
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    #[must_use]
    pub fn default_headers(mut self, headers: reqwest::header::HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    pub fn build(self) -> Result<ReqwestTransport> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        let client = builder
            .build()
            .map_err(|err| InterceptError::Config(format!("failed to build HTTP client: {err}")))?;

        Ok(ReqwestTransport { client })
    }
}
