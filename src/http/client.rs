//! Plain HTTP transport
//!
//! Sends prepared requests with optional pacing and honours cancellation.
//! There is no retry loop here; every non-2xx response is classified once
//! and returned to the caller.

use super::errors::interpret_error;
use super::rate_limit::{RateLimiter, RateLimiterConfig};
use super::request::{HttpRequest, RequestBody};
use super::response::HttpResponse;
use crate::cancel::CancellationToken;
use crate::error::{Error, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout
    pub timeout: Duration,
    /// Optional client-side pacing
    pub rate_limit: Option<RateLimiterConfig>,
    /// Headers added to every request (request headers win on conflict)
    pub default_headers: BTreeMap<String, String>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            rate_limit: None,
            default_headers: BTreeMap::new(),
            user_agent: format!("connectorkit/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Debug, Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the request timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Enable pacing
    #[must_use]
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Add a default header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set user agent
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// HTTP transport shared by all connectors. Cheap to clone.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    rate_limiter: Option<RateLimiter>,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Create a client with default configuration
    pub fn new() -> Self {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                Client::new()
            });

        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);

        Self {
            client,
            config,
            rate_limiter,
        }
    }

    /// The configuration this client was built with
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Get the underlying reqwest client
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Send a request.
    ///
    /// Returns the materialized response for 2xx statuses and a classified
    /// error otherwise. Cancelling `ctx` aborts the wait for a pacing permit
    /// or the exchange itself with [`Error::Cancelled`].
    #[instrument(skip_all, fields(method = %request.method, url = %request.url))]
    pub async fn send(&self, ctx: &CancellationToken, request: &HttpRequest) -> Result<HttpResponse> {
        if ctx.is_cancelled() {
            return Err(Error::Cancelled);
        }

        if let Some(limiter) = &self.rate_limiter {
            tokio::select! {
                biased;
                () = ctx.cancelled() => return Err(Error::Cancelled),
                () = limiter.wait() => {}
            }
        }

        let builder = self.prepare(request);
        let exchange = async {
            let response = builder.send().await?;
            let status = response.status().as_u16();
            let headers = response.headers().clone();
            let url = response.url().clone();
            let body = response.bytes().await?;
            Ok::<_, Error>(HttpResponse::new(status, headers, body, url))
        };

        let response = tokio::select! {
            biased;
            () = ctx.cancelled() => {
                debug!("Request cancelled");
                return Err(Error::Cancelled);
            }
            result = exchange => result?,
        };

        if response.is_success() {
            debug!(status = response.status, "Request succeeded");
            Ok(response)
        } else {
            warn!(status = response.status, "Request failed");
            Err(interpret_error(
                response.status,
                &response.headers,
                &response.body,
            ))
        }
    }

    fn prepare(&self, request: &HttpRequest) -> RequestBuilder {
        let mut req = self
            .client
            .request(request.method.into(), request.url.clone());

        for (key, value) in &self.config.default_headers {
            if request.header(key).is_none() {
                req = req.header(key.as_str(), value.as_str());
            }
        }

        for (key, value) in &request.headers {
            req = req.header(key.as_str(), value.as_str());
        }

        match &request.body {
            RequestBody::Empty => req,
            RequestBody::Json(body) => req.json(body),
            RequestBody::Form(pairs) => req.form(pairs),
            RequestBody::Xml(xml) => req
                .header(CONTENT_TYPE, "text/xml; charset=utf-8")
                .body(xml.clone()),
        }
    }
}
