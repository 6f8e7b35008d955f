//! The HTTP transport used to reach the user API.
//!
//! The engine only depends on the [`Transport`] trait. [`HttpTransport`] implements
//! it with [`reqwest`](https://docs.rs/reqwest/), alternative transports can be
//! provided with
//! [`GanderAttack::set_transport`](../struct.GanderAttack.html#method.set_transport).

use async_trait::async_trait;
use reqwest::{header, Client};
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::config::GanderConfiguration;
use crate::payload::RequestPlan;
use crate::GanderError;

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Default per-request timeout, in seconds.
pub const DEFAULT_TIMEOUT: f32 = 60.0;

/// Why a request failed to produce an HTTP status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportError {
    /// The request did not complete before the configured timeout.
    Timeout(String),
    /// A connection to the host could not be established.
    Connect(String),
    /// Any other failure, for example building the request or reading the response.
    Other(String),
}
impl TransportError {
    /// True if this error means the host could not be reached at all.
    pub fn is_connect(&self) -> bool {
        matches!(self, TransportError::Connect(_))
    }
}
impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Timeout(e) => write!(f, "timeout: {}", e),
            TransportError::Connect(e) => write!(f, "connection failed: {}", e),
            TransportError::Other(e) => write!(f, "request failed: {}", e),
        }
    }
}
impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

/// Sends a [`RequestPlan`] and reports the HTTP status code that came back.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue exactly one request, returning the response status code.
    async fn send(&self, plan: &RequestPlan) -> Result<u16, TransportError>;
}

/// A [`Transport`] backed by a shared [`reqwest::Client`].
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}
impl HttpTransport {
    /// Build a transport for `host`, with a per-request `timeout`.
    pub fn new(host: &str, timeout: Duration, gzip: bool) -> Result<Self, GanderError> {
        let base_url = Url::parse(host).map_err(|parse_error| GanderError::InvalidHost {
            host: host.to_string(),
            detail: "failed to parse host".to_string(),
            parse_error,
        })?;
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(timeout)
            .gzip(gzip)
            .build()?;
        Ok(HttpTransport { client, base_url })
    }

    /// Build a transport from a configured load test.
    pub fn from_configuration(configuration: &GanderConfiguration) -> Result<Self, GanderError> {
        let timeout = configuration
            .timeout
            .as_ref()
            .and_then(|t| t.parse::<f32>().ok())
            .unwrap_or(DEFAULT_TIMEOUT);
        let timeout =
            Duration::try_from_secs_f32(timeout).map_err(|e| GanderError::InvalidOption {
                option: "`configuration.timeout`".to_string(),
                value: timeout.to_string(),
                detail: format!("`configuration.timeout` is out of range: {}", e),
            })?;
        HttpTransport::new(&configuration.host, timeout, !configuration.no_gzip)
    }

    /// Join the configured host with the request path.
    pub fn build_url(&self, path: &str) -> Result<Url, GanderError> {
        // Preserve any path already included in the host, ie http://example.com/service
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|parse_error| GanderError::InvalidHost {
            host: joined,
            detail: "failed to join host and path".to_string(),
            parse_error,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, plan: &RequestPlan) -> Result<u16, TransportError> {
        let url = self
            .build_url(&plan.path)
            .map_err(|e| TransportError::Other(e.to_string()))?;
        let mut request_builder = self.client.request(plan.method.clone(), url);
        if !plan.query.is_empty() {
            request_builder = request_builder.query(&plan.query);
        }
        if let Some(body) = plan.body.as_ref() {
            request_builder = request_builder.json(body);
        }
        if let Some(authorization) = plan.authorization.as_ref() {
            request_builder = request_builder.header(header::AUTHORIZATION, authorization);
        }

        let response = request_builder.send().await?;
        Ok(response.status().as_u16())
    }
}
