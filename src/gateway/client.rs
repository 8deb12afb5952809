// src/gateway/client.rs

//! Retrying fetch client for the content-addressed gateway.
//!
//! A single network attempt lives behind the `Transport` trait; the
//! `FetchClient` wraps it with the retry policy. Transient statuses and
//! connection-level failures are retried with backoff; a non-retryable
//! status is handed back to the caller as-is so "exhausted retries" and
//! "permanent rejection" stay distinguishable.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use super::retry::{retry_blocking, RetryConfig, RetryResult};
use crate::config::GatewayConfig;
use crate::error::{CorpusError, Result};

/// Status codes treated as transient and retried automatically.
const RETRYABLE_STATUSES: [u16; 4] = [408, 500, 502, 504];

/// HTTP method for a gateway call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A gateway response: status plus raw body bytes.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub status: u16,
    pub body: Bytes,
}

impl GatewayResponse {
    /// Returns true for a 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Interpret the body as UTF-8 text.
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| CorpusError::gateway("body", format!("response is not UTF-8: {e}")))
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| CorpusError::gateway("body", format!("invalid JSON response: {e}")))
    }
}

/// One network attempt, no retry. `Err` means a connection-level failure.
pub trait Transport: Send + Sync {
    fn execute(
        &self,
        url: &str,
        args: &[(&str, &str)],
        method: Method,
    ) -> Result<GatewayResponse>;
}

/// Transport over a pooled blocking HTTP client.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| {
                CorpusError::gateway_with_source(
                    &config.node_get_url,
                    "failed to build HTTP client",
                    e,
                )
            })?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn execute(
        &self,
        url: &str,
        args: &[(&str, &str)],
        method: Method,
    ) -> Result<GatewayResponse> {
        let request = match method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        };

        let response = request
            .query(args)
            .send()
            .map_err(|e| CorpusError::gateway_with_source(url, "request failed", e))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map_err(|e| CorpusError::gateway_with_source(url, "failed to read body", e))?;

        Ok(GatewayResponse { status, body })
    }
}

/// Outcome of one attempt, kept so exhaustion can surface the last response.
enum Attempt {
    Status(GatewayResponse),
    Failed(CorpusError),
}

/// Fetch client with automatic retry and backoff.
#[derive(Clone)]
pub struct FetchClient {
    transport: Arc<dyn Transport>,
    retry: RetryConfig,
    cat_url: String,
    node_get_url: String,
}

impl FetchClient {
    /// Creates a client backed by a pooled HTTP transport.
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(config)?);
        Ok(Self::with_transport(config, transport))
    }

    /// Creates a client over a caller-supplied transport.
    pub fn with_transport(config: &GatewayConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            retry: RetryConfig::from(config),
            cat_url: config.cat_url.clone(),
            node_get_url: config.node_get_url.clone(),
        }
    }

    /// Performs a gateway call with automatic retry.
    ///
    /// Transient statuses (408, 500, 502, 504) and connection failures are
    /// retried with exponential backoff. When the retry budget is exhausted
    /// on a transient status the **last failure response** is returned as
    /// `Ok`, so callers see the status rather than an error. Only a
    /// connection failure that never produced a response yields `Err`.
    pub fn fetch(
        &self,
        url: &str,
        args: &[(&str, &str)],
        method: Method,
    ) -> Result<GatewayResponse> {
        let outcome = retry_blocking(&self.retry, || {
            match self.transport.execute(url, args, method) {
                Ok(resp) if resp.is_success() => RetryResult::Ok(resp),
                Ok(resp) if RETRYABLE_STATUSES.contains(&resp.status) => {
                    tracing::debug!(url, status = resp.status, "transient gateway status, retrying");
                    RetryResult::Retry(Attempt::Status(resp))
                }
                Ok(resp) => RetryResult::Fail(Attempt::Status(resp)),
                Err(e) => {
                    tracing::debug!(url, error = %e, "gateway connection failure, retrying");
                    RetryResult::Retry(Attempt::Failed(e))
                }
            }
        });

        match outcome {
            Ok(resp) => Ok(resp),
            Err(Attempt::Status(resp)) => Ok(resp),
            Err(Attempt::Failed(e)) => Err(e),
        }
    }

    /// Fetches raw file bytes for a content-hash.
    pub fn cat(&self, hash: &str) -> Result<GatewayResponse> {
        let url = self.cat_url.clone();
        self.fetch(&url, &[("arg", hash)], Method::Post)
    }

    /// Fetches the directory listing for a content-hash.
    pub fn node_get(&self, hash: &str) -> Result<GatewayResponse> {
        let url = self.node_get_url.clone();
        self.fetch(&url, &[("arg", hash)], Method::Post)
    }
}
