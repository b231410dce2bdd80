//! HTTP transport seam used by the request channel.
//!
//! The channel only ever issues binary POSTs, so the trait is narrow:
//! one request in, one status and body out. [`ReqwestTransport`] is the
//! production implementation; [`crate::mock::MockTransport`] scripts
//! responses for tests.

#![allow(async_fn_in_trait)]

use std::time::Duration;

use bytes::Bytes;
use tracing::trace;

use crate::error::{Result, TransportError};

/// Content type of every packet body.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// An outbound binary POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Bytes,
}

impl HttpRequest {
    pub fn post(url: impl Into<String>, body: Bytes) -> Self {
        Self {
            url: url.into(),
            headers: vec![("Content-Type", OCTET_STREAM.to_string())],
            body,
        }
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Value of the first header called `name`, compared case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Status and body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Something that can carry a binary POST to the API.
pub trait HttpTransport: Send {
    /// Whether the device currently has a network link.
    fn is_network_available(&self) -> bool {
        true
    }

    /// Send `request` and wait for the complete response.
    ///
    /// Non-200 statuses are returned as responses, not errors.
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// [`HttpTransport`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a client whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("attraccess-reader/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl HttpTransport for ReqwestTransport {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = self.client.post(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }

        let response = builder.body(request.body).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        trace!(status, body_len = body.len(), "HTTP response received");

        Ok(HttpResponse { status, body })
    }
}
