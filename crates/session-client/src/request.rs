//! Request descriptors and the transport seam
//!
//! A `RequestDescriptor` is built once per logical call and never mutated;
//! attaching auth headers produces a new descriptor, so the retry after a
//! refresh starts from the same method, URL and body as the first attempt.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::{debug, warn};

/// An outgoing backend request.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    method: Method,
    url: String,
    headers: HeaderMap,
    body: Option<serde_json::Value>,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::POST, url).with_body(body)
    }

    pub fn put(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::PUT, url).with_body(body)
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: &'static str, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// A copy of this descriptor with `extra` merged over its headers.
    /// Headers in `extra` replace same-named headers already present.
    pub fn merged_with(&self, extra: &HeaderMap) -> Self {
        let mut merged = self.clone();
        for (name, value) in extra {
            merged.headers.insert(name.clone(), value.clone());
        }
        merged
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }
}

/// A fully received response.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    /// Reason phrase for `status` ("Not Found"), empty when unknown
    pub status_text: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        let status_text = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or_default()
            .to_string();
        Self {
            status,
            status_text,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// A response with a JSON body.
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self::new(status, body.to_string())
    }

    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport-level failures: the request never produced a response.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("request was aborted")]
    Aborted,

    #[error("{0}")]
    Network(String),
}

/// The HTTP call primitive the executor drives.
///
/// Cancellation is applied by the executor dropping the returned future, so
/// implementations must be cancel-safe at every await point.
pub trait Transport: Send + Sync {
    fn send<'a>(
        &'a self,
        request: &'a RequestDescriptor,
    ) -> Pin<Box<dyn Future<Output = Result<TransportResponse, TransportError>> + Send + 'a>>;
}

/// Transport backed by a shared `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

impl Transport for ReqwestTransport {
    fn send<'a>(
        &'a self,
        request: &'a RequestDescriptor,
    ) -> Pin<Box<dyn Future<Output = Result<TransportResponse, TransportError>> + Send + 'a>>
    {
        Box::pin(async move {
            let mut builder = self
                .client
                .request(request.method().clone(), request.url())
                .headers(request.headers().clone())
                .timeout(self.timeout);
            if let Some(body) = request.body() {
                builder = builder.json(body);
            }

            let response = builder.send().await.map_err(|e| {
                debug!(error = %e, url = %request.url(), "transport error");
                TransportError::Network(e.to_string())
            })?;

            let status = response.status();
            let headers = response.headers().clone();
            // Status and headers already arrived; a broken body degrades to
            // empty so the caller still syncs headers and classifies by status.
            let body = match response.bytes().await {
                Ok(body) => body,
                Err(e) => {
                    warn!(
                        error = %e,
                        url = %request.url(),
                        status = status.as_u16(),
                        "failed to read response body"
                    );
                    Bytes::new()
                }
            };

            Ok(TransportResponse {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
                headers,
                body,
            })
        })
    }
}
