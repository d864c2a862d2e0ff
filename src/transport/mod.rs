//! 传输层：可插拔的 HTTP 后端抽象。
//!
//! Transport interface.
//!
//! Executors depend only on [`Transport`]. Two stock implementations exist:
//!
//! | Backend | Body representation |
//! |---------|---------------------|
//! | [`HttpTransport`] (default) | text lines when streaming, raw chunks when buffered |
//! | [`ChunkedTransport`] (alternate) | raw byte chunks, re-framed by the stream bridge |
//!
//! Anything else that can send a [`RequestEnvelope`] and hand back one of the two body
//! shapes can be plugged in as the alternate transport.

pub mod chunked;
pub mod http;

pub use chunked::ChunkedTransport;
pub use http::HttpTransport;

use crate::envelope::RequestEnvelope;
use crate::{BoxStream, Result};
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;

/// Header carrying the client-generated correlation id.
pub const REQUEST_ID_HEADER: &str = "x-aiproxy-request-id";

/// A pluggable HTTP backend.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &str;

    /// Send the request and return as soon as the response head is available.
    ///
    /// The body is handed back unread; the caller decides whether to drain it or
    /// iterate it incrementally. Dropping the body releases the connection.
    async fn send(&self, request: &RequestEnvelope, mode: BodyMode) -> Result<TransportResponse>;
}

/// How the caller will consume the body; decides what the envelope timeout covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    /// Timeout covers the whole exchange, body included.
    Buffered,
    /// Timeout covers only the wait for the response head.
    Streaming,
}

/// Incremental response body in the backend's native representation.
pub enum ResponseBody {
    /// Raw binary chunks with arbitrary boundaries.
    Chunks(BoxStream<'static, Bytes>),
    /// Text lines without their terminators.
    Lines(BoxStream<'static, String>),
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Chunks(_) => f.write_str("ResponseBody::Chunks(..)"),
            ResponseBody::Lines(_) => f.write_str("ResponseBody::Lines(..)"),
        }
    }
}

/// Response head plus an unread body.
#[derive(Debug)]
pub struct TransportResponse {
    pub status: u16,
    /// Lower-cased header names.
    pub headers: HashMap<String, String>,
    pub body: ResponseBody,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        match self {
            TransportError::Http(e) => e.is_timeout(),
            TransportError::Timeout { .. } => true,
            TransportError::Other(_) => false,
        }
    }

    /// Recover the underlying `reqwest::Error` from an I/O error produced by a byte reader.
    pub(crate) fn from_io(err: std::io::Error) -> Self {
        match err.into_inner() {
            Some(inner) => match inner.downcast::<reqwest::Error>() {
                Ok(e) => TransportError::Http(*e),
                Err(other) => TransportError::Other(other.to_string()),
            },
            None => TransportError::Other("I/O error while reading response body".to_string()),
        }
    }
}

/// Derive a `reqwest` request from an envelope: headers 1:1, method, verbatim body, timeout.
pub(crate) fn build_request(
    client: &reqwest::Client,
    envelope: &RequestEnvelope,
    mode: BodyMode,
) -> reqwest::RequestBuilder {
    let mut req = client.request(envelope.method().clone(), envelope.url().clone());
    if mode == BodyMode::Buffered {
        req = req.timeout(envelope.timeout_duration());
    }

    for (k, v) in envelope.header_map() {
        req = req.header(k.as_str(), v.as_str());
    }

    if let Some(body) = envelope.body_bytes() {
        req = req.body(body.clone());
    }

    req
}

/// Send a prepared request. In streaming mode the envelope timeout bounds only the
/// wait for the response head.
pub(crate) async fn send_request(
    req: reqwest::RequestBuilder,
    envelope: &RequestEnvelope,
    mode: BodyMode,
) -> Result<reqwest::Response> {
    let sent = match mode {
        BodyMode::Buffered => req.send().await,
        BodyMode::Streaming => tokio::time::timeout(envelope.timeout_duration(), req.send())
            .await
            .map_err(|_| TransportError::Timeout {
                url: envelope.readable_url().to_string(),
            })?,
    };
    sent.map_err(|e| crate::Error::Transport(TransportError::Http(e)))
}

pub(crate) fn collect_headers(headers: &reqwest::header::HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
        .collect()
}
