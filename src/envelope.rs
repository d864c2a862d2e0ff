//! Transport-agnostic description of one outbound request.

use crate::{Error, ErrorContext, Result};
use bytes::Bytes;
use reqwest::Method;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// Default per-request timeout when the caller does not set one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Method, absolute URL, headers, optional body and timeout.
///
/// Executors only ever borrow an envelope; each backend derives its own native
/// request from it.
#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    method: Method,
    url: Url,
    headers: HashMap<String, String>,
    body: Option<Bytes>,
    timeout: Duration,
}

impl RequestEnvelope {
    /// Create an envelope. The URL must be absolute (`http` or `https`).
    pub fn new(method: Method, url: &str) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|e| {
            Error::validation_with_context(
                format!("invalid request URL: {}", e),
                ErrorContext::new().with_url(url).with_source("request_envelope"),
            )
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::validation_with_context(
                format!("unsupported URL scheme: {}", parsed.scheme()),
                ErrorContext::new().with_url(url).with_source("request_envelope"),
            ));
        }
        Ok(Self {
            method,
            url: parsed,
            headers: HashMap::new(),
            body: None,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Parse the method from its string form (e.g. `"POST"`).
    pub fn with_method_str(method: &str, url: &str) -> Result<Self> {
        let method = Method::from_bytes(method.to_uppercase().as_bytes()).map_err(|e| {
            Error::validation_with_context(
                format!("invalid HTTP method {:?}: {}", method, e),
                ErrorContext::new().with_url(url).with_source("request_envelope"),
            )
        })?;
        Self::new(method, url)
    }

    pub fn get(url: &str) -> Result<Self> {
        Self::new(Method::GET, url)
    }

    pub fn post(url: &str) -> Result<Self> {
        Self::new(Method::POST, url)
    }

    /// Set a header. Keys are unique; setting an existing key replaces its value.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in headers {
            self.headers.insert(k.into(), v.into());
        }
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the JSON body and set `content-type: application/json`.
    pub fn json_body<B: serde::Serialize + ?Sized>(self, value: &B) -> Result<Self> {
        let bytes = serde_json::to_vec(value).map_err(|e| {
            Error::validation_with_context(
                format!("request body is not serializable: {}", e),
                ErrorContext::new()
                    .with_url(self.url.as_str())
                    .with_source("request_envelope"),
            )
        })?;
        Ok(self
            .header("content-type", "application/json")
            .body(bytes))
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn header_map(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn body_bytes(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn timeout_duration(&self) -> Duration {
        self.timeout
    }

    pub fn readable_url(&self) -> &str {
        self.url.as_str()
    }

    /// Body as UTF-8 text for diagnostics, `"None"` when absent or not valid UTF-8.
    pub fn readable_body(&self) -> String {
        self.body
            .as_ref()
            .and_then(|b| std::str::from_utf8(b).ok())
            .map(str::to_string)
            .unwrap_or_else(|| "None".to_string())
    }
}
