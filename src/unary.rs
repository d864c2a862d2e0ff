//! 非流式请求执行：完整读取响应体后一次性解码。
//!
//! Unary request execution (single attempt, fully buffered).

use crate::diagnostics::Diagnostics;
use crate::envelope::RequestEnvelope;
use crate::selector::TransportSelector;
use crate::transport::{BodyMode, ResponseBody, REQUEST_ID_HEADER};
use crate::{Error, ErrorContext, Result};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// Longest body excerpt attached to decode/remote error context.
const BODY_EXCERPT_LEN: usize = 512;

/// Sends one request and decodes the complete body into `T`.
#[derive(Clone)]
pub struct UnaryExecutor {
    selector: TransportSelector,
    diagnostics: Diagnostics,
}

impl UnaryExecutor {
    pub fn new(selector: TransportSelector) -> Self {
        Self {
            selector,
            diagnostics: Diagnostics::default(),
        }
    }

    pub(crate) fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub async fn execute<T: DeserializeOwned>(&self, envelope: &RequestEnvelope) -> Result<T> {
        let (request_id, body) = self.execute_bytes(envelope).await?;

        serde_json::from_slice::<T>(&body).map_err(|e| {
            Error::decode_with_context(
                e.to_string(),
                ErrorContext::new()
                    .with_url(envelope.readable_url())
                    .with_request_id(request_id)
                    .with_details(excerpt(&body))
                    .with_source("unary_executor"),
            )
        })
    }

    /// Send the request and return the drained body of a successful response.
    pub async fn execute_bytes(&self, envelope: &RequestEnvelope) -> Result<(String, Bytes)> {
        let request_id = Uuid::new_v4().to_string();
        let request = envelope.clone().header(REQUEST_ID_HEADER, request_id.as_str());
        let transport = self.selector.transport();

        self.diagnostics.request(envelope);

        let start = Instant::now();
        let resp = match transport.send(&request, BodyMode::Buffered).await {
            Ok(resp) => resp,
            Err(e) => {
                info!(
                    url = envelope.readable_url(),
                    request_id = request_id.as_str(),
                    transport = transport.name(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    error = %e,
                    "unary request failed"
                );
                return Err(e);
            }
        };

        let status = resp.status;
        let body = drain(resp.body).await?;
        self.diagnostics.response(&body);

        debug!(
            url = envelope.readable_url(),
            request_id = request_id.as_str(),
            transport = transport.name(),
            http_status = status,
            body_len = body.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "unary response received"
        );

        if !(200..300).contains(&status) {
            return Err(Error::Remote {
                status,
                message: String::from_utf8_lossy(&body).into_owned(),
                context: ErrorContext::new()
                    .with_url(envelope.readable_url())
                    .with_request_id(request_id)
                    .with_source("unary_executor"),
            });
        }

        Ok((request_id, body))
    }
}

/// Read a body to its end. Line bodies are re-joined with `\n`.
pub(crate) async fn drain(body: ResponseBody) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    match body {
        ResponseBody::Chunks(mut chunks) => {
            while let Some(chunk) = chunks.next().await {
                buf.extend_from_slice(&chunk?);
            }
        }
        ResponseBody::Lines(mut lines) => {
            let mut first = true;
            while let Some(line) = lines.next().await {
                if !first {
                    buf.extend_from_slice(b"\n");
                }
                buf.extend_from_slice(line?.as_bytes());
                first = false;
            }
        }
    }
    Ok(buf.freeze())
}

fn excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    match text.char_indices().nth(BODY_EXCERPT_LEN) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;

    #[tokio::test]
    async fn drain_concatenates_chunks() {
        let chunks = futures::stream::iter(vec![
            Ok::<_, Error>(Bytes::from_static(b"{\"cho")),
            Ok(Bytes::from_static(b"ices\":[]}")),
        ]);
        let body = drain(ResponseBody::Chunks(Box::pin(chunks))).await.unwrap();
        assert_eq!(&body[..], br#"{"choices":[]}"#);
    }

    #[tokio::test]
    async fn drain_rejoins_lines() {
        let lines = futures::stream::iter(vec![Ok::<_, Error>("{".to_string()), Ok("}".to_string())]);
        let body = drain(ResponseBody::Lines(Box::pin(lines))).await.unwrap();
        assert_eq!(&body[..], b"{\n}");
    }

    #[tokio::test]
    async fn drain_surfaces_mid_body_errors() {
        let chunks = futures::stream::iter(vec![
            Ok::<_, Error>(Bytes::from_static(b"{")),
            Err(Error::Transport(TransportError::Other("reset".into()))),
        ]);
        let err = drain(ResponseBody::Chunks(Box::pin(chunks))).await.unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn excerpt_truncates_on_char_boundary() {
        let long = "é".repeat(BODY_EXCERPT_LEN + 10);
        let out = excerpt(long.as_bytes());
        assert!(out.ends_with("..."));
        assert_eq!(out.chars().count(), BODY_EXCERPT_LEN + 3);
    }
}
