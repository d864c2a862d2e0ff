use crate::config::ClientConfig;
use crate::envelope::RequestEnvelope;
use crate::transport::{
    build_request, collect_headers, send_request, BodyMode, ResponseBody, Transport, TransportError,
    TransportResponse,
};
use crate::{Error, Result};
use futures::{Stream, TryStreamExt};
use reqwest::Proxy;
use std::time::Duration;
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, FramedRead};
use tokio_util::io::StreamReader;
use tracing::debug;

/// Default platform transport.
///
/// Owns its own pooled `reqwest::Client`. Streaming bodies come back as text lines, split
/// before any decoding happens; buffered bodies come back as the raw bytes.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        // Per-request timeouts come from the envelope; a client-wide one would also cut
        // long-lived streams.
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(Some(config.pool_idle_timeout))
            // Conservative HTTP/2 keepalive defaults for long-lived streams.
            .http2_adaptive_window(true)
            .http2_keep_alive_interval(Some(Duration::from_secs(30)))
            .http2_keep_alive_timeout(Duration::from_secs(10));

        if let Some(proxy_url) = &config.proxy_url {
            let proxy = Proxy::all(proxy_url).map_err(|e| {
                Error::configuration_with_context(
                    format!("invalid proxy URL: {}", e),
                    crate::ErrorContext::new()
                        .with_url(proxy_url.as_str())
                        .with_source("http_transport"),
                )
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn send(&self, request: &RequestEnvelope, mode: BodyMode) -> Result<TransportResponse> {
        let resp = send_request(build_request(&self.client, request, mode), request, mode).await?;

        let status = resp.status().as_u16();
        let headers = collect_headers(resp.headers());
        debug!(status, url = request.readable_url(), "http transport received response head");

        let body = match mode {
            // Unary bodies stay opaque bytes; only streams are split into lines.
            BodyMode::Buffered => ResponseBody::Chunks(Box::pin(
                resp.bytes_stream()
                    .map_err(|e| Error::Transport(TransportError::Http(e))),
            )),
            BodyMode::Streaming => ResponseBody::Lines(Box::pin(split_lines(resp))),
        };

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

/// Split a body on `\n`, dropping a trailing `\r`. Invalid UTF-8 is replaced rather than
/// failing the read, matching what the chunk re-framer does.
fn split_lines(resp: reqwest::Response) -> impl Stream<Item = Result<String>> + Send {
    let reader = StreamReader::new(
        resp.bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
    );
    FramedRead::new(reader, AnyDelimiterCodec::new(b"\n".to_vec(), b"\n".to_vec()))
        .map_ok(|line| {
            let line = line.strip_suffix(b"\r").unwrap_or(&line[..]);
            String::from_utf8_lossy(line).into_owned()
        })
        .map_err(|e| match e {
            AnyDelimiterCodecError::Io(io) => Error::Transport(TransportError::from_io(io)),
            AnyDelimiterCodecError::MaxChunkLengthExceeded => {
                Error::Transport(TransportError::Other("line length limit exceeded".to_string()))
            }
        })
}
