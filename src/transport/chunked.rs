use crate::envelope::RequestEnvelope;
use crate::transport::{
    build_request, collect_headers, send_request, BodyMode, ResponseBody, Transport, TransportError,
    TransportResponse,
};
use crate::{Error, Result};
use futures::TryStreamExt;
use tracing::debug;

/// Alternate transport around a caller-owned `reqwest::Client`.
///
/// The client is only ever invoked, never reconfigured. Bodies come back as raw byte
/// chunks exactly as the connection delivers them.
#[derive(Clone)]
pub struct ChunkedTransport {
    client: reqwest::Client,
}

impl ChunkedTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait::async_trait]
impl Transport for ChunkedTransport {
    fn name(&self) -> &str {
        "chunked"
    }

    async fn send(&self, request: &RequestEnvelope, mode: BodyMode) -> Result<TransportResponse> {
        let resp = send_request(build_request(&self.client, request, mode), request, mode).await?;

        let status = resp.status().as_u16();
        let headers = collect_headers(resp.headers());
        debug!(status, url = request.readable_url(), "chunked transport received response head");

        let chunks = resp
            .bytes_stream()
            .map_err(|e| Error::Transport(TransportError::Http(e)));

        Ok(TransportResponse {
            status,
            headers,
            body: ResponseBody::Chunks(Box::pin(chunks)),
        })
    }
}
