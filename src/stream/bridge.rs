use super::{ChunkReframer, EventStream, Message, StreamStats};
use crate::decode::{LineDecoder, LineOutcome, SkipReason};
use crate::diagnostics::Diagnostics;
use crate::envelope::RequestEnvelope;
use crate::selector::TransportSelector;
use crate::transport::{BodyMode, ResponseBody, REQUEST_ID_HEADER};
use crate::unary::drain;
use crate::{BoxStream, Error, ErrorContext, Result};
use bytes::Bytes;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};
use uuid::Uuid;

pub const DEFAULT_STREAM_BUFFER: usize = 32;

/// Opens streaming requests and bridges their bodies into [`EventStream`]s.
#[derive(Clone)]
pub struct StreamBridge {
    selector: TransportSelector,
    decoder: LineDecoder,
    diagnostics: Diagnostics,
    buffer: usize,
}

impl StreamBridge {
    pub fn new(selector: TransportSelector) -> Self {
        Self {
            selector,
            decoder: LineDecoder::sse(),
            diagnostics: Diagnostics::default(),
            buffer: DEFAULT_STREAM_BUFFER,
        }
    }

    pub fn with_decoder(mut self, decoder: LineDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    /// Capacity of the handoff channel. A full channel pauses network reads.
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }

    pub(crate) fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn decoder(&self) -> &LineDecoder {
        &self.decoder
    }

    /// Send the request and return a live stream once the response head is in.
    ///
    /// Connection failures and non-success statuses are returned here; failures after
    /// that surface as the stream's last item. Body reads run on a spawned task.
    pub async fn open_stream<T>(&self, envelope: &RequestEnvelope) -> Result<EventStream<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let request_id = Uuid::new_v4().to_string();
        let mut request = envelope
            .clone()
            .header(REQUEST_ID_HEADER, request_id.as_str());
        let has_accept = envelope
            .header_map()
            .keys()
            .any(|k| k.eq_ignore_ascii_case("accept"));
        if self.decoder.prefix().is_some() && !has_accept {
            request = request.header("accept", "text/event-stream");
        }

        self.diagnostics.request(envelope);

        let transport = self.selector.transport();
        let start = Instant::now();
        let resp = match transport.send(&request, BodyMode::Streaming).await {
            Ok(resp) => resp,
            Err(e) => {
                info!(
                    url = envelope.readable_url(),
                    request_id = request_id.as_str(),
                    transport = transport.name(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    error = %e,
                    "streaming request failed"
                );
                return Err(e);
            }
        };

        if !resp.is_success() {
            let status = resp.status;
            // The body of a refused stream gets the same deadline the head had.
            let drained = tokio::time::timeout(envelope.timeout_duration(), drain(resp.body)).await;
            let body = match drained {
                Ok(Ok(body)) => body,
                Ok(Err(e)) => {
                    debug!(request_id = request_id.as_str(), error = %e, "error body unreadable");
                    Bytes::new()
                }
                Err(_) => {
                    debug!(request_id = request_id.as_str(), "error body timed out");
                    Bytes::new()
                }
            };
            self.diagnostics.response(&body);
            info!(
                url = envelope.readable_url(),
                request_id = request_id.as_str(),
                transport = transport.name(),
                http_status = status,
                "streaming request rejected"
            );
            return Err(Error::Remote {
                status,
                message: String::from_utf8_lossy(&body).into_owned(),
                context: ErrorContext::new()
                    .with_url(envelope.readable_url())
                    .with_request_id(request_id)
                    .with_source("stream_bridge"),
            });
        }

        debug!(
            url = envelope.readable_url(),
            request_id = request_id.as_str(),
            transport = transport.name(),
            http_status = resp.status,
            duration_ms = start.elapsed().as_millis() as u64,
            "stream opened"
        );

        let (tx, rx) = mpsc::channel(self.buffer);
        let token = CancellationToken::new();
        let stats = Arc::new(StreamStats::default());

        let producer = Producer {
            decoder: self.decoder.clone(),
            diagnostics: self.diagnostics.clone(),
            tx,
            token: token.clone(),
            stats: stats.clone(),
            request_id: request_id.clone(),
        };
        let source = LineSource::new(resp.body, self.decoder.prefix());
        tokio::spawn(producer.run(source));

        Ok(EventStream::new(rx, token, stats, request_id))
    }
}

/// The transport body as batches of complete lines.
enum LineSource {
    Chunks {
        body: BoxStream<'static, Bytes>,
        reframer: ChunkReframer,
        flushed: bool,
    },
    Lines(BoxStream<'static, String>),
}

impl LineSource {
    fn new(body: ResponseBody, delimiter: Option<&str>) -> Self {
        match body {
            ResponseBody::Chunks(body) => LineSource::Chunks {
                body,
                reframer: ChunkReframer::new(delimiter),
                flushed: false,
            },
            ResponseBody::Lines(lines) => LineSource::Lines(lines),
        }
    }

    /// Pull the next body item. `None` once the body is exhausted and flushed.
    async fn next_batch(
        &mut self,
        diagnostics: &Diagnostics,
        stats: &StreamStats,
    ) -> Option<Result<Vec<String>>> {
        match self {
            LineSource::Lines(lines) => {
                let line = lines.next().await?;
                stats.record_read();
                Some(line.map(|line| {
                    diagnostics.chunk(&line);
                    vec![line]
                }))
            }
            LineSource::Chunks {
                body,
                reframer,
                flushed,
            } => {
                if *flushed {
                    return None;
                }
                match body.next().await {
                    Some(Ok(chunk)) => {
                        stats.record_read();
                        diagnostics.chunk(&String::from_utf8_lossy(&chunk));
                        Some(Ok(reframer.push(&chunk)))
                    }
                    Some(Err(e)) => {
                        stats.record_read();
                        Some(Err(e))
                    }
                    None => {
                        *flushed = true;
                        Some(Ok(reframer.finish()))
                    }
                }
            }
        }
    }
}

struct Producer<T> {
    decoder: LineDecoder,
    diagnostics: Diagnostics,
    tx: mpsc::Sender<Message<T>>,
    token: CancellationToken,
    stats: Arc<StreamStats>,
    request_id: String,
}

impl<T> Producer<T>
where
    T: DeserializeOwned + Send + 'static,
{
    async fn run(self, mut source: LineSource) {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.token.cancelled() => return self.cancelled(),
                _ = self.tx.closed() => return self.cancelled(),
                next = source.next_batch(&self.diagnostics, &self.stats) => next,
            };

            match next {
                None => {
                    debug!(
                        request_id = self.request_id.as_str(),
                        reads = self.stats.reads(),
                        yielded = self.stats.yielded(),
                        skipped = self.stats.skipped(),
                        "stream finished"
                    );
                    self.forward(Message::Done).await;
                    return;
                }
                Some(Err(e)) => {
                    info!(
                        request_id = self.request_id.as_str(),
                        yielded = self.stats.yielded(),
                        error = %e,
                        "stream failed"
                    );
                    self.forward(Message::Failed(e)).await;
                    return;
                }
                Some(Ok(lines)) => {
                    for line in lines {
                        match self.decoder.decode::<T>(&line) {
                            LineOutcome::Event(value) => {
                                if !self.forward(Message::Item(value)).await {
                                    return self.cancelled();
                                }
                                self.stats.record_yield();
                            }
                            LineOutcome::Skip(reason) => self.skipped(&line, reason),
                        }
                    }
                }
            }
        }
    }

    /// Hand one message to the consumer. False once the consumer is gone.
    async fn forward(&self, msg: Message<T>) -> bool {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => false,
            sent = self.tx.send(msg) => sent.is_ok(),
        }
    }

    fn skipped(&self, line: &str, reason: SkipReason) {
        let total = self.stats.record_skip(&reason);
        match reason {
            SkipReason::Malformed(error) => debug!(
                request_id = self.request_id.as_str(),
                skipped = total,
                error = error.as_str(),
                line,
                "dropping undecodable stream line"
            ),
            other => trace!(
                request_id = self.request_id.as_str(),
                reason = other.as_str(),
                "skipping stream line"
            ),
        }
    }

    fn cancelled(&self) {
        debug!(
            request_id = self.request_id.as_str(),
            reads = self.stats.reads(),
            yielded = self.stats.yielded(),
            "stream cancelled by consumer"
        );
    }
}
