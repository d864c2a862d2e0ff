//! 流式桥接：后台读取网络响应并按顺序交付解码后的事件。
//!
//! # Stream Bridge
//!
//! Turns a transport's incremental body into a single pull-based [`EventStream<T>`].
//!
//! ```text
//!  Transport body ──► producer task ──► mpsc (bounded) ──► EventStream<T> ──► consumer
//!   Chunks → ChunkReframer ┐   │                              │
//!   Lines  ────────────────┴► LineDecoder                     └─ drop / cancel()
//!                              │                                   │
//!                              └──────── CancellationToken ◄───────┘
//! ```
//!
//! The producer forwards decoded values in wire order. Completion and failure are
//! distinct terminal messages on the channel. When the consumer drops the stream or
//! cancels it, the producer stops reading and drops the body, which releases the
//! connection.

mod bridge;
pub mod framing;

pub use bridge::StreamBridge;
pub use framing::ChunkReframer;

use crate::decode::SkipReason;
use crate::{Error, Result};
use futures::Stream;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Lifecycle of one stream as seen by its consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamState {
    Open,
    Finished,
    Failed(StreamFailure),
}

impl StreamState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamState::Open)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFailure {
    /// The consumer stopped the stream before natural completion.
    Cancelled,
    /// The source raised an error; the message of the error that was yielded.
    Error(String),
}

/// Counters shared between the producer task and the consumer.
#[derive(Debug, Default)]
pub struct StreamStats {
    reads: AtomicU64,
    yielded: AtomicU64,
    skipped: AtomicU64,
    malformed: AtomicU64,
}

impl StreamStats {
    /// Items (chunks or lines) pulled from the transport body.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Decoded values handed to the consumer.
    pub fn yielded(&self) -> u64 {
        self.yielded.load(Ordering::Relaxed)
    }

    /// Lines that produced no value, malformed ones included.
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Lines with a payload that failed to decode.
    pub fn malformed(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }

    pub(crate) fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_yield(&self) {
        self.yielded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skip(&self, reason: &SkipReason) -> u64 {
        if matches!(reason, SkipReason::Malformed(_)) {
            self.malformed.fetch_add(1, Ordering::Relaxed);
        }
        self.skipped.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Stops a stream from outside the consuming task.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Messages from the producer task. `Done` and `Failed` are terminal.
#[derive(Debug)]
pub(crate) enum Message<T> {
    Item(T),
    Done,
    Failed(Error),
}

/// Forward-only, single-pass sequence of decoded events.
///
/// Dropping it cancels the producer.
pub struct EventStream<T> {
    rx: mpsc::Receiver<Message<T>>,
    state: StreamState,
    token: CancellationToken,
    stats: Arc<StreamStats>,
    request_id: String,
}

// The stream is never pin-projected.
impl<T> Unpin for EventStream<T> {}

impl<T> EventStream<T> {
    pub(crate) fn new(
        rx: mpsc::Receiver<Message<T>>,
        token: CancellationToken,
        stats: Arc<StreamStats>,
        request_id: String,
    ) -> Self {
        Self {
            rx,
            state: StreamState::Open,
            token,
            stats,
            request_id,
        }
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    pub fn stats(&self) -> Arc<StreamStats> {
        self.stats.clone()
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            token: self.token.clone(),
        }
    }

    /// Stop the stream now. Further polls return `None`.
    pub fn cancel(&mut self) {
        if !self.state.is_terminal() {
            self.state = StreamState::Failed(StreamFailure::Cancelled);
        }
        self.token.cancel();
        self.rx.close();
    }

    /// Collect every remaining value, stopping at the first error.
    pub async fn try_collect_all(mut self) -> Result<Vec<T>> {
        use futures::StreamExt;
        let mut out = Vec::new();
        while let Some(item) = self.next().await {
            out.push(item?);
        }
        Ok(out)
    }
}

impl<T> Stream for EventStream<T> {
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.state.is_terminal() {
            return Poll::Ready(None);
        }

        match this.rx.poll_recv(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Message::Item(v))) => Poll::Ready(Some(Ok(v))),
            Poll::Ready(Some(Message::Done)) => {
                this.state = StreamState::Finished;
                Poll::Ready(None)
            }
            Poll::Ready(Some(Message::Failed(e))) => {
                this.state = StreamState::Failed(StreamFailure::Error(e.to_string()));
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                if this.token.is_cancelled() {
                    this.state = StreamState::Failed(StreamFailure::Cancelled);
                    Poll::Ready(None)
                } else {
                    // Producer went away without a terminal message.
                    let e = Error::Transport(crate::TransportError::Other(
                        "stream producer terminated unexpectedly".to_string(),
                    ));
                    this.state = StreamState::Failed(StreamFailure::Error(e.to_string()));
                    Poll::Ready(Some(Err(e)))
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.state.is_terminal() {
            (0, Some(0))
        } else {
            (0, None)
        }
    }
}

impl<T> Drop for EventStream<T> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl<T> std::fmt::Debug for EventStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("state", &self.state)
            .field("request_id", &self.request_id)
            .field("stats", &self.stats)
            .finish()
    }
}
