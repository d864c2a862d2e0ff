//! Scripted transports for driving the executors without a network.

#![allow(dead_code)]

use ai_proxy_transport::{
    BodyMode, BoxStream, Error, RequestEnvelope, ResponseBody, Transport, TransportError,
    TransportResponse,
};
use bytes::Bytes;
use futures::StreamExt;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::Poll;

/// Observes what happened to a scripted body after it was handed out.
#[derive(Clone, Default)]
pub struct BodyWatch {
    reads: Arc<AtomicUsize>,
    dropped: Arc<AtomicBool>,
}

impl BodyWatch {
    /// Times the body stream was polled.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Whether the body stream has been dropped.
    pub fn dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Wrap a generator into a body stream that reports polls and drop to `watch`.
fn watched<I, F>(watch: &BodyWatch, mut next: F) -> BoxStream<'static, I>
where
    I: Send + 'static,
    F: FnMut(usize) -> Option<Result<I, Error>> + Send + 'static,
{
    let reads = watch.reads.clone();
    let flag = DropFlag(watch.dropped.clone());
    Box::pin(futures::stream::poll_fn(move |_cx| {
        let _alive = &flag;
        let n = reads.fetch_add(1, Ordering::SeqCst);
        Poll::Ready(next(n))
    }))
}

#[derive(Clone)]
pub enum Script {
    Chunks(Vec<Result<Vec<u8>, String>>),
    Lines(Vec<Result<String, String>>),
    /// Never ends: chunk `n` is produced by the function.
    EndlessChunks(fn(usize) -> Vec<u8>),
    EndlessLines(fn(usize) -> String),
    /// Delivers the lines, then never completes.
    Stalled(Vec<String>),
}

fn body_error(msg: &str) -> Error {
    Error::Transport(TransportError::Other(msg.to_string()))
}

/// A transport that answers every request with the same scripted response.
pub struct ScriptedTransport {
    name: String,
    status: u16,
    script: Script,
    connect_error: Option<String>,
    watch: BodyWatch,
    sends: AtomicUsize,
    last: Mutex<Option<(RequestEnvelope, BodyMode)>>,
}

impl ScriptedTransport {
    pub fn new(script: Script) -> Self {
        Self {
            name: "scripted".to_string(),
            status: 200,
            script,
            connect_error: None,
            watch: BodyWatch::default(),
            sends: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    pub fn chunks(chunks: &[&str]) -> Self {
        Self::new(Script::Chunks(
            chunks.iter().map(|c| Ok(c.as_bytes().to_vec())).collect(),
        ))
    }

    pub fn lines(lines: &[&str]) -> Self {
        Self::new(Script::Lines(
            lines.iter().map(|l| Ok(l.to_string())).collect(),
        ))
    }

    /// Fails every send before a response head exists.
    pub fn unreachable(msg: &str) -> Self {
        let mut t = Self::new(Script::Lines(Vec::new()));
        t.connect_error = Some(msg.to_string());
        t
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn watch(&self) -> BodyWatch {
        self.watch.clone()
    }

    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<(RequestEnvelope, BodyMode)> {
        self.last.lock().ok().and_then(|l| l.clone())
    }

    fn body(&self) -> ResponseBody {
        match self.script.clone() {
            Script::Chunks(items) => {
                let mut items: VecDeque<_> = items.into();
                ResponseBody::Chunks(watched(&self.watch, move |_| {
                    items
                        .pop_front()
                        .map(|item| item.map(Bytes::from).map_err(|e| body_error(&e)))
                }))
            }
            Script::Lines(items) => {
                let mut items: VecDeque<_> = items.into();
                ResponseBody::Lines(watched(&self.watch, move |_| {
                    items
                        .pop_front()
                        .map(|item| item.map_err(|e| body_error(&e)))
                }))
            }
            Script::EndlessChunks(gen) => {
                ResponseBody::Chunks(watched(&self.watch, move |n| Some(Ok(Bytes::from(gen(n))))))
            }
            Script::EndlessLines(gen) => {
                ResponseBody::Lines(watched(&self.watch, move |n| Some(Ok(gen(n)))))
            }
            Script::Stalled(lines) => ResponseBody::Lines(Box::pin(
                futures::stream::iter(lines.into_iter().map(Ok)).chain(futures::stream::pending()),
            )),
        }
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(
        &self,
        request: &RequestEnvelope,
        mode: BodyMode,
    ) -> ai_proxy_transport::Result<TransportResponse> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last.lock() {
            *last = Some((request.clone(), mode));
        }
        if let Some(msg) = &self.connect_error {
            return Err(body_error(msg));
        }
        Ok(TransportResponse {
            status: self.status,
            headers: HashMap::new(),
            body: self.body(),
        })
    }
}

/// Split `text` into chunks of at most `size` bytes, ignoring UTF-8 boundaries.
pub fn split_bytes(text: &str, size: usize) -> Vec<Result<Vec<u8>, String>> {
    text.as_bytes()
        .chunks(size.max(1))
        .map(|c| Ok(c.to_vec()))
        .collect()
}

/// The same body as the platform line transport would deliver it.
pub fn split_lines(text: &str) -> Vec<Result<String, String>> {
    text.lines().map(|l| Ok(l.to_string())).collect()
}

pub fn envelope() -> RequestEnvelope {
    RequestEnvelope::post("https://api.example.com/v1/chat/completions")
        .expect("valid url")
        .header("authorization", "Bearer test-key")
        .body(r#"{"model":"m","stream":true}"#)
}
