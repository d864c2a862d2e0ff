//! 诊断钩子：可选地观察原始请求与响应内容。
//!
//! Diagnostics hook.
//!
//! Executors hand raw request/response text to a [`DiagnosticsHook`] when the matching
//! [`ClientConfig`](crate::ClientConfig) flag is on. Hooks observe copies only; they
//! cannot alter or fail the request path, and they must not block.
//!
//! | Sink | Use |
//! |------|-----|
//! | [`TracingDiagnostics`] | default, emits `debug!` events |
//! | [`NoopDiagnostics`] | discard everything |
//! | [`InMemoryDiagnostics`] | capture for tests |

use std::sync::{Arc, Mutex};
use tracing::debug;

pub trait DiagnosticsHook: Send + Sync {
    /// Outgoing request URL and body text (`"None"` when there is no body).
    fn observe_request(&self, url: &str, body: &str);

    /// Fully buffered response body.
    fn observe_response(&self, payload: &str);

    /// One raw streaming chunk or line, before decoding.
    fn observe_stream_chunk(&self, chunk: &str) {
        let _ = chunk;
    }
}

pub struct NoopDiagnostics;

impl DiagnosticsHook for NoopDiagnostics {
    fn observe_request(&self, _url: &str, _body: &str) {}
    fn observe_response(&self, _payload: &str) {}
}

pub fn noop_hook() -> Arc<dyn DiagnosticsHook> {
    Arc::new(NoopDiagnostics)
}

pub struct TracingDiagnostics;

impl DiagnosticsHook for TracingDiagnostics {
    fn observe_request(&self, url: &str, body: &str) {
        debug!(url, body, "making a request");
    }

    fn observe_response(&self, payload: &str) {
        debug!(payload, "received response body");
    }

    fn observe_stream_chunk(&self, chunk: &str) {
        debug!(chunk, "received streaming response chunk");
    }
}

pub fn tracing_hook() -> Arc<dyn DiagnosticsHook> {
    Arc::new(TracingDiagnostics)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Request { url: String, body: String },
    Response(String),
    StreamChunk(String),
}

/// Captures observations in memory, keeping at most `max` entries.
pub struct InMemoryDiagnostics {
    entries: Mutex<Vec<Observation>>,
    max: usize,
}

impl InMemoryDiagnostics {
    pub fn new(max: usize) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            max: max.max(1),
        }
    }

    pub fn entries(&self) -> Vec<Observation> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, obs: Observation) {
        // A poisoned lock only drops the observation.
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(obs);
            if entries.len() > self.max {
                entries.remove(0);
            }
        }
    }
}

impl DiagnosticsHook for InMemoryDiagnostics {
    fn observe_request(&self, url: &str, body: &str) {
        self.push(Observation::Request {
            url: url.to_string(),
            body: body.to_string(),
        });
    }

    fn observe_response(&self, payload: &str) {
        self.push(Observation::Response(payload.to_string()));
    }

    fn observe_stream_chunk(&self, chunk: &str) {
        self.push(Observation::StreamChunk(chunk.to_string()));
    }
}

/// Hook plus the two switches that gate it.
#[derive(Clone)]
pub(crate) struct Diagnostics {
    pub(crate) hook: Arc<dyn DiagnosticsHook>,
    pub(crate) requests: bool,
    pub(crate) responses: bool,
}

impl Diagnostics {
    pub(crate) fn request(&self, envelope: &crate::RequestEnvelope) {
        if self.requests {
            self.hook
                .observe_request(envelope.readable_url(), &envelope.readable_body());
        }
    }

    pub(crate) fn response(&self, body: &[u8]) {
        if self.responses {
            self.hook.observe_response(&String::from_utf8_lossy(body));
        }
    }

    pub(crate) fn chunk(&self, chunk: &str) {
        if self.responses {
            self.hook.observe_stream_chunk(chunk);
        }
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            hook: noop_hook(),
            requests: false,
            responses: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_keeps_latest_entries() {
        let sink = InMemoryDiagnostics::new(2);
        sink.observe_response("a");
        sink.observe_response("b");
        sink.observe_stream_chunk("c");
        assert_eq!(
            sink.entries(),
            vec![
                Observation::Response("b".into()),
                Observation::StreamChunk("c".into())
            ]
        );
    }

    #[test]
    fn switches_gate_the_hook() {
        let sink = Arc::new(InMemoryDiagnostics::new(10));
        let diag = Diagnostics {
            hook: sink.clone(),
            requests: true,
            responses: false,
        };
        let env = crate::RequestEnvelope::post("https://example.com/x")
            .unwrap()
            .body("{}");
        diag.request(&env);
        diag.response(b"ignored");
        diag.chunk("ignored");
        assert_eq!(
            sink.entries(),
            vec![Observation::Request {
                url: "https://example.com/x".into(),
                body: "{}".into()
            }]
        );
    }
}
