use crate::client::core::ProxyClient;
use crate::config::ClientConfig;
use crate::decode::LineDecoder;
use crate::diagnostics::{Diagnostics, DiagnosticsHook};
use crate::selector::{TransportPreference, TransportSelector};
use crate::stream::StreamBridge;
use crate::transport::{ChunkedTransport, HttpTransport, Transport};
use crate::unary::UnaryExecutor;
use crate::Result;
use std::sync::Arc;

/// Builder for [`ProxyClient`].
///
/// Keep this surface area small and predictable.
pub struct ProxyClientBuilder {
    config: ClientConfig,
    preference: TransportPreference,
    default_transport: Option<Arc<dyn Transport>>,
    diagnostics: Arc<dyn DiagnosticsHook>,
    decoder: LineDecoder,
}

impl ProxyClientBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            preference: TransportPreference::Default,
            default_transport: None,
            diagnostics: crate::diagnostics::tracing_hook(),
            decoder: LineDecoder::sse(),
        }
    }

    /// Replace the whole configuration (e.g. with [`ClientConfig::from_env`]).
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Route every request of this client through `transport`.
    pub fn alternate_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.preference = TransportPreference::Alternate(transport);
        self
    }

    /// Route every request through a caller-owned `reqwest::Client`, reading bodies as
    /// raw chunks.
    pub fn http_client(self, client: reqwest::Client) -> Self {
        self.alternate_transport(Arc::new(ChunkedTransport::new(client)))
    }

    pub fn preference(mut self, preference: TransportPreference) -> Self {
        self.preference = preference;
        self
    }

    /// Replace the platform transport used when no alternate is set.
    ///
    /// Primarily for tests with scripted transports.
    pub fn default_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.default_transport = Some(transport);
        self
    }

    /// Inject a diagnostics hook. Default emits `tracing` debug events.
    pub fn diagnostics(mut self, hook: Arc<dyn DiagnosticsHook>) -> Self {
        self.diagnostics = hook;
        self
    }

    pub fn print_request_bodies(mut self, enable: bool) -> Self {
        self.config.print_request_bodies = enable;
        self
    }

    pub fn print_response_bodies(mut self, enable: bool) -> Self {
        self.config.print_response_bodies = enable;
        self
    }

    pub fn timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn stream_buffer(mut self, n: usize) -> Self {
        self.config.stream_buffer = n.max(1);
        self
    }

    /// Line format for streaming bodies. Default is `data: ` SSE framing.
    pub fn decoder(mut self, decoder: LineDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn build(self) -> Result<ProxyClient> {
        let default_transport = match self.default_transport {
            Some(t) => t,
            None => Arc::new(HttpTransport::new(&self.config)?) as Arc<dyn Transport>,
        };
        let selector = TransportSelector::new(self.preference, default_transport);

        let diagnostics = Diagnostics {
            hook: self.diagnostics,
            requests: self.config.print_request_bodies,
            responses: self.config.print_response_bodies,
        };

        let unary = UnaryExecutor::new(selector.clone()).with_diagnostics(diagnostics.clone());
        let bridge = StreamBridge::new(selector.clone())
            .with_decoder(self.decoder)
            .with_buffer(self.config.stream_buffer)
            .with_diagnostics(diagnostics);

        tracing::debug!(
            transport = selector.transport().name(),
            timeout_ms = self.config.timeout.as_millis() as u64,
            stream_buffer = self.config.stream_buffer,
            "proxy client built"
        );

        Ok(ProxyClient {
            config: self.config,
            selector,
            unary,
            bridge,
        })
    }
}

impl Default for ProxyClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
