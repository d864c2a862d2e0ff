use crate::config::ClientConfig;
use crate::decode::LineDecoder;
use crate::envelope::RequestEnvelope;
use crate::selector::{TransportKind, TransportSelector};
use crate::stream::{EventStream, StreamBridge};
use crate::unary::UnaryExecutor;
use crate::Result;
use serde::de::DeserializeOwned;

/// Client bound to one transport preference for its whole lifetime.
///
/// Cloning is cheap and clones share the same transports. Concurrent calls share
/// nothing mutable.
#[derive(Clone)]
pub struct ProxyClient {
    pub(crate) config: ClientConfig,
    pub(crate) selector: TransportSelector,
    pub(crate) unary: UnaryExecutor,
    pub(crate) bridge: StreamBridge,
}

impl ProxyClient {
    pub fn builder() -> crate::client::builder::ProxyClientBuilder {
        crate::client::builder::ProxyClientBuilder::new()
    }

    /// Client with default transport and configuration from the environment.
    pub fn new() -> Result<Self> {
        Self::builder().config(ClientConfig::from_env()).build()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Which backend serves this client's requests.
    pub fn transport_kind(&self) -> TransportKind {
        self.selector.resolve()
    }

    pub fn decoder(&self) -> &LineDecoder {
        self.bridge.decoder()
    }

    /// Envelope for `method url` carrying this client's default timeout.
    pub fn request(&self, method: reqwest::Method, url: &str) -> Result<RequestEnvelope> {
        Ok(RequestEnvelope::new(method, url)?.timeout(self.config.timeout))
    }

    /// Send a unary request and decode the whole body into `T`.
    pub async fn execute<T: DeserializeOwned>(&self, request: RequestEnvelope) -> Result<T> {
        self.unary.execute(&request).await
    }

    /// Send a streaming request and decode each event line into `T`.
    pub async fn open_stream<T>(&self, request: RequestEnvelope) -> Result<EventStream<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.bridge.open_stream(&request).await
    }
}

impl std::fmt::Debug for ProxyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyClient")
            .field("config", &self.config)
            .field("selector", &self.selector)
            .finish()
    }
}
