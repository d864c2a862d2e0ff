//! # ai-proxy-transport
//!
//! Transport core for multi-provider AI API clients: executes outbound HTTP requests
//! and turns the raw responses into strongly typed values.
//!
//! ## Overview
//!
//! Two request shapes are supported:
//!
//! - **Unary**: one request, one fully-buffered body, decoded once into `T`
//!   ([`unary::UnaryExecutor`]).
//! - **Streaming**: one request, an open-ended sequence of `data: `-framed events decoded
//!   line by line into `T` ([`stream::StreamBridge`]).
//!
//! Both go through a [`transport::Transport`] chosen per client instance by the
//! [`selector::TransportSelector`]: the default platform transport, or a caller-supplied
//! alternate. Callers never see which backend produced a stream; the sequences are identical.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ai_proxy_transport::{ProxyClient, RequestEnvelope};
//! use ai_proxy_transport::types::ChatCompletionChunk;
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> ai_proxy_transport::Result<()> {
//!     let client = ProxyClient::builder().build()?;
//!
//!     let request = RequestEnvelope::post("https://api.groq.com/openai/v1/chat/completions")?
//!         .header("authorization", "Bearer <key>")
//!         .json_body(&serde_json::json!({"model": "llama3-8b-8192", "stream": true, "messages": []}))?;
//!
//!     let mut stream = client.open_stream::<ChatCompletionChunk>(request).await?;
//!     while let Some(chunk) = stream.next().await {
//!         print!("{}", chunk?.text());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Per-instance client and builder |
//! | [`transport`] | Transport interface and the two stock backends |
//! | [`selector`] | Transport preference resolution |
//! | [`unary`] | Buffered request execution |
//! | [`stream`] | Streaming bridge and chunk re-framing |
//! | [`decode`] | Stateless line decoder |
//! | [`diagnostics`] | Optional request/response observation hooks |
//! | [`config`] | Client configuration with env overrides |
//! | [`types`] | Streaming chunk schema |

pub mod client;
pub mod config;
pub mod decode;
pub mod diagnostics;
pub mod envelope;
pub mod selector;
pub mod stream;
pub mod transport;
pub mod types;
pub mod unary;

pub use client::{ProxyClient, ProxyClientBuilder};
pub use config::ClientConfig;
pub use decode::{LineDecoder, LineFormat, LineOutcome, SkipReason};
pub use envelope::RequestEnvelope;
pub use selector::{TransportKind, TransportPreference, TransportSelector};
pub use stream::{CancelHandle, EventStream, StreamBridge, StreamFailure, StreamState, StreamStats};
pub use transport::{BodyMode, ResponseBody, Transport, TransportError, TransportResponse};
pub use unary::UnaryExecutor;

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `Result<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
