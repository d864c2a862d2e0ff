//! Per-instance client for the transport core.
//!
//! Keep the public surface small: build once, then `execute` or `open_stream`.
//! Implementation is split into submodules under `src/client/`.

pub mod builder;
pub mod core;

pub use builder::ProxyClientBuilder;
pub use core::ProxyClient;
