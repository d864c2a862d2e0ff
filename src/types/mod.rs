//! 类型模块：流式解码所需的响应结构。
//!
//! # Types Module
//!
//! Only the response shapes the transport core decodes itself live here. Provider
//! crates bring their own schema types; anything implementing `serde::Deserialize`
//! works with [`ProxyClient::execute`](crate::ProxyClient::execute) and
//! [`ProxyClient::open_stream`](crate::ProxyClient::open_stream).
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ChatCompletionChunk`] | One OpenAI-compatible streaming chunk |
//! | [`Choice`] | One candidate within a chunk |
//! | [`Delta`] | Incremental role/content update |

pub mod chunk;

pub use chunk::{ChatCompletionChunk, Choice, Delta};
