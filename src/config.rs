//! Per-client configuration.
//!
//! Every knob has a code default and an optional environment override. Nothing here is
//! process-global: each [`ProxyClient`](crate::ProxyClient) owns its own copy.

use std::env;
use std::time::Duration;

/// Configuration owned by one client instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Timeout applied by the default transport and to envelopes built by the client.
    pub timeout: Duration,
    /// Hand outgoing request URL + body to the diagnostics hook.
    pub print_request_bodies: bool,
    /// Hand buffered response bodies and streaming chunks to the diagnostics hook.
    pub print_response_bodies: bool,
    /// Capacity of the producer/consumer handoff channel of each stream.
    pub stream_buffer: usize,
    /// Optional proxy for the default transport.
    pub proxy_url: Option<String>,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            print_request_bodies: false,
            print_response_bodies: false,
            stream_buffer: 32,
            proxy_url: None,
            pool_max_idle_per_host: 32,
            pool_idle_timeout: Duration::from_secs(90),
        }
    }
}

impl ClientConfig {
    /// Defaults overlaid with environment overrides:
    ///
    /// - `AI_HTTP_TIMEOUT_SECS` (default 30)
    /// - `AI_PROXY_PRINT_REQUEST_BODIES` / `AI_PROXY_PRINT_RESPONSE_BODIES` (`1`/`true`)
    /// - `AI_PROXY_STREAM_BUFFER` (default 32)
    /// - `AI_PROXY_URL`
    /// - `AI_HTTP_POOL_MAX_IDLE_PER_HOST` (default 32)
    /// - `AI_HTTP_POOL_IDLE_TIMEOUT_SECS` (default 90)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse_u64 = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());
        let parse_usize = |key: &str| lookup(key).and_then(|s| s.trim().parse::<usize>().ok());
        let flag = |key: &str| {
            lookup(key)
                .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false)
        };

        Self {
            timeout: parse_u64("AI_HTTP_TIMEOUT_SECS")
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            print_request_bodies: flag("AI_PROXY_PRINT_REQUEST_BODIES"),
            print_response_bodies: flag("AI_PROXY_PRINT_RESPONSE_BODIES"),
            stream_buffer: parse_usize("AI_PROXY_STREAM_BUFFER")
                .map(|n| n.max(1))
                .unwrap_or(defaults.stream_buffer),
            proxy_url: lookup("AI_PROXY_URL").filter(|s| !s.trim().is_empty()),
            pool_max_idle_per_host: parse_usize("AI_HTTP_POOL_MAX_IDLE_PER_HOST")
                .unwrap_or(defaults.pool_max_idle_per_host),
            pool_idle_timeout: parse_u64("AI_HTTP_POOL_IDLE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.pool_idle_timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        assert_eq!(ClientConfig::from_lookup(|_| None), ClientConfig::default());
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = ClientConfig::from_lookup(lookup_from(&[
            ("AI_HTTP_TIMEOUT_SECS", "5"),
            ("AI_PROXY_PRINT_REQUEST_BODIES", "true"),
            ("AI_PROXY_PRINT_RESPONSE_BODIES", "1"),
            ("AI_PROXY_STREAM_BUFFER", "0"),
            ("AI_PROXY_URL", "http://127.0.0.1:8080"),
        ]));
        assert_eq!(cfg.timeout, Duration::from_secs(5));
        assert!(cfg.print_request_bodies);
        assert!(cfg.print_response_bodies);
        assert_eq!(cfg.stream_buffer, 1);
        assert_eq!(cfg.proxy_url.as_deref(), Some("http://127.0.0.1:8080"));
    }

    #[test]
    fn malformed_values_are_ignored() {
        let cfg = ClientConfig::from_lookup(lookup_from(&[
            ("AI_HTTP_TIMEOUT_SECS", "soon"),
            ("AI_PROXY_PRINT_REQUEST_BODIES", "maybe"),
        ]));
        assert_eq!(cfg.timeout, Duration::from_secs(30));
        assert!(!cfg.print_request_bodies);
    }
}
