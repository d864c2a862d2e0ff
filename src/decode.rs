//! Stateless line decoder.
//!
//! Turns one text line into either a typed value or a skip. Lines are self-contained:
//! the decoder keeps nothing between calls, so reassembling payloads that the wire split
//! is the job of the byte-source layer underneath it.

use serde::de::DeserializeOwned;
use std::fmt;

pub const DEFAULT_PREFIX: &str = "data: ";
pub const DEFAULT_DONE_SIGNAL: &str = "[DONE]";

/// Per-line event format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineFormat {
    /// `data: <json>` lines; other SSE fields, comments and the done sentinel are skipped.
    Sse { prefix: String, done_signal: String },
    /// One JSON document per line.
    Ndjson,
}

impl Default for LineFormat {
    fn default() -> Self {
        LineFormat::Sse {
            prefix: DEFAULT_PREFIX.to_string(),
            done_signal: DEFAULT_DONE_SIGNAL.to_string(),
        }
    }
}

/// Why a line produced no value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Empty after trimming.
    Blank,
    /// A bare prefix or a non-data SSE field (`event:`, `id:`, `retry:` ...).
    Framing,
    /// `: keepalive` style comment.
    Comment,
    /// End-of-stream sentinel such as `[DONE]`.
    Sentinel,
    /// Payload present but not valid for the target type.
    Malformed(String),
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Blank => "blank",
            SkipReason::Framing => "framing",
            SkipReason::Comment => "comment",
            SkipReason::Sentinel => "sentinel",
            SkipReason::Malformed(_) => "malformed",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Malformed(e) => write!(f, "malformed: {}", e),
            other => f.write_str(other.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome<T> {
    Event(T),
    Skip(SkipReason),
}

impl<T> LineOutcome<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            LineOutcome::Event(v) => Some(v),
            LineOutcome::Skip(_) => None,
        }
    }

    pub fn is_event(&self) -> bool {
        matches!(self, LineOutcome::Event(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineDecoder {
    format: LineFormat,
}

impl LineDecoder {
    pub fn new(format: LineFormat) -> Self {
        Self { format }
    }

    /// `data: ` framing with the `[DONE]` sentinel.
    pub fn sse() -> Self {
        Self::default()
    }

    pub fn ndjson() -> Self {
        Self::new(LineFormat::Ndjson)
    }

    pub fn format(&self) -> &LineFormat {
        &self.format
    }

    /// The event delimiter for formats that have one.
    pub fn prefix(&self) -> Option<&str> {
        match &self.format {
            LineFormat::Sse { prefix, .. } => Some(prefix),
            LineFormat::Ndjson => None,
        }
    }

    /// Decode one line, dropping the reason when it is skipped.
    pub fn decode_line<T: DeserializeOwned>(&self, line: &str) -> Option<T> {
        self.decode(line).into_option()
    }

    pub fn decode<T: DeserializeOwned>(&self, line: &str) -> LineOutcome<T> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return LineOutcome::Skip(SkipReason::Blank);
        }

        let payload = match &self.format {
            LineFormat::Ndjson => trimmed,
            LineFormat::Sse {
                prefix,
                done_signal,
            } => {
                if trimmed.starts_with(':') {
                    return LineOutcome::Skip(SkipReason::Comment);
                }
                let rest = if let Some(rest) = trimmed.strip_prefix(prefix.as_str()) {
                    rest
                } else if let Some(rest) = trimmed.strip_prefix(prefix.trim_end()) {
                    // The trimmed line loses the space of a bare "data: ".
                    rest
                } else {
                    return LineOutcome::Skip(SkipReason::Framing);
                };
                let rest = rest.trim();
                if rest.is_empty() {
                    return LineOutcome::Skip(SkipReason::Framing);
                }
                if rest == done_signal {
                    return LineOutcome::Skip(SkipReason::Sentinel);
                }
                rest
            }
        };

        match serde_json::from_str::<T>(payload) {
            Ok(v) => LineOutcome::Event(v),
            Err(e) => LineOutcome::Skip(SkipReason::Malformed(e.to_string())),
        }
    }
}
