//! Re-framing of raw byte chunks into event lines.
//!
//! Chunk boundaries are arbitrary: one chunk may hold several events, half an event, or
//! half of a multi-byte character. The reframer holds back at most the current incomplete
//! line (plus any trailing partial UTF-8 sequence) and emits everything else in arrival
//! order:
//!
//! - a line that starts with the event delimiter (`data: `) opens an event;
//! - further along such a line the delimiter opens another event only when the payload
//!   before it is already a complete JSON value, which separates events glued together
//!   without a newline but leaves `data: ` inside a string alone;
//! - each payload is trimmed and re-prefixed with the delimiter;
//! - other lines (`event:`, `: keepalive`, ...) are passed through trimmed, so the line
//!   decoder classifies them exactly as it would for a line-split body;
//! - empty fragments are dropped.

use serde::de::IgnoredAny;

/// Incremental chunk-to-line reframer. One instance per stream.
#[derive(Debug, Clone)]
pub struct ChunkReframer {
    delimiter: Option<String>,
    pending: Vec<u8>,
    carry: String,
}

impl ChunkReframer {
    /// Reframe around `delimiter`, or split on newlines only when `None`.
    pub fn new(delimiter: Option<&str>) -> Self {
        Self {
            delimiter: delimiter.filter(|d| !d.is_empty()).map(str::to_string),
            pending: Vec::new(),
            carry: String::new(),
        }
    }

    /// Feed one chunk; returns the lines it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.decode_utf8(chunk);
        let complete = self.complete_len();
        if complete == 0 {
            return Vec::new();
        }
        let rest = self.carry.split_off(complete);
        let region = std::mem::replace(&mut self.carry, rest);
        self.reframe(&region)
    }

    /// Flush whatever is held at end of stream.
    pub fn finish(&mut self) -> Vec<String> {
        if !self.pending.is_empty() {
            let tail = String::from_utf8_lossy(&self.pending).into_owned();
            self.carry.push_str(&tail);
            self.pending.clear();
        }
        let region = std::mem::take(&mut self.carry);
        self.reframe(&region)
    }

    /// Bytes of text currently held back.
    pub fn buffered(&self) -> usize {
        self.carry.len() + self.pending.len()
    }

    fn decode_utf8(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    self.carry.push_str(text);
                    self.pending.clear();
                    return;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    self.carry
                        .push_str(std::str::from_utf8(&self.pending[..valid]).unwrap_or_default());
                    match e.error_len() {
                        Some(bad) => {
                            self.carry.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                        // Incomplete sequence at the end: wait for the next chunk.
                        None => {
                            self.pending.drain(..valid);
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Length of the prefix of `carry` that can be emitted now.
    fn complete_len(&self) -> usize {
        let line_end = self.carry.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let Some(delimiter) = &self.delimiter else {
            return line_end;
        };
        // Within the open line, anything before the last event start is already complete.
        match event_starts(&self.carry[line_end..], delimiter).last() {
            Some(&i) if i > 0 => line_end + i,
            _ => line_end,
        }
    }

    fn reframe(&self, region: &str) -> Vec<String> {
        let mut out = Vec::new();
        let delimiter = self.delimiter.as_deref().unwrap_or_default();
        for line in region.lines() {
            let starts = match &self.delimiter {
                Some(d) => event_starts(line, d),
                None => Vec::new(),
            };
            if starts.is_empty() {
                let line = line.trim();
                if !line.is_empty() {
                    out.push(line.to_string());
                }
                continue;
            }
            for (i, &start) in starts.iter().enumerate() {
                let end = starts.get(i + 1).copied().unwrap_or(line.len());
                let payload = line[start + delimiter.len()..end].trim();
                if !payload.is_empty() {
                    out.push(format!("{}{}", delimiter, payload));
                }
            }
        }
        out
    }
}

/// Byte offsets in `line` where an event starts.
fn event_starts(line: &str, delimiter: &str) -> Vec<usize> {
    let first = line.len() - line.trim_start().len();
    if !line[first..].starts_with(delimiter) {
        return Vec::new();
    }

    let mut starts = vec![first];
    let mut payload_from = first + delimiter.len();
    let mut search = payload_from;
    while let Some(rel) = line[search..].find(delimiter) {
        let at = search + rel;
        if is_complete_payload(&line[payload_from..at]) {
            starts.push(at);
            payload_from = at + delimiter.len();
        }
        search = at + delimiter.len();
    }
    starts
}

fn is_complete_payload(text: &str) -> bool {
    let text = text.trim();
    text.is_empty() || serde_json::from_str::<IgnoredAny>(text).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sse() -> ChunkReframer {
        ChunkReframer::new(Some("data: "))
    }

    #[test]
    fn whole_events_in_one_chunk() {
        let mut r = sse();
        let lines = r.push(b"data: {\"a\":1}\n\ndata: {\"a\":2}\n\n");
        assert_eq!(lines, vec!["data: {\"a\":1}", "data: {\"a\":2}"]);
        assert_eq!(r.buffered(), 0);
    }

    #[test]
    fn payload_split_across_chunks_is_reassembled() {
        let mut r = sse();
        assert!(r.push(b"data: {\"choi").is_empty());
        assert!(r.push(b"ces\":[]").is_empty());
        assert_eq!(r.push(b"}\n\n"), vec!["data: {\"choices\":[]}"]);
    }

    #[test]
    fn delimiter_split_across_chunks() {
        let mut r = sse();
        assert_eq!(r.push(b"data: {\"a\":1}\n\nda"), vec!["data: {\"a\":1}"]);
        assert_eq!(r.push(b"ta: {\"a\":2}\n\n"), vec!["data: {\"a\":2}"]);
    }

    #[test]
    fn events_without_newlines_between_them() {
        let mut r = sse();
        assert_eq!(r.push(b"data: {\"a\":1}data: {\"a\":2}"), vec!["data: {\"a\":1}"]);
        assert_eq!(r.finish(), vec!["data: {\"a\":2}"]);
    }

    #[test]
    fn non_data_lines_pass_through() {
        let mut r = sse();
        let lines = r.push(b": ping\n\nevent: delta\ndata: {\"a\":1}\r\n\r\n");
        assert_eq!(lines, vec![": ping", "event: delta", "data: {\"a\":1}"]);
    }

    #[test]
    fn bare_delimiter_is_dropped() {
        let mut r = sse();
        assert!(r.push(b"data: \n\n").is_empty());
        assert_eq!(r.push(b"data: [DONE]\n\n"), vec!["data: [DONE]"]);
    }

    #[test]
    fn multibyte_character_split_across_chunks() {
        let mut r = sse();
        let text = "data: {\"c\":\"héllo\"}\n\n".as_bytes();
        let cut = text.iter().position(|b| *b == 0xC3).unwrap() + 1;
        assert!(r.push(&text[..cut]).is_empty());
        assert_eq!(r.push(&text[cut..]), vec!["data: {\"c\":\"héllo\"}"]);
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let mut r = sse();
        let lines = r.push(b"data: {\"c\":\"\xff\"}\n");
        assert_eq!(lines, vec!["data: {\"c\":\"\u{FFFD}\"}"]);
    }

    #[test]
    fn delimiter_inside_a_string_is_not_a_boundary() {
        let mut r = sse();
        let event = r#"data: {"choices":[{"delta":{"content":"see data: here"}}]}"#;
        assert_eq!(r.push(format!("{}\n\n", event).as_bytes()), vec![event]);
    }

    #[test]
    fn delimiter_inside_a_string_split_across_chunks() {
        let mut r = sse();
        assert!(r.push(br#"data: {"c":"a data: "#).is_empty());
        assert_eq!(r.push(br#"b"}data: {"c":"#), vec![r#"data: {"c":"a data: b"}"#]);
        assert_eq!(r.finish(), vec![r#"data: {"c":"#]);
    }

    #[test]
    fn delimiter_mid_line_of_non_data_line_is_kept() {
        let mut r = sse();
        assert_eq!(r.push(b"event: data: x\n"), vec!["event: data: x"]);
    }

    #[test]
    fn newline_only_mode() {
        let mut r = ChunkReframer::new(None);
        assert_eq!(r.push(b"{\"n\":1}\n{\"n\""), vec!["{\"n\":1}"]);
        assert_eq!(r.push(b":2}\n"), vec!["{\"n\":2}"]);
        assert!(r.finish().is_empty());
    }
}
