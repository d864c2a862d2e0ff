//! OpenAI-compatible chat completion streaming chunk (Groq, OpenAI, DeepSeek ...).

use serde::{Deserialize, Serialize};

/// One `data: ` payload of a chat completion stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    /// More than one entry when `n > 1` was requested; empty on the trailing
    /// usage-only chunk.
    pub choices: Vec<Choice>,
}

impl ChatCompletionChunk {
    pub fn new(choices: Vec<Choice>) -> Self {
        Self { choices }
    }

    /// Concatenated delta content across choices.
    pub fn text(&self) -> String {
        self.choices
            .iter()
            .filter_map(|c| c.delta.content.as_deref())
            .collect()
    }

    /// Finish reason of the first choice that carries one.
    pub fn finish_reason(&self) -> Option<&str> {
        self.choices.iter().find_map(|c| c.finish_reason.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub delta: Delta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}
