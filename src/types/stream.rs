//! Streaming chunk types.
//!
//! A [`ChatChunk`] mirrors one `chat.completion.chunk` from an
//! OpenAI-compatible endpoint. Tool-call fragments are keyed by a small slot
//! `index`; the provider call id and function name usually appear only on the
//! first fragment of a slot.

use serde::{Deserialize, Serialize};

/// One streamed fragment of a completion.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<ChunkUsage>,
}

/// A choice inside a chunk. Only the first choice is consumed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChunkChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Incremental content of a choice.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChunkDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallFragment>>,
}

/// A piece of one tool call, addressed by slot index.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolCallFragment {
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionFragment>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FunctionFragment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChunkUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

impl ChatChunk {
    fn with_delta(delta: ChunkDelta, finish_reason: Option<String>) -> Self {
        Self {
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason,
            }],
            usage: None,
        }
    }

    /// A chunk carrying a text fragment.
    pub fn text(content: impl Into<String>) -> Self {
        Self::with_delta(
            ChunkDelta {
                content: Some(content.into()),
                ..Default::default()
            },
            None,
        )
    }

    /// A chunk carrying one tool-call fragment.
    pub fn tool_call(
        index: u32,
        id: Option<&str>,
        name: Option<&str>,
        arguments: Option<&str>,
    ) -> Self {
        Self::with_delta(
            ChunkDelta {
                tool_calls: Some(vec![ToolCallFragment {
                    index,
                    id: id.map(str::to_string),
                    function: Some(FunctionFragment {
                        name: name.map(str::to_string),
                        arguments: arguments.map(str::to_string),
                    }),
                }]),
                ..Default::default()
            },
            None,
        )
    }

    /// A terminal chunk carrying only a finish reason.
    pub fn finish(reason: impl Into<String>) -> Self {
        Self::with_delta(ChunkDelta::default(), Some(reason.into()))
    }

    /// A chunk with no choices (usage-only or keep-alive frames).
    pub fn empty() -> Self {
        Self::default()
    }

    /// The first choice, if the chunk has one.
    pub fn first_choice(&self) -> Option<&ChunkChoice> {
        self.choices.first()
    }
}
