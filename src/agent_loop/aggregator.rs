//! Reassembles a turn from streamed fragments.
//!
//! Text is appended to one buffer in arrival order. Tool-call fragments are
//! grouped by slot index: the call id and name are sticky once seen and
//! argument pieces are concatenated verbatim. Only at turn end are the
//! buffers judged complete and parsed.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::tools::ToolArguments;
use crate::types::{AgentToolCall, ChatChunk, FinishReason};

/// What one fragment changed, in the order observers should hear about it.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkUpdate {
    Text(String),
    /// First fragment seen for a slot. `tool_name` is empty when the name
    /// has not arrived yet.
    ToolCallStarted {
        slot: u32,
        call_id: Option<String>,
        tool_name: String,
    },
}

#[derive(Debug, Clone, Default)]
struct SlotBuffer {
    id: String,
    name: String,
    arguments: String,
}

impl SlotBuffer {
    fn is_complete(&self) -> bool {
        !self.id.is_empty() && !self.name.is_empty() && !self.arguments.is_empty()
    }
}

/// A tool call whose id, name and arguments all arrived intact.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedCall {
    pub slot: u32,
    pub call_id: String,
    pub tool_name: String,
    pub arguments: ToolArguments,
    /// The concatenated argument fragments, unmodified.
    pub raw_arguments: String,
}

impl CompletedCall {
    pub fn to_agent_call(&self) -> AgentToolCall {
        AgentToolCall {
            id: self.call_id.clone(),
            name: self.tool_name.clone(),
            arguments: self.arguments.raw().clone(),
            raw_arguments: Some(self.raw_arguments.clone()),
        }
    }
}

/// Everything a finished turn produced.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledTurn {
    pub text: String,
    /// Dispatchable calls in slot order.
    pub tool_calls: Vec<CompletedCall>,
    pub finish_reason: FinishReason,
    /// Slots discarded at turn end (incomplete or unparseable).
    pub dropped: usize,
}

impl AssembledTurn {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Per-turn fragment aggregator.
#[derive(Debug, Default)]
pub struct ChunkAggregator {
    text: String,
    slots: BTreeMap<u32, SlotBuffer>,
    finish_reason: Option<String>,
}

impl ChunkAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one fragment in. Fragments without choices are skipped.
    pub fn push(&mut self, chunk: &ChatChunk) -> Vec<ChunkUpdate> {
        let Some(choice) = chunk.first_choice() else {
            warn!("received chunk with empty choices; skipping");
            return Vec::new();
        };

        let mut updates = Vec::new();

        if let Some(content) = choice.delta.content.as_deref().filter(|c| !c.is_empty()) {
            self.text.push_str(content);
            updates.push(ChunkUpdate::Text(content.to_string()));
        }

        for fragment in choice.delta.tool_calls.iter().flatten() {
            let name = fragment.function.as_ref().and_then(|f| f.name.as_deref());
            let id = fragment.id.as_deref().filter(|id| !id.is_empty());

            let is_new = !self.slots.contains_key(&fragment.index);
            let slot = self.slots.entry(fragment.index).or_default();
            if is_new {
                updates.push(ChunkUpdate::ToolCallStarted {
                    slot: fragment.index,
                    call_id: id.map(str::to_string),
                    tool_name: name.unwrap_or_default().to_string(),
                });
            }

            if let Some(id) = id {
                slot.id = id.to_string();
            }
            if let Some(name) = name.filter(|n| !n.is_empty()) {
                slot.name = name.to_string();
            }
            if let Some(arguments) = fragment.function.as_ref().and_then(|f| f.arguments.as_deref()) {
                slot.arguments.push_str(arguments);
            }
        }

        if let Some(reason) = &choice.finish_reason {
            self.finish_reason = Some(reason.clone());
        }

        updates
    }

    /// Text accumulated so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Close the turn: keep complete, well-formed calls and drop the rest.
    pub fn finish(self) -> AssembledTurn {
        let finish_reason = match self.finish_reason.as_deref() {
            Some(raw) => FinishReason::parse(raw).unwrap_or_else(|| {
                debug!(finish_reason = raw, "unrecognized finish reason; treating as stop");
                FinishReason::Stop
            }),
            None => {
                warn!("stream ended without a finish reason; treating as stop");
                FinishReason::Stop
            }
        };

        let mut tool_calls = Vec::new();
        let mut dropped = 0;
        for (slot, buffer) in self.slots {
            if !buffer.is_complete() {
                debug!(slot, id = %buffer.id, name = %buffer.name, "dropping incomplete tool call");
                dropped += 1;
                continue;
            }
            match ToolArguments::parse(&buffer.arguments) {
                Ok(arguments) => tool_calls.push(CompletedCall {
                    slot,
                    call_id: buffer.id,
                    tool_name: buffer.name,
                    arguments,
                    raw_arguments: buffer.arguments,
                }),
                Err(e) => {
                    warn!(slot, tool_name = %buffer.name, error = %e, "dropping tool call with malformed arguments");
                    dropped += 1;
                }
            }
        }

        AssembledTurn {
            text: self.text,
            tool_calls,
            finish_reason,
            dropped,
        }
    }
}
