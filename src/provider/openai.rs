//! OpenAI-compatible Chat Completions provider (streaming).

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::types::*;

use super::http::{bearer_headers, build_client, parse_sse_line, status_to_error, SseLine};
use super::{ChatProvider, ChatRequest, ChunkStream};

pub struct OpenAiProvider {
    model: String,
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(
        model: impl Into<String>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            model: model.into(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Build a provider from engine configuration. Requires an API key.
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let api_key = config.require_api_key()?;
        Ok(Self::new(
            config.model.clone(),
            api_key,
            config.base_url.clone(),
            build_client(config)?,
        ))
    }

    fn build_request_body(&self, request: &ChatRequest) -> Value {
        let messages = request
            .messages
            .iter()
            .map(message_to_openai)
            .collect::<Vec<_>>();

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
        });

        if let Some(obj) = body.as_object_mut() {
            if let Some(max) = request.settings.max_tokens {
                obj.insert("max_tokens".into(), max.into());
            }
            if let Some(temp) = request.settings.temperature {
                obj.insert("temperature".into(), temp.into());
            }
            if !request.tools.is_empty() {
                let tool_defs: Vec<Value> = request
                    .tools
                    .iter()
                    .map(|t| {
                        serde_json::json!({
                            "type": "function",
                            "function": {
                                "name": t.name,
                                "description": t.description,
                                "parameters": t.parameters,
                            }
                        })
                    })
                    .collect();
                obj.insert("tools".into(), tool_defs.into());
                let choice = request.settings.tool_choice.as_deref().unwrap_or("auto");
                obj.insert("tool_choice".into(), choice.into());
            }
        }

        body
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn stream_chat(&self, request: &ChatRequest) -> Result<ChunkStream, EngineError> {
        let body = self.build_request_body(request);
        let url = format!("{}/chat/completions", self.base_url);

        debug!(
            model = %self.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "OpenAI stream_chat"
        );

        let resp = self
            .client
            .post(&url)
            .headers(bearer_headers(&self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let byte_stream = resp.bytes_stream();

        let stream = async_stream::stream! {
            // Bytes, not text: a multi-byte character may straddle two network reads.
            let mut buffer: Vec<u8> = Vec::new();
            futures::pin_mut!(byte_stream);

            'read: loop {
                let chunk = match byte_stream.next().await {
                    Some(Ok(c)) => c,
                    Some(Err(e)) => {
                        yield Err(EngineError::Network(e));
                        break 'read;
                    }
                    None => {
                        if !buffer.is_empty() {
                            let line = String::from_utf8_lossy(&buffer).trim().to_string();
                            buffer.clear();
                            if let SseLine::Data(data) = parse_sse_line(&line) {
                                if let Some(chunk) = decode_chunk(data) {
                                    yield Ok(chunk);
                                }
                            }
                        }
                        break 'read;
                    }
                };

                buffer.extend_from_slice(&chunk);

                while let Some(line_end) = buffer.iter().position(|b| *b == b'\n') {
                    let raw: Vec<u8> = buffer.drain(..=line_end).collect();
                    let line = String::from_utf8_lossy(&raw).trim().to_string();

                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }

                    match parse_sse_line(&line) {
                        SseLine::Done => break 'read,
                        SseLine::Data(data) => {
                            if let Some(chunk) = decode_chunk(data) {
                                yield Ok(chunk);
                            }
                        }
                        SseLine::Ignored => {}
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

fn decode_chunk(data: &str) -> Option<ChatChunk> {
    match serde_json::from_str::<ChatChunk>(data) {
        Ok(chunk) => Some(chunk),
        Err(e) => {
            debug!(error = %e, data = %data, "skipping unparseable SSE chunk");
            None
        }
    }
}

fn tool_result_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn message_to_openai(msg: &ModelMessage) -> Value {
    if let Some(tr) = msg.tool_result_part() {
        return serde_json::json!({
            "role": "tool",
            "tool_call_id": tr.tool_call_id,
            "content": tool_result_to_string(&tr.result),
        });
    }

    let role = msg.role.to_string();
    let text = msg.text();
    let tool_calls = msg.tool_calls();
    if !tool_calls.is_empty() {
        let tc_json: Vec<Value> = tool_calls
            .iter()
            .map(|tc| {
                serde_json::json!({
                    "id": tc.id,
                    "type": "function",
                    "function": {
                        "name": tc.name,
                        "arguments": tc
                            .raw_arguments
                            .clone()
                            .unwrap_or_else(|| tc.arguments.to_string()),
                    }
                })
            })
            .collect();
        return serde_json::json!({
            "role": role,
            "content": if text.is_empty() { Value::Null } else { Value::String(text) },
            "tool_calls": tc_json,
        });
    }

    serde_json::json!({ "role": role, "content": text })
}
