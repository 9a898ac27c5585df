//! Shared test helpers: scripted provider, canned tools, failing store.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use deckhand::agent_loop::{ConversationDriver, RunId};
use deckhand::config::EngineConfig;
use deckhand::error::{EngineError, Result};
use deckhand::provider::{ChatProvider, ChatRequest, ChunkStream};
use deckhand::relay::{ControlSubscriber, Event, InMemoryBroker, Subscription};
use deckhand::store::{
    ConversationStore, InMemoryStore, InvocationId, MessageId, StoredMessage, ToolInvocationUpdate,
};
use deckhand::tools::{AgentTool, AgentToolParameters, Tool, ToolRegistry};
use deckhand::types::{ChatChunk, Role};

/// One step of a scripted completion stream.
#[derive(Clone)]
pub enum Step {
    Chunk(ChatChunk),
    /// Yield a transport error and end the stream.
    Fail(String),
    /// Yield a fragment that failed to decode; the stream goes on.
    Undecodable,
    /// Run a side effect when the driver pulls this position.
    Call(Arc<dyn Fn() + Send + Sync>),
    /// Stall before the next step.
    Sleep(Duration),
}

/// A scripted turn: either a stream of steps or a failure to open.
#[derive(Clone)]
pub enum Script {
    Stream(Vec<Step>),
    OpenError(String),
}

/// Provider that replays queued scripts, one per streaming call.
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_turn(self, steps: Vec<Step>) -> Self {
        self.scripts.lock().unwrap().push_back(Script::Stream(steps));
        self
    }

    pub fn with_chunks(self, chunks: Vec<ChatChunk>) -> Self {
        self.with_turn(chunks.into_iter().map(Step::Chunk).collect())
    }

    pub fn with_open_error(self, message: &str) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .push_back(Script::OpenError(message.to_string()));
        self
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_id(&self) -> &str {
        "scripted-model"
    }

    async fn stream_chat(&self, request: &ChatRequest) -> Result<ChunkStream> {
        self.requests.lock().unwrap().push(request.clone());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| EngineError::Stream("no scripted turn left".into()))?;

        let steps = match script {
            Script::OpenError(message) => return Err(EngineError::api(500, message)),
            Script::Stream(steps) => steps,
        };

        let stream = async_stream::stream! {
            for step in steps {
                match step {
                    Step::Chunk(chunk) => yield Ok(chunk),
                    Step::Fail(message) => {
                        yield Err(EngineError::Stream(message));
                        break;
                    }
                    Step::Undecodable => {
                        let err = serde_json::from_str::<serde_json::Value>("{\"choices\":")
                            .err()
                            .map(EngineError::Serialization);
                        if let Some(err) = err {
                            yield Err(err);
                        }
                    }
                    Step::Call(effect) => effect(),
                    Step::Sleep(duration) => tokio::time::sleep(duration).await,
                }
            }
        };
        Ok(Box::pin(stream))
    }
}

/// Plain text turn ending with `stop`.
pub fn text_turn(parts: &[&str]) -> Vec<ChatChunk> {
    let mut chunks: Vec<ChatChunk> = parts.iter().map(|p| ChatChunk::text(*p)).collect();
    chunks.push(ChatChunk::finish("stop"));
    chunks
}

/// A complete single-fragment tool call.
pub fn tool_call_chunk(slot: u32, id: &str, name: &str, arguments: &str) -> ChatChunk {
    ChatChunk::tool_call(slot, Some(id), Some(name), Some(arguments))
}

/// Tool that records its arguments and returns `{"ok": true, "tool": name}`.
pub fn recording_tool(name: &str, log: Arc<Mutex<Vec<serde_json::Value>>>) -> Arc<dyn Tool> {
    let tool_name = name.to_string();
    Arc::new(AgentTool::new(
        name,
        format!("records calls to {name}"),
        AgentToolParameters::empty(),
        move |args, _ctx| {
            let log = Arc::clone(&log);
            let tool_name = tool_name.clone();
            async move {
                log.lock().unwrap().push(args.raw().clone());
                Ok(serde_json::json!({ "ok": true, "tool": tool_name }))
            }
        },
    ))
}

/// Tool whose handler always fails with `message`.
pub fn failing_tool(name: &str, message: &str) -> Arc<dyn Tool> {
    let tool_name = name.to_string();
    let message = message.to_string();
    Arc::new(AgentTool::new(
        name,
        "always fails",
        AgentToolParameters::empty(),
        move |_args, _ctx| {
            let err = EngineError::tool(tool_name.clone(), message.clone());
            async move { Err(err) }
        },
    ))
}

/// Store whose every operation fails.
pub struct FailingStore;

#[async_trait]
impl ConversationStore for FailingStore {
    async fn append_message(&self, _chat_id: &str, _role: Role, _content: &str) -> Result<MessageId> {
        Err(EngineError::Persistence("database unavailable".into()))
    }

    async fn upsert_tool_invocation(
        &self,
        _chat_id: &str,
        _update: ToolInvocationUpdate,
    ) -> Result<InvocationId> {
        Err(EngineError::Persistence("database unavailable".into()))
    }

    async fn read_history(&self, _chat_id: &str) -> Result<Vec<StoredMessage>> {
        Err(EngineError::Persistence("database unavailable".into()))
    }
}

/// Everything a driver test needs, wired to in-memory collaborators.
pub struct Harness {
    pub config: EngineConfig,
    pub provider: Arc<ScriptedProvider>,
    pub broker: Arc<InMemoryBroker>,
    pub store: Arc<InMemoryStore>,
}

impl Harness {
    pub fn new(provider: ScriptedProvider) -> Self {
        Self::with_config(provider, EngineConfig::builder().system_prompt("sys").build())
    }

    pub fn with_config(provider: ScriptedProvider, config: EngineConfig) -> Self {
        Self {
            config,
            provider: Arc::new(provider),
            broker: Arc::new(InMemoryBroker::new()),
            store: Arc::new(InMemoryStore::new()),
        }
    }

    pub fn driver(&self, registry: ToolRegistry) -> ConversationDriver {
        ConversationDriver::new(
            self.config.clone(),
            self.provider.clone(),
            Arc::new(registry),
            self.broker.clone(),
            self.store.clone(),
        )
    }

    /// Subscribe to a run's event channel before it starts.
    pub async fn observe(&self, run_id: RunId) -> Subscription {
        self.broker
            .subscribe(&self.config.event_channel(run_id))
            .await
            .expect("subscribe to event channel")
    }
}

/// Read envelopes until the terminal one.
pub async fn collect_until_terminal(subscription: &mut Subscription) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(Some(raw)) =
        tokio::time::timeout(Duration::from_secs(5), subscription.next()).await
    {
        let event = Event::from_json(&raw).expect("well-formed envelope");
        let terminal = event.event_type.is_terminal();
        events.push(event);
        if terminal {
            break;
        }
    }
    events
}

pub fn event_types(events: &[Event]) -> Vec<String> {
    events.iter().map(|e| e.event_type.to_string()).collect()
}
