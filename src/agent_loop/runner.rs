//! The conversation driver: one run from user message to terminal envelope.

use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::aggregator::{AssembledTurn, ChunkAggregator, ChunkUpdate};
use super::cancellation::{stop_command, CancellationListener};
use super::dispatcher::ToolDispatcher;
use super::events::RunEventEmitter;
use super::journal::RunJournal;
use super::types::{RunContext, RunId, RunOutcome, ToolInvocation, ToolStatus};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::provider::{ChatProvider, ChatRequest, ToolDefinition};
use crate::relay::{Broker, Event};
use crate::store::{ConversationStore, ToolInvocationUpdate};
use crate::tools::ToolRegistry;
use crate::types::{GenerationSettings, ModelMessage, Role};

/// How a streaming turn ended.
enum TurnEnd {
    Assembled(AssembledTurn),
    Stopped,
}

/// Drives runs against one provider, tool set, broker and store.
pub struct ConversationDriver {
    config: EngineConfig,
    provider: Arc<dyn ChatProvider>,
    dispatcher: ToolDispatcher,
    broker: Arc<dyn Broker>,
    store: Arc<dyn ConversationStore>,
}

impl ConversationDriver {
    pub fn new(
        config: EngineConfig,
        provider: Arc<dyn ChatProvider>,
        tools: Arc<ToolRegistry>,
        broker: Arc<dyn Broker>,
        store: Arc<dyn ConversationStore>,
    ) -> Self {
        Self {
            config,
            provider,
            dispatcher: ToolDispatcher::new(tools),
            broker,
            store,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn broker(&self) -> Arc<dyn Broker> {
        Arc::clone(&self.broker)
    }

    /// Execute a run. Returns after its terminal envelope has been published.
    pub async fn run(&self, run: &RunContext, user_message: &str) -> RunOutcome {
        let listener = self.listen_for_stop(run).await;
        self.run_with_listener(run, user_message, listener).await
    }

    /// Subscribe to the run's control channel.
    async fn listen_for_stop(&self, run: &RunContext) -> CancellationListener {
        CancellationListener::start(
            self.broker.as_ref(),
            self.config.control_channel(run.run_id),
            run.stop_flag(),
        )
        .await
    }

    async fn run_with_listener(
        &self,
        run: &RunContext,
        user_message: &str,
        listener: CancellationListener,
    ) -> RunOutcome {
        info!(
            run_id = %run.run_id,
            chat_id = %run.chat_id,
            model = %self.provider.model_id(),
            "run started"
        );

        let emitter = RunEventEmitter::new(
            run.run_id,
            self.config.event_channel(run.run_id),
            Arc::clone(&self.broker),
        );
        let journal = RunJournal::new(run.chat_id.clone(), Arc::clone(&self.store));

        let outcome = self.drive(run, user_message, &emitter, &journal).await;
        listener.shutdown().await;

        info!(run_id = %run.run_id, status = %outcome.status, "run finished");
        outcome
    }

    async fn drive(
        &self,
        run: &RunContext,
        user_message: &str,
        emitter: &RunEventEmitter,
        journal: &RunJournal,
    ) -> RunOutcome {
        let mut messages = self.initial_messages(run, user_message, journal).await;
        let tools = self.dispatcher.registry().definitions();
        let settings = GenerationSettings::from_config(&self.config);
        // Invocations not yet linked to a persisted assistant message.
        let mut unlinked: Vec<String> = Vec::new();
        let mut turn = 0usize;

        loop {
            if run.is_stopped() {
                return self.stopped(run, emitter).await;
            }
            if turn >= self.config.max_turns {
                warn!(run_id = %run.run_id, max_turns = self.config.max_turns, "turn limit exceeded");
                return self.failed(run, emitter, "turn limit exceeded").await;
            }
            turn += 1;
            debug!(run_id = %run.run_id, turn, messages = messages.len(), "starting turn");

            let request = ChatRequest {
                messages: messages.clone(),
                tools: tools.clone(),
                settings: settings.clone(),
            };
            let assembled = match self.stream_turn(run, &request, emitter, journal).await {
                Ok(TurnEnd::Assembled(assembled)) => assembled,
                Ok(TurnEnd::Stopped) => return self.stopped(run, emitter).await,
                Err(e) => {
                    error!(run_id = %run.run_id, turn, error = %e, "completion stream failed");
                    return self.failed(run, emitter, e.to_string()).await;
                }
            };
            debug!(
                run_id = %run.run_id,
                turn,
                finish_reason = %assembled.finish_reason,
                text_len = assembled.text.len(),
                tool_calls = assembled.tool_calls.len(),
                dropped = assembled.dropped,
                "turn assembled"
            );

            if !assembled.has_tool_calls() {
                if !assembled.text.is_empty() {
                    self.persist_assistant(&assembled.text, &mut unlinked, journal).await;
                }
                emitter.emit(Event::completed(&assembled.text)).await;
                return RunOutcome::completed(run.run_id, assembled.text);
            }

            let invocations = self
                .dispatcher
                .dispatch_all(&assembled.tool_calls, run, emitter, journal)
                .await;
            unlinked.extend(invocations.iter().map(|inv| inv.call_id.clone()));
            if !assembled.text.is_empty() {
                self.persist_assistant(&assembled.text, &mut unlinked, journal).await;
            }
            append_tool_exchange(&mut messages, assembled, &invocations);
        }
    }

    /// System prompt, then persisted history (which now ends with the user message).
    async fn initial_messages(
        &self,
        run: &RunContext,
        user_message: &str,
        journal: &RunJournal,
    ) -> Vec<ModelMessage> {
        let persisted = journal.append(Role::User, user_message).await.is_some();
        let history = match journal.store().read_history(&run.chat_id).await {
            Ok(history) if persisted => history.iter().map(|m| m.to_model_message()).collect(),
            Ok(history) => {
                let mut history: Vec<_> = history.iter().map(|m| m.to_model_message()).collect();
                history.push(ModelMessage::user(user_message));
                history
            }
            Err(e) => {
                warn!(run_id = %run.run_id, error = %e, "failed to read history; continuing with the user message only");
                vec![ModelMessage::user(user_message)]
            }
        };

        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ModelMessage::system(&self.config.system_prompt));
        messages.extend(history);
        messages
    }

    async fn stream_turn(
        &self,
        run: &RunContext,
        request: &ChatRequest,
        emitter: &RunEventEmitter,
        journal: &RunJournal,
    ) -> Result<TurnEnd> {
        let mut stream = self.provider.stream_chat(request).await?;
        let mut aggregator = ChunkAggregator::new();

        loop {
            let next = match self.config.stream_idle_timeout() {
                Some(limit) => tokio::time::timeout(limit, stream.next())
                    .await
                    .map_err(|_| EngineError::Timeout(limit.as_millis() as u64))?,
                None => stream.next().await,
            };
            let Some(chunk) = next else {
                break;
            };
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) if e.is_transport() => return Err(e),
                Err(e) => {
                    warn!(run_id = %run.run_id, error = %e, "skipping undecodable fragment");
                    continue;
                }
            };

            for update in aggregator.push(&chunk) {
                match update {
                    ChunkUpdate::Text(content) => emitter.emit(Event::message(content)).await,
                    ChunkUpdate::ToolCallStarted {
                        slot,
                        call_id,
                        tool_name,
                    } => {
                        emitter.emit(Event::tool_call_start(slot, &tool_name)).await;
                        if let Some(call_id) = call_id {
                            journal
                                .record(ToolInvocationUpdate {
                                    call_id,
                                    tool_name: (!tool_name.is_empty()).then_some(tool_name),
                                    status: Some(ToolStatus::Pending),
                                    params: Some(serde_json::json!({})),
                                    ..Default::default()
                                })
                                .await;
                        }
                    }
                }
            }

            if run.is_stopped() {
                debug!(run_id = %run.run_id, "stop observed mid-stream; abandoning turn");
                return Ok(TurnEnd::Stopped);
            }
        }

        Ok(TurnEnd::Assembled(aggregator.finish()))
    }

    async fn persist_assistant(&self, text: &str, unlinked: &mut Vec<String>, journal: &RunJournal) {
        let Some(message_id) = journal.append(Role::Assistant, text).await else {
            return;
        };
        for call_id in unlinked.drain(..) {
            journal
                .record(
                    ToolInvocationUpdate::builder()
                        .call_id(call_id)
                        .message_id(message_id)
                        .build(),
                )
                .await;
        }
    }

    async fn stopped(&self, run: &RunContext, emitter: &RunEventEmitter) -> RunOutcome {
        info!(run_id = %run.run_id, "run stopped by user");
        emitter.emit(Event::stopped()).await;
        RunOutcome::stopped(run.run_id)
    }

    async fn failed(
        &self,
        run: &RunContext,
        emitter: &RunEventEmitter,
        message: impl Into<String>,
    ) -> RunOutcome {
        let message = message.into();
        emitter.emit(Event::error(&message)).await;
        RunOutcome::failed(run.run_id, message)
    }

    /// Tool schema set offered to the model.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.dispatcher.registry().definitions()
    }
}

/// Append the assistant request for the dispatched calls and one result per call.
fn append_tool_exchange(
    messages: &mut Vec<ModelMessage>,
    assembled: AssembledTurn,
    invocations: &[ToolInvocation],
) {
    if invocations.is_empty() {
        return;
    }
    let calls = assembled
        .tool_calls
        .iter()
        .filter(|call| invocations.iter().any(|inv| inv.call_id == call.call_id))
        .map(|call| call.to_agent_call())
        .collect();
    messages.push(ModelMessage::assistant_tool_calls(assembled.text, calls));
    for invocation in invocations {
        messages.push(ModelMessage::tool_result(
            &invocation.call_id,
            invocation.result_for_model(),
            invocation.status == ToolStatus::Failed,
        ));
    }
}

/// Starts runs as background tasks.
#[derive(Clone)]
pub struct RunLauncher {
    driver: Arc<ConversationDriver>,
}

impl RunLauncher {
    pub fn new(driver: Arc<ConversationDriver>) -> Self {
        Self { driver }
    }

    /// Spawn a run on the current tokio runtime.
    ///
    /// The stop listener is subscribed before this returns, so a stop
    /// requested right after is seen by the run.
    pub async fn spawn_run(
        &self,
        run: RunContext,
        user_message: impl Into<String>,
    ) -> JoinHandle<RunOutcome> {
        let driver = Arc::clone(&self.driver);
        let user_message = user_message.into();
        let listener = driver.listen_for_stop(&run).await;
        tokio::spawn(async move { driver.run_with_listener(&run, &user_message, listener).await })
    }

    pub async fn request_stop(&self, run_id: RunId) -> Result<usize> {
        request_stop(self.driver.broker().as_ref(), self.driver.config(), run_id).await
    }
}

/// Ask a run to stop. Returns how many listeners received the request.
pub async fn request_stop(broker: &dyn Broker, config: &EngineConfig, run_id: RunId) -> Result<usize> {
    broker
        .publish(&config.control_channel(run_id), &stop_command())
        .await
}
