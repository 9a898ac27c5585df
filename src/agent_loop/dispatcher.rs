//! Sequential tool execution with per-call failure containment.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tracing::{debug, info, warn};

use super::aggregator::CompletedCall;
use super::events::RunEventEmitter;
use super::journal::RunJournal;
use super::types::{RunContext, ToolInvocation, ToolStatus};
use crate::relay::Event;
use crate::store::ToolInvocationUpdate;
use crate::tools::{ToolArguments, ToolContext, ToolRegistry};

/// Result of one handler invocation. Every failure mode ends up here.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Success(serde_json::Value),
    Failure(String),
}

/// Executes completed tool calls against the registry.
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run one handler. Unknown names, handler errors and panics all come
    /// back as [`ToolOutcome::Failure`].
    pub async fn execute(&self, name: &str, args: &ToolArguments, ctx: &ToolContext) -> ToolOutcome {
        let tool = match self.registry.get(name) {
            Ok(tool) => tool,
            Err(e) => return ToolOutcome::Failure(e.to_string()),
        };
        match AssertUnwindSafe(tool.execute(args, ctx)).catch_unwind().await {
            Ok(Ok(value)) => ToolOutcome::Success(value),
            Ok(Err(e)) => ToolOutcome::Failure(e.to_string()),
            Err(_) => ToolOutcome::Failure(format!("tool '{name}' panicked")),
        }
    }

    /// Dispatch a turn's calls in slot order.
    ///
    /// The stop flag is checked before each call: a call already running
    /// finishes and is recorded, the remaining ones are skipped.
    pub(crate) async fn dispatch_all(
        &self,
        calls: &[CompletedCall],
        run: &RunContext,
        emitter: &RunEventEmitter,
        journal: &RunJournal,
    ) -> Vec<ToolInvocation> {
        let mut finished = Vec::with_capacity(calls.len());
        for call in calls {
            if run.is_stopped() {
                info!(
                    run_id = %run.run_id,
                    skipped = calls.len() - finished.len(),
                    "stop requested; skipping remaining tool calls"
                );
                break;
            }
            match self.dispatch_one(call, run, emitter, journal).await {
                Some(invocation) => finished.push(invocation),
                None => break,
            }
        }
        finished
    }

    async fn dispatch_one(
        &self,
        call: &CompletedCall,
        run: &RunContext,
        emitter: &RunEventEmitter,
        journal: &RunJournal,
    ) -> Option<ToolInvocation> {
        let params = call.arguments.raw().clone();
        let mut invocation =
            ToolInvocation::pending(call.slot, &call.call_id, &call.tool_name, params.clone());
        if let Err(e) = invocation.start() {
            warn!(run_id = %run.run_id, error = %e, "tool invocation in unexpected state");
            return None;
        }

        emitter
            .emit(Event::tool_call_progress(call.slot, &call.tool_name, &params))
            .await;
        journal
            .record(
                ToolInvocationUpdate::builder()
                    .call_id(&call.call_id)
                    .tool_name(&call.tool_name)
                    .status(ToolStatus::Running)
                    .params(params)
                    .build(),
            )
            .await;

        debug!(run_id = %run.run_id, tool_name = %call.tool_name, call_id = %call.call_id, "executing tool");
        let started = Instant::now();
        let outcome = self
            .execute(&call.tool_name, &call.arguments, &run.tool_context(&call.call_id))
            .await;
        let elapsed = started.elapsed().as_secs_f64();

        let (transition, event, update) = match outcome {
            ToolOutcome::Success(result) => (
                invocation.succeed(result.clone(), elapsed),
                Event::tool_call_succeeded(call.slot, &call.tool_name, &result, elapsed),
                ToolInvocationUpdate::builder()
                    .call_id(&call.call_id)
                    .status(ToolStatus::Success)
                    .result(result)
                    .execution_time(elapsed)
                    .build(),
            ),
            ToolOutcome::Failure(error) => {
                warn!(run_id = %run.run_id, tool_name = %call.tool_name, error = %error, "tool call failed");
                (
                    invocation.fail(error.clone(), elapsed),
                    Event::tool_call_failed(call.slot, &call.tool_name, &error, elapsed),
                    ToolInvocationUpdate::builder()
                        .call_id(&call.call_id)
                        .status(ToolStatus::Failed)
                        .error(error)
                        .execution_time(elapsed)
                        .build(),
                )
            }
        };
        if let Err(e) = transition {
            warn!(run_id = %run.run_id, error = %e, "tool invocation in unexpected state");
            return None;
        }

        journal.record(update).await;
        emitter.emit(event).await;
        Some(invocation)
    }
}
