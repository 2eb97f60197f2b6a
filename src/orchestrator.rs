//! The tool-calling loop.
//!
//! [`Orchestrator::run`] drives up to `max_tool_iterations` turns over a growing message
//! list. Text is relayed while each turn streams; tool calls are only acted on once their
//! turn has completed. Each iteration:
//!
//! 1. stop with a partial result if cancellation is set
//! 2. run one turn over the current messages
//! 3. no tool calls: append the assistant reply and finish
//! 4. otherwise append the assistant message with its calls, then invoke each tool in
//!    order and append its result as a tool message
//!
//! Running out of iterations while the model is still asking for tools is
//! [`Error::MaxIterationsExceeded`]; no request is made past the bound.

use crate::cancel::CancellationContext;
use crate::hooks::{HookEvent, Hooks};
use crate::tools::ToolInvoker;
use crate::transport::Transport;
use crate::turn::{EventSink, TurnDriver};
use crate::types::{AgentOptions, ConversationResult, Message, StreamEvent, ToolCall};
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::{Value, json};

/// Forwards relayed events to the caller and to `Chunk` listeners.
struct HookedSink<'a> {
    inner: &'a mut dyn EventSink,
    hooks: &'a Hooks,
    iteration: u32,
}

#[async_trait]
impl EventSink for HookedSink<'_> {
    async fn emit(&mut self, event: StreamEvent) -> bool {
        // Listeners only see what the caller actually received
        let chunk = HookEvent::Chunk {
            iteration: self.iteration,
            event: event.clone(),
        };
        if !self.inner.emit(event).await {
            return false;
        }
        self.hooks.dispatch(&chunk);
        true
    }
}

/// Bounded multi-turn tool-calling loop.
pub struct Orchestrator<'a> {
    transport: &'a dyn Transport,
    tools: &'a dyn ToolInvoker,
    options: &'a AgentOptions,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        tools: &'a dyn ToolInvoker,
        options: &'a AgentOptions,
    ) -> Self {
        Self {
            transport,
            tools,
            options,
        }
    }

    fn hooks(&self) -> &Hooks {
        &self.options.hooks
    }

    /// Run the loop, appending every assistant and tool message to `messages`.
    ///
    /// `messages` holds the seed on entry and the whole conversation on return, including
    /// when the run fails. The `Error` hook fires before an error is returned, and the
    /// `Complete` hook fires last on every path.
    ///
    /// # Errors
    ///
    /// Any turn-level failure, [`Error::UnknownTool`], or
    /// [`Error::MaxIterationsExceeded`]. Tool execution failures are not errors here; they
    /// are fed back to the model.
    pub async fn run(
        &self,
        messages: &mut Vec<Message>,
        cancel: &CancellationContext,
        sink: &mut dyn EventSink,
    ) -> Result<ConversationResult> {
        let mut summary = ConversationResult::default();
        let outcome = self.drive(messages, cancel, sink, &mut summary).await;

        match &outcome {
            Ok(result) => self.hooks().dispatch(&HookEvent::Success {
                result: result.clone(),
            }),
            Err(e) => {
                log::warn!("conversation failed after {} turns: {}", summary.iterations, e);
                self.hooks().dispatch(&HookEvent::Error {
                    message: e.to_string(),
                });
            }
        }
        self.hooks().dispatch(&HookEvent::Complete {
            iterations: summary.iterations,
            succeeded: outcome.is_ok(),
        });

        outcome
    }

    async fn drive(
        &self,
        messages: &mut Vec<Message>,
        cancel: &CancellationContext,
        sink: &mut dyn EventSink,
        summary: &mut ConversationResult,
    ) -> Result<ConversationResult> {
        let max_iterations = self.options.max_tool_iterations;
        let definitions = self.tools.definitions();
        let driver = TurnDriver::new(self.transport, self.options);

        for iteration in 1..=max_iterations {
            if cancel.is_cancelled() {
                log::debug!("cancelled before turn {}", iteration);
                summary.cancelled = true;
                return Ok(summary.clone());
            }

            summary.iterations = iteration;
            self.hooks().dispatch(&HookEvent::StreamStart {
                iteration,
                message_count: messages.len(),
            });

            let mut relay = HookedSink {
                inner: &mut *sink,
                hooks: self.hooks(),
                iteration,
            };
            let turn = driver
                .run(messages, &definitions, cancel, &mut relay)
                .await?;

            self.hooks().dispatch(&HookEvent::StreamEnd {
                iteration,
                turn: turn.clone(),
            });

            summary.text.push_str(&turn.assistant_text);
            if let Some(usage) = turn.usage {
                summary.usage = Some(usage);
                summary.total_usage += usage;
            }
            if turn.finish_reason.is_some() {
                summary.finish_reason = turn.finish_reason.clone();
            }

            if turn.cancelled {
                summary.cancelled = true;
                return Ok(summary.clone());
            }

            if !turn.has_tool_calls() {
                messages.push(Message::assistant(turn.assistant_text));
                log::debug!("conversation finished after {} turns", iteration);
                return Ok(summary.clone());
            }

            let calls = turn.tool_calls;
            messages.push(Message::assistant_with_tool_calls(
                turn.assistant_text,
                calls.clone(),
            ));

            for (position, call) in calls.iter().enumerate() {
                if cancel.is_cancelled() {
                    log::debug!(
                        "cancelled with {} of {} tool calls pending",
                        calls.len() - position,
                        calls.len()
                    );
                    messages.extend(calls[position..].iter().map(cancelled_result));
                    summary.cancelled = true;
                    return Ok(summary.clone());
                }

                self.hooks().dispatch(&HookEvent::ToolCall {
                    iteration,
                    call: call.clone(),
                });
                messages.push(self.invoke(call).await?);
            }
        }

        log::warn!(
            "model still requesting tools after {} iterations",
            max_iterations
        );
        Err(Error::MaxIterationsExceeded(max_iterations))
    }

    /// Invoke one tool and turn its outcome into the tool message fed back to the model.
    async fn invoke(&self, call: &ToolCall) -> Result<Message> {
        log::debug!("invoking tool '{}' ({})", call.name, call.id);

        match self
            .tools
            .call_function(&call.name, call.arguments.clone())
            .await
        {
            Ok(Value::String(text)) => Ok(Message::tool_result(&call.id, &call.name, text)),
            Ok(value) => Ok(Message::tool_result(&call.id, &call.name, value.to_string())),
            Err(Error::UnknownTool(name)) => Err(Error::UnknownTool(name)),
            Err(e) => {
                let message = match e {
                    Error::Tool(message) => message,
                    other => other.to_string(),
                };
                log::warn!("tool '{}' failed: {}", call.name, message);
                let content = json!({"error": message, "tool": call.name, "id": call.id});
                Ok(Message::tool_error(&call.id, &call.name, content.to_string()))
            }
        }
    }
}

fn cancelled_result(call: &ToolCall) -> Message {
    let content = json!({
        "error": "cancelled",
        "tool": call.name,
        "id": call.id,
    });
    Message::tool_error(&call.id, &call.name, content.to_string())
}
