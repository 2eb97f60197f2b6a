//! The Turn Driver: one request, one streamed response.
//!
//! A turn sends the current message list, relays events to an [`EventSink`] as soon as the
//! decoder produces them, and folds the same events into a [`TurnResult`].
//!
//! Relayed per turn, in order:
//!
//! 1. every `TextDelta` and `ToolCallDelta`, live, in decoder order
//! 2. `ToolCallsReady` if the turn requested tools
//! 3. exactly one `StreamCompleted`
//!
//! The decoder's own completion and ready signals are held back and folded, because some
//! vendors send several of them (OpenAI reports usage on a separate chunk after the finish
//! reason). Cancellation is checked before every relay; a cancelled turn relays neither
//! of the closing events.

use crate::accumulator::ToolCallAccumulator;
use crate::cancel::CancellationContext;
use crate::frame::frames;
use crate::tools::ToolDefinition;
use crate::transport::Transport;
use crate::types::{AgentOptions, Message, StreamEvent, ToolCall, TurnResult};
use crate::Result;
use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;

/// Receives relayed events.
#[async_trait]
pub trait EventSink: Send {
    /// Deliver one event. Returning `false` means nobody is listening any more; the engine
    /// treats that like cancellation.
    async fn emit(&mut self, event: StreamEvent) -> bool;
}

#[async_trait]
impl EventSink for mpsc::Sender<Result<StreamEvent>> {
    async fn emit(&mut self, event: StreamEvent) -> bool {
        self.send(Ok(event)).await.is_ok()
    }
}

/// Collects events in memory.
#[async_trait]
impl EventSink for Vec<StreamEvent> {
    async fn emit(&mut self, event: StreamEvent) -> bool {
        self.push(event);
        true
    }
}

/// Drives single turns against one transport.
pub struct TurnDriver<'a> {
    transport: &'a dyn Transport,
    options: &'a AgentOptions,
}

impl<'a> TurnDriver<'a> {
    pub fn new(transport: &'a dyn Transport, options: &'a AgentOptions) -> Self {
        Self { transport, options }
    }

    /// Run one turn for `messages`.
    ///
    /// Returns a partial result flagged `cancelled` if cancellation was observed (or the
    /// sink went away) before the turn completed.
    ///
    /// # Errors
    ///
    /// Transport failures, error frames reported by the service, and
    /// [`Error::ToolArguments`](crate::Error::ToolArguments) when a requested tool call
    /// cannot be reassembled.
    pub async fn run(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        cancel: &CancellationContext,
        sink: &mut dyn EventSink,
    ) -> Result<TurnResult> {
        let wire_format = self.options.wire_format;
        let request = wire_format.build_request(self.options, messages, tools)?;

        log::debug!(
            "starting {} turn: {} messages, {} tools",
            wire_format,
            messages.len(),
            tools.len()
        );
        let mut frames = frames(self.transport.open(&request).await?);
        let mut decoder = wire_format.decoder();
        let mut accumulator = ToolCallAccumulator::new();
        let mut ready: Option<Vec<ToolCall>> = None;
        let mut result = TurnResult::default();

        while let Some(frame) = frames.next().await {
            let frame = frame?;
            for event in decoder.decode(&frame)? {
                match event {
                    StreamEvent::StreamCompleted {
                        finish_reason,
                        usage,
                    } => {
                        if finish_reason.is_some() {
                            result.finish_reason = finish_reason;
                        }
                        if usage.is_some() {
                            result.usage = usage;
                        }
                        continue;
                    }
                    StreamEvent::ToolCallsReady { tool_calls } => {
                        ready = Some(tool_calls);
                        continue;
                    }
                    _ => {}
                }

                if cancel.is_cancelled() {
                    return Ok(cancelled(result));
                }

                match &event {
                    StreamEvent::TextDelta { text } => result.assistant_text.push_str(text),
                    StreamEvent::ToolCallDelta { .. } => accumulator.apply(&event),
                    _ => {}
                }

                if !sink.emit(event).await {
                    return Ok(cancelled(result));
                }
            }
        }

        // A decoder's consolidated list wins over our own reconstruction
        result.tool_calls = match ready {
            Some(calls) => calls,
            None => accumulator.get_tool_calls()?,
        };

        if result.has_tool_calls() {
            if cancel.is_cancelled() {
                return Ok(cancelled(result));
            }
            let event = StreamEvent::ToolCallsReady {
                tool_calls: result.tool_calls.clone(),
            };
            if !sink.emit(event).await {
                return Ok(cancelled(result));
            }
        }

        if cancel.is_cancelled() {
            return Ok(cancelled(result));
        }
        let completed = StreamEvent::completed(result.finish_reason.clone(), result.usage);
        if !sink.emit(completed).await {
            return Ok(cancelled(result));
        }

        log::debug!(
            "turn complete: {} chars, {} tool calls, finish_reason={:?}",
            result.assistant_text.len(),
            result.tool_calls.len(),
            result.finish_reason
        );
        Ok(result)
    }
}

fn cancelled(mut result: TurnResult) -> TurnResult {
    log::debug!("turn cancelled after {} chars", result.assistant_text.len());
    result.cancelled = true;
    result
}
