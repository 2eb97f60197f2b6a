//! Client for streamed, tool-calling conversations
//!
//! [`Client`] owns everything one conversation needs: options, a transport, a tool invoker,
//! the message history and an interrupt flag. It offers two ways to run the loop:
//!
//! - [`Client::run`]: drive the conversation in place, handing events to any [`EventSink`]
//! - [`Client::stream`]: spawn the conversation and consume it as a `Stream` of events
//!
//! [`query`] is the one-shot shorthand for the second.
//!
//! ## Request Flow
//!
//! ```text
//! seed messages appended to history
//!     │
//!     ├─> turn: request encoded for the configured wire format
//!     │     ├─> response body read frame by frame
//!     │     ├─> text and tool-call deltas relayed as they arrive
//!     │     └─> ToolCallsReady (if any), then StreamCompleted
//!     │
//!     ├─> tools invoked in order, results appended to history
//!     │
//!     └─> repeat until a turn requests no tools, or the iteration bound is hit
//! ```
//!
//! ## Interruption
//!
//! ```rust,no_run
//! # use agent_stream::{AgentOptions, CancellationContext, Client, Message};
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = AgentOptions::builder()
//!     .model("qwen2.5-32b-instruct")
//!     .base_url("http://localhost:1234/v1")
//!     .build()?;
//! let mut client = Client::new(options)?;
//! let handle = client.interrupt_handle();
//!
//! tokio::spawn(async move {
//!     tokio::time::sleep(std::time::Duration::from_secs(5)).await;
//!     handle.cancel();
//! });
//!
//! let mut events = Vec::new();
//! let result = client
//!     .run(vec![Message::user("Long request")], &CancellationContext::never(), &mut events)
//!     .await?;
//! assert!(result.cancelled || !result.text.is_empty());
//! # Ok(())
//! # }
//! ```

use crate::cancel::{CancellationContext, CancellationFlag};
use crate::hooks::Hooks;
use crate::orchestrator::Orchestrator;
use crate::tools::{ToolInvoker, ToolRegistry};
use crate::transport::{HttpTransport, Transport};
use crate::turn::EventSink;
use crate::types::{AgentOptions, ConversationResult, Message, StreamEvent};
use crate::{Error, Result};
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

/// Events buffered between a spawned conversation and its consumer.
///
/// Kept small so a consumer that cancels sees only a handful of further events.
pub const EVENT_CHANNEL_CAPACITY: usize = 8;

/// Conversation client.
///
/// Not meant for concurrent use; one run at a time. The interrupt handle may be used
/// from anywhere.
pub struct Client {
    options: AgentOptions,

    transport: Arc<dyn Transport>,

    tools: Arc<dyn ToolInvoker>,

    /// Every message of the conversation so far, seed included. Never includes the
    /// configured system prompt, which is added per request.
    history: Vec<Message>,

    interrupted: CancellationFlag,
}

impl Client {
    /// Create a client that talks HTTP and serves `options.tools`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(options: AgentOptions) -> Result<Self> {
        let transport = HttpTransport::new(options.timeout, options.retry.clone())?;
        let tools = ToolRegistry::from_tools(options.tools.iter().cloned());
        Ok(Self::with_transport(
            options,
            Arc::new(transport),
            Arc::new(tools),
        ))
    }

    /// Create a client over a custom transport and tool invoker.
    pub fn with_transport(
        options: AgentOptions,
        transport: Arc<dyn Transport>,
        tools: Arc<dyn ToolInvoker>,
    ) -> Self {
        Self {
            options,
            transport,
            tools,
            history: Vec::new(),
            interrupted: CancellationFlag::new(),
        }
    }

    /// Append `seed` to the history and run the tool-calling loop over it.
    ///
    /// The run stops early, with `cancelled` set on the result, when `cancel` or the
    /// client's interrupt handle fires. The interrupt flag is cleared at the start of every
    /// run. Whatever happened, the history keeps every message exchanged so far.
    ///
    /// # Errors
    ///
    /// See [`Orchestrator::run`].
    pub async fn run(
        &mut self,
        seed: Vec<Message>,
        cancel: &CancellationContext,
        sink: &mut dyn EventSink,
    ) -> Result<ConversationResult> {
        self.interrupted.reset();
        self.history.extend(seed);

        let interrupted = self.interrupted.clone();
        let outer = cancel.clone();
        let cancel =
            CancellationContext::new(move || outer.is_cancelled() || interrupted.is_cancelled());

        Orchestrator::new(self.transport.as_ref(), self.tools.as_ref(), &self.options)
            .run(&mut self.history, &cancel, sink)
            .await
    }

    /// Run the conversation on a spawned task and stream its events.
    ///
    /// The stream ends after the last turn's `StreamCompleted`, or with the error that
    /// ended the run as its final item. Dropping the stream cancels the run at its next
    /// check point. Call [`ConversationStream::finish`] to get the client back.
    pub fn stream(mut self, seed: Vec<Message>, cancel: CancellationContext) -> ConversationStream {
        let (tx, rx) = mpsc::channel::<Result<StreamEvent>>(EVENT_CHANNEL_CAPACITY);

        // A dropped receiver also stops tool calls, which emit nothing to notice it
        let watch = tx.clone();
        let outer = cancel;
        let cancel = CancellationContext::new(move || outer.is_cancelled() || watch.is_closed());

        let handle = tokio::spawn(async move {
            let mut sink = tx;
            let outcome = self.run(seed, &cancel, &mut sink).await;
            let result = match outcome {
                Ok(result) => Some(result),
                Err(e) => {
                    // Receiver may be gone already; nothing else to tell
                    let _ = sink.send(Err(e)).await;
                    None
                }
            };
            (self, result)
        });

        ConversationStream {
            events: ReceiverStream::new(rx),
            handle,
        }
    }

    /// Handle that interrupts the current or next run from another task.
    pub fn interrupt_handle(&self) -> CancellationFlag {
        self.interrupted.clone()
    }

    /// Interrupt the current run at its next check point.
    pub fn interrupt(&self) {
        self.interrupted.cancel();
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn options(&self) -> &AgentOptions {
        &self.options
    }

    /// Lifecycle hook registry shared with [`AgentOptions::hooks`].
    pub fn hooks(&self) -> &Hooks {
        &self.options.hooks
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("options", &self.options)
            .field("history", &format!("{} messages", self.history.len()))
            .field("interrupted", &self.interrupted.is_cancelled())
            .finish()
    }
}

/// Live events of a spawned conversation.
///
/// Yields `Ok(StreamEvent)` as the conversation progresses. If the run fails, the error
/// is the last item.
pub struct ConversationStream {
    events: ReceiverStream<Result<StreamEvent>>,
    handle: JoinHandle<(Client, Option<ConversationResult>)>,
}

impl ConversationStream {
    /// Drain any remaining events and wait for the run to end.
    ///
    /// Returns the client (with its history) and the run's outcome. The client is `None`
    /// only if the conversation task itself died. If the terminal error was already taken
    /// from the stream, the outcome is an [`Error::Other`] saying so.
    pub async fn finish(mut self) -> (Option<Client>, Result<ConversationResult>) {
        let mut failure = None;
        while let Some(item) = self.events.next().await {
            if let Err(e) = item {
                failure = Some(e);
            }
        }

        match self.handle.await {
            Ok((client, Some(result))) => (Some(client), Ok(result)),
            Ok((client, None)) => (
                Some(client),
                Err(failure.unwrap_or_else(|| {
                    Error::other("conversation failed; the error was already read from the stream")
                })),
            ),
            Err(e) => (None, Err(Error::other(format!("conversation task failed: {e}")))),
        }
    }
}

impl Stream for ConversationStream {
    type Item = Result<StreamEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_next_unpin(cx)
    }
}

/// One-shot conversation over HTTP: build a fresh client and stream it.
///
/// # Errors
///
/// Returns an error if the client cannot be created; everything after that is reported
/// through the stream.
///
/// # Examples
///
/// ```rust,no_run
/// use agent_stream::{query, AgentOptions, CancellationContext, Message, StreamEvent};
/// use futures::StreamExt;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let options = AgentOptions::builder()
///     .model("qwen2.5-32b-instruct")
///     .base_url("http://localhost:1234/v1")
///     .build()?;
///
/// let mut stream = query(vec![Message::user("Hello!")], options, CancellationContext::never())?;
/// while let Some(event) = stream.next().await {
///     if let StreamEvent::TextDelta { text } = event? {
///         print!("{text}");
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub fn query(
    seed: Vec<Message>,
    options: AgentOptions,
    cancel: CancellationContext,
) -> Result<ConversationStream> {
    Ok(Client::new(options)?.stream(seed, cancel))
}
