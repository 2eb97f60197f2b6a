//! # agent-stream
//!
//! A streaming-first engine for tool-calling conversations with LLM services.
//!
//! ## Overview
//!
//! The crate turns a vendor's incremental HTTP response into one normalized event sequence
//! and runs the multi-turn tool-calling loop on top of it:
//!
//! - OpenAI-compatible servers (OpenAI, LM Studio, Ollama, llama.cpp, vLLM)
//! - the Anthropic Messages API
//!
//! ## Key Features
//!
//! - **Live relay**: text deltas reach the caller as the bytes arrive, in every turn
//! - **Tool calling**: fragmented tool-call arguments are reassembled and dispatched
//! - **Bounded loop**: a hard cap on model turns per run
//! - **Cooperative cancellation**: stops within one frame or one tool call
//! - **Lifecycle hooks**: observe every milestone without affecting the outcome
//! - **Retry Logic**: exponential backoff with jitter when opening a stream
//!
//! ## Two Interaction Modes
//!
//! ### 1. One-shot stream (`query()`)
//!
//! ```rust,no_run
//! use agent_stream::{query, AgentOptions, CancellationContext, Message, StreamEvent};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = AgentOptions::builder()
//!         .system_prompt("You are a helpful assistant")
//!         .model("qwen2.5-32b-instruct")
//!         .base_url("http://localhost:1234/v1")
//!         .build()?;
//!
//!     let seed = vec![Message::user("What's the capital of France?")];
//!     let mut stream = query(seed, options, CancellationContext::never())?;
//!
//!     while let Some(event) = stream.next().await {
//!         match event? {
//!             StreamEvent::TextDelta { text } => print!("{text}"),
//!             StreamEvent::ToolCallsReady { tool_calls } => {
//!                 println!("\n[{} tool calls]", tool_calls.len());
//!             }
//!             _ => {}
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ### 2. Client Object (`Client`)
//!
//! For multi-turn conversations with persistent state:
//!
//! ```rust,no_run
//! use agent_stream::{tool, AgentOptions, CancellationContext, Client, Message};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let add = tool("add", "Add two numbers")
//!         .param("a", "number")
//!         .param("b", "number")
//!         .build(|args| async move {
//!             let a = args["a"].as_f64().unwrap_or(0.0);
//!             let b = args["b"].as_f64().unwrap_or(0.0);
//!             Ok(json!({"result": a + b}))
//!         });
//!
//!     let options = AgentOptions::builder()
//!         .model("qwen2.5-32b-instruct")
//!         .base_url("http://localhost:1234/v1")
//!         .tool(add)
//!         .build()?;
//!
//!     let mut client = Client::new(options)?;
//!     let mut events = Vec::new();
//!
//!     let first = client
//!         .run(vec![Message::user("What's 2+2?")], &CancellationContext::never(), &mut events)
//!         .await?;
//!     println!("{}", first.text);
//!
//!     // The client remembers the previous exchange
//!     let second = client
//!         .run(vec![Message::user("Multiply that by 3")], &CancellationContext::never(), &mut events)
//!         .await?;
//!     println!("{}", second.text);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **frame**: event-stream record reading
//! - **vendor**: per-vendor request encoding and stream decoding
//! - **accumulator**: tool-call reassembly from fragments
//! - **turn**: one request, one relayed response
//! - **orchestrator**: the bounded tool-calling loop
//! - **client**: stateful client, spawned streams and `query()`
//! - **cancel**, **hooks**, **tools**, **transport**, **config**, **error**, **retry**

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

/// Tool-call reassembly from streamed fragments.
mod accumulator;

/// Cooperative cancellation predicate and owner-side flag.
mod cancel;

/// Stateful client, spawned conversation streams and the `query()` shorthand.
mod client;

/// Provider shortcuts with environment variable overrides.
mod config;

mod error;

/// Event-stream frame reading over raw response bytes.
mod frame;

/// Observer-only lifecycle hooks.
mod hooks;

/// The bounded tool-calling loop.
mod orchestrator;

/// Tool definitions, the invoker trait and the default registry.
mod tools;

/// The network seam and its reqwest implementation.
mod transport;

/// One request/response exchange relayed as events.
mod turn;

mod types;

// ============================================================================
// PUBLIC EXPORTS
// ============================================================================

/// Retry utilities with exponential backoff and jitter.
pub mod retry;

/// Vendor wire formats: request encoding and stream decoding.
pub mod vendor;

// --- Core Client API ---

pub use client::{Client, ConversationStream, EVENT_CHANNEL_CAPACITY, query};

// --- Engine ---

pub use accumulator::ToolCallAccumulator;
pub use frame::{DONE_SENTINEL, Frame, FrameReader, FrameStream, frames};
pub use orchestrator::Orchestrator;
pub use turn::{EventSink, TurnDriver};
pub use vendor::{StreamDecoder, WireFormat};

// --- Cancellation ---

pub use cancel::{CancellationContext, CancellationFlag};

// --- Provider Configuration ---

pub use config::{BASE_URL_ENV, MODEL_ENV, Provider, get_base_url, get_model};

// --- Error Handling ---

pub use error::{Error, Result};

// --- Lifecycle Hooks ---

pub use hooks::{HookEvent, HookKind, Hooks, Listener, ListenerId};

// --- Tool System ---

pub use tools::{Tool, ToolBuilder, ToolDefinition, ToolHandler, ToolInvoker, ToolRegistry, tool};

// --- Transport ---

pub use transport::{ByteStream, HttpTransport, Transport, WireRequest};

// --- Core Types ---

pub use types::{
    AgentOptions, AgentOptionsBuilder, ConversationResult, DEFAULT_ANTHROPIC_VERSION,
    FinishReason, Message, MessageRole, StreamEvent, ToolCall, TurnResult, Usage,
};

// ============================================================================
// CONVENIENCE PRELUDE
// ============================================================================

/// The most commonly used types and functions.
///
/// Import with `use agent_stream::prelude::*;`.
pub mod prelude {
    pub use crate::{
        AgentOptions, AgentOptionsBuilder, CancellationContext, CancellationFlag, Client,
        ConversationResult, Error, HookEvent, HookKind, Hooks, Message, Result, StreamEvent,
        Tool, ToolCall, WireFormat, query, tool,
    };
}
