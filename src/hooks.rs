//! Lifecycle hooks for observing a conversation run
//!
//! Hooks are *observers*. A listener sees an immutable snapshot of a lifecycle milestone and
//! returns nothing, so it cannot block, rewrite or suppress anything the engine does. This
//! makes them a good fit for audit logging, metrics and UI side channels.
//!
//! # Lifecycle
//!
//! For each turn of a run the engine dispatches, in order:
//!
//! 1. [`HookKind::StreamStart`] before the request is sent
//! 2. [`HookKind::Chunk`] for every event relayed to the caller
//! 3. [`HookKind::StreamEnd`] once the turn has finished streaming
//! 4. [`HookKind::ToolCall`] before each tool is invoked
//!
//! and once per run:
//!
//! - [`HookKind::Success`] when the run produced a result (cancelled runs included)
//! - [`HookKind::Error`] when the run failed, *before* the error is returned
//! - [`HookKind::Complete`] last, on every path
//!
//! # Dispatch
//!
//! Dispatch is synchronous and runs listeners in registration order. A listener that
//! panics is logged and skipped; the remaining listeners still run and the engine's
//! outcome is unchanged.
//!
//! ```rust
//! use agent_stream::{HookEvent, HookKind, Hooks};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let hooks = Hooks::new();
//! let chunks = Arc::new(AtomicUsize::new(0));
//!
//! let counter = chunks.clone();
//! let id = hooks.on(HookKind::Chunk, move |_event| {
//!     counter.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! hooks.off(HookKind::Chunk, id);
//! ```

use crate::types::{ConversationResult, StreamEvent, ToolCall, TurnResult};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, RwLock};

/// Lifecycle milestones a listener can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    StreamStart,
    Chunk,
    ToolCall,
    StreamEnd,
    Success,
    Error,
    Complete,
}

/// Snapshot passed to listeners. Each variant belongs to exactly one [`HookKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum HookEvent {
    StreamStart {
        /// 1-based turn number within the run.
        iteration: u32,
        message_count: usize,
    },
    Chunk {
        iteration: u32,
        event: StreamEvent,
    },
    ToolCall {
        iteration: u32,
        call: ToolCall,
    },
    StreamEnd {
        iteration: u32,
        turn: TurnResult,
    },
    Success {
        result: ConversationResult,
    },
    Error {
        message: String,
    },
    Complete {
        iterations: u32,
        succeeded: bool,
    },
}

impl HookEvent {
    pub fn kind(&self) -> HookKind {
        match self {
            HookEvent::StreamStart { .. } => HookKind::StreamStart,
            HookEvent::Chunk { .. } => HookKind::Chunk,
            HookEvent::ToolCall { .. } => HookKind::ToolCall,
            HookEvent::StreamEnd { .. } => HookKind::StreamEnd,
            HookEvent::Success { .. } => HookKind::Success,
            HookEvent::Error { .. } => HookKind::Error,
            HookEvent::Complete { .. } => HookKind::Complete,
        }
    }
}

/// Type-erased listener callback.
pub type Listener = Arc<dyn Fn(&HookEvent) + Send + Sync>;

/// Handle returned by [`Hooks::on`], used to unregister the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registration {
    id: ListenerId,
    kind: HookKind,
    listener: Listener,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<Registration>,
}

/// Shared listener registry.
///
/// Cloning is cheap and every clone sees the same listeners, so a registry handed to
/// [`AgentOptions`](crate::AgentOptions) can still be added to afterwards.
#[derive(Clone, Default)]
pub struct Hooks {
    inner: Arc<RwLock<Registry>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `kind`.
    pub fn on<F>(&self, kind: HookKind, listener: F) -> ListenerId
    where
        F: Fn(&HookEvent) + Send + Sync + 'static,
    {
        let mut registry = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let id = ListenerId(registry.next_id);
        registry.next_id += 1;
        registry.listeners.push(Registration {
            id,
            kind,
            listener: Arc::new(listener),
        });
        id
    }

    /// Unregister a listener. Returns false if it was not registered for `kind`.
    pub fn off(&self, kind: HookKind, id: ListenerId) -> bool {
        let mut registry = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let before = registry.listeners.len();
        registry
            .listeners
            .retain(|r| !(r.id == id && r.kind == kind));
        registry.listeners.len() != before
    }

    pub fn listener_count(&self, kind: HookKind) -> usize {
        let registry = self.inner.read().unwrap_or_else(|e| e.into_inner());
        registry.listeners.iter().filter(|r| r.kind == kind).count()
    }

    /// Deliver `event` to every listener registered for its kind.
    pub fn dispatch(&self, event: &HookEvent) {
        let kind = event.kind();

        // Snapshot so listeners may call on/off without deadlocking
        let listeners: Vec<Listener> = {
            let registry = self.inner.read().unwrap_or_else(|e| e.into_inner());
            registry
                .listeners
                .iter()
                .filter(|r| r.kind == kind)
                .map(|r| r.listener.clone())
                .collect()
        };

        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                log::warn!("{:?} hook listener panicked; ignoring", kind);
            }
        }
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.inner.read().unwrap_or_else(|e| e.into_inner());
        f.debug_struct("Hooks")
            .field("listeners", &format!("{} listeners", registry.listeners.len()))
            .finish()
    }
}
