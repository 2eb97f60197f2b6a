//! Cooperative cancellation.
//!
//! A [`CancellationContext`] is a side-effect-free predicate. The engine polls it before
//! relaying each event, before starting each turn and before invoking each tool. It never
//! interrupts an in-flight read; the next check point notices instead.
//!
//! Cancellation is not an error. Whoever observes it stops and returns the partial result
//! it has, flagged `cancelled`.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Read-only view of "should we stop?".
#[derive(Clone)]
pub struct CancellationContext {
    predicate: Arc<dyn Fn() -> bool + Send + Sync>,
}

impl CancellationContext {
    /// A context that is never cancelled.
    pub fn never() -> Self {
        Self::new(|| false)
    }

    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
        }
    }

    pub fn from_flag(flag: Arc<AtomicBool>) -> Self {
        Self::new(move || flag.load(Ordering::SeqCst))
    }

    pub fn is_cancelled(&self) -> bool {
        (self.predicate)()
    }
}

impl Default for CancellationContext {
    fn default() -> Self {
        Self::never()
    }
}

impl fmt::Debug for CancellationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationContext")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Owner-side handle: call [`cancel`](Self::cancel) from anywhere, hand
/// [`context`](Self::context) to the engine.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    flag: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clear the flag so the owning client can be reused.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    pub fn context(&self) -> CancellationContext {
        CancellationContext::from_flag(self.flag.clone())
    }
}
