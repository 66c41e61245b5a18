//! Callback handles
//!
//! A [`Callback`] wraps the integer id of a pending script function together
//! with the sink that routes invocations back to the script queue.
//!
//! - Single-use callbacks may be invoked once.
//! - A success/error pair shares one consumed flag: invoking either side
//!   consumes both.
//! - Repeating callbacks may be invoked any number of times.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::id::CallbackId;
use crate::value::Value;

/// Callback errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CallbackError {
    #[error("Callback already consumed: {0}")]
    AlreadyConsumed(CallbackId),
}

/// Receives callback invocations and forwards them to script
pub trait CallbackSink: Send + Sync {
    /// Invoke the script function identified by `id` with `args`
    fn invoke_callback(&self, id: CallbackId, args: Vec<Value>);
}

/// Handle to a script-side function
#[derive(Clone)]
pub struct Callback {
    id: CallbackId,
    sink: Arc<dyn CallbackSink>,
    consumed: Arc<AtomicBool>,
    repeating: bool,
}

impl Callback {
    /// Create a single-use callback
    pub fn new(id: CallbackId, sink: Arc<dyn CallbackSink>) -> Self {
        Self {
            id,
            sink,
            consumed: Arc::new(AtomicBool::new(false)),
            repeating: false,
        }
    }

    /// Create a callback that may be invoked many times
    pub fn repeating(id: CallbackId, sink: Arc<dyn CallbackSink>) -> Self {
        Self {
            repeating: true,
            ..Self::new(id, sink)
        }
    }

    /// Create a success/error pair; invoking one consumes both
    pub fn pair(success: CallbackId, error: CallbackId, sink: Arc<dyn CallbackSink>) -> (Self, Self) {
        let consumed = Arc::new(AtomicBool::new(false));
        let success = Self {
            id: success,
            sink: sink.clone(),
            consumed: consumed.clone(),
            repeating: false,
        };
        let error = Self {
            id: error,
            sink,
            consumed,
            repeating: false,
        };
        (success, error)
    }

    /// Get the callback id
    pub fn id(&self) -> CallbackId {
        self.id
    }

    /// Check if this callback allows multiple invocations
    pub fn is_repeating(&self) -> bool {
        self.repeating
    }

    /// Check if this callback (or its pair partner) was already invoked
    pub fn is_consumed(&self) -> bool {
        !self.repeating && self.consumed.load(Ordering::Acquire)
    }

    /// Invoke the script function with `args`
    pub fn invoke(&self, args: Vec<Value>) -> Result<(), CallbackError> {
        if !self.repeating && self.consumed.swap(true, Ordering::AcqRel) {
            return Err(CallbackError::AlreadyConsumed(self.id));
        }
        self.sink.invoke_callback(self.id, args);
        Ok(())
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("id", &self.id)
            .field("repeating", &self.repeating)
            .field("consumed", &self.consumed.load(Ordering::Relaxed))
            .finish()
    }
}
