//! # Tether Bridge
//!
//! The call/response protocol between native code and the script engine.
//!
//! ```text
//!  caller queue            script queue                 native-modules queue
//!  ────────────            ────────────                 ────────────────────
//!  call_function ──wait──► executor.call_function…()
//!                          validate flushed calls ──submit──► invoke(m0, f0, a0)
//!                                                             invoke(m1, f1, a1)
//!                                                             …
//!                                                             on_batch_complete()
//! ```
//!
//! A flushed-calls response is `null`, undefined, or
//! `[moduleIds, methodIds, paramsArrays, callId?]` with three equal-length
//! arrays. Anything else is rejected before a single call is dispatched.

pub mod executor;
pub mod flushed;
pub mod transport;
pub mod wire;

pub use executor::{ExecutorError, ScriptExecutor};
pub use flushed::{FlushedCall, FlushedCalls};
pub use transport::{Bridge, BridgeCallback, BridgeStats};
pub use wire::{EncodedExecutor, ScriptEngine};

use tether_queue::QueueError;
use thiserror::Error;

/// Bridge errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BridgeError {
    #[error("Invalid flushed-calls response: {0}")]
    InvalidResponse(String),

    #[error("Executor error: {0}")]
    Executor(#[from] ExecutorError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Bridge disposed")]
    Disposed,
}

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Script-side entry points
pub mod entry_points {
    /// Global object holding the flush entry points
    pub const BATCHED_BRIDGE: &str = "__fbBatchedBridge";
    /// Call a module method and return the flushed queue
    pub const CALL_FUNCTION: &str = "callFunctionReturnFlushedQueue";
    /// Invoke a callback and return the flushed queue
    pub const INVOKE_CALLBACK: &str = "invokeCallbackAndReturnFlushedQueue";
    /// Global receiving the native module configuration
    pub const MODULE_CONFIG: &str = "__fbBatchedBridgeConfig";
}

/// Re-export commonly used types
pub mod prelude {
    pub use crate::executor::{ExecutorError, ScriptExecutor};
    pub use crate::transport::{Bridge, BridgeCallback};
    pub use crate::{BridgeError, BridgeResult};
}
