//! # Tether Queue
//!
//! Strictly serial execution contexts. The runtime owns three of them:
//!
//! ```text
//! ┌──────────────┐  call_and_wait  ┌──────────────────┐  submit  ┌──────────────┐
//! │ script queue │ ◄────────────── │ native-modules   │ ───────► │ layout queue │
//! │ (engine)     │ ──────────────► │ queue (modules)  │          │ (UI commit)  │
//! └──────────────┘     submit      └──────────────────┘          └──────────────┘
//! ```
//!
//! Tasks on one queue run in submission order and never concurrently with each
//! other. Tasks on different queues may run concurrently. The only blocking
//! primitive is [`ExecutionQueue::call_and_wait`], which refuses to block a
//! queue on itself.

pub mod queue;
pub mod set;

pub use queue::{
    DisposePolicy, ExecutionQueue, FailureHandler, QueueFailure, QueueId, QueueSpec, QueueState,
    QueueStats,
};
pub use set::{QueueKind, QueueSet, QueueSetSpec};

use thiserror::Error;

/// Queue errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Blocking call on queue '{0}' issued from a task running on that queue")]
    ReentrantBlockingCall(String),

    #[error("Queue disposed: {0}")]
    QueueDisposed(String),

    #[error("Task panicked on queue '{queue}': {message}")]
    TaskPanicked { queue: String, message: String },

    #[error("Failed to spawn worker for queue '{queue}': {reason}")]
    SpawnFailed { queue: String, reason: String },

    #[error("Expected to run on queue '{expected}'")]
    WrongQueue { expected: String },
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::queue::{DisposePolicy, ExecutionQueue, QueueSpec, QueueState};
    pub use crate::set::{QueueKind, QueueSet};
    pub use crate::{QueueError, QueueResult};
}
