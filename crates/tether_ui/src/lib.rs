//! # Tether UI
//!
//! Buffers view-tree mutations and commits them on the layout queue.
//!
//! ```text
//!  native-modules queue                      layout queue
//!  ────────────────────                      ────────────
//!  enqueue_create ─┐
//!  enqueue_update ─┼─► buffer ──commit()──►  apply ops in enqueue order
//!  enqueue_remove ─┘                          │   ViewTree + side tables
//!                                             │   view manager capabilities
//!                                             ▼
//!                                           CommitReport
//! ```
//!
//! Enqueueing never touches the tree. A commit applies a whole batch in one
//! layout-queue task, so nothing else on that queue observes a partial batch.
//! The first failing operation stops the batch; later operations are skipped
//! and earlier ones stay applied.

pub mod operation;
pub mod manager;
pub mod tree;
pub mod side_table;
pub mod tag;
pub mod queue;

mod apply;

pub use manager::{
    ChildManaging, DimensionAware, ExtraDataConsuming, NativeView, PropUpdatable, ViewManager,
    ViewManagerError, ViewManagerRegistry,
};
pub use operation::{Frame, UiOperation};
pub use queue::{BatchId, CommitListener, CommitReport, UiOperationQueue, UiStats};
pub use side_table::ViewSideTable;
pub use tag::ViewTagAllocator;
pub use tree::{ViewSnapshot, ViewTree};

use tether_core::ViewTag;
use tether_queue::QueueError;
use thiserror::Error;

/// UI errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum UiError {
    #[error("Unknown view tag: {0}")]
    UnknownTag(ViewTag),

    #[error("Invalid view tag: {0}")]
    InvalidTag(ViewTag),

    #[error("View already exists: {0}")]
    ViewAlreadyExists(ViewTag),

    #[error("View tag reused after removal: {0}")]
    TagReused(ViewTag),

    #[error("Unknown view manager: {0}")]
    UnknownViewManager(String),

    #[error("View manager already registered: {0}")]
    DuplicateViewManager(String),

    #[error("Cannot remove {tag}: child {child} is still attached")]
    DanglingChildReference { tag: ViewTag, child: ViewTag },

    #[error("View {child} already has parent {parent}")]
    ChildAlreadyParented { child: ViewTag, parent: ViewTag },

    #[error("Index {index} out of range for {tag} with {len} children")]
    InvalidIndex { tag: ViewTag, index: usize, len: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("View manager '{manager}' does not support {operation}")]
    UnsupportedOperation { manager: String, operation: String },

    #[error("View manager '{manager}' failed: {message}")]
    ViewManager { manager: String, message: String },

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

/// Result type for UI operations
pub type UiResult<T> = Result<T, UiError>;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::manager::{ViewManager, ViewManagerRegistry};
    pub use crate::operation::{Frame, UiOperation};
    pub use crate::queue::{CommitReport, UiOperationQueue};
    pub use crate::{UiError, UiResult};
}
