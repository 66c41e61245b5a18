//! # Tether Event
//!
//! Collects native input and layout events and delivers them to script once
//! per frame.
//!
//! ```text
//!  native toolkit ──dispatch()──► pending window ──flush()──► RCTEventEmitter
//!                                   │                          receiveEvent
//!                                   └ coalescable events        receiveTouches
//!                                     replace their pending
//!                                     duplicate in place
//! ```
//!
//! Events are delivered in the order they were finally queued. A coalescable
//! event keeps the queue position of the first event it replaced.

pub mod event;
pub mod dispatcher;

pub use dispatcher::{EventDispatcher, EventEmitter, EventStats, TagValidator};
pub use event::{Event, EventKind, TouchEventType};

use tether_core::ViewTag;
use thiserror::Error;

/// Script module that receives events
pub const EMITTER_MODULE: &str = "RCTEventEmitter";
/// Method receiving `[viewTag, eventName, payload]`
pub const RECEIVE_EVENT: &str = "receiveEvent";
/// Method receiving `[eventName, touches, changedIndices]`
pub const RECEIVE_TOUCHES: &str = "receiveTouches";

/// Event errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("Invalid view tag: {0}")]
    InvalidTag(ViewTag),

    #[error("Event for unknown view: {0}")]
    UnknownTag(ViewTag),

    #[error("Event name must not be empty")]
    EmptyName,

    #[error("Emit failed: {0}")]
    Emit(String),
}

/// Result type for event operations
pub type EventResult<T> = Result<T, EventError>;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::dispatcher::{EventDispatcher, EventEmitter};
    pub use crate::event::{Event, TouchEventType};
    pub use crate::{EventError, EventResult};
}
