//! Event types

use std::fmt;

use tether_core::{Value, ViewTag};

/// Phase of a touch gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TouchEventType {
    Start,
    Move,
    End,
    Cancel,
}

impl TouchEventType {
    /// Script-side event name
    pub fn event_name(self) -> &'static str {
        match self {
            Self::Start => "topTouchStart",
            Self::Move => "topTouchMove",
            Self::End => "topTouchEnd",
            Self::Cancel => "topTouchCancel",
        }
    }

    /// Only moves may be merged
    pub fn can_coalesce(self) -> bool {
        matches!(self, Self::Move)
    }
}

impl fmt::Display for TouchEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_name())
    }
}

/// How an event is delivered
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// `receiveEvent(viewTag, eventName, payload)`
    Custom { payload: Value },
    /// `receiveTouches(eventName, touches, changedIndices)`
    Touch {
        touches: Vec<Value>,
        changed_indices: Vec<usize>,
    },
}

/// A native event addressed to one view
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub view_tag: ViewTag,
    pub event_name: String,
    pub coalescing_key: u16,
    pub can_coalesce: bool,
    pub kind: EventKind,
}

impl Event {
    /// Create a non-coalescable event
    pub fn new(view_tag: ViewTag, event_name: impl Into<String>, payload: Value) -> Self {
        Self {
            view_tag,
            event_name: event_name.into(),
            coalescing_key: 0,
            can_coalesce: false,
            kind: EventKind::Custom { payload },
        }
    }

    /// Create a touch event for the pointer that changed.
    ///
    /// Keyed by `pointer_id`, so moves of different pointers on one view
    /// coalesce separately. Only moves coalesce.
    pub fn touch(
        view_tag: ViewTag,
        phase: TouchEventType,
        pointer_id: u16,
        touches: Vec<Value>,
        changed_indices: Vec<usize>,
    ) -> Self {
        Self {
            view_tag,
            event_name: phase.event_name().to_string(),
            coalescing_key: pointer_id,
            can_coalesce: phase.can_coalesce(),
            kind: EventKind::Touch {
                touches,
                changed_indices,
            },
        }
    }

    /// Make the event coalescable under `key`
    pub fn coalescing(mut self, key: u16) -> Self {
        self.can_coalesce = true;
        self.coalescing_key = key;
        self
    }

    /// Set the coalescing key without changing coalescability
    pub fn with_coalescing_key(mut self, key: u16) -> Self {
        self.coalescing_key = key;
        self
    }

    /// `(module method, args)` for delivery
    pub(crate) fn into_call(self) -> (&'static str, Vec<Value>) {
        match self.kind {
            EventKind::Custom { payload } => (
                crate::RECEIVE_EVENT,
                vec![Value::from(self.view_tag), Value::from(self.event_name), payload],
            ),
            EventKind::Touch {
                touches,
                changed_indices,
            } => (
                crate::RECEIVE_TOUCHES,
                vec![
                    Value::from(self.event_name),
                    Value::from(touches),
                    changed_indices.into_iter().map(Value::from).collect::<Vec<_>>().into(),
                ],
            ),
        }
    }
}
