//! UI operations

use tether_core::{Callback, Value, ValueMap, ViewTag};

/// Position and size of a view in its parent's coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Frame {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Frame {
    /// Create a frame
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// `[x, y, width, height]` as sent to script
    pub fn to_values(self) -> Vec<Value> {
        vec![
            Value::from(self.x),
            Value::from(self.y),
            Value::from(self.width),
            Value::from(self.height),
        ]
    }
}

/// One buffered view-tree mutation
#[derive(Debug, Clone)]
pub enum UiOperation {
    /// Create a view with initial props
    CreateView {
        tag: ViewTag,
        type_name: String,
        root_tag: ViewTag,
        props: ValueMap,
    },
    /// Merge props; a `null` value removes the prop
    UpdateProps { tag: ViewTag, props: ValueMap },
    /// Detach, move and attach children of `tag`.
    ///
    /// Children at `move_from` are reinserted at `move_to`. Children at
    /// `remove_from` are detached but stay alive until removed. Views in
    /// `add_child_tags` are attached at `add_at_indices`.
    ManageChildren {
        tag: ViewTag,
        move_from: Vec<usize>,
        move_to: Vec<usize>,
        add_child_tags: Vec<ViewTag>,
        add_at_indices: Vec<usize>,
        remove_from: Vec<usize>,
    },
    /// Attach children to a view that has none
    SetChildren { tag: ViewTag, child_tags: Vec<ViewTag> },
    /// Record layout results
    SetDimensions { tag: ViewTag, frame: Frame },
    /// Hand opaque layout data to the view manager
    UpdateExtraData { tag: ViewTag, payload: Value },
    /// Destroy a view; it must have no children left
    RemoveView { tag: ViewTag },
    /// Reply with `[x, y, width, height]`, or nothing if unknown
    Measure { tag: ViewTag, callback: Callback },
}

impl UiOperation {
    /// Tag of the view the operation targets
    pub fn tag(&self) -> ViewTag {
        match self {
            Self::CreateView { tag, .. }
            | Self::UpdateProps { tag, .. }
            | Self::ManageChildren { tag, .. }
            | Self::SetChildren { tag, .. }
            | Self::SetDimensions { tag, .. }
            | Self::UpdateExtraData { tag, .. }
            | Self::RemoveView { tag }
            | Self::Measure { tag, .. } => *tag,
        }
    }

    /// Operation name for logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateView { .. } => "createView",
            Self::UpdateProps { .. } => "updateProps",
            Self::ManageChildren { .. } => "manageChildren",
            Self::SetChildren { .. } => "setChildren",
            Self::SetDimensions { .. } => "setDimensions",
            Self::UpdateExtraData { .. } => "updateExtraData",
            Self::RemoveView { .. } => "removeView",
            Self::Measure { .. } => "measure",
        }
    }
}
