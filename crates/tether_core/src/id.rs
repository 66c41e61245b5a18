//! Identifier newtypes
//!
//! Ids on the wire are plain integers. Wrapping them keeps view tags, callback
//! ids and module/method ids from being mixed up on the native side.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            /// Create from a raw value
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            /// Get the raw value
            pub const fn raw(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "({})"), self.0)
            }
        }

        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for crate::value::Value {
            fn from(id: $name) -> Self {
                crate::value::Value::Number(id.0 as f64)
            }
        }
    };
}

define_id!(
    /// Identifies one native view for its whole lifetime. Tag 0 is reserved.
    ViewTag,
    "ViewTag"
);

define_id!(
    /// Opaque handle to a pending script-side function
    CallbackId,
    "CallbackId"
);

define_id!(
    /// Index of a native module in the registry
    ModuleId,
    "ModuleId"
);

define_id!(
    /// Index of a method within its module
    MethodId,
    "MethodId"
);

impl ViewTag {
    /// The reserved, never-allocated tag
    pub const INVALID: ViewTag = ViewTag(0);

    /// Check whether this tag can refer to a view
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl ModuleId {
    /// Position of this module in the registry
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl MethodId {
    /// Position of this method within its module
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_view_tag_validity() {
        assert!(!ViewTag::INVALID.is_valid());
        assert!(ViewTag::new(1).is_valid());
    }

    #[test]
    fn test_id_display_and_value() {
        assert_eq!(CallbackId::new(7).to_string(), "CallbackId(7)");
        assert_eq!(Value::from(ModuleId::new(3)).as_u32(), Some(3));
    }

    #[test]
    fn test_id_serde_is_transparent() {
        assert_eq!(serde_json::to_string(&ViewTag::new(12)).unwrap(), "12");
    }
}
