//! # Tether Core
//!
//! Shared primitives for the script/native bridge:
//! - **Value**: the closed, recursive value model that every cross-boundary
//!   payload is made of
//! - **Codec**: JSON text and compact binary encodings of values
//! - **Ids**: view tags, callback ids, module and method ids
//! - **Callbacks**: single-use, paired and repeating handles to script functions
//! - **Diagnostics**: the single sink that runtime faults are routed to
//! - **Recovery**: panic containment for native callbacks
//!
//! ## Data Flow
//!
//! ```text
//! Script ──► flushed calls (Value) ──► Bridge ──► Native modules
//!    ▲                                                  │
//!    └──────── callbacks / events (Value) ◄─────────────┘
//! ```

pub mod value;
pub mod codec;
pub mod id;
pub mod callback;
pub mod diagnostics;
pub mod recovery;

pub use value::{Value, ValueKind, ValueMap};
pub use codec::{
    decode, encode, expect_array, expect_map, from_json_str, to_json_string, CodecError,
    WireFormat, MAX_PAYLOAD_BYTES,
};
pub use id::{CallbackId, MethodId, ModuleId, ViewTag};
pub use callback::{Callback, CallbackError, CallbackSink};
pub use diagnostics::{CollectingDiagnostics, DiagnosticsSink, Fault, FaultSource, LogDiagnostics};
pub use recovery::{catch_panic, panic_message};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::callback::{Callback, CallbackError, CallbackSink};
    pub use crate::codec::{CodecError, WireFormat};
    pub use crate::diagnostics::{DiagnosticsSink, Fault, FaultSource};
    pub use crate::id::{CallbackId, MethodId, ModuleId, ViewTag};
    pub use crate::value::{Value, ValueKind, ValueMap};
}
