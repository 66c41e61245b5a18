//! # Tether Modules
//!
//! Native modules export methods that script calls by `(moduleId, methodId)`.
//!
//! - Each module supplies an explicit table of methods: name, parameter
//!   signature and handler. Nothing is discovered by introspection.
//! - Arguments are checked against the signature before the handler runs.
//! - Handlers return nothing to script; results travel back through callback
//!   arguments.
//! - Handler errors and panics are contained per call and reported to the
//!   diagnostics sink.
//!
//! ```text
//! flushed call (moduleId, methodId, args)
//!        │
//!        ▼
//! ModuleRegistry::invoke ──► check arity/types ──► handler(&module, Arguments)
//!                                   │                      │
//!                           ArgumentTypeMismatch     Err / panic ──► DiagnosticsSink
//! ```

pub mod module;
pub mod arguments;
pub mod registry;
pub mod invoker;

pub use arguments::{Arguments, Promise};
pub use invoker::NativeModulesInvoker;
pub use module::{MethodKind, MethodSpec, NativeModule, ParamKind, ParamSpec};
pub use registry::{ConstantsPolicy, ModuleRegistry, ModuleRegistryBuilder, RegistryStats};

use tether_core::{CallbackError, MethodId, ModuleId, ValueKind};
use thiserror::Error;

/// Registration errors; fatal to startup
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModuleError {
    #[error("Module already registered: {0}")]
    DuplicateModule(String),

    #[error("Duplicate method name '{method}' on module '{module}'")]
    DuplicateMethodName { module: String, method: String },

    #[error("Invalid signature for {module}.{method}: {reason}")]
    InvalidSignature {
        module: String,
        method: String,
        reason: String,
    },

    #[error("Module name must not be empty")]
    EmptyName,
}

/// Per-call invocation errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InvokeError {
    #[error("Unknown module: {0}")]
    UnknownModule(ModuleId),

    #[error("Unknown method {method_id} on module '{module}'")]
    UnknownMethod { module: String, method_id: MethodId },

    #[error("{module}.{method} expects {expected} arguments, got {found}")]
    ArityMismatch {
        module: String,
        method: String,
        expected: usize,
        found: usize,
    },

    #[error("{module}.{method}: argument {index} ('{param}') expected {expected}, found {found}")]
    ArgumentTypeMismatch {
        module: String,
        method: String,
        param: String,
        index: usize,
        expected: String,
        found: ValueKind,
    },

    #[error("{module}.{method} failed: {message}")]
    MethodFailed {
        module: String,
        method: String,
        message: String,
    },

    #[error("{module}.{method} panicked: {message}")]
    MethodPanicked {
        module: String,
        method: String,
        message: String,
    },
}

/// Errors returned by method handlers
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MethodError {
    #[error("{0}")]
    Failed(String),

    #[error("Argument {index}: {message}")]
    Argument { index: usize, message: String },

    #[error(transparent)]
    Callback(#[from] CallbackError),
}

impl MethodError {
    /// Create a generic failure
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Result type for method handlers
pub type MethodResult = Result<(), MethodError>;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::arguments::{Arguments, Promise};
    pub use crate::module::{MethodKind, MethodSpec, NativeModule, ParamKind};
    pub use crate::registry::{ConstantsPolicy, ModuleRegistry, ModuleRegistryBuilder};
    pub use crate::{InvokeError, MethodError, MethodResult, ModuleError};
}
