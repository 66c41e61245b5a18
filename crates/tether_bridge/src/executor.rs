//! Script engine boundary

use tether_core::{CallbackId, CodecError, Value};
use thiserror::Error;

/// Errors raised by a script executor
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExecutorError {
    #[error("Script error: {0}")]
    Script(String),

    #[error("Missing entry point: {0}")]
    MissingEntryPoint(String),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

/// A script engine able to run the batched-bridge entry points.
///
/// All methods are called on the script queue only. A return value of `None`
/// means the engine produced `undefined`.
pub trait ScriptExecutor: Send {
    /// Call `module.method(...args)` and return the flushed calls
    fn call_function_return_flushed_queue(
        &mut self,
        module: &str,
        method: &str,
        args: &[Value],
    ) -> Result<Option<Value>, ExecutorError>;

    /// Invoke callback `id` with `args` and return the flushed calls
    fn invoke_callback_and_return_flushed_queue(
        &mut self,
        id: CallbackId,
        args: &[Value],
    ) -> Result<Option<Value>, ExecutorError>;

    /// Define a global variable from JSON text
    fn set_global_variable(&mut self, name: &str, json_value: &str) -> Result<(), ExecutorError>;

    /// Release engine resources
    fn dispose(&mut self) {}
}
