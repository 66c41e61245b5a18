//! Byte-level engine adapter
//!
//! Engines that exchange serialized payloads rather than [`Value`]s implement
//! [`ScriptEngine`]. [`EncodedExecutor`] turns such an engine into a
//! [`ScriptExecutor`] using one [`WireFormat`]:
//!
//! - `callFunctionReturnFlushedQueue` receives `[module, method, args]`
//! - `invokeCallbackAndReturnFlushedQueue` receives `[callbackId, args]`
//! - an empty reply means `undefined`

use tether_core::{decode, encode, CallbackId, Value, WireFormat};

use crate::entry_points;
use crate::executor::{ExecutorError, ScriptExecutor};

/// An engine speaking encoded payloads
pub trait ScriptEngine: Send {
    /// Run `entry_point` with an encoded argument tuple, returning the
    /// encoded reply
    fn call(&mut self, entry_point: &str, payload: &[u8]) -> Result<Vec<u8>, ExecutorError>;

    /// Define a global variable from JSON text
    fn set_global(&mut self, name: &str, json_value: &str) -> Result<(), ExecutorError>;

    /// Release engine resources
    fn shutdown(&mut self) {}
}

/// [`ScriptExecutor`] over a byte-level [`ScriptEngine`]
pub struct EncodedExecutor<E> {
    engine: E,
    format: WireFormat,
}

impl<E: ScriptEngine> EncodedExecutor<E> {
    /// Wrap `engine`, encoding payloads with `format`
    pub fn new(engine: E, format: WireFormat) -> Self {
        Self { engine, format }
    }

    /// The wire format in use
    pub fn format(&self) -> WireFormat {
        self.format
    }

    /// Access the wrapped engine
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Access the wrapped engine mutably
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    fn round_trip(&mut self, entry_point: &str, tuple: Value) -> Result<Option<Value>, ExecutorError> {
        let payload = encode(&tuple, self.format)?;
        let reply = self.engine.call(entry_point, &payload)?;
        if reply.is_empty() {
            return Ok(None);
        }
        Ok(Some(decode(&reply, self.format)?))
    }
}

impl<E: ScriptEngine> ScriptExecutor for EncodedExecutor<E> {
    fn call_function_return_flushed_queue(
        &mut self,
        module: &str,
        method: &str,
        args: &[Value],
    ) -> Result<Option<Value>, ExecutorError> {
        let tuple = Value::Array(vec![
            Value::from(module),
            Value::from(method),
            Value::Array(args.to_vec()),
        ]);
        self.round_trip(entry_points::CALL_FUNCTION, tuple)
    }

    fn invoke_callback_and_return_flushed_queue(
        &mut self,
        id: CallbackId,
        args: &[Value],
    ) -> Result<Option<Value>, ExecutorError> {
        let tuple = Value::Array(vec![Value::from(id), Value::Array(args.to_vec())]);
        self.round_trip(entry_points::INVOKE_CALLBACK, tuple)
    }

    fn set_global_variable(&mut self, name: &str, json_value: &str) -> Result<(), ExecutorError> {
        self.engine.set_global(name, json_value)
    }

    fn dispose(&mut self) {
        self.engine.shutdown();
    }
}
