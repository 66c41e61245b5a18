//! Decoded method arguments

use std::sync::Arc;

use tether_core::{Callback, CallbackError, CallbackId, CallbackSink, Value, ValueMap};

use crate::module::{ParamKind, ParamSpec};
use crate::{InvokeError, MethodError};

enum Slot {
    Value(Value),
    Callback(Option<Callback>),
}

/// Arguments of one call, already checked against the method signature
pub struct Arguments {
    slots: Vec<Slot>,
}

fn misuse(index: usize, message: impl Into<String>) -> MethodError {
    MethodError::Argument {
        index,
        message: message.into(),
    }
}

impl Arguments {
    /// Wrap plain values (no callback parameters)
    pub fn from_values(values: Vec<Value>) -> Self {
        Self {
            slots: values.into_iter().map(Slot::Value).collect(),
        }
    }

    /// Check `values` against `params` and bind callback ids to `sink`
    pub(crate) fn decode(
        module: &str,
        method: &str,
        params: &[ParamSpec],
        values: Vec<Value>,
        sink: &Arc<dyn CallbackSink>,
    ) -> Result<Self, InvokeError> {
        if values.len() != params.len() {
            return Err(InvokeError::ArityMismatch {
                module: module.to_string(),
                method: method.to_string(),
                expected: params.len(),
                found: values.len(),
            });
        }

        for (index, (param, value)) in params.iter().zip(&values).enumerate() {
            let ok = (param.nullable && value.is_null()) || param.kind.accepts(value);
            if !ok {
                return Err(InvokeError::ArgumentTypeMismatch {
                    module: module.to_string(),
                    method: method.to_string(),
                    param: param.name.clone(),
                    index,
                    expected: param.expected(),
                    found: value.kind(),
                });
            }
        }

        let callback_id = |value: &Value| value.as_u32().map(CallbackId::new);
        let mut slots: Vec<Slot> = Vec::with_capacity(values.len());
        let mut values = values.into_iter().peekable();
        let mut index = 0;

        while let Some(value) = values.next() {
            let param = &params[index];
            let slot = match param.kind {
                ParamKind::RepeatingCallback => Slot::Callback(
                    callback_id(&value).map(|id| Callback::repeating(id, sink.clone())),
                ),
                ParamKind::Callback => {
                    let next_is_pair = params
                        .get(index + 1)
                        .map_or(false, |p| p.kind == ParamKind::Callback);
                    let partner = if next_is_pair {
                        values.peek().and_then(callback_id)
                    } else {
                        None
                    };

                    match (callback_id(&value), partner) {
                        (Some(first), Some(second)) => {
                            let (first, second) = Callback::pair(first, second, sink.clone());
                            values.next();
                            index += 1;
                            slots.push(Slot::Callback(Some(first)));
                            Slot::Callback(Some(second))
                        }
                        (id, _) => Slot::Callback(id.map(|id| Callback::new(id, sink.clone()))),
                    }
                }
                _ => Slot::Value(value),
            };
            slots.push(slot);
            index += 1;
        }

        Ok(Self { slots })
    }

    /// Number of arguments
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if there are no arguments
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Get a value argument
    pub fn value(&self, index: usize) -> Result<&Value, MethodError> {
        match self.slots.get(index) {
            Some(Slot::Value(value)) => Ok(value),
            Some(Slot::Callback(_)) => Err(misuse(index, "is a callback")),
            None => Err(misuse(index, "out of range")),
        }
    }

    /// Move a value argument out, leaving `null`
    pub fn take(&mut self, index: usize) -> Result<Value, MethodError> {
        match self.slots.get_mut(index) {
            Some(Slot::Value(value)) => Ok(std::mem::take(value)),
            Some(Slot::Callback(_)) => Err(misuse(index, "is a callback")),
            None => Err(misuse(index, "out of range")),
        }
    }

    /// Get a boolean argument
    pub fn bool(&self, index: usize) -> Result<bool, MethodError> {
        self.value(index)?
            .as_bool()
            .ok_or_else(|| misuse(index, "not a boolean"))
    }

    /// Get a numeric argument
    pub fn f64(&self, index: usize) -> Result<f64, MethodError> {
        self.value(index)?
            .as_f64()
            .ok_or_else(|| misuse(index, "not a number"))
    }

    /// Get an integer argument
    pub fn i64(&self, index: usize) -> Result<i64, MethodError> {
        self.value(index)?
            .as_i64()
            .ok_or_else(|| misuse(index, "not an integer"))
    }

    /// Get a string argument
    pub fn str(&self, index: usize) -> Result<&str, MethodError> {
        self.value(index)?
            .as_str()
            .ok_or_else(|| misuse(index, "not a string"))
    }

    /// Get an array argument
    pub fn array(&self, index: usize) -> Result<&[Value], MethodError> {
        self.value(index)?
            .as_array()
            .ok_or_else(|| misuse(index, "not an array"))
    }

    /// Get a map argument
    pub fn map(&self, index: usize) -> Result<&ValueMap, MethodError> {
        self.value(index)?
            .as_map()
            .ok_or_else(|| misuse(index, "not a map"))
    }

    /// Get a callback argument that may have been passed as `null`
    pub fn optional_callback(&self, index: usize) -> Result<Option<Callback>, MethodError> {
        match self.slots.get(index) {
            Some(Slot::Callback(callback)) => Ok(callback.clone()),
            Some(Slot::Value(_)) => Err(misuse(index, "not a callback")),
            None => Err(misuse(index, "out of range")),
        }
    }

    /// Get a callback argument
    pub fn callback(&self, index: usize) -> Result<Callback, MethodError> {
        self.optional_callback(index)?
            .ok_or_else(|| misuse(index, "callback is null"))
    }

    /// Get the resolve/reject pair starting at `index`
    pub fn promise(&self, index: usize) -> Result<Promise, MethodError> {
        Ok(Promise {
            resolve: self.callback(index)?,
            reject: self.callback(index + 1)?,
        })
    }
}

/// Resolve/reject pair of a promise method; settling one side consumes both
#[derive(Debug, Clone)]
pub struct Promise {
    resolve: Callback,
    reject: Callback,
}

impl Promise {
    /// Resolve with `value`
    pub fn resolve(self, value: impl Into<Value>) -> Result<(), CallbackError> {
        self.resolve.invoke(vec![value.into()])
    }

    /// Reject with an error code and message
    pub fn reject(self, code: &str, message: &str) -> Result<(), CallbackError> {
        let error: Value = [("code", code), ("message", message)].into_iter().collect();
        self.reject.invoke(vec![error])
    }
}
