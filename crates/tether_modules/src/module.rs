//! Native module contract and method tables

use std::fmt;
use std::sync::Arc;

use tether_core::{Value, ValueKind, ValueMap};

use crate::arguments::Arguments;
use crate::{MethodResult, ModuleError};

/// How script calls a method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MethodKind {
    /// Fire-and-forget; results come back through callback arguments
    #[default]
    Async,
    /// Ends with a resolve/reject callback pair
    Promise,
    /// Marked synchronous in the module description
    Sync,
}

/// Expected type of one parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Bool,
    Number,
    /// Number without fractional part
    Int,
    String,
    Array,
    Map,
    /// Any value, unchecked
    Any,
    /// Single-use callback id
    Callback,
    /// Callback id that may be invoked many times
    RepeatingCallback,
}

impl ParamKind {
    /// Check if this parameter carries a callback id
    pub fn is_callback(self) -> bool {
        matches!(self, Self::Callback | Self::RepeatingCallback)
    }

    /// Check whether `value` satisfies this kind (null handled by the caller)
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Bool => matches!(value, Value::Bool(_)),
            Self::Number => matches!(value, Value::Number(_)),
            Self::Int => value.as_i64().is_some(),
            Self::String => matches!(value, Value::String(_)),
            Self::Array => matches!(value, Value::Array(_)),
            Self::Map => matches!(value, Value::Map(_)),
            Self::Any => true,
            Self::Callback | Self::RepeatingCallback => value.as_u32().is_some(),
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => ValueKind::Bool.to_string(),
            Self::Number => ValueKind::Number.to_string(),
            Self::Int => "integer".to_string(),
            Self::String => ValueKind::String.to_string(),
            Self::Array => ValueKind::Array.to_string(),
            Self::Map => ValueKind::Map.to_string(),
            Self::Any => "any".to_string(),
            Self::Callback => "callback".to_string(),
            Self::RepeatingCallback => "repeating callback".to_string(),
        };
        f.write_str(&name)
    }
}

/// One declared parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    /// Accept `null` in place of a value
    pub nullable: bool,
}

impl ParamSpec {
    /// Describe the expected type for error messages
    pub fn expected(&self) -> String {
        if self.nullable {
            format!("{} or null", self.kind)
        } else {
            self.kind.to_string()
        }
    }
}

/// Handler bound to a concrete module type
pub type MethodHandler<M> = Arc<dyn Fn(&M, Arguments) -> MethodResult + Send + Sync>;

/// An exported method: name, signature and handler
pub struct MethodSpec<M> {
    pub(crate) name: String,
    pub(crate) kind: MethodKind,
    pub(crate) params: Vec<ParamSpec>,
    pub(crate) handler: MethodHandler<M>,
}

impl<M> MethodSpec<M> {
    /// Declare a method with no parameters yet
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&M, Arguments) -> MethodResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind: MethodKind::Async,
            params: Vec::new(),
            handler: Arc::new(handler),
        }
    }

    /// Append a required parameter
    pub fn param(mut self, name: impl Into<String>, kind: ParamKind) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            kind,
            nullable: false,
        });
        self
    }

    /// Append a parameter that also accepts `null`
    pub fn nullable_param(mut self, name: impl Into<String>, kind: ParamKind) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            kind,
            nullable: true,
        });
        self
    }

    /// Append a single-use callback parameter
    pub fn callback(self, name: impl Into<String>) -> Self {
        self.param(name, ParamKind::Callback)
    }

    /// Make this a promise method; appends the resolve/reject pair
    pub fn promise(mut self) -> Self {
        self.kind = MethodKind::Promise;
        self.param("resolve", ParamKind::Callback)
            .param("reject", ParamKind::Callback)
    }

    /// Mark this method synchronous
    pub fn sync(mut self) -> Self {
        self.kind = MethodKind::Sync;
        self
    }

    /// Method name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Method kind
    pub fn kind(&self) -> MethodKind {
        self.kind
    }

    /// Declared parameters
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Check the signature: callbacks only as the last one or two
    /// parameters, and promise methods end in a callback pair
    pub(crate) fn validate(&self, module: &str) -> Result<(), ModuleError> {
        let invalid = |reason: &str| ModuleError::InvalidSignature {
            module: module.to_string(),
            method: self.name.clone(),
            reason: reason.to_string(),
        };

        let trailing = self
            .params
            .iter()
            .rev()
            .take_while(|p| p.kind.is_callback())
            .count();
        let total = self.params.iter().filter(|p| p.kind.is_callback()).count();

        if total != trailing {
            return Err(invalid("callbacks must be the last parameters"));
        }
        if trailing > 2 {
            return Err(invalid("at most two trailing callbacks are allowed"));
        }
        if self.kind == MethodKind::Promise && trailing != 2 {
            return Err(invalid("promise methods must end with a resolve/reject pair"));
        }
        if self.kind == MethodKind::Sync && trailing != 0 {
            return Err(invalid("sync methods cannot take callbacks"));
        }
        Ok(())
    }
}

impl<M> fmt::Debug for MethodSpec<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodSpec")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("params", &self.params)
            .finish()
    }
}

/// A native module callable from script.
///
/// Lifecycle hooks run on the native-modules queue.
pub trait NativeModule: Send + Sync + 'static {
    /// Unique module name
    fn name(&self) -> &str;

    /// Exported methods; ids are positions in this list
    fn methods(&self) -> Vec<MethodSpec<Self>>
    where
        Self: Sized;

    /// Allow this module to replace an earlier one with the same name
    fn can_override_existing_module(&self) -> bool {
        false
    }

    /// Constants delivered to script at initialization
    fn constants(&self) -> Option<ValueMap> {
        None
    }

    /// Called once after the runtime starts
    fn initialize(&self) {}

    /// Called after each batch of native calls was dispatched
    fn on_batch_complete(&self) {}

    /// Called once at runtime teardown
    fn dispose(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy;

    fn noop(_: &Dummy, _: Arguments) -> MethodResult {
        Ok(())
    }

    #[test]
    fn test_param_kind_accepts() {
        assert!(ParamKind::Int.accepts(&Value::from(3)));
        assert!(!ParamKind::Int.accepts(&Value::from(3.5)));
        assert!(ParamKind::Callback.accepts(&Value::from(7)));
        assert!(!ParamKind::Callback.accepts(&Value::from("7")));
        assert!(ParamKind::Any.accepts(&Value::Null));
        assert!(!ParamKind::Map.accepts(&Value::empty_array()));
    }

    #[test]
    fn test_trailing_callbacks_allowed() {
        let single = MethodSpec::new("a", noop).param("x", ParamKind::Int).callback("cb");
        assert!(single.validate("M").is_ok());

        let pair = MethodSpec::new("b", noop).callback("ok").callback("err");
        assert!(pair.validate("M").is_ok());

        let promise = MethodSpec::new("c", noop).param("x", ParamKind::String).promise();
        assert_eq!(promise.kind(), MethodKind::Promise);
        assert_eq!(promise.params().len(), 3);
        assert!(promise.validate("M").is_ok());
    }

    #[test]
    fn test_callback_in_middle_rejected() {
        let spec = MethodSpec::new("a", noop)
            .callback("cb")
            .param("x", ParamKind::Int);
        assert!(matches!(
            spec.validate("M"),
            Err(ModuleError::InvalidSignature { .. })
        ));
    }

    #[test]
    fn test_three_callbacks_rejected() {
        let spec = MethodSpec::new("a", noop)
            .callback("a")
            .callback("b")
            .callback("c");
        assert!(spec.validate("M").is_err());
    }

    #[test]
    fn test_sync_with_callback_rejected() {
        let spec = MethodSpec::new("a", noop).callback("cb").sync();
        assert!(spec.validate("M").is_err());
    }
}
