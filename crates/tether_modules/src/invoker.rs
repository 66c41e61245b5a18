//! Bridge-facing invoker
//!
//! Connects the transport's [`BridgeCallback`] to the registry. Every call is
//! isolated: a failing or panicking method is reported and the batch moves on
//! to the next call.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tether_bridge::BridgeCallback;
use tether_core::{CallbackSink, MethodId, ModuleId, Value};

use crate::registry::ModuleRegistry;

/// Runs flushed calls against a [`ModuleRegistry`]
pub struct NativeModulesInvoker {
    registry: Arc<ModuleRegistry>,
    callbacks: Arc<dyn CallbackSink>,
    pending_script_calls: AtomicUsize,
}

impl NativeModulesInvoker {
    /// Create an invoker; callback arguments are routed to `callbacks`
    pub fn new(registry: Arc<ModuleRegistry>, callbacks: Arc<dyn CallbackSink>) -> Self {
        Self {
            registry,
            callbacks,
            pending_script_calls: AtomicUsize::new(0),
        }
    }

    /// The registry calls are resolved against
    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    /// Script calls started but not yet fully dispatched
    pub fn pending_script_calls(&self) -> usize {
        self.pending_script_calls.load(Ordering::Acquire)
    }
}

impl BridgeCallback for NativeModulesInvoker {
    fn invoke(&self, module_id: ModuleId, method_id: MethodId, params: Vec<Value>) {
        // Failures were already reported to diagnostics by the registry
        let _ = self.registry.invoke(module_id, method_id, params, &self.callbacks);
    }

    fn on_batch_complete(&self) {
        self.registry.on_batch_complete();
    }

    fn increment_pending_script_calls(&self) {
        self.pending_script_calls.fetch_add(1, Ordering::AcqRel);
    }

    fn decrement_pending_script_calls(&self) {
        let _ = self
            .pending_script_calls
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }
}
