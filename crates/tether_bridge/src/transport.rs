//! Bridge transport
//!
//! [`Bridge`] runs every engine call on the script queue, validates the
//! flushed calls it returns, and hands the batch to the native-modules queue
//! as a single task: each call in index order, then one batch-complete signal.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tether_core::{CallbackId, MethodId, ModuleId, Value};
use tether_queue::{ExecutionQueue, QueueError};

use crate::executor::{ExecutorError, ScriptExecutor};
use crate::flushed::FlushedCalls;
use crate::{BridgeError, BridgeResult};

/// Native side of the bridge; called on the native-modules queue
pub trait BridgeCallback: Send + Sync {
    /// Invoke one native method
    fn invoke(&self, module_id: ModuleId, method_id: MethodId, params: Vec<Value>);

    /// Called once per flush after all of its calls were dispatched
    fn on_batch_complete(&self);

    /// A script call has started
    fn increment_pending_script_calls(&self) {}

    /// A script call and its batch have finished
    fn decrement_pending_script_calls(&self) {}
}

/// Keeps the pending script call counter raised until dropped
struct PendingCall {
    callback: Arc<dyn BridgeCallback>,
}

impl PendingCall {
    fn begin(callback: &Arc<dyn BridgeCallback>) -> Self {
        callback.increment_pending_script_calls();
        Self {
            callback: callback.clone(),
        }
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        self.callback.decrement_pending_script_calls();
    }
}

/// Bridge statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// `call_function` requests
    pub function_calls: u64,
    /// `invoke_callback` requests
    pub callback_invocations: u64,
    /// Batches handed to the native-modules queue
    pub batches_dispatched: u64,
    /// Native calls handed to the native-modules queue
    pub native_calls_dispatched: u64,
    /// Responses rejected by validation
    pub invalid_responses: u64,
    /// Engine failures
    pub executor_errors: u64,
}

#[derive(Default)]
struct StatCounters {
    function_calls: AtomicU64,
    callback_invocations: AtomicU64,
    batches_dispatched: AtomicU64,
    native_calls_dispatched: AtomicU64,
    invalid_responses: AtomicU64,
    executor_errors: AtomicU64,
}

type SharedExecutor = Arc<Mutex<Box<dyn ScriptExecutor>>>;

/// The script/native transport
pub struct Bridge {
    executor: SharedExecutor,
    callback: Arc<dyn BridgeCallback>,
    script_queue: ExecutionQueue,
    native_queue: ExecutionQueue,
    disposed: AtomicBool,
    stats: StatCounters,
}

impl Bridge {
    /// Create a bridge over `executor`, running engine calls on
    /// `script_queue` and native calls on `native_queue`
    pub fn new(
        executor: Box<dyn ScriptExecutor>,
        callback: Arc<dyn BridgeCallback>,
        script_queue: ExecutionQueue,
        native_queue: ExecutionQueue,
    ) -> Self {
        Self {
            executor: Arc::new(Mutex::new(executor)),
            callback,
            script_queue,
            native_queue,
            disposed: AtomicBool::new(false),
            stats: StatCounters::default(),
        }
    }

    /// The queue engine calls run on
    pub fn script_queue(&self) -> &ExecutionQueue {
        &self.script_queue
    }

    /// The queue native calls run on
    pub fn native_queue(&self) -> &ExecutionQueue {
        &self.native_queue
    }

    /// Check if the bridge was disposed
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn ensure_live(&self) -> BridgeResult<()> {
        if self.is_disposed() {
            Err(BridgeError::Disposed)
        } else {
            Ok(())
        }
    }

    /// Call `module.method(args)` in script and dispatch the flushed calls
    pub fn call_function(
        &self,
        module: impl Into<String>,
        method: impl Into<String>,
        args: Vec<Value>,
    ) -> BridgeResult<()> {
        self.ensure_live()?;
        self.stats.function_calls.fetch_add(1, Ordering::Relaxed);

        let module = module.into();
        let method = method.into();
        let context = format!("{}.{}", module, method);
        log::trace!("callFunction {}", context);

        let pending = PendingCall::begin(&self.callback);
        let executor = self.executor.clone();
        let response = self.script_queue.run_sync(move || {
            executor
                .lock()
                .call_function_return_flushed_queue(&module, &method, &args)
        })?;

        self.dispatch(response, pending, &context)
    }

    /// Invoke script callback `id` with `args` and dispatch the flushed calls
    pub fn invoke_callback(&self, id: CallbackId, args: Vec<Value>) -> BridgeResult<()> {
        self.ensure_live()?;
        self.stats.callback_invocations.fetch_add(1, Ordering::Relaxed);
        log::trace!("invokeCallback {}", id);

        let pending = PendingCall::begin(&self.callback);
        let executor = self.executor.clone();
        let response = self.script_queue.run_sync(move || {
            executor
                .lock()
                .invoke_callback_and_return_flushed_queue(id, &args)
        })?;

        self.dispatch(response, pending, &id.to_string())
    }

    /// Define a script global from JSON text
    pub fn set_global_variable(
        &self,
        name: impl Into<String>,
        json_value: impl Into<String>,
    ) -> BridgeResult<()> {
        self.ensure_live()?;

        let name = name.into();
        if name.is_empty() {
            return Err(BridgeError::InvalidArgument(
                "global variable name must not be empty".to_string(),
            ));
        }

        let json_value = json_value.into();
        let executor = self.executor.clone();
        self.script_queue
            .run_sync(move || executor.lock().set_global_variable(&name, &json_value))?
            .map_err(BridgeError::from)
    }

    fn dispatch(
        &self,
        response: Result<Option<Value>, ExecutorError>,
        pending: PendingCall,
        context: &str,
    ) -> BridgeResult<()> {
        let response = response.map_err(|e| {
            self.stats.executor_errors.fetch_add(1, Ordering::Relaxed);
            log::warn!("Script call {} failed: {}", context, e);
            BridgeError::from(e)
        })?;

        let batch = FlushedCalls::from_response(response).map_err(|e| {
            self.stats.invalid_responses.fetch_add(1, Ordering::Relaxed);
            log::warn!("Rejected flushed calls from {}: {}", context, e);
            e
        })?;

        self.stats.batches_dispatched.fetch_add(1, Ordering::Relaxed);
        self.stats
            .native_calls_dispatched
            .fetch_add(batch.len() as u64, Ordering::Relaxed);

        let callback = self.callback.clone();
        self.native_queue.submit(move || {
            for call in batch {
                callback.invoke(call.module_id, call.method_id, call.params);
            }
            callback.on_batch_complete();
            drop(pending);
        })?;
        Ok(())
    }

    /// Get bridge statistics
    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            function_calls: self.stats.function_calls.load(Ordering::Relaxed),
            callback_invocations: self.stats.callback_invocations.load(Ordering::Relaxed),
            batches_dispatched: self.stats.batches_dispatched.load(Ordering::Relaxed),
            native_calls_dispatched: self.stats.native_calls_dispatched.load(Ordering::Relaxed),
            invalid_responses: self.stats.invalid_responses.load(Ordering::Relaxed),
            executor_errors: self.stats.executor_errors.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting calls and release the engine. Runs the engine's
    /// `dispose` on the script queue when it is still running.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        let executor = self.executor.clone();
        match self.script_queue.run_sync(move || executor.lock().dispose()) {
            Ok(()) => {}
            Err(QueueError::QueueDisposed(_)) => self.executor.lock().dispose(),
            Err(e) => log::warn!("Failed to dispose script engine: {}", e),
        }
        log::info!("Bridge disposed");
    }
}
