//! Runtime instance
//!
//! [`RuntimeBuilder`] starts the three queues, builds the view manager and
//! native module registries from the packages, creates the bridge and
//! installs the module configuration in script. [`Runtime`] is the host's
//! handle for calling into script, dispatching events and ticking frames.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use tether_bridge::{entry_points, Bridge, BridgeError, BridgeResult, EncodedExecutor, ScriptEngine, ScriptExecutor};
use tether_core::{
    to_json_string, CallbackId, CallbackSink, DiagnosticsSink, Fault, FaultSource, LogDiagnostics,
    Value, ValueMap, ViewTag, WireFormat,
};
use tether_event::{Event, EventDispatcher, EventEmitter, EventError, EventResult};
use tether_modules::{ModuleRegistry, ModuleRegistryBuilder, NativeModulesInvoker};
use tether_queue::{DisposePolicy, ExecutionQueue, QueueFailure, QueueSet};
use tether_ui::{UiOperationQueue, ViewManagerRegistry};

use crate::choreographer::{Choreographer, FrameReport};
use crate::config::RuntimeConfig;
use crate::logging::init_logging;
use crate::modules::{PlatformConstantsModule, UiManagerModule};
use crate::package::{Package, PackageContext};
use crate::{RuntimeError, RuntimeResult};

type ExecutorFactory = Box<dyn FnOnce(WireFormat) -> Box<dyn ScriptExecutor>>;

/// Routes native callback invocations to the script queue
struct ScriptCallbacks {
    bridge: OnceLock<Weak<Bridge>>,
    script: ExecutionQueue,
    diagnostics: Arc<dyn DiagnosticsSink>,
}

impl CallbackSink for ScriptCallbacks {
    fn invoke_callback(&self, id: CallbackId, args: Vec<Value>) {
        let Some(bridge) = self.bridge.get().cloned() else {
            log::warn!("Callback {} invoked before the bridge was ready", id);
            return;
        };

        let diagnostics = self.diagnostics.clone();
        let submitted = self.script.submit(move || {
            let Some(bridge) = bridge.upgrade() else {
                return;
            };
            if let Err(e) = bridge.invoke_callback(id, args) {
                diagnostics.report(Fault::new(FaultSource::Transport, id.to_string(), e.to_string()));
            }
        });
        if let Err(e) = submitted {
            log::warn!("Dropped callback {}: {}", id, e);
        }
    }
}

/// Delivers events through `RCTEventEmitter` calls on the bridge
struct BridgeEmitter<'a>(&'a Bridge);

impl EventEmitter for BridgeEmitter<'_> {
    fn call_function(&self, module: &str, method: &str, args: Vec<Value>) -> EventResult<()> {
        self.0
            .call_function(module, method, args)
            .map_err(|e| EventError::Emit(e.to_string()))
    }
}

/// Builds a [`Runtime`]
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    packages: Vec<Box<dyn Package>>,
    executor: Option<ExecutorFactory>,
    diagnostics: Option<Arc<dyn DiagnosticsSink>>,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
            packages: Vec::new(),
            executor: None,
            diagnostics: None,
        }
    }

    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a package; packages are merged in the order added
    pub fn with_package(mut self, package: impl Package + 'static) -> Self {
        self.packages.push(Box::new(package));
        self
    }

    /// Use an executor that exchanges values directly
    pub fn with_executor(mut self, executor: Box<dyn ScriptExecutor>) -> Self {
        self.executor = Some(Box::new(move |_: WireFormat| executor));
        self
    }

    /// Use an engine that exchanges encoded payloads in the configured
    /// wire format
    pub fn with_engine<E: ScriptEngine + 'static>(mut self, engine: E) -> Self {
        self.executor = Some(Box::new(move |format: WireFormat| {
            Box::new(EncodedExecutor::new(engine, format)) as Box<dyn ScriptExecutor>
        }));
        self
    }

    /// Route runtime faults to `sink` instead of the log
    pub fn with_diagnostics(mut self, sink: Arc<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    /// Start the runtime.
    ///
    /// Installs the `env_logger` backend with the configured filter unless a
    /// logger is already installed.
    pub fn build(self) -> RuntimeResult<Runtime> {
        let Self {
            config,
            packages,
            executor,
            diagnostics,
        } = self;

        if init_logging(&config.log_filter) {
            log::debug!("Logging initialized with filter '{}'", config.log_filter);
        }

        let executor = executor
            .ok_or_else(|| RuntimeError::Config("no script executor configured".to_string()))?;
        let diagnostics = diagnostics.unwrap_or_else(|| Arc::new(LogDiagnostics));

        let queues = QueueSet::spawn(&config.queues)?;
        let sink = diagnostics.clone();
        queues.set_failure_handler(Arc::new(move |failure: &QueueFailure| {
            sink.report(Fault::new(
                FaultSource::Queue,
                failure.queue.clone(),
                failure.message.clone(),
            ));
        }));

        match assemble(config, packages, executor, diagnostics, queues.clone()) {
            Ok(runtime) => Ok(runtime),
            Err(e) => {
                log::error!("Runtime startup failed: {}", e);
                let _ = queues.dispose_all(DisposePolicy::Discard);
                Err(e)
            }
        }
    }
}

fn assemble(
    config: RuntimeConfig,
    packages: Vec<Box<dyn Package>>,
    executor: ExecutorFactory,
    diagnostics: Arc<dyn DiagnosticsSink>,
    queues: QueueSet,
) -> RuntimeResult<Runtime> {
    let mut managers = ViewManagerRegistry::new();
    for package in &packages {
        for manager in package.view_managers() {
            managers.register(manager)?;
        }
    }

    let ui = Arc::new(
        UiOperationQueue::new(queues.layout.clone(), managers).with_diagnostics(diagnostics.clone()),
    );

    let events = Arc::new(EventDispatcher::with_diagnostics(diagnostics.clone()));
    let live = ui.clone();
    events.set_tag_validator(Arc::new(move |tag: ViewTag| live.is_live(tag)));

    let context = PackageContext {
        queues: queues.clone(),
        ui: ui.clone(),
    };
    let mut builder = ModuleRegistryBuilder::new();
    builder.register(UiManagerModule::new(ui.clone()).with_lazy_constants(config.lazy_constants))?;
    builder.register(PlatformConstantsModule::default())?;
    for package in &packages {
        log::debug!("Registering package '{}'", package.name());
        package.register_modules(&mut builder, &context)?;
    }
    let registry = Arc::new(builder.build_with_diagnostics(config.constants_policy(), diagnostics.clone()));

    let callbacks = Arc::new(ScriptCallbacks {
        bridge: OnceLock::new(),
        script: queues.script.clone(),
        diagnostics: diagnostics.clone(),
    });
    let invoker = Arc::new(NativeModulesInvoker::new(registry.clone(), callbacks.clone()));
    let bridge = Arc::new(Bridge::new(
        executor(config.wire_format),
        invoker.clone(),
        queues.script.clone(),
        queues.native_modules.clone(),
    ));
    let _ = callbacks.bridge.set(Arc::downgrade(&bridge));

    let module_config = to_json_string(&registry.describe())?;
    bridge.set_global_variable(entry_points::MODULE_CONFIG, module_config)?;

    let modules = registry.clone();
    queues.native_modules.call_and_wait(move || modules.initialize())?;

    let choreographer = Choreographer::new(ui.clone(), events.clone(), invoker.clone());
    log::info!(
        "Runtime started: {} native modules, {} view managers, {} wire format",
        registry.len(),
        ui.view_manager_names().len(),
        config.wire_format
    );

    Ok(Runtime {
        config,
        queues,
        bridge,
        registry,
        invoker,
        ui,
        events,
        choreographer,
        diagnostics,
        disposed: AtomicBool::new(false),
    })
}

/// A running bridge instance
pub struct Runtime {
    config: RuntimeConfig,
    queues: QueueSet,
    bridge: Arc<Bridge>,
    registry: Arc<ModuleRegistry>,
    invoker: Arc<NativeModulesInvoker>,
    ui: Arc<UiOperationQueue>,
    events: Arc<EventDispatcher>,
    choreographer: Choreographer,
    diagnostics: Arc<dyn DiagnosticsSink>,
    disposed: AtomicBool,
}

impl Runtime {
    /// Start building a runtime
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn queues(&self) -> &QueueSet {
        &self.queues
    }

    pub fn bridge(&self) -> &Arc<Bridge> {
        &self.bridge
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    pub fn ui(&self) -> &Arc<UiOperationQueue> {
        &self.ui
    }

    pub fn events(&self) -> &Arc<EventDispatcher> {
        &self.events
    }

    pub fn choreographer(&self) -> &Choreographer {
        &self.choreographer
    }

    /// Check if the runtime was disposed
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn ensure_live(&self) -> RuntimeResult<()> {
        if self.is_disposed() {
            Err(RuntimeError::Disposed)
        } else {
            Ok(())
        }
    }

    fn report(&self, context: &str, result: BridgeResult<()>) -> RuntimeResult<()> {
        if let Err(e @ (BridgeError::InvalidResponse(_) | BridgeError::Executor(_))) = &result {
            self.diagnostics
                .report(Fault::new(FaultSource::Transport, context, e.to_string()));
        }
        Ok(result?)
    }

    /// Call `module.method(args)` in script
    pub fn call_function(&self, module: &str, method: &str, args: Vec<Value>) -> RuntimeResult<()> {
        self.ensure_live()?;
        let result = self.bridge.call_function(module, method, args);
        self.report(&format!("{}.{}", module, method), result)
    }

    /// Invoke script callback `id`
    pub fn invoke_callback(&self, id: CallbackId, args: Vec<Value>) -> RuntimeResult<()> {
        self.ensure_live()?;
        let result = self.bridge.invoke_callback(id, args);
        self.report(&id.to_string(), result)
    }

    /// Allocate a root view tag and buffer its creation
    pub fn add_root_view(&self, type_name: &str, props: ValueMap) -> RuntimeResult<ViewTag> {
        self.ensure_live()?;
        Ok(self.ui.add_root_view(type_name, props))
    }

    /// Start application `app_key` in the root view `root_tag`
    pub fn run_application(
        &self,
        app_key: &str,
        root_tag: ViewTag,
        initial_props: ValueMap,
    ) -> RuntimeResult<()> {
        let params: Value = [
            ("rootTag", Value::from(root_tag)),
            ("initialProps", Value::from(initial_props)),
        ]
        .into_iter()
        .collect();
        self.call_function("AppRegistry", "runApplication", vec![Value::from(app_key), params])
    }

    /// Queue a native event for the next frame
    pub fn dispatch_event(&self, event: Event) -> RuntimeResult<()> {
        self.ensure_live()?;
        Ok(self.events.dispatch(event)?)
    }

    /// Run one frame: commit UI, deliver events, run idle work
    pub fn on_frame(&self) -> RuntimeResult<FrameReport> {
        self.ensure_live()?;
        Ok(self.choreographer.tick(&BridgeEmitter(&self.bridge))?)
    }

    /// Script calls started but not yet fully dispatched
    pub fn pending_script_calls(&self) -> usize {
        self.invoker.pending_script_calls()
    }

    /// Check if no script call is in flight
    pub fn is_idle(&self) -> bool {
        self.choreographer.is_idle()
    }

    /// Tear down modules, the bridge and the queues.
    ///
    /// Pending events are dropped. Queued tasks are drained or discarded per
    /// the configured dispose policy. Calling this more than once is a no-op.
    pub fn dispose(&self) -> RuntimeResult<()> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let dropped = self.events.clear();
        if dropped > 0 {
            log::debug!("Dropped {} pending events", dropped);
        }

        let modules = self.registry.clone();
        if let Err(e) = self.queues.native_modules.run_sync(move || modules.dispose()) {
            log::warn!("Failed to dispose native modules: {}", e);
        }
        self.bridge.dispose();
        self.queues.dispose_all(self.config.dispose_policy)?;
        log::info!("Runtime disposed");
        Ok(())
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        if let Err(e) = self.dispose() {
            log::warn!("Runtime dispose on drop failed: {}", e);
        }
    }
}
