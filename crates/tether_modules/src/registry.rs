//! Native module registry
//!
//! Modules are registered once, single-threaded, through
//! [`ModuleRegistryBuilder`]. The built [`ModuleRegistry`] is immutable
//! and shared by the native-modules queue.
//!
//! Module ids are registration order. A module that overrides an earlier one
//! with the same name takes over its id slot.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use tether_core::recovery::catch_panic;
use tether_core::{
    CallbackSink, DiagnosticsSink, Fault, FaultSource, LogDiagnostics, MethodId, ModuleId, Value,
    ValueMap,
};

use crate::arguments::Arguments;
use crate::module::{MethodKind, NativeModule, ParamSpec};
use crate::{InvokeError, MethodError, MethodResult, ModuleError};

/// When module constants are collected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConstantsPolicy {
    /// At registry build time
    #[default]
    Eager,
    /// On first request
    Lazy,
}

type ErasedHandler = Arc<dyn Fn(Arguments) -> MethodResult + Send + Sync>;

struct MethodEntry {
    name: String,
    kind: MethodKind,
    params: Vec<ParamSpec>,
    handler: ErasedHandler,
}

struct ModuleEntry {
    name: String,
    module: Arc<dyn NativeModule>,
    methods: Vec<MethodEntry>,
    method_ids: HashMap<String, MethodId>,
    constants: OnceLock<Option<ValueMap>>,
}

impl ModuleEntry {
    fn new<M: NativeModule>(module: Arc<M>) -> Result<Self, ModuleError> {
        let name = module.name().to_string();
        if name.is_empty() {
            return Err(ModuleError::EmptyName);
        }

        let specs = module.methods();
        let mut methods = Vec::with_capacity(specs.len());
        let mut method_ids = HashMap::with_capacity(specs.len());

        for spec in specs {
            spec.validate(&name)?;
            let id = MethodId::new(methods.len() as u32);
            if method_ids.insert(spec.name.clone(), id).is_some() {
                return Err(ModuleError::DuplicateMethodName {
                    module: name,
                    method: spec.name,
                });
            }

            let target = module.clone();
            let handler = spec.handler;
            methods.push(MethodEntry {
                name: spec.name,
                kind: spec.kind,
                params: spec.params,
                handler: Arc::new(move |args| handler(&*target, args)),
            });
        }

        Ok(Self {
            name,
            module,
            methods,
            method_ids,
            constants: OnceLock::new(),
        })
    }

    fn method_ids_of_kind(&self, kind: MethodKind) -> Value {
        Value::Array(
            self.methods
                .iter()
                .enumerate()
                .filter(|(_, m)| m.kind == kind)
                .map(|(i, _)| Value::from(i))
                .collect(),
        )
    }
}

/// Collects modules before the runtime starts
#[derive(Default)]
pub struct ModuleRegistryBuilder {
    entries: Vec<ModuleEntry>,
    by_name: HashMap<String, usize>,
}

impl ModuleRegistryBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module
    pub fn register<M: NativeModule>(&mut self, module: M) -> Result<ModuleId, ModuleError> {
        self.register_arc(Arc::new(module))
    }

    /// Register a module that the caller keeps a handle to
    pub fn register_arc<M: NativeModule>(&mut self, module: Arc<M>) -> Result<ModuleId, ModuleError> {
        let can_override = module.can_override_existing_module();
        let entry = ModuleEntry::new(module)?;

        if let Some(&index) = self.by_name.get(&entry.name) {
            if !can_override {
                return Err(ModuleError::DuplicateModule(entry.name));
            }
            log::info!("Module '{}' overrides an existing module", entry.name);
            self.entries[index] = entry;
            return Ok(ModuleId::new(index as u32));
        }

        let index = self.entries.len();
        log::debug!("Registered module '{}' as {}", entry.name, index);
        self.by_name.insert(entry.name.clone(), index);
        self.entries.push(entry);
        Ok(ModuleId::new(index as u32))
    }

    /// Number of registered modules
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no module was registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check if a module name is taken
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Freeze the registry, reporting faults to the log
    pub fn build(self, policy: ConstantsPolicy) -> ModuleRegistry {
        self.build_with_diagnostics(policy, Arc::new(LogDiagnostics))
    }

    /// Freeze the registry, reporting faults to `diagnostics`
    pub fn build_with_diagnostics(
        self,
        policy: ConstantsPolicy,
        diagnostics: Arc<dyn DiagnosticsSink>,
    ) -> ModuleRegistry {
        let registry = ModuleRegistry {
            by_name: self
                .by_name
                .into_iter()
                .map(|(name, index)| (name, ModuleId::new(index as u32)))
                .collect(),
            entries: self.entries,
            policy,
            diagnostics,
            stats: StatCounters::default(),
        };

        if policy == ConstantsPolicy::Eager {
            for entry in &registry.entries {
                registry.constants_of(entry);
            }
        }
        registry
    }
}

/// Registry statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Calls that reached a handler
    pub invocations: u64,
    /// Calls rejected before the handler ran
    pub rejected: u64,
    /// Handlers that returned an error or panicked
    pub failures: u64,
}

#[derive(Default)]
struct StatCounters {
    invocations: AtomicU64,
    rejected: AtomicU64,
    failures: AtomicU64,
}

/// Immutable table of native modules
pub struct ModuleRegistry {
    entries: Vec<ModuleEntry>,
    by_name: HashMap<String, ModuleId>,
    policy: ConstantsPolicy,
    diagnostics: Arc<dyn DiagnosticsSink>,
    stats: StatCounters,
}

impl ModuleRegistry {
    /// Number of modules
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Constants policy in effect
    pub fn constants_policy(&self) -> ConstantsPolicy {
        self.policy
    }

    /// Module names in id order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Look up a module id by name
    pub fn module_id(&self, name: &str) -> Option<ModuleId> {
        self.by_name.get(name).copied()
    }

    /// Look up a module by name
    pub fn module(&self, name: &str) -> Option<Arc<dyn NativeModule>> {
        let id = self.module_id(name)?;
        self.entries.get(id.index()).map(|e| e.module.clone())
    }

    /// Look up a method id by module and method name
    pub fn method_id(&self, module: &str, method: &str) -> Option<MethodId> {
        let id = self.module_id(module)?;
        self.entries.get(id.index())?.method_ids.get(method).copied()
    }

    fn constants_of(&self, entry: &ModuleEntry) -> Option<ValueMap> {
        entry
            .constants
            .get_or_init(|| {
                let module = entry.module.clone();
                match catch_panic(move || module.constants()) {
                    Ok(constants) => constants,
                    Err(message) => {
                        self.diagnostics.report(Fault::new(
                            FaultSource::NativeMethod,
                            format!("{}.constants", entry.name),
                            message,
                        ));
                        None
                    }
                }
            })
            .clone()
    }

    /// Constants of a module, collected once
    pub fn constants(&self, id: ModuleId) -> Option<ValueMap> {
        self.entries.get(id.index()).and_then(|e| self.constants_of(e))
    }

    /// Describe every module for the script side:
    /// `{"remoteModuleConfig": [[name, constants, methods, promiseIds, syncIds], ...]}`
    pub fn describe(&self) -> Value {
        let modules = self
            .entries
            .iter()
            .map(|entry| {
                let methods = entry
                    .methods
                    .iter()
                    .map(|m| Value::from(m.name.as_str()))
                    .collect::<Vec<_>>();
                Value::Array(vec![
                    Value::from(entry.name.as_str()),
                    Value::from(self.constants_of(entry)),
                    Value::Array(methods),
                    entry.method_ids_of_kind(MethodKind::Promise),
                    entry.method_ids_of_kind(MethodKind::Sync),
                ])
            })
            .collect::<Vec<_>>();

        [("remoteModuleConfig", Value::Array(modules))]
            .into_iter()
            .collect()
    }

    /// Invoke a method. Failures are reported to diagnostics and returned.
    pub fn invoke(
        &self,
        module_id: ModuleId,
        method_id: MethodId,
        params: Vec<Value>,
        sink: &Arc<dyn CallbackSink>,
    ) -> Result<(), InvokeError> {
        let result = self.try_invoke(module_id, method_id, params, sink);
        if let Err(e) = &result {
            let context = self.context(module_id, method_id);
            self.diagnostics
                .report(Fault::new(FaultSource::NativeMethod, context, e.to_string()));
        }
        result
    }

    fn context(&self, module_id: ModuleId, method_id: MethodId) -> String {
        match self.entries.get(module_id.index()) {
            Some(entry) => match entry.methods.get(method_id.index()) {
                Some(method) => format!("{}.{}", entry.name, method.name),
                None => format!("{}.{}", entry.name, method_id),
            },
            None => format!("{}.{}", module_id, method_id),
        }
    }

    fn try_invoke(
        &self,
        module_id: ModuleId,
        method_id: MethodId,
        params: Vec<Value>,
        sink: &Arc<dyn CallbackSink>,
    ) -> Result<(), InvokeError> {
        let reject = |e: InvokeError| {
            self.stats.rejected.fetch_add(1, Ordering::Relaxed);
            e
        };

        let entry = self
            .entries
            .get(module_id.index())
            .ok_or_else(|| reject(InvokeError::UnknownModule(module_id)))?;
        let method = entry.methods.get(method_id.index()).ok_or_else(|| {
            reject(InvokeError::UnknownMethod {
                module: entry.name.clone(),
                method_id,
            })
        })?;

        let args = Arguments::decode(&entry.name, &method.name, &method.params, params, sink)
            .map_err(reject)?;

        self.stats.invocations.fetch_add(1, Ordering::Relaxed);
        log::trace!("invoke {}.{}", entry.name, method.name);

        let handler = method.handler.clone();
        let outcome = catch_panic(move || handler(args));
        let failure = match outcome {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(MethodError::Failed(message))) => InvokeError::MethodFailed {
                module: entry.name.clone(),
                method: method.name.clone(),
                message,
            },
            Ok(Err(other)) => InvokeError::MethodFailed {
                module: entry.name.clone(),
                method: method.name.clone(),
                message: other.to_string(),
            },
            Err(message) => InvokeError::MethodPanicked {
                module: entry.name.clone(),
                method: method.name.clone(),
                message,
            },
        };
        self.stats.failures.fetch_add(1, Ordering::Relaxed);
        Err(failure)
    }

    fn for_each_module(&self, hook: &str, f: impl Fn(&dyn NativeModule)) {
        for entry in &self.entries {
            let module = entry.module.clone();
            if let Err(message) = catch_panic(|| f(module.as_ref())) {
                self.diagnostics.report(Fault::new(
                    FaultSource::NativeMethod,
                    format!("{}.{}", entry.name, hook),
                    message,
                ));
            }
        }
    }

    /// Run every module's `initialize` hook
    pub fn initialize(&self) {
        self.for_each_module("initialize", |m| m.initialize());
    }

    /// Run every module's `on_batch_complete` hook
    pub fn on_batch_complete(&self) {
        self.for_each_module("onBatchComplete", |m| m.on_batch_complete());
    }

    /// Run every module's `dispose` hook
    pub fn dispose(&self) {
        self.for_each_module("dispose", |m| m.dispose());
    }

    /// Get registry statistics
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            invocations: self.stats.invocations.load(Ordering::Relaxed),
            rejected: self.stats.rejected.load(Ordering::Relaxed),
            failures: self.stats.failures.load(Ordering::Relaxed),
        }
    }
}
