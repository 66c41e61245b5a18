//! Coalescing event dispatcher

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tether_core::{DiagnosticsSink, Fault, FaultSource, LogDiagnostics, Value, ViewTag};

use crate::event::Event;
use crate::{EventError, EventResult, EMITTER_MODULE};

/// Delivers events to script
pub trait EventEmitter {
    /// Call `module.method(args)` in script
    fn call_function(&self, module: &str, method: &str, args: Vec<Value>) -> EventResult<()>;
}

/// Decides whether a view tag may receive events
pub type TagValidator = Arc<dyn Fn(ViewTag) -> bool + Send + Sync>;

/// Dispatcher statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventStats {
    /// Events accepted by `dispatch`
    pub dispatched: u64,
    /// Events that replaced a pending duplicate
    pub coalesced: u64,
    /// Events handed to script
    pub delivered: u64,
    /// Deliveries that failed
    pub failed: u64,
    /// Events waiting for the next flush
    pub pending: usize,
}

#[derive(Default)]
struct Window {
    events: Vec<Event>,
    /// Position of the pending coalescable event per `(tag, key)`
    index: HashMap<(ViewTag, u16), usize>,
}

/// Buffers events between frames and delivers them on flush
pub struct EventDispatcher {
    window: Mutex<Window>,
    validator: RwLock<Option<TagValidator>>,
    diagnostics: Arc<dyn DiagnosticsSink>,
    dispatched: AtomicU64,
    coalesced: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDispatcher {
    /// Create a dispatcher that logs delivery failures
    pub fn new() -> Self {
        Self::with_diagnostics(Arc::new(LogDiagnostics))
    }

    /// Create a dispatcher reporting delivery failures to `diagnostics`
    pub fn with_diagnostics(diagnostics: Arc<dyn DiagnosticsSink>) -> Self {
        Self {
            window: Mutex::new(Window::default()),
            validator: RwLock::new(None),
            diagnostics,
            dispatched: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Reject events whose tag fails `validator`
    pub fn set_tag_validator(&self, validator: TagValidator) {
        *self.validator.write() = Some(validator);
    }

    /// Queue an event for the next flush
    pub fn dispatch(&self, event: Event) -> EventResult<()> {
        if !event.view_tag.is_valid() {
            return Err(EventError::InvalidTag(event.view_tag));
        }
        if event.event_name.is_empty() {
            return Err(EventError::EmptyName);
        }
        if let Some(validator) = self.validator.read().as_ref() {
            if !validator(event.view_tag) {
                return Err(EventError::UnknownTag(event.view_tag));
            }
        }

        self.dispatched.fetch_add(1, Ordering::Relaxed);
        let mut window = self.window.lock();

        if event.can_coalesce {
            let key = (event.view_tag, event.coalescing_key);
            if let Some(&position) = window.index.get(&key) {
                log::trace!(
                    "Coalescing {} for {} key {}",
                    event.event_name,
                    event.view_tag,
                    event.coalescing_key
                );
                window.events[position] = event;
                self.coalesced.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
            let position = window.events.len();
            window.index.insert(key, position);
        }

        window.events.push(event);
        Ok(())
    }

    /// Number of events waiting for flush
    pub fn pending(&self) -> usize {
        self.window.lock().events.len()
    }

    /// Deliver every pending event in queue order and open a new window.
    ///
    /// A failed delivery is reported and not retried. Returns the number of
    /// events delivered.
    pub fn flush(&self, emitter: &dyn EventEmitter) -> usize {
        let events = {
            let mut window = self.window.lock();
            window.index.clear();
            std::mem::take(&mut window.events)
        };

        let mut delivered = 0;
        for event in events {
            let name = event.event_name.clone();
            let tag = event.view_tag;
            let (method, args) = event.into_call();
            match emitter.call_function(EMITTER_MODULE, method, args) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    self.failed.fetch_add(1, Ordering::Relaxed);
                    self.diagnostics.report(Fault::new(
                        FaultSource::Event,
                        format!("{} on {}", name, tag),
                        e.to_string(),
                    ));
                }
            }
        }

        self.delivered.fetch_add(delivered as u64, Ordering::Relaxed);
        delivered
    }

    /// Drop pending events without delivering them
    pub fn clear(&self) -> usize {
        let mut window = self.window.lock();
        window.index.clear();
        let dropped = window.events.len();
        window.events.clear();
        dropped
    }

    /// Get statistics
    pub fn stats(&self) -> EventStats {
        EventStats {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            pending: self.pending(),
        }
    }
}
