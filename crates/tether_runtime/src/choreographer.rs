//! Frame choreographer
//!
//! Each frame tick runs its phases in a fixed order:
//!
//! | Phase | Work |
//! |---|---|
//! | `DispatchUi` | commit buffered UI operations |
//! | `ScriptEvents` | deliver the pending event window to script |
//! | `Idle` | run idle callbacks, only when no script call is pending |
//!
//! Frame callbacks posted for a phase run once, on the next tick.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tether_event::{EventDispatcher, EventEmitter};
use tether_modules::NativeModulesInvoker;
use tether_ui::{BatchId, UiOperationQueue, UiResult};

/// Phases of one frame, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramePhase {
    DispatchUi,
    ScriptEvents,
    Idle,
}

impl FramePhase {
    /// All phases in execution order
    pub const ALL: [FramePhase; 3] = [Self::DispatchUi, Self::ScriptEvents, Self::Idle];

    fn index(self) -> usize {
        match self {
            Self::DispatchUi => 0,
            Self::ScriptEvents => 1,
            Self::Idle => 2,
        }
    }
}

/// One-shot callback run during a phase of the next frame
pub type FrameCallback = Box<dyn FnOnce(u64) + Send>;

/// Callback run on every idle frame with the frame number
pub type IdleCallback = Arc<dyn Fn(u64) + Send + Sync>;

/// What happened during one tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub frame: u64,
    /// Batch committed in `DispatchUi`
    pub committed: Option<BatchId>,
    /// Events delivered in `ScriptEvents`
    pub events_delivered: usize,
    /// Whether the idle phase ran
    pub idle: bool,
    /// Frame and idle callbacks run
    pub callbacks_run: usize,
}

/// Drives UI commits, event delivery and idle work once per frame
pub struct Choreographer {
    ui: Arc<UiOperationQueue>,
    events: Arc<EventDispatcher>,
    invoker: Arc<NativeModulesInvoker>,
    frame_callbacks: Mutex<[Vec<FrameCallback>; 3]>,
    idle_callbacks: Mutex<Vec<IdleCallback>>,
    frame: AtomicU64,
}

impl Choreographer {
    pub fn new(
        ui: Arc<UiOperationQueue>,
        events: Arc<EventDispatcher>,
        invoker: Arc<NativeModulesInvoker>,
    ) -> Self {
        Self {
            ui,
            events,
            invoker,
            frame_callbacks: Mutex::new([Vec::new(), Vec::new(), Vec::new()]),
            idle_callbacks: Mutex::new(Vec::new()),
            frame: AtomicU64::new(0),
        }
    }

    /// Run `callback` once during `phase` of the next frame
    pub fn post_frame_callback(&self, phase: FramePhase, callback: FrameCallback) {
        self.frame_callbacks.lock()[phase.index()].push(callback);
    }

    /// Run `callback` on every frame whose idle phase runs
    pub fn add_idle_callback(&self, callback: IdleCallback) {
        self.idle_callbacks.lock().push(callback);
    }

    /// Number of frames ticked so far
    pub fn frames(&self) -> u64 {
        self.frame.load(Ordering::Relaxed)
    }

    /// Check if no script call is in flight
    pub fn is_idle(&self) -> bool {
        self.invoker.pending_script_calls() == 0
    }

    fn run_posted(&self, phase: FramePhase, frame: u64) -> usize {
        let callbacks = std::mem::take(&mut self.frame_callbacks.lock()[phase.index()]);
        let count = callbacks.len();
        for callback in callbacks {
            callback(frame);
        }
        count
    }

    /// Run one frame
    pub fn tick(&self, emitter: &dyn EventEmitter) -> UiResult<FrameReport> {
        let frame = self.frame.fetch_add(1, Ordering::Relaxed) + 1;
        let mut report = FrameReport {
            frame,
            ..FrameReport::default()
        };

        report.callbacks_run += self.run_posted(FramePhase::DispatchUi, frame);
        report.committed = self.ui.commit()?;

        report.callbacks_run += self.run_posted(FramePhase::ScriptEvents, frame);
        report.events_delivered = self.events.flush(emitter);

        if self.is_idle() {
            report.idle = true;
            report.callbacks_run += self.run_posted(FramePhase::Idle, frame);
            let idle = self.idle_callbacks.lock().clone();
            for callback in idle {
                callback(frame);
                report.callbacks_run += 1;
            }
        }

        log::trace!("Frame {} done: {:?}", frame, report);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tether_core::{CallbackId, CallbackSink, Value, ViewTag};
    use tether_event::{Event, EventResult};
    use tether_modules::{ConstantsPolicy, ModuleRegistryBuilder};
    use tether_bridge::BridgeCallback;
    use tether_queue::{DisposePolicy, ExecutionQueue, QueueSpec};
    use tether_ui::ViewManagerRegistry;

    struct NullSink;

    impl CallbackSink for NullSink {
        fn invoke_callback(&self, _: CallbackId, _: Vec<Value>) {}
    }

    #[derive(Default)]
    struct CountingEmitter {
        calls: AtomicUsize,
    }

    impl EventEmitter for CountingEmitter {
        fn call_function(&self, _: &str, _: &str, _: Vec<Value>) -> EventResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn choreographer() -> (Choreographer, Arc<NativeModulesInvoker>, ExecutionQueue) {
        let layout = ExecutionQueue::spawn(QueueSpec::new("chore.layout")).unwrap();
        let ui = Arc::new(UiOperationQueue::new(layout.clone(), ViewManagerRegistry::new()));
        let registry = Arc::new(ModuleRegistryBuilder::new().build(ConstantsPolicy::Eager));
        let invoker = Arc::new(NativeModulesInvoker::new(registry, Arc::new(NullSink)));
        let events = Arc::new(EventDispatcher::new());
        (Choreographer::new(ui, events, invoker.clone()), invoker, layout)
    }

    #[test]
    fn test_phases_run_in_order() {
        let (chore, _, layout) = choreographer();
        let order = Arc::new(Mutex::new(Vec::new()));
        for phase in [FramePhase::Idle, FramePhase::ScriptEvents, FramePhase::DispatchUi] {
            let order = order.clone();
            chore.post_frame_callback(phase, Box::new(move |_| order.lock().push(phase)));
        }

        let report = chore.tick(&CountingEmitter::default()).unwrap();
        assert_eq!(*order.lock(), FramePhase::ALL.to_vec());
        assert_eq!(report.callbacks_run, 3);

        // Posted callbacks are one-shot
        assert_eq!(chore.tick(&CountingEmitter::default()).unwrap().callbacks_run, 0);
        layout.drain_and_dispose(DisposePolicy::Drain).unwrap();
    }

    #[test]
    fn test_idle_skipped_while_script_busy() {
        let (chore, invoker, layout) = choreographer();
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = ran.clone();
        chore.add_idle_callback(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        invoker.increment_pending_script_calls();
        assert!(!chore.tick(&CountingEmitter::default()).unwrap().idle);
        invoker.decrement_pending_script_calls();
        assert!(chore.tick(&CountingEmitter::default()).unwrap().idle);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(chore.frames(), 2);
        layout.drain_and_dispose(DisposePolicy::Drain).unwrap();
    }

    #[test]
    fn test_tick_flushes_events() {
        let (chore, _, layout) = choreographer();
        chore
            .events
            .dispatch(Event::new(ViewTag::new(1), "topChange", Value::Null))
            .unwrap();
        let emitter = CountingEmitter::default();
        assert_eq!(chore.tick(&emitter).unwrap().events_delivered, 1);
        assert_eq!(emitter.calls.load(Ordering::SeqCst), 1);
        layout.drain_and_dispose(DisposePolicy::Drain).unwrap();
    }
}
