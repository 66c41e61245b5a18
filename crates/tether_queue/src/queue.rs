//! Serial execution queue
//!
//! Each [`ExecutionQueue`] owns one dedicated worker thread fed by a
//! `crossbeam-channel`. Handles are cheap to clone and are passed explicitly
//! to every component that needs to post work; there is no ambient "current
//! dispatcher" lookup.
//!
//! # Lifecycle
//!
//! ```text
//! Created ──start()──► Running ──drain_and_dispose()──► Draining ──► Disposed
//! ```
//!
//! Tasks submitted while `Created` are buffered until the worker starts.
//! Submissions after disposal begins fail with [`QueueError::QueueDisposed`].

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tether_core::recovery::{catch_panic, panic_message};

use crate::{QueueError, QueueResult};

static NEXT_QUEUE_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Id of the queue whose worker is running on this thread (0 = none)
    static CURRENT_QUEUE: Cell<u64> = Cell::new(0);
}

/// Unique queue identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueId(u64);

impl QueueId {
    fn next() -> Self {
        Self(NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Queue construction parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSpec {
    /// Queue name, also used as the worker thread name
    pub name: String,
    /// Worker stack size in bytes (platform default if unset)
    pub stack_size: Option<usize>,
}

impl QueueSpec {
    /// Create a spec with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stack_size: None,
        }
    }

    /// Set the worker stack size
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }
}

impl Default for QueueSpec {
    fn default() -> Self {
        Self::new("queue")
    }
}

/// Queue lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueState {
    /// Constructed, worker not started yet
    Created,
    /// Worker running
    Running,
    /// Disposal in progress; no new tasks accepted
    Draining,
    /// Worker stopped
    Disposed,
}

impl QueueState {
    /// Check if new tasks are accepted in this state
    pub fn accepts_tasks(self) -> bool {
        matches!(self, Self::Created | Self::Running)
    }
}

/// What happens to queued tasks at disposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisposePolicy {
    /// Run every task already queued, then stop
    #[default]
    Drain,
    /// Drop queued tasks without running them
    Discard,
}

/// A task that panicked on a queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueFailure {
    /// Queue name
    pub queue: String,
    /// Panic message
    pub message: String,
}

/// Receives task failures; runs on the failing queue's worker
pub type FailureHandler = Arc<dyn Fn(&QueueFailure) + Send + Sync>;

fn log_failure_handler() -> FailureHandler {
    Arc::new(|failure: &QueueFailure| {
        log::error!("Task panicked on queue '{}': {}", failure.queue, failure.message);
    })
}

/// Queue statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Tasks accepted
    pub submitted: u64,
    /// Tasks that ran to completion
    pub completed: u64,
    /// Tasks that panicked
    pub panicked: u64,
    /// Tasks dropped at disposal
    pub discarded: u64,
    /// Tasks waiting or running
    pub pending: usize,
}

type Task = Box<dyn FnOnce() + Send + 'static>;

/// State shared between the handles and the worker thread
struct Shared {
    id: QueueId,
    name: String,
    pending: AtomicUsize,
    discarding: AtomicBool,
    submitted: AtomicU64,
    completed: AtomicU64,
    panicked: AtomicU64,
    discarded: AtomicU64,
    failure_handler: RwLock<FailureHandler>,
}

impl Shared {
    fn report_failure(&self, message: String) {
        self.panicked.fetch_add(1, Ordering::Relaxed);
        let failure = QueueFailure {
            queue: self.name.clone(),
            message,
        };
        let handler = self.failure_handler.read().clone();
        handler(&failure);
    }

    fn discard(&self, task: Task) {
        drop(task);
        self.discarded.fetch_add(1, Ordering::Relaxed);
        self.pending.fetch_sub(1, Ordering::AcqRel);
    }

    fn run(self: Arc<Self>, receiver: Receiver<Task>) {
        CURRENT_QUEUE.with(|current| current.set(self.id.0));
        log::info!("Queue '{}' started", self.name);

        for task in receiver.iter() {
            if self.discarding.load(Ordering::Acquire) {
                self.discard(task);
                continue;
            }

            match catch_panic(task) {
                Ok(()) => {
                    self.completed.fetch_add(1, Ordering::Relaxed);
                }
                Err(message) => self.report_failure(message),
            }
            self.pending.fetch_sub(1, Ordering::AcqRel);
        }

        CURRENT_QUEUE.with(|current| current.set(0));
        log::info!("Queue '{}' stopped", self.name);
    }
}

struct Inner {
    shared: Arc<Shared>,
    /// Lock order: `sender` before `state`
    sender: Mutex<Option<Sender<Task>>>,
    state: Mutex<QueueState>,
    /// Held until the worker starts
    receiver: Mutex<Option<Receiver<Task>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    stack_size: Option<usize>,
}

/// Handle to a serial execution queue
#[derive(Clone)]
pub struct ExecutionQueue {
    inner: Arc<Inner>,
}

impl ExecutionQueue {
    /// Create a queue in the `Created` state
    pub fn new(spec: QueueSpec) -> Self {
        let (sender, receiver) = unbounded();
        let shared = Arc::new(Shared {
            id: QueueId::next(),
            name: spec.name,
            pending: AtomicUsize::new(0),
            discarding: AtomicBool::new(false),
            submitted: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
            failure_handler: RwLock::new(log_failure_handler()),
        });

        Self {
            inner: Arc::new(Inner {
                shared,
                sender: Mutex::new(Some(sender)),
                state: Mutex::new(QueueState::Created),
                receiver: Mutex::new(Some(receiver)),
                worker: Mutex::new(None),
                stack_size: spec.stack_size,
            }),
        }
    }

    /// Create and start a queue
    pub fn spawn(spec: QueueSpec) -> QueueResult<Self> {
        let queue = Self::new(spec);
        queue.start()?;
        Ok(queue)
    }

    /// Start the worker thread
    pub fn start(&self) -> QueueResult<()> {
        let name = self.name().to_string();
        let mut state = self.inner.state.lock();
        match *state {
            QueueState::Created => {}
            QueueState::Running => return Ok(()),
            QueueState::Draining | QueueState::Disposed => {
                return Err(QueueError::QueueDisposed(name));
            }
        }

        let receiver = self
            .inner
            .receiver
            .lock()
            .take()
            .ok_or_else(|| QueueError::QueueDisposed(name.clone()))?;

        let shared = self.inner.shared.clone();
        let mut builder = thread::Builder::new().name(name.clone());
        if let Some(size) = self.inner.stack_size {
            builder = builder.stack_size(size);
        }

        match builder.spawn(move || shared.run(receiver)) {
            Ok(handle) => {
                *self.inner.worker.lock() = Some(handle);
                *state = QueueState::Running;
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to spawn worker for queue '{}': {}", name, e);
                *state = QueueState::Disposed;
                drop(state);
                self.inner.sender.lock().take();
                Err(QueueError::SpawnFailed {
                    queue: name,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Get the queue id
    pub fn id(&self) -> QueueId {
        self.inner.shared.id
    }

    /// Get the queue name
    pub fn name(&self) -> &str {
        &self.inner.shared.name
    }

    /// Get the current lifecycle state
    pub fn state(&self) -> QueueState {
        *self.inner.state.lock()
    }

    /// Check whether the calling thread is this queue's worker
    pub fn is_current(&self) -> bool {
        CURRENT_QUEUE.with(|current| current.get() == self.inner.shared.id.0)
    }

    /// Fail unless called from this queue's worker
    pub fn ensure_current(&self) -> QueueResult<()> {
        if self.is_current() {
            Ok(())
        } else {
            Err(QueueError::WrongQueue {
                expected: self.name().to_string(),
            })
        }
    }

    /// Number of tasks waiting or running
    pub fn pending_tasks(&self) -> usize {
        self.inner.shared.pending.load(Ordering::Acquire)
    }

    /// Get queue statistics
    pub fn stats(&self) -> QueueStats {
        let shared = &self.inner.shared;
        QueueStats {
            submitted: shared.submitted.load(Ordering::Relaxed),
            completed: shared.completed.load(Ordering::Relaxed),
            panicked: shared.panicked.load(Ordering::Relaxed),
            discarded: shared.discarded.load(Ordering::Relaxed),
            pending: shared.pending.load(Ordering::Acquire),
        }
    }

    /// Replace the failure handler
    pub fn set_failure_handler(&self, handler: FailureHandler) {
        *self.inner.shared.failure_handler.write() = handler;
    }

    /// Post a task; returns once the task is queued
    pub fn submit<F>(&self, task: F) -> QueueResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.inner.sender.lock();
        let state = *self.inner.state.lock();
        let sender = match (state.accepts_tasks(), sender.as_ref()) {
            (true, Some(sender)) => sender,
            _ => return Err(QueueError::QueueDisposed(self.name().to_string())),
        };

        let shared = &self.inner.shared;
        shared.pending.fetch_add(1, Ordering::AcqRel);
        if sender.send(Box::new(task)).is_err() {
            shared.pending.fetch_sub(1, Ordering::AcqRel);
            return Err(QueueError::QueueDisposed(self.name().to_string()));
        }
        shared.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Run a task on this queue and block until it returns.
    ///
    /// Fails with [`QueueError::ReentrantBlockingCall`] when called from this
    /// queue's own worker, with [`QueueError::QueueDisposed`] if the task is
    /// discarded, and with [`QueueError::TaskPanicked`] if it panics. A queue
    /// that was never started holds the caller until it is.
    pub fn call_and_wait<F, R>(&self, f: F) -> QueueResult<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_current() {
            return Err(QueueError::ReentrantBlockingCall(self.name().to_string()));
        }

        let (reply_tx, reply_rx) = bounded::<Result<R, String>>(1);
        self.submit(move || match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => {
                let _ = reply_tx.send(Ok(value));
            }
            Err(payload) => {
                let _ = reply_tx.send(Err(panic_message(payload.as_ref())));
                // Let the worker report it like any other panicking task
                panic::resume_unwind(payload);
            }
        })?;

        match reply_rx.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(message)) => Err(QueueError::TaskPanicked {
                queue: self.name().to_string(),
                message,
            }),
            Err(_) => Err(QueueError::QueueDisposed(self.name().to_string())),
        }
    }

    /// Run `f` inline when already on this queue, otherwise via
    /// [`call_and_wait`](Self::call_and_wait)
    pub fn run_sync<F, R>(&self, f: F) -> QueueResult<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_current() {
            Ok(f())
        } else {
            self.call_and_wait(f)
        }
    }

    /// Stop accepting tasks, drain or discard what is queued, and join the
    /// worker. Calling it again after disposal is a no-op.
    pub fn drain_and_dispose(&self, policy: DisposePolicy) -> QueueResult<()> {
        if self.is_current() {
            return Err(QueueError::ReentrantBlockingCall(self.name().to_string()));
        }

        let sender = {
            let mut sender = self.inner.sender.lock();
            let mut state = self.inner.state.lock();
            if matches!(*state, QueueState::Draining | QueueState::Disposed) {
                return Ok(());
            }
            *state = QueueState::Draining;
            if policy == DisposePolicy::Discard {
                self.inner.shared.discarding.store(true, Ordering::Release);
            }
            sender.take()
        };
        // Closing the channel ends the worker loop once the backlog is consumed
        drop(sender);

        // Never started: nothing will run the buffered tasks
        if let Some(receiver) = self.inner.receiver.lock().take() {
            for task in receiver.try_iter() {
                self.inner.shared.discard(task);
            }
        }

        let worker = self.inner.worker.lock().take();
        if let Some(handle) = worker {
            if handle.join().is_err() {
                log::error!("Worker for queue '{}' terminated abnormally", self.name());
            }
        }

        *self.inner.state.lock() = QueueState::Disposed;
        log::info!("Queue '{}' disposed ({:?})", self.name(), policy);
        Ok(())
    }
}

impl fmt::Debug for ExecutionQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionQueue")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("state", &self.state())
            .field("pending", &self.pending_tasks())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn queue(name: &str) -> ExecutionQueue {
        ExecutionQueue::spawn(QueueSpec::new(name)).unwrap()
    }

    #[test]
    fn test_fifo_order() {
        let q = queue("test.fifo");
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..100 {
            let seen = seen.clone();
            q.submit(move || seen.lock().push(i)).unwrap();
        }
        q.drain_and_dispose(DisposePolicy::Drain).unwrap();

        assert_eq!(*seen.lock(), (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_is_current() {
        let q = queue("test.current");
        assert!(!q.is_current());

        let inner = q.clone();
        assert!(q.call_and_wait(move || inner.is_current()).unwrap());
        q.drain_and_dispose(DisposePolicy::Drain).unwrap();
    }

    #[test]
    fn test_reentrant_call_and_wait_is_rejected() {
        let q = queue("test.reentrant");
        let inner = q.clone();

        let result = q
            .call_and_wait(move || inner.call_and_wait(|| 1))
            .unwrap();
        assert_eq!(
            result,
            Err(QueueError::ReentrantBlockingCall("test.reentrant".into()))
        );
        q.drain_and_dispose(DisposePolicy::Drain).unwrap();
    }

    #[test]
    fn test_run_sync_inline_on_own_queue() {
        let q = queue("test.run_sync");
        let inner = q.clone();

        let result = q.call_and_wait(move || inner.run_sync(|| 5)).unwrap();
        assert_eq!(result, Ok(5));
        q.drain_and_dispose(DisposePolicy::Drain).unwrap();
    }

    #[test]
    fn test_panicking_task_does_not_stop_queue() {
        let q = queue("test.panic");
        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink = failures.clone();
        q.set_failure_handler(Arc::new(move |failure: &QueueFailure| {
            sink.lock().push(failure.message.clone());
        }));

        q.submit(|| panic!("boom")).unwrap();
        assert_eq!(q.call_and_wait(|| 2 + 2).unwrap(), 4);

        assert_eq!(*failures.lock(), vec!["boom".to_string()]);
        assert_eq!(q.stats().panicked, 1);
        q.drain_and_dispose(DisposePolicy::Drain).unwrap();
    }

    #[test]
    fn test_call_and_wait_reports_panic() {
        let q = queue("test.wait_panic");
        q.set_failure_handler(Arc::new(|_: &QueueFailure| {}));

        let result: QueueResult<()> = q.call_and_wait(|| panic!("bad task"));
        assert_eq!(
            result,
            Err(QueueError::TaskPanicked {
                queue: "test.wait_panic".into(),
                message: "bad task".into(),
            })
        );
        q.drain_and_dispose(DisposePolicy::Drain).unwrap();
    }

    #[test]
    fn test_submit_after_dispose_fails() {
        let q = queue("test.disposed");
        q.drain_and_dispose(DisposePolicy::Drain).unwrap();

        assert_eq!(q.state(), QueueState::Disposed);
        assert_eq!(
            q.submit(|| {}),
            Err(QueueError::QueueDisposed("test.disposed".into()))
        );
        assert!(q.call_and_wait(|| ()).is_err());
        // Idempotent
        q.drain_and_dispose(DisposePolicy::Drain).unwrap();
    }

    #[test]
    fn test_dispose_from_own_queue_is_rejected() {
        let q = queue("test.self_dispose");
        let inner = q.clone();

        let result = q
            .call_and_wait(move || inner.drain_and_dispose(DisposePolicy::Drain))
            .unwrap();
        assert!(matches!(result, Err(QueueError::ReentrantBlockingCall(_))));
        q.drain_and_dispose(DisposePolicy::Drain).unwrap();
    }

    #[test]
    fn test_discard_fails_waiters() {
        let q = queue("test.discard");
        let (gate_tx, gate_rx) = bounded::<()>(0);
        q.submit(move || {
            let _ = gate_rx.recv();
        })
        .unwrap();

        let waiter_queue = q.clone();
        let waiter = thread::spawn(move || waiter_queue.call_and_wait(|| 5));
        while q.pending_tasks() < 2 {
            thread::sleep(Duration::from_millis(1));
        }

        let disposer_queue = q.clone();
        let disposer =
            thread::spawn(move || disposer_queue.drain_and_dispose(DisposePolicy::Discard));
        while q.state() != QueueState::Draining {
            thread::sleep(Duration::from_millis(1));
        }
        gate_tx.send(()).unwrap();

        assert_eq!(
            waiter.join().unwrap(),
            Err(QueueError::QueueDisposed("test.discard".into()))
        );
        disposer.join().unwrap().unwrap();
        assert_eq!(q.stats().discarded, 1);
    }

    #[test]
    fn test_tasks_buffered_before_start() {
        let q = ExecutionQueue::new(QueueSpec::new("test.created"));
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();

        assert_eq!(q.state(), QueueState::Created);
        q.submit(move || flag.store(true, Ordering::SeqCst)).unwrap();
        q.start().unwrap();
        q.drain_and_dispose(DisposePolicy::Drain).unwrap();

        assert!(ran.load(Ordering::SeqCst));
    }
}
