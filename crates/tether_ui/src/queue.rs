//! UI operation queue
//!
//! Operations are buffered on the calling thread and handed to the layout
//! queue as one batch per commit. Batches apply in commit order; within a
//! batch, operations apply in enqueue order.

use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tether_core::recovery::catch_panic;
use tether_core::{Callback, DiagnosticsSink, Fault, FaultSource, LogDiagnostics, Value, ValueMap, ViewTag};
use tether_queue::ExecutionQueue;

use crate::apply::UiState;
use crate::manager::ViewManagerRegistry;
use crate::operation::{Frame, UiOperation};
use crate::tag::ViewTagAllocator;
use crate::tree::ViewSnapshot;
use crate::{UiError, UiResult};

/// Sequence number of a committed batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BatchId(pub u64);

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Batch({})", self.0)
    }
}

/// Outcome of one applied batch
#[derive(Debug, Clone, PartialEq)]
pub struct CommitReport {
    pub batch_id: BatchId,
    /// Operations applied before the first failure
    pub applied: usize,
    /// Operations not attempted after the first failure
    pub skipped: usize,
    /// The failure that stopped the batch, if any
    pub error: Option<UiError>,
}

impl CommitReport {
    /// Check if every operation was applied
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Called on the layout queue after every batch
pub type CommitListener = Arc<dyn Fn(&CommitReport) + Send + Sync>;

/// UI statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiStats {
    pub batches_committed: u64,
    pub batches_failed: u64,
    pub operations_applied: u64,
    pub operations_skipped: u64,
    /// Operations buffered but not yet committed
    pub buffered: usize,
}

/// State shared with layout-queue tasks
struct Committer {
    state: Mutex<UiState>,
    live: RwLock<HashSet<ViewTag>>,
    listeners: RwLock<Vec<CommitListener>>,
    diagnostics: RwLock<Arc<dyn DiagnosticsSink>>,
    batches_committed: AtomicU64,
    batches_failed: AtomicU64,
    operations_applied: AtomicU64,
    operations_skipped: AtomicU64,
}

impl Committer {
    fn apply_batch(&self, batch_id: BatchId, ops: Vec<UiOperation>) -> CommitReport {
        let total = ops.len();
        let mut applied = 0;
        let mut error = None;

        {
            let mut state = self.state.lock();
            for op in ops {
                let name = op.name();
                let tag = op.tag();
                let created = matches!(op, UiOperation::CreateView { .. });
                let removed = matches!(op, UiOperation::RemoveView { .. });

                let result = catch_panic(|| state.apply(op)).unwrap_or_else(|message| {
                    Err(UiError::ViewManager {
                        manager: format!("{} on {}", name, tag),
                        message,
                    })
                });

                match result {
                    Ok(()) => {
                        applied += 1;
                        if created {
                            self.live.write().insert(tag);
                        } else if removed {
                            self.live.write().remove(&tag);
                        }
                    }
                    Err(e) => {
                        log::error!("{} failed at {} on {}: {}", batch_id, name, tag, e);
                        error = Some(e);
                        break;
                    }
                }
            }
        }

        let report = CommitReport {
            batch_id,
            applied,
            skipped: total - applied - usize::from(error.is_some()),
            error,
        };

        self.batches_committed.fetch_add(1, Ordering::Relaxed);
        self.operations_applied.fetch_add(report.applied as u64, Ordering::Relaxed);
        self.operations_skipped.fetch_add(report.skipped as u64, Ordering::Relaxed);
        if let Some(e) = &report.error {
            self.batches_failed.fetch_add(1, Ordering::Relaxed);
            let sink = self.diagnostics.read().clone();
            sink.report(Fault::new(FaultSource::Commit, batch_id.to_string(), e.to_string()));
        }

        let listeners = self.listeners.read().clone();
        for listener in listeners {
            if let Err(message) = catch_panic(|| listener(&report)) {
                log::error!("Commit listener panicked: {}", message);
            }
        }
        report
    }
}

/// Buffers UI operations and commits them to the layout queue
pub struct UiOperationQueue {
    buffer: Mutex<Vec<UiOperation>>,
    committer: Arc<Committer>,
    layout: ExecutionQueue,
    tags: ViewTagAllocator,
    next_batch: AtomicU64,
    manager_names: Vec<String>,
}

impl UiOperationQueue {
    /// Create a queue that applies batches on `layout`
    pub fn new(layout: ExecutionQueue, managers: ViewManagerRegistry) -> Self {
        let manager_names = managers.names();
        Self {
            buffer: Mutex::new(Vec::new()),
            committer: Arc::new(Committer {
                state: Mutex::new(UiState::new(managers)),
                live: RwLock::new(HashSet::new()),
                listeners: RwLock::new(Vec::new()),
                diagnostics: RwLock::new(Arc::new(LogDiagnostics)),
                batches_committed: AtomicU64::new(0),
                batches_failed: AtomicU64::new(0),
                operations_applied: AtomicU64::new(0),
                operations_skipped: AtomicU64::new(0),
            }),
            layout,
            tags: ViewTagAllocator::new(),
            next_batch: AtomicU64::new(1),
            manager_names,
        }
    }

    /// Route commit failures to `sink`
    pub fn with_diagnostics(self, sink: Arc<dyn DiagnosticsSink>) -> Self {
        *self.committer.diagnostics.write() = sink;
        self
    }

    /// The queue batches are applied on
    pub fn layout_queue(&self) -> &ExecutionQueue {
        &self.layout
    }

    /// Buffer an operation
    pub fn enqueue(&self, op: UiOperation) {
        if let UiOperation::CreateView { tag, .. } = &op {
            self.tags.observe(*tag);
        }
        self.buffer.lock().push(op);
    }

    pub fn enqueue_create_view(
        &self,
        tag: ViewTag,
        type_name: impl Into<String>,
        root_tag: ViewTag,
        props: ValueMap,
    ) {
        self.enqueue(UiOperation::CreateView {
            tag,
            type_name: type_name.into(),
            root_tag,
            props,
        });
    }

    pub fn enqueue_update_props(&self, tag: ViewTag, props: ValueMap) {
        self.enqueue(UiOperation::UpdateProps { tag, props });
    }

    pub fn enqueue_manage_children(
        &self,
        tag: ViewTag,
        move_from: Vec<usize>,
        move_to: Vec<usize>,
        add_child_tags: Vec<ViewTag>,
        add_at_indices: Vec<usize>,
        remove_from: Vec<usize>,
    ) {
        self.enqueue(UiOperation::ManageChildren {
            tag,
            move_from,
            move_to,
            add_child_tags,
            add_at_indices,
            remove_from,
        });
    }

    pub fn enqueue_set_children(&self, tag: ViewTag, child_tags: Vec<ViewTag>) {
        self.enqueue(UiOperation::SetChildren { tag, child_tags });
    }

    pub fn enqueue_set_dimensions(&self, tag: ViewTag, frame: Frame) {
        self.enqueue(UiOperation::SetDimensions { tag, frame });
    }

    pub fn enqueue_update_extra_data(&self, tag: ViewTag, payload: Value) {
        self.enqueue(UiOperation::UpdateExtraData { tag, payload });
    }

    pub fn enqueue_remove_view(&self, tag: ViewTag) {
        self.enqueue(UiOperation::RemoveView { tag });
    }

    pub fn enqueue_measure(&self, tag: ViewTag, callback: Callback) {
        self.enqueue(UiOperation::Measure { tag, callback });
    }

    /// Allocate a tag and buffer the creation of a root view under it
    pub fn add_root_view(&self, type_name: impl Into<String>, props: ValueMap) -> ViewTag {
        let tag = self.tags.allocate();
        self.enqueue_create_view(tag, type_name, tag, props);
        tag
    }

    /// Number of buffered operations
    pub fn buffered(&self) -> usize {
        self.buffer.lock().len()
    }

    fn take_batch(&self) -> (BatchId, Vec<UiOperation>) {
        let ops = std::mem::take(&mut *self.buffer.lock());
        let id = BatchId(self.next_batch.fetch_add(1, Ordering::Relaxed));
        (id, ops)
    }

    /// Hand the buffered operations to the layout queue.
    ///
    /// Returns `None` if nothing was buffered.
    pub fn commit(&self) -> UiResult<Option<BatchId>> {
        if self.buffer.lock().is_empty() {
            return Ok(None);
        }
        let (batch_id, ops) = self.take_batch();
        log::debug!("Committing {} with {} operations", batch_id, ops.len());

        let committer = self.committer.clone();
        self.layout.submit(move || {
            committer.apply_batch(batch_id, ops);
        })?;
        Ok(Some(batch_id))
    }

    /// Commit and block until the batch is applied
    pub fn commit_and_wait(&self) -> UiResult<CommitReport> {
        let (batch_id, ops) = self.take_batch();
        let committer = self.committer.clone();
        Ok(self.layout.run_sync(move || committer.apply_batch(batch_id, ops))?)
    }

    /// Wait until every batch committed so far is applied
    pub fn flush(&self) -> UiResult<()> {
        Ok(self.layout.run_sync(|| ())?)
    }

    /// Committed state of `tag`
    pub fn snapshot(&self, tag: ViewTag) -> UiResult<Option<ViewSnapshot>> {
        let committer = self.committer.clone();
        Ok(self
            .layout
            .run_sync(move || committer.state.lock().tree.snapshot(tag))?)
    }

    /// Last committed frame of `tag`
    pub fn frame(&self, tag: ViewTag) -> UiResult<Option<Frame>> {
        let committer = self.committer.clone();
        Ok(self
            .layout
            .run_sync(move || committer.state.lock().frames.get(tag).copied())?)
    }

    /// Check if `tag` is a committed, not yet removed view
    pub fn is_live(&self, tag: ViewTag) -> bool {
        self.committer.live.read().contains(&tag)
    }

    /// Names of the registered view managers
    pub fn view_manager_names(&self) -> &[String] {
        &self.manager_names
    }

    /// Constants of every view manager, collected on the layout queue
    pub fn view_manager_constants(&self) -> UiResult<ValueMap> {
        let committer = self.committer.clone();
        Ok(self
            .layout
            .run_sync(move || committer.state.lock().managers.constants())?)
    }

    /// Register a listener for applied batches
    pub fn add_listener(&self, listener: CommitListener) {
        self.committer.listeners.write().push(listener);
    }

    /// Get statistics
    pub fn stats(&self) -> UiStats {
        let c = &self.committer;
        UiStats {
            batches_committed: c.batches_committed.load(Ordering::Relaxed),
            batches_failed: c.batches_failed.load(Ordering::Relaxed),
            operations_applied: c.operations_applied.load(Ordering::Relaxed),
            operations_skipped: c.operations_skipped.load(Ordering::Relaxed),
            buffered: self.buffered(),
        }
    }
}
