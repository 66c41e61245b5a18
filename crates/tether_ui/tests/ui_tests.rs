//! Integration tests for tether_ui

use parking_lot::Mutex;
use std::any::Any;
use std::sync::Arc;

use tether_core::{Callback, CallbackId, CallbackSink, CollectingDiagnostics, FaultSource, Value, ValueMap, ViewTag};
use tether_queue::{DisposePolicy, ExecutionQueue, QueueSpec};
use tether_ui::*;

type Journal = Arc<Mutex<Vec<String>>>;

#[derive(Debug, Default)]
struct TestView {
    tag: u32,
    props: ValueMap,
    children: Vec<u32>,
    frame: Option<Frame>,
}

fn test_view(view: &mut dyn Any) -> Result<&mut TestView, ViewManagerError> {
    view.downcast_mut::<TestView>()
        .ok_or_else(|| ViewManagerError::new("not a TestView"))
}

/// Container manager supporting every capability
struct ContainerManager {
    journal: Journal,
}

impl ViewManager for ContainerManager {
    fn name(&self) -> &str {
        "RCTView"
    }

    fn create_view(&mut self, tag: ViewTag) -> Result<NativeView, ViewManagerError> {
        self.journal.lock().push(format!("create {}", tag.raw()));
        Ok(Box::new(TestView {
            tag: tag.raw(),
            ..TestView::default()
        }))
    }

    fn drop_view(&mut self, tag: ViewTag, _view: NativeView) {
        self.journal.lock().push(format!("drop {}", tag.raw()));
    }

    fn constants(&self) -> Option<ValueMap> {
        Some([("clips".to_string(), Value::from(true))].into_iter().collect())
    }

    fn as_prop_updatable(&mut self) -> Option<&mut dyn PropUpdatable> {
        Some(self)
    }

    fn as_child_managing(&mut self) -> Option<&mut dyn ChildManaging> {
        Some(self)
    }

    fn as_dimension_aware(&mut self) -> Option<&mut dyn DimensionAware> {
        Some(self)
    }
}

impl PropUpdatable for ContainerManager {
    fn update_props(&mut self, view: &mut dyn Any, props: &ValueMap) -> Result<(), ViewManagerError> {
        let view = test_view(view)?;
        for (key, value) in props {
            if value.is_null() {
                view.props.remove(key);
            } else {
                view.props.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }
}

impl ChildManaging for ContainerManager {
    fn add_child(
        &mut self,
        parent: &mut dyn Any,
        child: &mut dyn Any,
        index: usize,
    ) -> Result<(), ViewManagerError> {
        let child_tag = test_view(child)?.tag;
        let parent = test_view(parent)?;
        parent.children.insert(index, child_tag);
        self.journal.lock().push(format!("add {} to {} at {}", child_tag, parent.tag, index));
        Ok(())
    }

    fn remove_child_at(&mut self, parent: &mut dyn Any, index: usize) -> Result<(), ViewManagerError> {
        let parent = test_view(parent)?;
        let child = parent.children.remove(index);
        self.journal.lock().push(format!("remove {} from {}", child, parent.tag));
        Ok(())
    }
}

impl DimensionAware for ContainerManager {
    fn set_dimensions(&mut self, view: &mut dyn Any, frame: Frame) -> Result<(), ViewManagerError> {
        test_view(view)?.frame = Some(frame);
        Ok(())
    }
}

/// Leaf manager with no capabilities
struct LeafManager;

impl ViewManager for LeafManager {
    fn name(&self) -> &str {
        "RCTRawText"
    }

    fn create_view(&mut self, tag: ViewTag) -> Result<NativeView, ViewManagerError> {
        Ok(Box::new(TestView {
            tag: tag.raw(),
            ..TestView::default()
        }))
    }
}

struct Fixture {
    ui: UiOperationQueue,
    journal: Journal,
    diagnostics: Arc<CollectingDiagnostics>,
}

impl Fixture {
    fn new() -> Self {
        let journal = Journal::default();
        let mut managers = ViewManagerRegistry::new();
        managers
            .register(Box::new(ContainerManager { journal: journal.clone() }))
            .unwrap();
        managers.register(Box::new(LeafManager)).unwrap();

        let diagnostics = Arc::new(CollectingDiagnostics::new());
        let layout = ExecutionQueue::spawn(QueueSpec::new("test.layout")).unwrap();
        let ui = UiOperationQueue::new(layout, managers).with_diagnostics(diagnostics.clone());
        Self {
            ui,
            journal,
            diagnostics,
        }
    }

    fn create(&self, tag: u32, type_name: &str, props: ValueMap) {
        self.ui
            .enqueue_create_view(ViewTag::new(tag), type_name, ViewTag::new(1), props);
    }

    fn children(&self, tag: u32) -> Vec<ViewTag> {
        self.ui.snapshot(ViewTag::new(tag)).unwrap().unwrap().children
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = self.ui.layout_queue().drain_and_dispose(DisposePolicy::Drain);
    }
}

fn props(entries: &[(&str, Value)]) -> ValueMap {
    entries.iter().cloned().map(|(k, v)| (k.to_string(), v)).collect()
}

fn tags(raw: &[u32]) -> Vec<ViewTag> {
    raw.iter().copied().map(ViewTag::new).collect()
}

#[test]
fn test_commit_applies_in_enqueue_order() {
    let fx = Fixture::new();
    fx.create(1, "RCTView", props(&[("opacity", Value::from(0.5))]));
    fx.ui
        .enqueue_update_props(ViewTag::new(1), props(&[("opacity", Value::from(1))]));
    fx.create(2, "RCTView", ValueMap::new());
    fx.ui
        .enqueue_manage_children(ViewTag::new(1), vec![], vec![], tags(&[2]), vec![0], vec![]);

    let report = fx.ui.commit_and_wait().unwrap();
    assert!(report.is_ok());
    assert_eq!(report.applied, 4);

    let root = fx.ui.snapshot(ViewTag::new(1)).unwrap().unwrap();
    assert_eq!(root.children, tags(&[2]));
    assert_eq!(root.props.get("opacity"), Some(&Value::from(1)));
    assert_eq!(
        fx.ui.snapshot(ViewTag::new(2)).unwrap().unwrap().parent,
        Some(ViewTag::new(1))
    );
    assert!(fx.ui.is_live(ViewTag::new(2)));
}

#[test]
fn test_batches_apply_in_commit_order() {
    let fx = Fixture::new();
    fx.create(1, "RCTView", ValueMap::new());
    let first = fx.ui.commit().unwrap().unwrap();
    fx.ui
        .enqueue_update_props(ViewTag::new(1), props(&[("testID", Value::from("root"))]));
    let second = fx.ui.commit().unwrap().unwrap();
    assert!(first < second);

    fx.ui.flush().unwrap();
    let root = fx.ui.snapshot(ViewTag::new(1)).unwrap().unwrap();
    assert_eq!(root.props.get("testID"), Some(&Value::from("root")));
    assert_eq!(fx.ui.stats().batches_committed, 2);
}

#[test]
fn test_null_prop_removes_key() {
    let fx = Fixture::new();
    fx.create(1, "RCTView", props(&[("a", Value::from(1)), ("b", Value::Null)]));
    fx.ui
        .enqueue_update_props(ViewTag::new(1), props(&[("a", Value::Null), ("c", Value::from(3))]));
    fx.ui.commit_and_wait().unwrap();

    let root = fx.ui.snapshot(ViewTag::new(1)).unwrap().unwrap();
    assert_eq!(root.props, props(&[("c", Value::from(3))]));
}

#[test]
fn test_dangling_child_stops_batch() {
    let fx = Fixture::new();
    fx.create(1, "RCTView", ValueMap::new());
    fx.create(2, "RCTView", ValueMap::new());
    fx.ui.enqueue_set_children(ViewTag::new(1), tags(&[2]));
    assert!(fx.ui.commit_and_wait().unwrap().is_ok());

    fx.ui.enqueue_remove_view(ViewTag::new(1));
    fx.ui
        .enqueue_update_props(ViewTag::new(2), props(&[("x", Value::from(1))]));
    let report = fx.ui.commit_and_wait().unwrap();

    assert_eq!(
        report.error,
        Some(UiError::DanglingChildReference {
            tag: ViewTag::new(1),
            child: ViewTag::new(2),
        })
    );
    assert_eq!(report.applied, 0);
    assert_eq!(report.skipped, 1);

    // Earlier commit intact, later op never applied
    assert_eq!(fx.children(1), tags(&[2]));
    assert!(fx.ui.snapshot(ViewTag::new(2)).unwrap().unwrap().props.is_empty());

    let faults = fx.diagnostics.take();
    assert_eq!(faults.len(), 1);
    assert_eq!(faults[0].source, FaultSource::Commit);
    assert_eq!(fx.ui.stats().batches_failed, 1);
}

#[test]
fn test_remove_detaches_then_retires_tag() {
    let fx = Fixture::new();
    fx.create(1, "RCTView", ValueMap::new());
    fx.create(2, "RCTView", ValueMap::new());
    fx.ui.enqueue_set_children(ViewTag::new(1), tags(&[2]));
    fx.ui.enqueue_remove_view(ViewTag::new(2));
    assert!(fx.ui.commit_and_wait().unwrap().is_ok());
    assert!(fx.children(1).is_empty());
    assert!(!fx.ui.is_live(ViewTag::new(2)));
    assert!(fx.journal.lock().contains(&"drop 2".to_string()));

    fx.create(2, "RCTView", ValueMap::new());
    let report = fx.ui.commit_and_wait().unwrap();
    assert_eq!(report.error, Some(UiError::TagReused(ViewTag::new(2))));
}

#[test]
fn test_manage_children_moves_and_removes() {
    let fx = Fixture::new();
    for tag in 1..=5 {
        fx.create(tag, "RCTView", ValueMap::new());
    }
    fx.ui.enqueue_set_children(ViewTag::new(1), tags(&[2, 3, 4]));
    assert!(fx.ui.commit_and_wait().unwrap().is_ok());

    // Move 2 to index 1, drop 3, insert 5 at the front
    fx.ui
        .enqueue_manage_children(ViewTag::new(1), vec![0], vec![1], tags(&[5]), vec![0], vec![1]);
    assert!(fx.ui.commit_and_wait().unwrap().is_ok());

    assert_eq!(fx.children(1), tags(&[5, 2, 4]));
    let removed = fx.ui.snapshot(ViewTag::new(3)).unwrap().unwrap();
    assert_eq!(removed.parent, None);
}

#[test]
fn test_manage_children_rejects_bad_index() {
    let fx = Fixture::new();
    fx.create(1, "RCTView", ValueMap::new());
    fx.create(2, "RCTView", ValueMap::new());
    fx.ui
        .enqueue_manage_children(ViewTag::new(1), vec![], vec![], tags(&[2]), vec![3], vec![]);
    let report = fx.ui.commit_and_wait().unwrap();
    assert!(matches!(report.error, Some(UiError::InvalidIndex { index: 3, .. })));
    assert_eq!(fx.ui.snapshot(ViewTag::new(2)).unwrap().unwrap().parent, None);
}

#[test]
fn test_child_with_parent_rejected() {
    let fx = Fixture::new();
    for tag in 1..=3 {
        fx.create(tag, "RCTView", ValueMap::new());
    }
    fx.ui.enqueue_set_children(ViewTag::new(1), tags(&[3]));
    fx.ui.enqueue_set_children(ViewTag::new(2), tags(&[3]));
    let report = fx.ui.commit_and_wait().unwrap();
    assert_eq!(
        report.error,
        Some(UiError::ChildAlreadyParented {
            child: ViewTag::new(3),
            parent: ViewTag::new(1),
        })
    );
}

#[test]
fn test_manage_children_rejects_repeated_child() {
    let fx = Fixture::new();
    fx.create(1, "RCTView", ValueMap::new());
    fx.create(2, "RCTView", ValueMap::new());
    fx.ui
        .enqueue_manage_children(ViewTag::new(1), vec![], vec![], tags(&[2, 2]), vec![0, 1], vec![]);
    let report = fx.ui.commit_and_wait().unwrap();
    assert!(matches!(report.error, Some(UiError::InvalidArgument(_))));
    assert!(fx.children(1).is_empty());
    assert_eq!(fx.ui.snapshot(ViewTag::new(2)).unwrap().unwrap().parent, None);

    // Tree is still consistent: both views can be removed
    fx.ui.enqueue_remove_view(ViewTag::new(2));
    fx.ui.enqueue_remove_view(ViewTag::new(1));
    assert!(fx.ui.commit_and_wait().unwrap().is_ok());
}

#[test]
fn test_ancestor_cannot_become_child() {
    let fx = Fixture::new();
    for tag in 1..=3 {
        fx.create(tag, "RCTView", ValueMap::new());
    }
    fx.ui.enqueue_set_children(ViewTag::new(1), tags(&[2]));
    fx.ui.enqueue_set_children(ViewTag::new(2), tags(&[3]));
    assert!(fx.ui.commit_and_wait().unwrap().is_ok());

    fx.ui
        .enqueue_manage_children(ViewTag::new(2), vec![], vec![], tags(&[1]), vec![0], vec![]);
    let report = fx.ui.commit_and_wait().unwrap();
    assert!(matches!(report.error, Some(UiError::InvalidArgument(_))));

    fx.ui.enqueue_set_children(ViewTag::new(3), tags(&[1]));
    let report = fx.ui.commit_and_wait().unwrap();
    assert!(matches!(report.error, Some(UiError::InvalidArgument(_))));

    fx.ui.enqueue_set_children(ViewTag::new(1), tags(&[1]));
    let report = fx.ui.commit_and_wait().unwrap();
    assert!(matches!(report.error, Some(UiError::InvalidArgument(_))));

    assert_eq!(fx.ui.snapshot(ViewTag::new(1)).unwrap().unwrap().parent, None);
    assert_eq!(fx.children(2), tags(&[3]));
    assert!(fx.children(3).is_empty());
}

#[test]
fn test_leaf_manager_cannot_manage_children() {
    let fx = Fixture::new();
    fx.create(1, "RCTRawText", ValueMap::new());
    fx.create(2, "RCTView", ValueMap::new());
    fx.ui.enqueue_set_children(ViewTag::new(1), tags(&[2]));
    let report = fx.ui.commit_and_wait().unwrap();
    assert!(matches!(report.error, Some(UiError::UnsupportedOperation { .. })));
}

#[test]
fn test_leaf_manager_ignores_optional_capabilities() {
    let fx = Fixture::new();
    fx.create(1, "RCTRawText", props(&[("text", Value::from("hi"))]));
    fx.ui
        .enqueue_set_dimensions(ViewTag::new(1), Frame::new(0.0, 0.0, 10.0, 10.0));
    fx.ui
        .enqueue_update_extra_data(ViewTag::new(1), Value::from("layout"));
    let report = fx.ui.commit_and_wait().unwrap();
    assert!(report.is_ok());
    assert_eq!(
        fx.ui.frame(ViewTag::new(1)).unwrap(),
        Some(Frame::new(0.0, 0.0, 10.0, 10.0))
    );
}

#[test]
fn test_unknown_view_manager() {
    let fx = Fixture::new();
    fx.create(1, "RCTMissing", ValueMap::new());
    let report = fx.ui.commit_and_wait().unwrap();
    assert_eq!(report.error, Some(UiError::UnknownViewManager("RCTMissing".into())));
}

#[derive(Default)]
struct RecordingSink {
    calls: Mutex<Vec<(CallbackId, Vec<Value>)>>,
}

impl CallbackSink for RecordingSink {
    fn invoke_callback(&self, id: CallbackId, args: Vec<Value>) {
        self.calls.lock().push((id, args));
    }
}

#[test]
fn test_measure_replies_with_frame() {
    let fx = Fixture::new();
    let sink = Arc::new(RecordingSink::default());
    fx.create(1, "RCTView", ValueMap::new());
    fx.ui
        .enqueue_set_dimensions(ViewTag::new(1), Frame::new(1.0, 2.0, 30.0, 40.0));
    fx.ui
        .enqueue_measure(ViewTag::new(1), Callback::new(CallbackId::new(5), sink.clone()));
    fx.ui
        .enqueue_measure(ViewTag::new(9), Callback::new(CallbackId::new(6), sink.clone()));
    fx.create(2, "RCTView", ValueMap::new());
    fx.ui
        .enqueue_measure(ViewTag::new(2), Callback::new(CallbackId::new(7), sink.clone()));
    assert!(fx.ui.commit_and_wait().unwrap().is_ok());

    let calls = sink.calls.lock();
    assert_eq!(
        calls[0],
        (
            CallbackId::new(5),
            vec![Value::from(1.0), Value::from(2.0), Value::from(30.0), Value::from(40.0)]
        )
    );
    assert_eq!(calls[1], (CallbackId::new(6), vec![]));
    // Live but never laid out
    assert_eq!(calls[2], (CallbackId::new(7), vec![]));
}

#[test]
fn test_listener_sees_reports() {
    let fx = Fixture::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    fx.ui
        .add_listener(Arc::new(move |report: &CommitReport| sink.lock().push(report.batch_id)));

    fx.create(1, "RCTView", ValueMap::new());
    let id = fx.ui.commit().unwrap().unwrap();
    fx.ui.flush().unwrap();
    assert_eq!(*seen.lock(), vec![id]);
}

#[test]
fn test_view_manager_constants() {
    let fx = Fixture::new();
    assert_eq!(fx.ui.view_manager_names(), ["RCTView".to_string(), "RCTRawText".to_string()]);
    let constants = fx.ui.view_manager_constants().unwrap();
    assert_eq!(
        constants.get("RCTView").and_then(|c| c.get("clips")),
        Some(&Value::from(true))
    );
    assert_eq!(constants.get("RCTRawText"), Some(&Value::Null));
}
