//! Integration tests for tether_event

use parking_lot::Mutex;
use std::sync::Arc;

use tether_core::{CollectingDiagnostics, FaultSource, Value, ViewTag};
use tether_event::*;

#[derive(Default)]
struct RecordingEmitter {
    calls: Mutex<Vec<(String, String, Vec<Value>)>>,
    fail_on: Option<&'static str>,
}

impl EventEmitter for RecordingEmitter {
    fn call_function(&self, module: &str, method: &str, args: Vec<Value>) -> EventResult<()> {
        let name = args
            .iter()
            .find_map(|a| a.as_str().filter(|s| s.starts_with("top")))
            .unwrap_or_default()
            .to_string();
        if self.fail_on == Some(name.as_str()) {
            return Err(EventError::Emit("script threw".into()));
        }
        self.calls.lock().push((module.to_string(), method.to_string(), args));
        Ok(())
    }
}

fn scroll(tag: u32, offset: i32) -> Event {
    Event::new(ViewTag::new(tag), "topScroll", Value::from(offset)).coalescing(7)
}

#[test]
fn test_coalescable_twice_delivers_latest_once() {
    let dispatcher = EventDispatcher::new();
    dispatcher.dispatch(scroll(3, 10)).unwrap();
    dispatcher.dispatch(scroll(3, 20)).unwrap();

    let emitter = RecordingEmitter::default();
    assert_eq!(dispatcher.flush(&emitter), 1);

    let calls = emitter.calls.lock();
    assert_eq!(
        calls[0],
        (
            "RCTEventEmitter".to_string(),
            "receiveEvent".to_string(),
            vec![Value::from(3), Value::from("topScroll"), Value::from(20)]
        )
    );
    assert_eq!(dispatcher.stats().coalesced, 1);
}

#[test]
fn test_non_coalescable_follows_in_order() {
    let dispatcher = EventDispatcher::new();
    dispatcher.dispatch(scroll(3, 10)).unwrap();
    dispatcher
        .dispatch(Event::new(ViewTag::new(3), "topChange", Value::from("b")))
        .unwrap();

    let emitter = RecordingEmitter::default();
    assert_eq!(dispatcher.flush(&emitter), 2);
    let calls = emitter.calls.lock();
    assert_eq!(calls[0].2[1], Value::from("topScroll"));
    assert_eq!(calls[1].2[1], Value::from("topChange"));
}

#[test]
fn test_non_coalescable_never_dropped() {
    let dispatcher = EventDispatcher::new();
    for i in 0..3 {
        dispatcher
            .dispatch(Event::new(ViewTag::new(1), "topChange", Value::from(i)))
            .unwrap();
    }
    let emitter = RecordingEmitter::default();
    assert_eq!(dispatcher.flush(&emitter), 3);
}

#[test]
fn test_distinct_tags_do_not_coalesce() {
    let dispatcher = EventDispatcher::new();
    dispatcher.dispatch(scroll(1, 10)).unwrap();
    dispatcher.dispatch(scroll(2, 20)).unwrap();
    assert_eq!(dispatcher.pending(), 2);
}

#[test]
fn test_flush_opens_new_window() {
    let dispatcher = EventDispatcher::new();
    let emitter = RecordingEmitter::default();

    dispatcher.dispatch(scroll(3, 10)).unwrap();
    dispatcher.flush(&emitter);
    dispatcher.dispatch(scroll(3, 20)).unwrap();
    dispatcher.flush(&emitter);

    assert_eq!(emitter.calls.lock().len(), 2);
    assert_eq!(dispatcher.flush(&emitter), 0);
    assert_eq!(dispatcher.stats().delivered, 2);
}

#[test]
fn test_touch_moves_coalesce() {
    let dispatcher = EventDispatcher::new();
    let touch = |phase, x: i32| {
        let point: Value = [("pageX", Value::from(x))].into_iter().collect();
        Event::touch(ViewTag::new(5), phase, 1, vec![point], vec![0])
    };

    dispatcher.dispatch(touch(TouchEventType::Start, 0)).unwrap();
    dispatcher.dispatch(touch(TouchEventType::Move, 1)).unwrap();
    dispatcher.dispatch(touch(TouchEventType::Move, 2)).unwrap();
    dispatcher.dispatch(touch(TouchEventType::End, 2)).unwrap();

    let emitter = RecordingEmitter::default();
    assert_eq!(dispatcher.flush(&emitter), 3);

    let calls = emitter.calls.lock();
    let names: Vec<_> = calls.iter().map(|(_, _, args)| args[0].clone()).collect();
    assert_eq!(
        names,
        vec![
            Value::from("topTouchStart"),
            Value::from("topTouchMove"),
            Value::from("topTouchEnd"),
        ]
    );
    assert!(calls.iter().all(|(_, method, _)| method == "receiveTouches"));
    assert_eq!(
        calls[1].2[1].as_array().and_then(|t| t[0].get("pageX")).cloned(),
        Some(Value::from(2))
    );
}

#[test]
fn test_touch_moves_of_different_pointers_kept_apart() {
    let dispatcher = EventDispatcher::new();
    let touch = |pointer: u16, x: i32| {
        let point: Value = [("identifier", Value::from(u32::from(pointer))), ("pageX", Value::from(x))]
            .into_iter()
            .collect();
        Event::touch(ViewTag::new(5), TouchEventType::Move, pointer, vec![point], vec![0])
    };

    dispatcher.dispatch(touch(1, 10)).unwrap();
    dispatcher.dispatch(touch(2, 20)).unwrap();
    dispatcher.dispatch(touch(1, 11)).unwrap();
    dispatcher.dispatch(touch(2, 21)).unwrap();
    assert_eq!(dispatcher.pending(), 2);

    let emitter = RecordingEmitter::default();
    assert_eq!(dispatcher.flush(&emitter), 2);

    let calls = emitter.calls.lock();
    let xs: Vec<_> = calls
        .iter()
        .map(|(_, _, args)| args[1].as_array().and_then(|t| t[0].get("pageX")).cloned())
        .collect();
    assert_eq!(xs, vec![Some(Value::from(11)), Some(Value::from(21))]);
}

#[test]
fn test_failed_delivery_reported_once() {
    let diagnostics = Arc::new(CollectingDiagnostics::new());
    let dispatcher = EventDispatcher::with_diagnostics(diagnostics.clone());
    dispatcher
        .dispatch(Event::new(ViewTag::new(1), "topBad", Value::Null))
        .unwrap();
    dispatcher
        .dispatch(Event::new(ViewTag::new(1), "topGood", Value::Null))
        .unwrap();

    let emitter = RecordingEmitter {
        fail_on: Some("topBad"),
        ..RecordingEmitter::default()
    };
    assert_eq!(dispatcher.flush(&emitter), 1);
    assert_eq!(dispatcher.flush(&emitter), 0);

    let faults = diagnostics.take();
    assert_eq!(faults.len(), 1);
    assert_eq!(faults[0].source, FaultSource::Event);
    assert_eq!(dispatcher.stats().failed, 1);
}
