//! Integration tests for tether_queue

use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use tether_queue::*;

#[test]
fn test_submissions_from_many_threads_stay_serial() {
    let q = ExecutionQueue::spawn(QueueSpec::new("it.serial")).unwrap();
    let active = Arc::new(Mutex::new(0usize));
    let max_active = Arc::new(Mutex::new(0usize));

    let producers: Vec<_> = (0..4)
        .map(|_| {
            let q = q.clone();
            let active = active.clone();
            let max_active = max_active.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    let active = active.clone();
                    let max_active = max_active.clone();
                    q.submit(move || {
                        let now = {
                            let mut a = active.lock();
                            *a += 1;
                            *a
                        };
                        {
                            let mut m = max_active.lock();
                            *m = (*m).max(now);
                        }
                        *active.lock() -= 1;
                    })
                    .unwrap();
                }
            })
        })
        .collect();

    for producer in producers {
        producer.join().unwrap();
    }
    q.drain_and_dispose(DisposePolicy::Drain).unwrap();

    assert_eq!(*max_active.lock(), 1);
    assert_eq!(q.stats().completed, 200);
    assert_eq!(q.pending_tasks(), 0);
}

#[test]
fn test_per_producer_order_is_preserved() {
    let q = ExecutionQueue::spawn(QueueSpec::new("it.order")).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    for i in 0..20 {
        let seen = seen.clone();
        q.submit(move || seen.lock().push(i)).unwrap();
    }
    let result = q.call_and_wait({
        let seen = seen.clone();
        move || seen.lock().clone()
    });

    assert_eq!(result.unwrap(), (0..20).collect::<Vec<_>>());
    q.drain_and_dispose(DisposePolicy::Drain).unwrap();
}

#[test]
fn test_ensure_current() {
    let set = QueueSet::spawn(&QueueSetSpec::default()).unwrap();
    assert!(matches!(
        set.layout.ensure_current(),
        Err(QueueError::WrongQueue { .. })
    ));

    let layout = set.layout.clone();
    assert!(set.layout.call_and_wait(move || layout.ensure_current()).unwrap().is_ok());
    set.dispose_all(DisposePolicy::Discard).unwrap();
}

#[test]
fn test_drain_runs_backlog() {
    let q = ExecutionQueue::spawn(QueueSpec::new("it.drain").with_stack_size(256 * 1024)).unwrap();
    let count = Arc::new(Mutex::new(0));
    for _ in 0..10 {
        let count = count.clone();
        q.submit(move || *count.lock() += 1).unwrap();
    }
    q.drain_and_dispose(DisposePolicy::Drain).unwrap();
    assert_eq!(*count.lock(), 10);
}
