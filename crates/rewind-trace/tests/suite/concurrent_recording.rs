use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use rewind_trace::{EventKind, ObjRef, ThreadRef, TraceSession, Value};

#[test]
fn lanes_append_without_losing_events() {
    let session = Arc::new(TraceSession::default());
    let lanes = 4u64;
    let per_lane = 250;

    let handles: Vec<_> = (0..lanes)
        .map(|lane| {
            let session = Arc::clone(&session);
            thread::spawn(move || {
                let thread = ThreadRef::new(lane, &format!("lane-{lane}"));
                let activation = session.next_activation_id();
                for i in 0..per_lane {
                    session.record(
                        &thread,
                        activation,
                        None,
                        EventKind::StoreLocal {
                            slot: 1,
                            value: Value::Int(i),
                        },
                    );
                }
                activation
            })
        })
        .collect();
    let activations: HashSet<i64> = handles
        .into_iter()
        .map(|handle| handle.join().expect("lane panicked"))
        .collect();
    assert_eq!(activations.len(), lanes as usize);

    let events = session.events();
    assert_eq!(events.len(), lanes as usize * per_lane as usize);
    for (index, event) in events.iter().enumerate() {
        assert_eq!(event.sequence, index as u64);
    }
    for lane in 0..lanes {
        let stored: Vec<i32> = events
            .iter()
            .filter(|event| event.thread.id() == lane)
            .filter_map(|event| match &event.kind {
                EventKind::StoreLocal {
                    value: Value::Int(v),
                    ..
                } => Some(*v),
                _ => None,
            })
            .collect();
        assert_eq!(stored, (0..per_lane).collect::<Vec<_>>());
    }
}

#[test]
fn concurrent_labels_are_unique_per_object() {
    let session = Arc::new(TraceSession::default());
    let objects: Arc<Vec<ObjRef>> =
        Arc::new((0..16).map(|_| ObjRef::instance("demo/Node")).collect());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let session = Arc::clone(&session);
            let objects = Arc::clone(&objects);
            thread::spawn(move || {
                objects
                    .iter()
                    .map(|obj| session.labeler().label(obj))
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    let results: Vec<Vec<String>> = handles
        .into_iter()
        .map(|handle| handle.join().expect("labeling panicked"))
        .collect();

    for other in &results[1..] {
        assert_eq!(other, &results[0]);
    }
    let distinct: HashSet<&String> = results[0].iter().collect();
    assert_eq!(distinct.len(), 16);
    assert!(results[0].iter().all(|label| label.starts_with("Node-")));
}
