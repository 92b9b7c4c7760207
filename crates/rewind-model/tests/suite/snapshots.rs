use rewind_bytecode::MemberRef;
use rewind_model::EventLog;
use rewind_test_utils::programs::INVENTORY;
use rewind_trace::{EventKind, ObjRef, ObjectData, ThreadRef, TraceEvent, TraceSession, Value};

use super::traced;

fn position(events: &[TraceEvent], predicate: impl Fn(&EventKind) -> bool) -> u64 {
    events
        .iter()
        .find(|event| predicate(&event.kind))
        .map(|event| event.sequence)
        .expect("a matching event was recorded")
}

fn strings(values: &[&str]) -> Vec<Value> {
    values.iter().map(|value| Value::str(value)).collect()
}

#[test]
fn list_contents_replay_at_any_position() {
    let vm = traced(&[INVENTORY]);
    let lane = vm.lane("main");
    let list = lane
        .invoke_static(INVENTORY, "fruit", "()Ljava/util/List;", vec![])
        .unwrap()
        .unwrap();
    let object = list.as_object().unwrap().clone();

    let log = EventLog::from_session(vm.session());
    let stored = position(log.events(), |kind| {
        matches!(kind, EventKind::StoreLocal { slot: 0, .. })
    });
    let sorting = position(log.events(), |kind| {
        matches!(kind, EventKind::InvokeStatic { method, .. } if method.name == "sort")
    });
    let last = log.len() as u64 - 1;

    let at = |up_to: u64| {
        log.object_snapshot(&object, up_to)
            .and_then(|snapshot| snapshot.as_sequence().map(<[Value]>::to_vec))
    };
    assert_eq!(at(stored), Some(Vec::new()));
    assert_eq!(at(sorting), Some(strings(&["pear", "apple"])));
    assert_eq!(at(last), Some(strings(&["apple", "pear", "fig"])));
    assert_eq!(log.render_at(&list, sorting), "[pear, apple]");

    // The program keeps running and mutating the list after the copy was taken.
    if let ObjectData::List(items) = &mut *object.data() {
        items.push(Value::str("kiwi"));
    }
    lane.invoke_static(INVENTORY, "counts", "()Ljava/util/Map;", vec![]).unwrap();

    assert_eq!(object.list_elements().map(|items| items.len()), Some(4));
    assert!(vm.session().len() > log.len());
    assert_eq!(at(sorting), Some(strings(&["pear", "apple"])));
    assert_eq!(at(last), Some(strings(&["apple", "pear", "fig"])));
}

#[test]
fn map_contents_follow_puts_and_removes() {
    let vm = traced(&[INVENTORY]);
    let lane = vm.lane("main");
    let map = lane
        .invoke_static(INVENTORY, "counts", "()Ljava/util/Map;", vec![])
        .unwrap()
        .unwrap();
    let object = map.as_object().unwrap();

    let log = EventLog::from_session(vm.session());
    let removing = position(log.events(), |kind| {
        matches!(kind, EventKind::InvokeVirtual { method, .. } if method.name == "remove")
    });
    let last = log.len() as u64 - 1;

    let before = log.object_snapshot(object, removing - 1).unwrap();
    assert_eq!(
        before.as_map(),
        Some(
            &[
                (Value::str("a"), Value::Int(1)),
                (Value::str("b"), Value::Int(2)),
            ][..]
        )
    );
    let after = log.object_snapshot(object, last).unwrap();
    assert_eq!(after.as_map(), Some(&[(Value::str("b"), Value::Int(2))][..]));
    assert_eq!(log.render_at(&map, last), "{b=2}");
}

#[test]
fn objects_without_a_strategy_have_no_snapshot() {
    let vm = traced(&[INVENTORY]);
    let lane = vm.lane("main");
    lane.invoke_static(INVENTORY, "fruit", "()Ljava/util/List;", vec![]).unwrap();

    let log = EventLog::from_session(vm.session());
    let plain = rewind_trace::ObjRef::instance("fixtures/Shape");
    assert_eq!(log.object_snapshot(&plain, log.len() as u64), None);
}

#[test]
fn list_of_lists_renders_inner_contents_at_the_same_position() {
    let session = TraceSession::default();
    let thread = ThreadRef::new(1, "main");
    let inner = ObjRef::list("java/util/ArrayList", vec![Value::Int(1)]);
    let outer = ObjRef::list("java/util/ArrayList", vec![Value::Object(inner.clone())]);
    let nested = Value::Object(outer);
    session.record(
        &thread,
        0,
        None,
        EventKind::StoreLocal {
            slot: 1,
            value: nested.clone(),
        },
    );
    let stored = session.len() as u64 - 1;
    session.record(
        &thread,
        0,
        None,
        EventKind::InvokeVirtual {
            receiver: Value::Object(inner.clone()),
            method: MemberRef::new("java/util/ArrayList", "add", "(Ljava/lang/Object;)Z"),
            args: vec![Value::Int(2)],
        },
    );
    let added = stored + 1;
    if let ObjectData::List(items) = &mut *inner.data() {
        items.extend([Value::Int(2), Value::Int(3)]);
    }

    let log = EventLog::from_session(&session);
    assert_eq!(log.render_at(&nested, stored), "[[1]]");
    assert_eq!(log.render_at(&nested, added), "[[1, 2]]");
}
