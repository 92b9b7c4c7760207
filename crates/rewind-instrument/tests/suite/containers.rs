use rewind_test_utils::programs;
use rewind_trace::{EventKind, SnapshotValue, Value};

use super::traced;

#[test]
fn list_is_snapshotted_when_first_seen_and_after_sorting() {
    let vm = traced(&[programs::INVENTORY]);
    vm.lane("main")
        .invoke_static(programs::INVENTORY, "fruit", "()Ljava/util/List;", vec![])
        .unwrap();

    let add = "INVOKE: ArrayList-1, add, (Ljava/lang/Object;)Z";
    assert_eq!(
        vm.session().log_lines(),
        vec![
            "ENTER METHOD: fixtures/Inventory, fruit, ()Ljava/util/List;, []".to_owned(),
            "SET LOCAL NAME: items, 0".to_owned(),
            "INVOKE SPECIAL: null, java/util/ArrayList, <init>, ()V, []".to_owned(),
            "RETURNED: null".to_owned(),
            "LIST SNAPSHOT: ArrayList-1, []".to_owned(),
            "STORE: 0, []".to_owned(),
            format!("{add}, [pear]"),
            "RETURNED: true".to_owned(),
            format!("{add}, [apple]"),
            "RETURNED: true".to_owned(),
            "INVOKE STATIC: java/util/Collections, sort, (Ljava/util/List;)V, \
             [[pear, apple]]"
                .to_owned(),
            "RETURNED: null".to_owned(),
            "LIST SNAPSHOT: ArrayList-1, [apple, pear]".to_owned(),
            format!("{add}, [fig]"),
            "RETURNED: true".to_owned(),
            "RETURN: [apple, pear, fig]".to_owned(),
            "EXIT VALUE: [apple, pear, fig]".to_owned(),
        ]
    );
}

#[test]
fn list_contents_can_be_replayed_at_any_event() {
    let vm = traced(&[programs::INVENTORY]);
    let list = vm
        .lane("main")
        .invoke_static(programs::INVENTORY, "fruit", "()Ljava/util/List;", vec![])
        .unwrap()
        .unwrap();
    let list = list.as_object().unwrap();

    let session = vm.session();
    let events = session.events();
    let position = |line: &str| {
        let lines = session.log_lines();
        lines.iter().position(|l| l == line).unwrap() as u64
    };
    let strings = |values: &[&str]| -> SnapshotValue {
        SnapshotValue::Sequence(values.iter().map(|value| Value::str(value)).collect())
    };

    assert_eq!(session.object_snapshot(list, position("STORE: 0, []")), Some(strings(&[])));
    let first_add = position("RETURNED: true");
    assert_eq!(session.object_snapshot(list, first_add), Some(strings(&["pear"])));
    let sorted = position("LIST SNAPSHOT: ArrayList-1, [apple, pear]");
    assert_eq!(session.object_snapshot(list, sorted), Some(strings(&["apple", "pear"])));
    let last = events.len() as u64 - 1;
    assert_eq!(
        session.object_snapshot(list, last),
        Some(strings(&["apple", "pear", "fig"]))
    );
    // Replaying twice gives the same answer.
    assert_eq!(session.object_snapshot(list, last), session.object_snapshot(list, last));
}

#[test]
fn map_operations_are_logged() {
    let vm = traced(&[programs::INVENTORY]);
    vm.lane("main")
        .invoke_static(programs::INVENTORY, "counts", "()Ljava/util/Map;", vec![])
        .unwrap();

    let put = "INVOKE: HashMap-1, put, (Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;";
    let value_of = "INVOKE STATIC: java/lang/Integer, valueOf, (I)Ljava/lang/Integer;";
    assert_eq!(
        vm.session().log_lines(),
        vec![
            "ENTER METHOD: fixtures/Inventory, counts, ()Ljava/util/Map;, []".to_owned(),
            "INVOKE SPECIAL: null, java/util/HashMap, <init>, ()V, []".to_owned(),
            "RETURNED: null".to_owned(),
            "MAP SNAPSHOT: HashMap-1, {}".to_owned(),
            "STORE: 0, {}".to_owned(),
            format!("{value_of}, [1]"),
            "RETURNED: 1".to_owned(),
            format!("{put}, [a, 1]"),
            "RETURNED: null".to_owned(),
            format!("{value_of}, [2]"),
            "RETURNED: 2".to_owned(),
            format!("{put}, [b, 2]"),
            "RETURNED: null".to_owned(),
            "INVOKE: HashMap-1, remove, (Ljava/lang/Object;)Ljava/lang/Object;, [a]".to_owned(),
            "RETURNED: 1".to_owned(),
            "RETURN: {b=2}".to_owned(),
            "EXIT VALUE: {b=2}".to_owned(),
        ]
    );

    let snapshots = vm
        .session()
        .events()
        .iter()
        .filter(|event| matches!(event.kind, EventKind::ObjectSnapshot { .. }))
        .count();
    assert_eq!(snapshots, 1);
}
