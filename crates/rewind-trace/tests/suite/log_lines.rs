use rewind_bytecode::MemberRef;
use rewind_trace::{EventKind, ObjRef, ObjectData, ThreadRef, TraceSession, Value};

#[test]
fn list_mutations_and_snapshots_are_logged() {
    let session = TraceSession::default();
    let main = ThreadRef::new(1, "main");
    let list = ObjRef::list("java/util/ArrayList", Vec::new());
    let add = MemberRef::new("java/util/ArrayList", "add", "(Ljava/lang/Object;)Z");

    session.record(
        &main,
        0,
        Some(3),
        EventKind::StoreLocal {
            slot: 1,
            value: Value::Object(list.clone()),
        },
    );
    session.record(
        &main,
        0,
        Some(4),
        EventKind::InvokeVirtual {
            receiver: Value::Object(list.clone()),
            method: add,
            args: vec![Value::Int(7)],
        },
    );
    if let ObjectData::List(elements) = &mut *list.data() {
        elements.push(Value::Int(7));
    }
    session.record(
        &main,
        0,
        Some(4),
        EventKind::ReturnedValue {
            value: Value::Boolean(true),
        },
    );

    assert_eq!(
        session.log_lines(),
        vec![
            "LIST SNAPSHOT: ArrayList-1, []",
            "STORE: 1, []",
            "INVOKE: ArrayList-1, add, (Ljava/lang/Object;)Z, [7]",
            "RETURNED: true",
        ]
    );

    let snapshot = session.object_snapshot(&list, 1).expect("list is tracked");
    assert_eq!(snapshot.as_sequence(), Some(&[][..]));
    let snapshot = session.object_snapshot(&list, 2).expect("list is tracked");
    assert_eq!(snapshot.as_sequence(), Some(&[Value::Int(7)][..]));
}

#[test]
fn clear_resets_labels_and_log() {
    let session = TraceSession::default();
    let main = ThreadRef::new(1, "main");
    let first = ObjRef::instance("demo/Point");
    session.record(
        &main,
        session.next_activation_id(),
        None,
        EventKind::SetReceiver {
            receiver: Value::Object(first),
        },
    );
    session.clear();
    assert!(session.is_empty());

    let second = ObjRef::instance("demo/Point");
    session.record(
        &main,
        session.next_activation_id(),
        None,
        EventKind::SetReceiver {
            receiver: Value::Object(second),
        },
    );
    assert_eq!(session.log_lines(), vec!["SETTHIS: Point-1"]);
    assert_eq!(session.events()[0].activation, 0);
}
