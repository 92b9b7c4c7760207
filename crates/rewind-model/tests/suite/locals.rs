use rewind_model::EventLog;
use rewind_test_utils::probes::METHODS;
use rewind_trace::{EventKind, Value};
use rewind_vm::samples::{QUICK_SORT, SORT_DESCRIPTOR};

use super::{int_list, is_return_of, last_event, traced};

#[test]
fn quick_sort_locals_before_the_root_returns() {
    let vm = traced(&[QUICK_SORT]);
    let lane = vm.lane("main");
    let input = int_list(&[5, 2, 7, 5, 9, 8, 7, 1, 3]);
    lane.invoke_static(QUICK_SORT, "sort", SORT_DESCRIPTOR, vec![input.clone()]).unwrap();

    let log = EventLog::from_session(vm.session());
    let thread = lane.thread();
    let tree = log.call_stack(thread);
    let root = &tree[tree.roots()[0]];
    let returning = last_event(log.events(), thread, |event| {
        is_return_of(event, root.activation())
    });

    let locals = log.local_variables_at(thread, returning);
    let names: Vec<&str> = locals.keys().map(String::as_str).collect();
    assert_eq!(names, ["left", "pivot", "result", "right", "values", "x"]);
    assert_eq!(locals["values"], input);
    assert_eq!(locals["pivot"], Value::Int(5));
    assert_eq!(locals["x"], Value::Int(9));

    let left = locals["left"].as_object().unwrap();
    let left = log.object_snapshot(left, returning).unwrap();
    assert_eq!(
        left.as_sequence(),
        Some(&[Value::Int(2), Value::Int(1), Value::Int(3)][..])
    );

    let exit = returning + 1;
    assert!(matches!(
        log.events()[exit as usize].kind,
        EventKind::ExitWithValue { .. }
    ));
    assert!(log.local_variables_at(thread, exit).is_empty());
}

#[test]
fn nested_call_sees_only_its_own_frame() {
    let vm = traced(&[QUICK_SORT]);
    let lane = vm.lane("main");
    lane.invoke_static(QUICK_SORT, "sort", SORT_DESCRIPTOR, vec![int_list(&[2, 1])]).unwrap();

    let log = EventLog::from_session(vm.session());
    let thread = lane.thread();
    let tree = log.call_stack(thread);
    let root = tree.roots()[0];
    let nested = tree.instrumented_children(root).next().unwrap();
    let nested_activation = tree[nested].activation();
    let entry = log
        .events()
        .iter()
        .find(|event| {
            event.activation == nested_activation
                && matches!(event.kind, EventKind::EnterActivation { .. })
        })
        .unwrap();

    // Names are announced after entry, so the parameter is still anonymous.
    let locals = log.local_variables_at(thread, entry.sequence);
    assert_eq!(locals.len(), 1);
    assert_eq!(tree[nested].args().first(), locals.get("local-0"));
}

#[test]
fn every_declared_type_is_visible() {
    let vm = traced(&[METHODS]);
    let methods = vm.lane("setup").new_object(METHODS, "()V", vec![]).unwrap();
    let receiver = Value::Object(methods);
    vm.session().clear();

    let lane = vm.lane("main");
    lane.invoke_virtual(receiver.clone(), "localVariableTypes", "()V", vec![]).unwrap();

    let log = EventLog::from_session(vm.session());
    let thread = lane.thread();
    let returning = last_event(log.events(), thread, |event| {
        matches!(event.kind, EventKind::ReturnValue { .. })
    });
    assert_eq!(log.source_line_at(thread, returning), None);

    let locals = log.local_variables_at(thread, returning);
    let expected = [
        ("a", Value::Int(1)),
        ("b", Value::Int(1)),
        ("c", Value::Int(50)),
        ("d", Value::Int(3)),
        ("e", Value::Int(4)),
        ("f", Value::Long(5)),
        ("g", Value::Float(6.0)),
        ("h", Value::Double(7.0)),
        ("i", Value::Null),
        ("j", Value::Null),
        ("this", receiver),
    ];
    let actual: Vec<(&str, Value)> = locals
        .iter()
        .map(|(name, value)| (name.as_str(), value.clone()))
        .collect();
    assert_eq!(actual, expected);
}
