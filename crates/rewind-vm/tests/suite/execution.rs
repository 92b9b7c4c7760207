use std::thread;

use rewind_test_utils::{probes, programs};
use rewind_trace::{ObjRef, Value};
use rewind_vm::samples;

use super::runtime;

fn ints(values: &[i32]) -> Vec<Value> {
    values.iter().copied().map(Value::Int).collect()
}

#[test]
fn quick_sort_runs_uninstrumented() {
    let vm = runtime();
    vm.load_class(samples::quick_sort_class().unwrap()).unwrap();

    let input = ObjRef::list("java/util/ArrayList", ints(&[5, 2, 3, 8, 7, 3, 8, 6, 3]));
    let sorted = vm
        .lane("main")
        .invoke_static(
            samples::QUICK_SORT,
            "sort",
            samples::SORT_DESCRIPTOR,
            vec![Value::Object(input.clone())],
        )
        .unwrap()
        .unwrap();

    let sorted = sorted.as_object().and_then(ObjRef::list_elements).unwrap();
    assert_eq!(sorted, ints(&[2, 3, 3, 3, 5, 6, 7, 8, 8]));
    // The input is partitioned into fresh lists and never modified.
    assert_eq!(input.list_elements().unwrap(), ints(&[5, 2, 3, 8, 7, 3, 8, 6, 3]));
    assert!(vm.session().is_empty());
}

#[test]
fn constructor_chain_initializes_inherited_fields() {
    let vm = runtime();
    let square = vm
        .lane("main")
        .invoke_static(programs::SHAPE_FACTORY, "square", "()Lfixtures/Square;", vec![])
        .unwrap()
        .unwrap();

    let square = square.as_object().unwrap();
    assert_eq!(square.class_name(), programs::SQUARE);
    assert_eq!(square.field("sides"), Some(Value::Int(4)));
    assert_eq!(square.field("size"), Some(Value::Int(1)));
}

#[test]
fn static_calls_cross_classes() {
    let vm = runtime();
    let result = vm
        .lane("main")
        .invoke_static(programs::GAP_CALLER, "outer", "()I", vec![])
        .unwrap();
    assert_eq!(result, Some(Value::Int(42)));
}

#[test]
fn virtual_calls_dispatch_to_inherited_and_interface_methods() {
    let vm = runtime();
    let lane = vm.lane("main");
    let methods = Value::Object(lane.new_object(probes::METHODS, "()V", vec![]).unwrap());

    let call = |name: &str, descriptor: &str, args: Vec<Value>| {
        lane.invoke_virtual(methods.clone(), name, descriptor, args).unwrap()
    };
    assert_eq!(call("superMethod", "()I", vec![]), Some(Value::Int(3)));
    assert_eq!(call("callInterfaceMethod", "()I", vec![]), Some(Value::Int(3)));
    assert_eq!(call("callSuperMethod", "()I", vec![]), Some(Value::Int(3)));
    assert_eq!(
        call("recursiveMethod", "(IZ)I", vec![Value::Int(5), Value::Int(1)]),
        Some(Value::Int(120))
    );
    assert_eq!(call("incrementVariable", "()I", vec![]), Some(Value::Int(2)));
    assert_eq!(call("simpleLongMethod", "()J", vec![]), Some(Value::Long(2)));
    assert_eq!(call("simpleStringMethod", "()Ljava/lang/String;", vec![]), Some(Value::str("2")));
    assert_eq!(call("callSimpleVoidMethod", "()V", vec![]), None);
}

#[test]
fn results_are_boxed_to_the_declared_return_type() {
    let vm = runtime();
    let result = vm
        .lane("main")
        .invoke_static("java/lang/Integer", "valueOf", "(I)Ljava/lang/Integer;", ints(&[9]))
        .unwrap();
    assert_eq!(result, Some(Value::Int(9)));

    let lane = vm.lane("main");
    let list = Value::Object(ObjRef::list("java/util/ArrayList", Vec::new()));
    let added = lane
        .invoke_virtual(list, "add", "(Ljava/lang/Object;)Z", vec![Value::str("x")])
        .unwrap();
    assert_eq!(added, Some(Value::Boolean(true)));
}

#[test]
fn statics_are_shared_between_lanes() {
    let vm = runtime();
    let bump = |vm: &rewind_vm::Vm| {
        vm.lane("worker")
            .invoke_static(programs::FAULTS, "bump", "()I", vec![])
            .unwrap()
    };
    assert_eq!(bump(&vm), Some(Value::Int(1)));

    let other = vm.clone();
    let from_thread = thread::spawn(move || bump(&other)).join().unwrap();
    assert_eq!(from_thread, Some(Value::Int(2)));
    assert_eq!(bump(&vm), Some(Value::Int(3)));
}

#[test]
fn lanes_get_distinct_ids() {
    let vm = runtime();
    let first = vm.lane("main");
    let second = vm.lane("main");
    assert_ne!(first.thread().id(), second.thread().id());
    assert_eq!(first.thread().name(), "main");
}

#[test]
fn argument_count_is_checked() {
    let vm = runtime();
    let err = vm
        .lane("main")
        .invoke_static(programs::FAULTS, "divide", "(II)I", ints(&[1]))
        .unwrap_err();
    assert!(
        err.to_string().contains("expected 2 arguments, got 1"),
        "unexpected error: {err}"
    );
}

#[test]
fn missing_methods_and_classes_are_linkage_errors() {
    let vm = runtime();
    let lane = vm.lane("main");

    let err = lane
        .invoke_static(programs::FAULTS, "absent", "()V", vec![])
        .unwrap_err();
    assert_eq!(err.to_string(), "no method fixtures/Faults.absent()V");

    let err = lane
        .invoke_static("fixtures/Nowhere", "run", "()V", vec![])
        .unwrap_err();
    assert!(err.exception().is_none());

    let err = lane
        .invoke_virtual(Value::Null, "toString", "()Ljava/lang/String;", vec![])
        .unwrap_err();
    assert_eq!(
        err.exception().map(ObjRef::class_name),
        Some("java/lang/NullPointerException")
    );
}
