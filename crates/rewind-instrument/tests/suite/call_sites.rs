use rewind_test_utils::probes::{self, METHODS, METHODS_BASE, PARAMETER_TYPES};
use rewind_trace::Value;
use rewind_vm::samples;

use super::{log_of_call, traced};

fn lines(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|line| line.to_string()).collect()
}

#[test]
fn simple_calls_report_the_returned_value() {
    let vm = traced(&[probes::METHODS]);
    for (kind, descriptor, value) in [
        ("Void", "()V", "null"),
        ("Int", "()I", "2"),
        ("Float", "()F", "2.0"),
        ("Double", "()D", "2.0"),
        ("Long", "()J", "2"),
        ("String", "()Ljava/lang/String;", "2"),
    ] {
        let caller = format!("callSimple{kind}Method");
        let callee = format!("simple{kind}Method");
        let log = log_of_call(&vm, &caller, "()V", vec![]);
        assert_eq!(
            log,
            vec![
                format!("ENTER METHOD: {METHODS}, {caller}, ()V, []"),
                "SETTHIS: Methods-1".to_owned(),
                format!("INVOKE: Methods-1, {callee}, {descriptor}, []"),
                format!("ENTER METHOD: {METHODS}, {callee}, {descriptor}, []"),
                "SETTHIS: Methods-1".to_owned(),
                format!("RETURN: {value}"),
                format!("EXIT VALUE: {value}"),
                format!("RETURNED: {value}"),
                "RETURN: null".to_owned(),
                "EXIT VALUE: null".to_owned(),
            ],
            "{caller}"
        );
    }
}

#[test]
fn recursion_nests_activations() {
    let vm = traced(&[probes::METHODS]);
    let log = log_of_call(
        &vm,
        "recursiveMethod",
        "(IZ)I",
        vec![Value::Int(3), Value::Boolean(true)],
    );

    let enter = |n: i32| format!("ENTER METHOD: {METHODS}, recursiveMethod, (IZ)I, [{n}, true]");
    let invoke = |n: i32| format!("INVOKE: Methods-1, recursiveMethod, (IZ)I, [{n}, true]");
    let this = || "SETTHIS: Methods-1".to_owned();
    assert_eq!(
        log,
        vec![
            enter(3),
            this(),
            invoke(2),
            enter(2),
            this(),
            invoke(1),
            enter(1),
            this(),
            "RETURN: 1".to_owned(),
            "EXIT VALUE: 1".to_owned(),
            "RETURNED: 1".to_owned(),
            "RETURN: 2".to_owned(),
            "EXIT VALUE: 2".to_owned(),
            "RETURNED: 2".to_owned(),
            "RETURN: 6".to_owned(),
            "EXIT VALUE: 6".to_owned(),
        ]
    );
}

#[test]
fn parameters_are_reported_on_entry() {
    let vm = traced(&[probes::METHODS]);
    let args = vec![Value::Int(1), Value::Int(2)];

    let log = log_of_call(&vm, "intParameterMethod", "(II)I", args.clone());
    assert_eq!(
        log,
        vec![
            format!("ENTER METHOD: {METHODS}, intParameterMethod, (II)I, [1, 2]"),
            "SETTHIS: Methods-1".to_owned(),
            "RETURN: 3".to_owned(),
            "EXIT VALUE: 3".to_owned(),
        ]
    );

    vm.session().clear();
    vm.lane("main")
        .invoke_static(probes::METHODS, "staticIntParameterMethod", "(II)I", args)
        .unwrap();
    assert_eq!(
        vm.session().log_lines(),
        vec![
            format!("ENTER METHOD: {METHODS}, staticIntParameterMethod, (II)I, [1, 2]"),
            "RETURN: 3".to_owned(),
            "EXIT VALUE: 3".to_owned(),
        ]
    );
}

#[test]
fn every_parameter_type_is_boxed() {
    let vm = traced(&[probes::METHODS]);
    let log = log_of_call(&vm, "callParameterTypes", "()I", vec![]);

    let args = "[true, 1, 2, 3, 4, 5, 6.0, 7.0, null, null]";
    assert_eq!(
        log,
        vec![
            format!("ENTER METHOD: {METHODS}, callParameterTypes, ()I, []"),
            "SETTHIS: Methods-1".to_owned(),
            format!("INVOKE: Methods-1, parameterTypes, {PARAMETER_TYPES}, {args}"),
            format!("ENTER METHOD: {METHODS}, parameterTypes, {PARAMETER_TYPES}, {args}"),
            "SETTHIS: Methods-1".to_owned(),
            "RETURN: 1".to_owned(),
            "EXIT VALUE: 1".to_owned(),
            "RETURNED: 1".to_owned(),
            "RETURN: 1".to_owned(),
            "EXIT VALUE: 1".to_owned(),
        ]
    );
}

#[test]
fn static_calls_into_library_code() {
    let vm = traced(&[probes::METHODS]);
    let log = log_of_call(&vm, "callStaticMethod", "()V", vec![]);

    let mut expected = lines(&["SETTHIS: Methods-1"]);
    for value in 1..=3 {
        expected.push(format!(
            "INVOKE STATIC: java/lang/Integer, valueOf, (I)Ljava/lang/Integer;, [{value}]"
        ));
        expected.push(format!("RETURNED: {value}"));
    }
    expected.extend(lines(&["RETURN: null", "EXIT VALUE: null"]));
    assert_eq!(log[1..], expected[..]);
}

#[test]
fn constructor_calls_have_no_receiver_yet() {
    let vm = traced(&[probes::METHODS]);
    let log = log_of_call(&vm, "callConstructor", "()V", vec![]);
    assert_eq!(
        log[2..],
        lines(&[
            "INVOKE SPECIAL: null, java/util/ArrayList, <init>, (I)V, [5]",
            "RETURNED: null",
            "RETURN: null",
            "EXIT VALUE: null",
        ])[..]
    );
}

#[test]
fn interface_calls_are_reported_as_virtual() {
    let vm = traced(&[probes::METHODS]);
    let log = log_of_call(&vm, "callInterfaceMethod", "()I", vec![]);
    assert_eq!(
        log[2..],
        lines(&[
            "INVOKE: Methods-1, interfaceMethod, (I)I, [2]",
            "ENTER METHOD: fixtures/Probes$Methods, interfaceMethod, (I)I, [2]",
            "SETTHIS: Methods-1",
            "RETURN: 3",
            "EXIT VALUE: 3",
            "RETURNED: 3",
            "RETURN: 3",
            "EXIT VALUE: 3",
        ])[..]
    );
}

#[test]
fn super_calls_into_uninstrumented_code() {
    let vm = traced(&[probes::METHODS]);
    let log = log_of_call(&vm, "callSuperMethod", "()I", vec![]);
    assert_eq!(
        log[2..],
        [
            format!("INVOKE SPECIAL: Methods-1, {METHODS_BASE}, superMethod, ()I, []"),
            "RETURNED: 3".to_owned(),
            "RETURN: 3".to_owned(),
            "EXIT VALUE: 3".to_owned(),
        ]
    );
}

#[test]
fn constructor_receiver_is_reported_after_the_super_call() {
    let vm = traced(&[probes::METHODS, probes::METHODS_BASE]);
    vm.lane("main")
        .new_object(probes::METHODS, "()V", vec![])
        .unwrap();

    assert_eq!(
        vm.session().log_lines(),
        vec![
            format!("ENTER METHOD: {METHODS}, <init>, ()V, []"),
            format!("INVOKE SPECIAL: null, {METHODS_BASE}, <init>, ()V, []"),
            format!("ENTER METHOD: {METHODS_BASE}, <init>, ()V, []"),
            "INVOKE SPECIAL: null, java/lang/Object, <init>, ()V, []".to_owned(),
            "RETURNED: null".to_owned(),
            "SETTHIS: Methods-1".to_owned(),
            "RETURN: null".to_owned(),
            "EXIT VALUE: null".to_owned(),
            "RETURNED: null".to_owned(),
            "SETTHIS: Methods-1".to_owned(),
            "RETURN: null".to_owned(),
            "EXIT VALUE: null".to_owned(),
        ]
    );
}

#[test]
fn quick_sort_returns_from_both_exits() {
    let vm = traced(&[samples::QUICK_SORT]);
    let input = rewind_trace::ObjRef::list(
        "java/util/ArrayList",
        vec![Value::Int(2), Value::Int(1)],
    );
    vm.lane("main")
        .invoke_static(
            samples::QUICK_SORT,
            "sort",
            samples::SORT_DESCRIPTOR,
            vec![Value::Object(input)],
        )
        .unwrap();

    let return_lines: Vec<Option<u32>> = vm
        .session()
        .events()
        .iter()
        .filter(|event| matches!(event.kind, rewind_trace::EventKind::ReturnValue { .. }))
        .map(|event| event.line)
        .collect();
    assert_eq!(return_lines, vec![Some(9), Some(9), Some(28)]);
}
