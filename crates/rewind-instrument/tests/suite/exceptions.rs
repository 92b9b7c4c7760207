use rewind_test_utils::{probes, programs};
use rewind_trace::{EventKind, Value};

use super::{methods_receiver, traced};

#[test]
fn caught_exception_reports_throw_and_catch() {
    let vm = traced(&[probes::METHODS]);
    let receiver = methods_receiver(&vm);
    let result = vm
        .lane("main")
        .invoke_virtual(receiver, "throwException", "()I", vec![])
        .unwrap();
    assert_eq!(result, Some(Value::Int(2)));

    assert_eq!(
        vm.session().log_lines(),
        vec![
            "ENTER METHOD: fixtures/Probes$Methods, throwException, ()I, []",
            "SETTHIS: Methods-1",
            "SET LOCAL NAME: e, 1",
            "INVOKE SPECIAL: null, java/lang/RuntimeException, <init>, \
             (Ljava/lang/String;)V, [Test Exception]",
            "RETURNED: null",
            "THROW: java.lang.RuntimeException, Test Exception",
            "CATCH: java.lang.RuntimeException, Test Exception",
            "STORE: 1, RuntimeException-1",
            "RETURN: 2",
            "EXIT VALUE: 2",
        ]
    );
}

#[test]
fn uncaught_exception_exits_the_activation() {
    let vm = traced(&[probes::METHODS]);
    let receiver = methods_receiver(&vm);
    let err = vm
        .lane("main")
        .invoke_virtual(receiver, "throwUncaughtException", "()I", vec![])
        .unwrap_err();
    assert_eq!(
        err.exception().map(|exception| exception.class_name()),
        Some("java/lang/RuntimeException")
    );

    let log = vm.session().log_lines();
    assert_eq!(
        log[log.len() - 2..],
        [
            "THROW: java.lang.RuntimeException, Test Exception",
            "EXIT EXCEPTION: java.lang.RuntimeException, Test Exception",
        ]
    );
}

#[test]
fn every_frame_reports_the_same_exception_on_exit() {
    let vm = traced(&[programs::THROWER]);
    vm.lane("main")
        .invoke_static(programs::THROWER, "level1", "()V", vec![])
        .unwrap_err();

    let events = vm.session().events();
    let exits: Vec<_> = events
        .iter()
        .filter_map(|event| match &event.kind {
            EventKind::ExitWithException { exception } => {
                Some((event.activation, exception.clone()))
            }
            _ => None,
        })
        .collect();
    assert_eq!(exits.len(), 3);
    // Innermost frame first.
    assert!(exits[0].0 > exits[1].0 && exits[1].0 > exits[2].0);
    assert!(exits.iter().all(|(_, exception)| *exception == exits[0].1));

    let throws = events
        .iter()
        .filter(|event| matches!(event.kind, EventKind::ThrowValue { .. }))
        .count();
    assert_eq!(throws, 1);
}

#[test]
fn runtime_faults_exit_through_the_protective_region() {
    let vm = traced(&[programs::FAULTS]);
    vm.lane("main")
        .invoke_static(programs::FAULTS, "readArray", "(I)I", vec![Value::Int(7)])
        .unwrap_err();

    let log = vm.session().log_lines();
    assert_eq!(
        log.last().map(String::as_str),
        Some(
            "EXIT EXCEPTION: java.lang.ArrayIndexOutOfBoundsException, \
             Index 7 out of bounds for length 3"
        )
    );
}

#[test]
fn handlers_in_instrumented_code_still_catch() {
    let vm = traced(&[programs::FAULTS]);
    let lane = vm.lane("main");
    let result = lane
        .invoke_static(
            programs::FAULTS,
            "divide",
            "(II)I",
            vec![Value::Int(1), Value::Int(0)],
        )
        .unwrap();
    assert_eq!(result, Some(Value::Int(-1)));

    let log = vm.session().log_lines();
    assert!(log.contains(&"CATCH: java.lang.ArithmeticException, / by zero".to_owned()));
    assert!(!log.iter().any(|line| line.starts_with("EXIT EXCEPTION")));
}
