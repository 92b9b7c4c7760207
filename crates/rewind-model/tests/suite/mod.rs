use std::sync::Arc;

use rewind_config::InstrumentConfig;
use rewind_instrument::Instrumentor;
use rewind_trace::{EventKind, ObjRef, ThreadRef, TraceEvent, TraceSession, Value};
use rewind_vm::{samples, Vm};

mod call_tree;
mod locals;
mod snapshots;

/// A runtime with every fixture loaded and the named classes instrumented.
pub(crate) fn traced(classes: &[&str]) -> Vm {
    let vm = Vm::new(Arc::new(TraceSession::default()));
    let fixtures = rewind_test_utils::all_classes()
        .into_iter()
        .chain([samples::quick_sort_class().expect("sample class verifies")]);
    for class in fixtures {
        vm.load_class(class).expect("fixture loads");
    }

    let instrumentor = Instrumentor::new(InstrumentConfig::default());
    for name in classes {
        let class = vm.class(name).expect("fixture is loaded");
        let result = instrumentor
            .instrument_and_redefine(&class, &vm)
            .unwrap_or_else(|err| panic!("instrumenting {name} failed: {err}"));
        assert!(result.is_complete(), "{name}: {:?}", result.failures);
    }
    vm
}

pub(crate) fn int_list(values: &[i32]) -> Value {
    let elements = values.iter().copied().map(Value::Int).collect();
    Value::Object(ObjRef::list("java/util/ArrayList", elements))
}

/// Sequence of the last event on `thread` matching `predicate`.
pub(crate) fn last_event(
    events: &[TraceEvent],
    thread: &ThreadRef,
    predicate: impl Fn(&TraceEvent) -> bool,
) -> u64 {
    events
        .iter()
        .rev()
        .find(|event| &event.thread == thread && predicate(event))
        .map(|event| event.sequence)
        .expect("a matching event was recorded")
}

pub(crate) fn is_return_of(event: &TraceEvent, activation: i64) -> bool {
    event.activation == activation && matches!(event.kind, EventKind::ReturnValue { .. })
}
