use std::sync::Arc;

use rewind_config::VmConfig;
use rewind_trace::TraceSession;
use rewind_vm::Vm;

mod execution;
mod library;
mod redefinition;

/// A runtime with every test fixture loaded and nothing instrumented.
pub(crate) fn runtime() -> Vm {
    runtime_with_config(VmConfig::default())
}

pub(crate) fn runtime_with_config(config: VmConfig) -> Vm {
    let vm = Vm::with_config(Arc::new(TraceSession::default()), config);
    for class in rewind_test_utils::all_classes() {
        let name = class.name.clone();
        vm.load_class(class)
            .unwrap_or_else(|err| panic!("failed to load {name}: {err}"));
    }
    vm
}
