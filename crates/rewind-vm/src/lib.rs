//! A small stack-machine runtime for [`rewind_bytecode`] classes.
//!
//! The runtime executes both original and instrumented method bodies. Probe
//! instructions are forwarded to the [`TraceSession`] the runtime was created
//! with, and the runtime doubles as the [`ClassRedefiner`] the instrumentor
//! installs rewritten classes through.
//!
//! ```
//! use std::sync::Arc;
//!
//! use rewind_trace::{ObjRef, TraceSession, Value};
//! use rewind_vm::{samples, Vm};
//!
//! let vm = Vm::new(Arc::new(TraceSession::default()));
//! vm.load_class(samples::quick_sort_class().unwrap()).unwrap();
//!
//! let input = ObjRef::list("java/util/ArrayList", vec![Value::Int(3), Value::Int(1)]);
//! let sorted = vm
//!     .lane("main")
//!     .invoke_static(
//!         samples::QUICK_SORT,
//!         "sort",
//!         samples::SORT_DESCRIPTOR,
//!         vec![Value::Object(input)],
//!     )
//!     .unwrap();
//! let sorted = sorted.and_then(|value| value.as_object().and_then(ObjRef::list_elements));
//! assert_eq!(sorted, Some(vec![Value::Int(1), Value::Int(3)]));
//! ```

#![forbid(unsafe_code)]

mod builtins;
mod class;
mod error;
mod interp;
mod lane;
mod natives;
mod probe;
mod runtime;
pub mod samples;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rewind_bytecode::{ClassDef, ClassRedefiner, RedefineError};
use rewind_config::VmConfig;
use rewind_trace::{ThreadRef, TraceSession};

use crate::class::ClassTable;
use crate::natives::NativeRegistry;
use crate::runtime::VmShared;

pub use crate::error::VmError;
pub use crate::lane::Lane;

/// Handle to one runtime. Clones share classes, statics and the session.
#[derive(Clone)]
pub struct Vm {
    shared: Arc<VmShared>,
}

impl Vm {
    pub fn new(session: Arc<TraceSession>) -> Self {
        Self::with_config(session, VmConfig::default())
    }

    pub fn with_config(session: Arc<TraceSession>, config: VmConfig) -> Self {
        Self {
            shared: Arc::new(VmShared {
                session,
                config,
                classes: ClassTable::with_builtins(),
                natives: NativeRegistry::with_builtins(),
                statics: Mutex::default(),
                next_lane: AtomicU64::new(1),
            }),
        }
    }

    pub fn session(&self) -> &Arc<TraceSession> {
        &self.shared.session
    }

    pub fn config(&self) -> &VmConfig {
        &self.shared.config
    }

    /// Make `class` available for execution. Its superclass must already be
    /// loaded or built in.
    pub fn load_class(&self, class: ClassDef) -> Result<(), VmError> {
        if let Some(super_name) = &class.super_name {
            self.shared.classes.require(super_name)?;
        }
        tracing::debug!(target: "rewind.vm", class = %class.name, "loading class");
        self.shared.classes.insert(class)
    }

    /// The current definition of a loaded class.
    pub fn class(&self, name: &str) -> Option<ClassDef> {
        self.shared.classes.get(name).map(|class| class.def.clone())
    }

    /// Open a new execution lane named `name`. Each lane gets a distinct id
    /// even when names repeat.
    pub fn lane(&self, name: &str) -> Lane {
        let id = self.shared.next_lane.fetch_add(1, Ordering::Relaxed);
        Lane::new(Arc::clone(&self.shared), ThreadRef::new(id, name))
    }
}

impl ClassRedefiner for Vm {
    fn redefine_class(&self, class: ClassDef) -> Result<(), RedefineError> {
        let name = class.name.clone();
        self.shared.classes.replace(class)?;
        tracing::info!(target: "rewind.vm", class = %name, "class redefined");
        Ok(())
    }
}

impl std::fmt::Debug for Vm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vm")
            .field("config", &self.shared.config)
            .field("natives", &self.shared.natives)
            .finish_non_exhaustive()
    }
}
