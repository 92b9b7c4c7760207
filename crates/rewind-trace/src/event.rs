use std::fmt;
use std::sync::Arc;

use rewind_bytecode::MemberRef;
use serde::Serialize;

use crate::snapshot::SnapshotValue;
use crate::value::{ObjRef, Value};

/// Activation id of a method execution. Instrumented methods draw fresh ids
/// from the trace session; calls into code that is not instrumented are
/// represented by [`NOT_INSTRUMENTED`].
pub type ActivationId = i64;

pub const NOT_INSTRUMENTED: ActivationId = -1;

/// An execution lane (thread) identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ThreadRef {
    id: u64,
    name: Arc<str>,
}

impl ThreadRef {
    pub fn new(id: u64, name: &str) -> Self {
        Self {
            id,
            name: Arc::from(name),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ThreadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TraceEvent {
    /// Position in the session log; strictly increasing across all lanes.
    pub sequence: u64,
    pub thread: ThreadRef,
    pub activation: ActivationId,
    pub line: Option<u32>,
    pub kind: EventKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum EventKind {
    EnterActivation {
        method: MemberRef,
        is_static: bool,
        args: Vec<Value>,
    },
    SetReceiver {
        receiver: Value,
    },
    PutField {
        target: Value,
        name: String,
        value: Value,
    },
    StoreLocal {
        slot: u16,
        value: Value,
    },
    StoreElement {
        array: Value,
        index: i32,
        value: Value,
    },
    /// Also used for interface calls.
    InvokeVirtual {
        receiver: Value,
        method: MemberRef,
        args: Vec<Value>,
    },
    /// `receiver` is null for constructor calls, whose target is not yet
    /// initialized when the call is announced.
    InvokeSpecial {
        receiver: Value,
        method: MemberRef,
        args: Vec<Value>,
    },
    InvokeStatic {
        method: MemberRef,
        args: Vec<Value>,
    },
    ReturnValue {
        value: Value,
    },
    /// Result of a call as seen by the caller; null for `void` methods.
    ReturnedValue {
        value: Value,
    },
    ThrowValue {
        exception: Value,
    },
    CatchValue {
        exception: Value,
    },
    ExitWithValue {
        value: Value,
    },
    ExitWithException {
        exception: Value,
    },
    SetLocalName {
        slot: u16,
        name: String,
    },
    ObjectSnapshot {
        object: ObjRef,
        /// Name of the strategy that produced the snapshot, e.g. `LIST`.
        strategy: &'static str,
        snapshot: SnapshotValue,
    },
}

impl EventKind {
    pub fn tag(&self) -> &'static str {
        match self {
            EventKind::EnterActivation { .. } => "EnterActivation",
            EventKind::SetReceiver { .. } => "SetReceiver",
            EventKind::PutField { .. } => "PutField",
            EventKind::StoreLocal { .. } => "StoreLocal",
            EventKind::StoreElement { .. } => "StoreElement",
            EventKind::InvokeVirtual { .. } => "InvokeVirtual",
            EventKind::InvokeSpecial { .. } => "InvokeSpecial",
            EventKind::InvokeStatic { .. } => "InvokeStatic",
            EventKind::ReturnValue { .. } => "ReturnValue",
            EventKind::ReturnedValue { .. } => "ReturnedValue",
            EventKind::ThrowValue { .. } => "ThrowValue",
            EventKind::CatchValue { .. } => "CatchValue",
            EventKind::ExitWithValue { .. } => "ExitWithValue",
            EventKind::ExitWithException { .. } => "ExitWithException",
            EventKind::SetLocalName { .. } => "SetLocalName",
            EventKind::ObjectSnapshot { .. } => "ObjectSnapshot",
        }
    }

    /// Method targeted by an invocation event.
    pub fn invoked_method(&self) -> Option<&MemberRef> {
        match self {
            EventKind::InvokeVirtual { method, .. }
            | EventKind::InvokeSpecial { method, .. }
            | EventKind::InvokeStatic { method, .. } => Some(method),
            _ => None,
        }
    }

    pub fn is_invocation(&self) -> bool {
        self.invoked_method().is_some()
    }

    /// Values whose first appearance warrants a baseline snapshot.
    pub(crate) fn observed_values(&self) -> Vec<&Value> {
        match self {
            EventKind::EnterActivation { args, .. } | EventKind::InvokeStatic { args, .. } => {
                args.iter().collect()
            }
            EventKind::InvokeVirtual { receiver, args, .. }
            | EventKind::InvokeSpecial { receiver, args, .. } => {
                std::iter::once(receiver).chain(args.iter()).collect()
            }
            EventKind::SetReceiver { receiver } => vec![receiver],
            EventKind::PutField { value, .. }
            | EventKind::StoreLocal { value, .. }
            | EventKind::StoreElement { value, .. }
            | EventKind::ReturnValue { value }
            | EventKind::ReturnedValue { value }
            | EventKind::ExitWithValue { value } => vec![value],
            EventKind::ThrowValue { .. }
            | EventKind::CatchValue { .. }
            | EventKind::ExitWithException { .. }
            | EventKind::SetLocalName { .. }
            | EventKind::ObjectSnapshot { .. } => Vec::new(),
        }
    }
}
