//! Trace events and the session that records them.
//!
//! Instrumented code reports every observable state change to a
//! [`TraceSession`]. The session labels objects by identity, keeps the
//! ordered event log together with its human-readable rendering, and takes
//! [`snapshot`]s of mutable containers so their contents can later be
//! reconstructed at any point of the run.

mod event;
mod label;
mod render;
mod session;
pub mod snapshot;
mod value;

pub use crate::event::{ActivationId, EventKind, ThreadRef, TraceEvent, NOT_INSTRUMENTED};
pub use crate::label::{simple_type_name, IdentityLabeler, NULL_LABEL};
pub use crate::render::{exception_summary, ValueRenderer};
pub use crate::session::TraceSession;
pub use crate::snapshot::{
    ListSnapshotStrategy, MapSnapshotStrategy, SnapshotRegistry, SnapshotStrategy, SnapshotValue,
};
pub use crate::value::{HeapObject, ObjRef, ObjectData, ObjectId, Value};
