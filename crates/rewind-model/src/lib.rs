//! Read-side queries over a recorded trace.
//!
//! An [`EventLog`] is a point-in-time copy of a session's events. Every query
//! on it is a pure function of that copy: the call tree of a lane, the local
//! variables visible at a given event, and the contents a tracked container
//! had at any position.

mod locals;
mod log;
mod tree;
mod view;

pub use crate::log::EventLog;
pub use crate::tree::{CallNode, CallTree, NodeDisplay, NodeId};
pub use crate::view::{CallTreeView, NodeView};
