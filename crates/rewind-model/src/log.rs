use std::collections::BTreeMap;
use std::sync::Arc;

use rewind_trace::{
    IdentityLabeler, ObjRef, SnapshotRegistry, SnapshotValue, ThreadRef, TraceEvent,
    TraceSession, Value, ValueRenderer,
};

use crate::locals::locals_at;
use crate::tree::CallTree;
use crate::view::CallTreeView;

/// Point-in-time copy of a trace, with the queries a debugger front end asks
/// of it.
///
/// Events are kept in sequence order. Queries never touch the live session,
/// so an `EventLog` may be inspected while the program keeps running.
#[derive(Debug, Clone)]
pub struct EventLog {
    events: Arc<[TraceEvent]>,
    registry: SnapshotRegistry,
    labeler: Arc<IdentityLabeler>,
}

impl EventLog {
    /// Wraps an arbitrary event list. Objects are labeled from scratch, so
    /// labels may differ from a session's log lines.
    pub fn new(mut events: Vec<TraceEvent>, registry: SnapshotRegistry) -> Self {
        events.sort_by_key(|event| event.sequence);
        Self {
            events: events.into(),
            registry,
            labeler: Arc::new(IdentityLabeler::new()),
        }
    }

    /// Copies the session's events, sharing its labels and strategies.
    pub fn from_session(session: &TraceSession) -> Self {
        Self {
            events: session.events().into(),
            registry: session.registry().clone(),
            labeler: Arc::clone(session.labeler()),
        }
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Every lane that recorded an event, sorted by name.
    pub fn threads(&self) -> Vec<ThreadRef> {
        let mut threads: Vec<ThreadRef> = self.events.iter().map(|e| e.thread.clone()).collect();
        threads.sort_by(|a, b| a.name().cmp(b.name()).then(a.id().cmp(&b.id())));
        threads.dedup();
        threads
    }

    /// The lane with the given name, if it recorded anything.
    pub fn thread_named(&self, name: &str) -> Option<ThreadRef> {
        self.events
            .iter()
            .find(|event| event.thread.name() == name)
            .map(|event| event.thread.clone())
    }

    pub fn call_stack(&self, thread: &ThreadRef) -> CallTree {
        CallTree::build(self, thread)
    }

    /// Serializable rendering of [`EventLog::call_stack`], with containers
    /// shown as they were when each call was entered and left.
    pub fn call_tree_view(&self, thread: &ThreadRef) -> CallTreeView {
        CallTreeView::new(self, &self.call_stack(thread))
    }

    /// Local variables of the innermost activation open on `thread` once the
    /// event at `sequence` has been applied.
    pub fn local_variables_at(
        &self,
        thread: &ThreadRef,
        sequence: u64,
    ) -> BTreeMap<String, Value> {
        locals_at(
            self.prefix(sequence)
                .iter()
                .filter(|event| &event.thread == thread),
        )
    }

    /// Contents of `object` once the event at `up_to` has been applied.
    pub fn object_snapshot(&self, object: &ObjRef, up_to: u64) -> Option<SnapshotValue> {
        self.registry.materialize(object, self.prefix(up_to))
    }

    /// Source line of the latest event on `thread` at or before `sequence`
    /// that carries one.
    pub fn source_line_at(&self, thread: &ThreadRef, sequence: u64) -> Option<u32> {
        self.prefix(sequence)
            .iter()
            .rev()
            .filter(|event| &event.thread == thread)
            .find_map(|event| event.line)
    }

    /// `value` as text, with every tracked container it reaches shown as it
    /// was at position `at`. Containers the log never snapshotted fall back
    /// to their live contents.
    pub fn render_at(&self, value: &Value, at: u64) -> String {
        let resolve = |object: &ObjRef| self.object_snapshot(object, at);
        ValueRenderer::new(&self.labeler).render_resolved(value, &resolve)
    }

    fn prefix(&self, up_to: u64) -> &[TraceEvent] {
        let end = self.events.partition_point(|event| event.sequence <= up_to);
        &self.events[..end]
    }
}
