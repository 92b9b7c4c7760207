//! Call-tree reconstruction for a single lane.

use std::fmt;
use std::ops::Index;

use rewind_bytecode::MemberRef;
use rewind_trace::{
    ActivationId, EventKind, ThreadRef, TraceEvent, Value, NOT_INSTRUMENTED, NULL_LABEL,
};

use crate::log::EventLog;

/// Index of a node inside its [`CallTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

const ROOT: NodeId = NodeId(0);

/// One method execution as seen from the trace.
///
/// Nodes opened by an invocation event start with activation id
/// [`NOT_INSTRUMENTED`]; they adopt the callee's id when the callee turns out
/// to be instrumented and enters itself right away.
#[derive(Clone, Debug)]
pub struct CallNode {
    method: MemberRef,
    activation: ActivationId,
    args: Vec<Value>,
    result: Option<Value>,
    exception: Option<Value>,
    entered_at: u64,
    exited_at: Option<u64>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl CallNode {
    fn new(
        method: MemberRef,
        activation: ActivationId,
        args: Vec<Value>,
        entered_at: u64,
        parent: NodeId,
    ) -> Self {
        Self {
            method,
            activation,
            args,
            result: None,
            exception: None,
            entered_at,
            exited_at: None,
            parent: Some(parent),
            children: Vec::new(),
        }
    }

    fn root() -> Self {
        Self {
            method: MemberRef::new("", "", ""),
            activation: NOT_INSTRUMENTED,
            args: Vec::new(),
            result: None,
            exception: None,
            entered_at: 0,
            exited_at: None,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Owner, name and descriptor. For virtual calls into code that is not
    /// instrumented the owner is the receiver's runtime class.
    pub fn method(&self) -> &MemberRef {
        &self.method
    }

    pub fn activation(&self) -> ActivationId {
        self.activation
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Value the execution returned; `None` while unknown or after an
    /// exception.
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn exception(&self) -> Option<&Value> {
        self.exception.as_ref()
    }

    /// Sequence of the event that opened the node.
    pub fn entered_at(&self) -> u64 {
        self.entered_at
    }

    /// Sequence of the event that closed the node, if any did.
    pub fn exited_at(&self) -> Option<u64> {
        self.exited_at
    }

    /// `None` for top-level executions.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent.filter(|parent| *parent != ROOT)
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_instrumented(&self) -> bool {
        self.activation != NOT_INSTRUMENTED
    }

    /// An uninstrumented call that reached instrumented code again.
    pub fn is_gap(&self) -> bool {
        !self.is_instrumented() && !self.children.is_empty()
    }
}

/// Forest of method executions of one lane, in call order.
#[derive(Clone)]
pub struct CallTree {
    thread: ThreadRef,
    nodes: Vec<CallNode>,
    log: EventLog,
}

impl fmt::Debug for CallTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallTree")
            .field("thread", &self.thread)
            .field("nodes", &self.len())
            .finish()
    }
}

impl CallTree {
    pub(crate) fn build(log: &EventLog, thread: &ThreadRef) -> Self {
        let mut builder = Builder {
            tree: CallTree {
                thread: thread.clone(),
                nodes: vec![CallNode::root()],
                log: log.clone(),
            },
            current: ROOT,
        };
        for event in log.events().iter().filter(|event| &event.thread == thread) {
            builder.apply(event);
        }
        tracing::debug!(
            target: "rewind.model",
            thread = thread.name(),
            nodes = builder.tree.len(),
            "call tree rebuilt"
        );
        builder.tree
    }

    pub fn thread(&self) -> &ThreadRef {
        &self.thread
    }

    /// Top-level executions, in call order.
    pub fn roots(&self) -> &[NodeId] {
        &self.nodes[ROOT.0].children
    }

    pub fn get(&self, id: NodeId) -> Option<&CallNode> {
        match id {
            ROOT => None,
            NodeId(index) => self.nodes.get(index),
        }
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(CallNode::children).unwrap_or_default()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(CallNode::parent)
    }

    /// Number of nodes, not counting the synthetic root.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every node in depth-first pre-order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &CallNode)> + '_ {
        let mut pending: Vec<NodeId> = self.roots().iter().rev().copied().collect();
        std::iter::from_fn(move || {
            let id = pending.pop()?;
            let node = &self.nodes[id.0];
            pending.extend(node.children.iter().rev().copied());
            Some((id, node))
        })
    }

    /// Children of `id` that are instrumented executions.
    pub fn instrumented_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(|child| self.nodes[child.0].is_instrumented())
    }

    /// `Owner.name([args]) - result`, with the exception's class in place of
    /// the result when the execution threw. Arguments are shown as they were
    /// on entry and the result as it was on exit.
    pub fn display(&self, id: NodeId) -> NodeDisplay<'_> {
        NodeDisplay { tree: self, id }
    }
}

impl Index<NodeId> for CallTree {
    type Output = CallNode;

    fn index(&self, id: NodeId) -> &CallNode {
        &self.nodes[id.0]
    }
}

pub struct NodeDisplay<'a> {
    tree: &'a CallTree,
    id: NodeId,
}

impl fmt::Display for NodeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = &self.tree[self.id];
        let log = &self.tree.log;
        let args: Vec<String> = node
            .args
            .iter()
            .map(|arg| log.render_at(arg, node.entered_at))
            .collect();
        write!(
            f,
            "{}.{}([{}]) - ",
            node.method.owner,
            node.method.name,
            args.join(", ")
        )?;
        match (&node.exception, &node.result) {
            (Some(exception), _) => {
                f.write_str(exception.runtime_class().unwrap_or(NULL_LABEL))
            }
            (None, Some(result)) => {
                let exited_at = node.exited_at.unwrap_or(u64::MAX);
                f.write_str(&log.render_at(result, exited_at))
            }
            (None, None) => f.write_str(NULL_LABEL),
        }
    }
}

struct Builder {
    tree: CallTree,
    current: NodeId,
}

impl Builder {
    fn node(&mut self, id: NodeId) -> &mut CallNode {
        &mut self.tree.nodes[id.0]
    }

    fn push(&mut self, method: MemberRef, activation: ActivationId, args: &[Value], at: u64) {
        let id = NodeId(self.tree.nodes.len());
        let parent = self.current;
        self.tree
            .nodes
            .push(CallNode::new(method, activation, args.to_vec(), at, parent));
        self.node(parent).children.push(id);
        self.current = id;
    }

    /// Move `current` to its parent; the root stays put.
    fn pop(&mut self) {
        self.current = self.tree.nodes[self.current.0].parent.unwrap_or(ROOT);
    }

    fn apply(&mut self, event: &TraceEvent) {
        match &event.kind {
            EventKind::EnterActivation { method, args, .. } => {
                let current = self.current;
                let node = self.node(current);
                if current != ROOT && node.method == *method {
                    node.activation = event.activation;
                } else {
                    self.push(method.clone(), event.activation, args, event.sequence);
                }
            }
            EventKind::InvokeVirtual {
                receiver,
                method,
                args,
            } => {
                let owner = receiver.runtime_class().unwrap_or(&method.owner);
                let method = MemberRef::new(owner, &method.name, &method.descriptor);
                self.push(method, NOT_INSTRUMENTED, args, event.sequence);
            }
            EventKind::InvokeSpecial { method, args, .. }
            | EventKind::InvokeStatic { method, args } => {
                self.push(method.clone(), NOT_INSTRUMENTED, args, event.sequence);
            }
            EventKind::ReturnedValue { value } => {
                let current = self.current;
                let node = self.node(current);
                if current != ROOT && !node.is_instrumented() {
                    node.result = Some(value.clone());
                    node.exited_at = Some(event.sequence);
                    self.pop();
                }
            }
            EventKind::ExitWithValue { value } => {
                if self.unwind_to(event, None) {
                    let current = self.current;
                    let node = self.node(current);
                    node.result = Some(value.clone());
                    node.exited_at = Some(event.sequence);
                    self.pop();
                }
            }
            EventKind::ExitWithException { exception } => {
                if self.unwind_to(event, Some(exception)) {
                    let current = self.current;
                    let node = self.node(current);
                    node.exception = Some(exception.clone());
                    node.exited_at = Some(event.sequence);
                    self.pop();
                }
            }
            EventKind::CatchValue { exception } => {
                // Calls that were still open when the exception passed through
                // never report back; close them at the catching activation.
                if self.find(event.activation).is_some() {
                    self.unwind_to(event, Some(exception));
                }
            }
            _ => {}
        }
    }

    fn find(&self, activation: ActivationId) -> Option<NodeId> {
        let mut cursor = self.current;
        while cursor != ROOT {
            let node = &self.tree.nodes[cursor.0];
            if node.activation == activation {
                return Some(cursor);
            }
            cursor = node.parent.unwrap_or(ROOT);
        }
        None
    }

    /// Make the node of the event's activation current. Nodes passed on the
    /// way are closed at the event, recording `exception` if one is given.
    /// Returns `false`, after resetting to the root, when the activation is
    /// not open on this lane.
    fn unwind_to(&mut self, event: &TraceEvent, exception: Option<&Value>) -> bool {
        let Some(target) = self.find(event.activation) else {
            tracing::warn!(
                target: "rewind.model",
                thread = event.thread.name(),
                activation = event.activation,
                sequence = event.sequence,
                kind = event.kind.tag(),
                "exit without a matching activation; resetting to the root"
            );
            self.current = ROOT;
            return false;
        };
        while self.current != target {
            let current = self.current;
            let node = self.node(current);
            if node.exited_at.is_none() {
                node.exited_at = Some(event.sequence);
                if node.exception.is_none() {
                    node.exception = exception.cloned();
                }
            }
            self.pop();
        }
        true
    }
}
