use serde::Serialize;

use rewind_trace::exception_summary;

use crate::log::EventLog;
use crate::tree::{CallTree, NodeId};

/// Rendered call tree of one lane, ready for JSON output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallTreeView {
    pub thread: String,
    pub calls: Vec<NodeView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeView {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    /// `None` for calls into code that is not instrumented.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activation: Option<i64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub gap: bool,
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeView>,
}

impl CallTreeView {
    pub(crate) fn new(log: &EventLog, tree: &CallTree) -> Self {
        Self {
            thread: tree.thread().name().to_owned(),
            calls: tree
                .roots()
                .iter()
                .map(|root| NodeView::new(log, tree, *root))
                .collect(),
        }
    }
}

impl NodeView {
    fn new(log: &EventLog, tree: &CallTree, id: NodeId) -> Self {
        let node = &tree[id];
        let exited_at = node.exited_at().unwrap_or(u64::MAX);
        Self {
            owner: node.method().owner.clone(),
            name: node.method().name.clone(),
            descriptor: node.method().descriptor.clone(),
            activation: node.is_instrumented().then(|| node.activation()),
            gap: node.is_gap(),
            args: node
                .args()
                .iter()
                .map(|arg| log.render_at(arg, node.entered_at()))
                .collect(),
            result: node.result().map(|value| log.render_at(value, exited_at)),
            exception: node.exception().map(exception_summary),
            children: node
                .children()
                .iter()
                .map(|child| NodeView::new(log, tree, *child))
                .collect(),
        }
    }
}
