use rewind_model::{CallTree, EventLog, NodeId};
use rewind_test_utils::programs::{GAP_CALLER, GAP_RELAY, SHAPE, SHAPE_FACTORY, SQUARE, THROWER};
use rewind_trace::{EventKind, ObjRef, TraceEvent, Value};
use rewind_vm::samples::{QUICK_SORT, SORT_DESCRIPTOR};

use super::{int_list, traced};

fn rendered(tree: &CallTree, ids: impl IntoIterator<Item = NodeId>) -> Vec<String> {
    ids.into_iter().map(|id| tree.display(id).to_string()).collect()
}

#[test]
fn quick_sort_partitions_on_the_first_element() {
    let vm = traced(&[QUICK_SORT]);
    let lane = vm.lane("main");
    lane.invoke_static(
        QUICK_SORT,
        "sort",
        SORT_DESCRIPTOR,
        vec![int_list(&[5, 2, 7, 5, 9, 8, 7, 1, 3])],
    )
    .unwrap();

    let log = EventLog::from_session(vm.session());
    let tree = log.call_stack(lane.thread());
    assert_eq!(tree.roots().len(), 1);
    let root = tree.roots()[0];
    assert_eq!(
        tree.display(root).to_string(),
        "demo/QuickSort.sort([[5, 2, 7, 5, 9, 8, 7, 1, 3]]) - [1, 2, 3, 5, 5, 7, 7, 8, 9]"
    );

    let partitions: Vec<NodeId> = tree.instrumented_children(root).collect();
    assert_eq!(
        rendered(&tree, partitions.iter().copied()),
        [
            "demo/QuickSort.sort([[2, 1, 3]]) - [1, 2, 3]",
            "demo/QuickSort.sort([[7, 5, 9, 8, 7]]) - [5, 7, 7, 8, 9]",
        ]
    );
    assert_eq!(
        rendered(&tree, tree.instrumented_children(partitions[0])),
        [
            "demo/QuickSort.sort([[1]]) - [1]",
            "demo/QuickSort.sort([[3]]) - [3]",
        ]
    );

    // Library calls stay in the tree as leaves, named after the receiver's class.
    let size = tree
        .children(root)
        .iter()
        .map(|child| &tree[*child])
        .find(|node| node.method().name == "size")
        .expect("size() is recorded");
    assert_eq!(size.method().owner, "java/util/ArrayList");
    assert!(!size.is_instrumented());
    assert!(!size.is_gap());
    assert_eq!(size.result(), Some(&Value::Int(9)));
}

#[test]
fn uninstrumented_relay_shows_up_as_a_gap() {
    let vm = traced(&[GAP_CALLER]);
    let lane = vm.lane("main");
    let result = lane.invoke_static(GAP_CALLER, "outer", "()I", vec![]).unwrap();
    assert_eq!(result, Some(Value::Int(42)));

    let tree = EventLog::from_session(vm.session()).call_stack(lane.thread());
    let outer = tree.roots()[0];
    assert_eq!(tree.display(outer).to_string(), "fixtures/GapCaller.outer([]) - 42");

    let relay = tree.children(outer)[0];
    assert_eq!(tree[relay].method().owner, GAP_RELAY);
    assert!(tree[relay].is_gap());
    assert_eq!(tree[relay].result(), Some(&Value::Int(41)));
    assert_eq!(tree.parent(relay), Some(outer));

    let inner = tree.children(relay)[0];
    assert_eq!(tree.display(inner).to_string(), "fixtures/GapCaller.inner([]) - 41");
    assert!(tree[inner].is_instrumented());
    assert!(tree.children(inner).is_empty());
}

#[test]
fn constructor_chain_nests_super_constructors() {
    let vm = traced(&[SHAPE_FACTORY, SQUARE, SHAPE]);
    let lane = vm.lane("main");
    lane.invoke_static(SHAPE_FACTORY, "square", "()Lfixtures/Square;", vec![]).unwrap();

    let tree = EventLog::from_session(vm.session()).call_stack(lane.thread());
    let mut chain = Vec::new();
    let mut cursor = tree.roots().first().copied();
    while let Some(id) = cursor {
        let node = &tree[id];
        chain.push((
            format!("{}.{}", node.method().owner, node.method().name),
            node.is_instrumented(),
        ));
        assert!(tree.children(id).len() <= 1, "{}", tree.display(id));
        cursor = tree.children(id).first().copied();
    }

    assert_eq!(
        chain,
        [
            ("fixtures/ShapeFactory.square".to_owned(), true),
            ("fixtures/Square.<init>".to_owned(), true),
            ("fixtures/Shape.<init>".to_owned(), true),
            ("java/lang/Object.<init>".to_owned(), false),
        ]
    );
    assert_eq!(tree.len(), 4);
}

#[test]
fn exception_unwinds_every_level_with_the_same_object() {
    let vm = traced(&[THROWER]);
    let lane = vm.lane("main");
    lane.invoke_static(THROWER, "level1", "()V", vec![]).unwrap_err();

    let log = EventLog::from_session(vm.session());
    let tree = log.call_stack(lane.thread());
    let mut levels = Vec::new();
    let mut cursor = tree.roots().first().copied();
    while let Some(id) = cursor {
        levels.push(id);
        cursor = tree.instrumented_children(id).next();
    }
    assert_eq!(levels.len(), 3);

    let thrown: Vec<_> = levels
        .iter()
        .map(|id| {
            let node = &tree[*id];
            assert_eq!(node.result(), None);
            node.exception().and_then(Value::as_object).map(ObjRef::id)
        })
        .collect();
    assert!(thrown[0].is_some());
    assert!(thrown.iter().all(|id| *id == thrown[0]));
    assert_eq!(
        tree.display(levels[2]).to_string(),
        "fixtures/Thrower.level3([]) - java/lang/IllegalStateException"
    );

    let view = log.call_tree_view(lane.thread());
    assert_eq!(
        view.calls[0].exception.as_deref(),
        Some("java.lang.IllegalStateException, deep")
    );
}

#[test]
fn missing_entry_leaves_results_unset() {
    let vm = traced(&[GAP_CALLER]);
    let lane = vm.lane("main");
    lane.invoke_static(GAP_CALLER, "outer", "()I", vec![]).unwrap();

    let session = vm.session();
    let mut events: Vec<TraceEvent> = session.events();
    let inner_entry = events
        .iter()
        .position(|event| {
            matches!(
                &event.kind,
                EventKind::EnterActivation { method, .. } if method.name == "inner"
            )
        })
        .expect("inner() was entered");
    events.remove(inner_entry);

    let log = EventLog::new(events, session.registry().clone());
    let tree = log.call_stack(lane.thread());
    assert_eq!(tree.len(), 2);
    let outer = tree.roots()[0];
    assert_eq!(tree[outer].result(), None);
    let relay = tree.children(outer)[0];
    assert!(!tree[relay].is_gap());
    assert_eq!(tree[relay].result(), None);
}

#[test]
fn view_serializes_the_rendered_tree() {
    let vm = traced(&[QUICK_SORT]);
    let lane = vm.lane("main");
    lane.invoke_static(QUICK_SORT, "sort", SORT_DESCRIPTOR, vec![int_list(&[2, 1])]).unwrap();

    let log = EventLog::from_session(vm.session());
    let view = log.call_tree_view(lane.thread());
    assert_eq!(view.thread, "main");
    assert_eq!(view.calls.len(), 1);

    let root = &view.calls[0];
    assert_eq!(root.name, "sort");
    assert_eq!(root.activation, Some(0));
    assert_eq!(root.args, ["[2, 1]"]);
    assert_eq!(root.result.as_deref(), Some("[1, 2]"));

    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["thread"], "main");
    assert_eq!(json["calls"][0]["owner"], "demo/QuickSort");
    assert_eq!(json["calls"][0]["result"], "[1, 2]");
    assert!(json["calls"][0].get("exception").is_none());
    assert!(json["calls"][0].get("gap").is_none());
}
