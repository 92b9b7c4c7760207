use rewind_bytecode::FieldType;
use rewind_test_utils::programs;
use rewind_trace::{ObjRef, ObjectData, Value};
use rewind_vm::Lane;

use super::runtime;

const OBJECT_DESC: &str = "(Ljava/lang/Object;)Z";

fn strings(values: &[&str]) -> Vec<Value> {
    values.iter().map(|value| Value::str(value)).collect()
}

fn to_string(lane: &Lane, value: Value) -> Value {
    lane.invoke_virtual(value, "toString", "()Ljava/lang/String;", vec![])
        .unwrap()
        .unwrap()
}

#[test]
fn list_operations_follow_java_semantics() {
    let vm = runtime();
    let list = vm
        .lane("main")
        .invoke_static(programs::INVENTORY, "fruit", "()Ljava/util/List;", vec![])
        .unwrap()
        .unwrap();

    let elements = list.as_object().and_then(ObjRef::list_elements).unwrap();
    assert_eq!(elements, strings(&["apple", "pear", "fig"]));
}

#[test]
fn map_keeps_insertion_order() {
    let vm = runtime();
    let lane = vm.lane("main");
    let map = lane
        .invoke_static(programs::INVENTORY, "counts", "()Ljava/util/Map;", vec![])
        .unwrap()
        .unwrap();

    let entries = match &*map.as_object().unwrap().data() {
        ObjectData::Map(entries) => entries.clone(),
        other => panic!("expected a map, got {other:?}"),
    };
    assert_eq!(entries, vec![(Value::str("b"), Value::Int(2))]);
    assert_eq!(to_string(&lane, map), Value::str("{b=2}"));
}

#[test]
fn fixed_size_lists_reject_structural_changes() {
    let vm = runtime();
    let lane = vm.lane("main");
    let array = ObjRef::array(FieldType::object("java/lang/Object"), strings(&["x", "y"]));
    let fixed = lane
        .invoke_static(
            "java/util/Arrays",
            "asList",
            "([Ljava/lang/Object;)Ljava/util/List;",
            vec![Value::Object(array)],
        )
        .unwrap()
        .unwrap();

    let err = lane
        .invoke_virtual(fixed.clone(), "add", OBJECT_DESC, vec![Value::str("z")])
        .unwrap_err();
    assert_eq!(
        err.exception().map(ObjRef::class_name),
        Some("java/lang/UnsupportedOperationException")
    );

    lane.invoke_virtual(
        fixed.clone(),
        "set",
        "(ILjava/lang/Object;)Ljava/lang/Object;",
        vec![Value::Int(0), Value::str("w")],
    )
    .unwrap();
    assert_eq!(to_string(&lane, fixed), Value::str("[w, y]"));
}

#[test]
fn sorting_mixed_elements_is_a_class_cast() {
    let vm = runtime();
    let lane = vm.lane("main");
    let list = ObjRef::list("java/util/ArrayList", vec![Value::Int(1), Value::str("one")]);
    let err = lane
        .invoke_static(
            "java/util/Collections",
            "sort",
            "(Ljava/util/List;)V",
            vec![Value::Object(list)],
        )
        .unwrap_err();
    assert_eq!(
        err.exception().map(ObjRef::class_name),
        Some("java/lang/ClassCastException")
    );
}

#[test]
fn list_index_errors_are_exceptions() {
    let vm = runtime();
    let lane = vm.lane("main");
    let list = Value::Object(ObjRef::list("java/util/ArrayList", vec![Value::Int(1)]));
    let err = lane
        .invoke_virtual(list, "get", "(I)Ljava/lang/Object;", vec![Value::Int(4)])
        .unwrap_err();
    let exception = err.exception().unwrap();
    assert_eq!(exception.class_name(), "java/lang/IndexOutOfBoundsException");
    assert_eq!(
        exception.field("message"),
        Some(Value::str("Index 4 out of bounds for length 1"))
    );
}

#[test]
fn strings_and_builders() {
    let vm = runtime();
    let lane = vm.lane("main");
    let length = lane
        .invoke_virtual(Value::str("rewind"), "length", "()I", vec![])
        .unwrap();
    assert_eq!(length, Some(Value::Int(6)));

    let builder = Value::Object(lane.new_object("java/lang/StringBuilder", "()V", vec![]).unwrap());
    lane.invoke_virtual(
        builder.clone(),
        "append",
        "(Ljava/lang/String;)Ljava/lang/StringBuilder;",
        vec![Value::str("n=")],
    )
    .unwrap();
    lane.invoke_virtual(
        builder.clone(),
        "append",
        "(I)Ljava/lang/StringBuilder;",
        vec![Value::Int(3)],
    )
    .unwrap();
    assert_eq!(to_string(&lane, builder), Value::str("n=3"));
}
