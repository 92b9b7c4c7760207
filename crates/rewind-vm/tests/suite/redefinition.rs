use rewind_bytecode::{
    AccessFlags, ClassDef, ClassRedefiner, CodeBuilder, MethodDef, RedefineError, ValueKind,
};
use rewind_test_utils::programs;
use rewind_trace::Value;

use super::runtime;

fn with_inner_returning(class: ClassDef, value: i32) -> ClassDef {
    let mut code = CodeBuilder::new();
    code.iconst(value).ret(Some(ValueKind::Int));
    let inner = MethodDef::new(AccessFlags::from_bits(0x0009), "inner", "()I", code.build())
        .unwrap();
    let mut class = class;
    if let Some(method) = class.methods.iter_mut().find(|method| method.name == "inner") {
        *method = inner;
    }
    class
}

#[test]
fn redefinition_replaces_method_bodies() {
    let vm = runtime();
    let original = vm.class(programs::GAP_CALLER).unwrap();
    vm.redefine_class(with_inner_returning(original, 99)).unwrap();

    let result = vm
        .lane("main")
        .invoke_static(programs::GAP_CALLER, "outer", "()I", vec![])
        .unwrap();
    assert_eq!(result, Some(Value::Int(100)));
}

#[test]
fn redefining_an_unknown_class_fails() {
    let vm = runtime();
    let err = vm
        .redefine_class(ClassDef::new("fixtures/Unknown", Some("java/lang/Object")))
        .unwrap_err();
    assert_eq!(err, RedefineError::NotLoaded("fixtures/Unknown".to_owned()));
}

#[test]
fn redefinition_cannot_change_the_schema() {
    let vm = runtime();
    let original = vm.class(programs::SHAPE).unwrap();

    let with_field = original
        .clone()
        .with_field(AccessFlags::PRIVATE, "color", "I");
    assert!(matches!(
        vm.redefine_class(with_field),
        Err(RedefineError::SchemaChange { detail, .. }) if detail == "fields differ"
    ));

    let mut without_methods = original.clone();
    without_methods.methods.clear();
    assert!(matches!(
        vm.redefine_class(without_methods),
        Err(RedefineError::SchemaChange { detail, .. }) if detail == "methods added or removed"
    ));

    assert_eq!(vm.class(programs::SHAPE), Some(original));
}

#[test]
fn loading_requires_the_superclass() {
    let vm = runtime();
    let orphan = ClassDef::new("fixtures/Orphan", Some("fixtures/Missing"));
    assert_eq!(
        vm.load_class(orphan).unwrap_err().to_string(),
        "class fixtures/Missing is not loaded"
    );
    let duplicate = ClassDef::new(programs::SHAPE, Some("java/lang/Object"));
    assert_eq!(
        vm.load_class(duplicate).unwrap_err().to_string(),
        "class fixtures/Shape is already loaded"
    );
}
