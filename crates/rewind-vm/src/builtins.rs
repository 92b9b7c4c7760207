//! Class definitions for the slice of the Java library the runtime ships.
//! None of them carry code; their methods are resolved in
//! [`crate::natives`].

use rewind_bytecode::{AccessFlags, ClassDef};

const OBJECT: &str = "java/lang/Object";

fn class(name: &str, super_name: &str) -> ClassDef {
    ClassDef::new(name, Some(super_name))
}

fn interface(name: &str, extends: &[&str]) -> ClassDef {
    extends
        .iter()
        .fold(class(name, OBJECT), |def, parent| def.with_interface(*parent))
}

/// Throwable subclasses in `(name, superclass)` order.
const THROWABLES: &[(&str, &str)] = &[
    ("java/lang/Exception", "java/lang/Throwable"),
    ("java/lang/RuntimeException", "java/lang/Exception"),
    ("java/lang/IllegalStateException", "java/lang/RuntimeException"),
    ("java/lang/IllegalArgumentException", "java/lang/RuntimeException"),
    ("java/lang/NumberFormatException", "java/lang/IllegalArgumentException"),
    ("java/lang/ArithmeticException", "java/lang/RuntimeException"),
    ("java/lang/NullPointerException", "java/lang/RuntimeException"),
    ("java/lang/ClassCastException", "java/lang/RuntimeException"),
    ("java/lang/NegativeArraySizeException", "java/lang/RuntimeException"),
    ("java/lang/UnsupportedOperationException", "java/lang/RuntimeException"),
    ("java/lang/IndexOutOfBoundsException", "java/lang/RuntimeException"),
    ("java/lang/ArrayIndexOutOfBoundsException", "java/lang/IndexOutOfBoundsException"),
    ("java/lang/StringIndexOutOfBoundsException", "java/lang/IndexOutOfBoundsException"),
    ("java/lang/Error", "java/lang/Throwable"),
    ("java/lang/VirtualMachineError", "java/lang/Error"),
    ("java/lang/StackOverflowError", "java/lang/VirtualMachineError"),
];

pub(crate) fn builtin_classes() -> Vec<ClassDef> {
    let mut classes = vec![
        ClassDef::new(OBJECT, None),
        interface("java/lang/Comparable", &[]),
        interface("java/lang/CharSequence", &[]),
        class("java/lang/String", OBJECT)
            .with_interface("java/lang/CharSequence")
            .with_interface("java/lang/Comparable"),
        class("java/lang/StringBuilder", OBJECT)
            .with_interface("java/lang/CharSequence")
            .with_field(AccessFlags::PRIVATE, "value", "Ljava/lang/String;"),
        class("java/lang/Number", OBJECT),
        class("java/lang/Integer", "java/lang/Number").with_interface("java/lang/Comparable"),
        class("java/lang/Math", OBJECT),
        class("java/lang/Throwable", OBJECT).with_field(
            AccessFlags::PRIVATE,
            "message",
            "Ljava/lang/String;",
        ),
    ];
    classes.extend(
        THROWABLES
            .iter()
            .map(|(name, super_name)| class(name, super_name)),
    );

    classes.extend([
        interface("java/lang/Iterable", &[]),
        interface("java/util/Collection", &["java/lang/Iterable"]),
        interface("java/util/List", &["java/util/Collection"]),
        interface("java/util/Map", &[]),
        class("java/util/AbstractCollection", OBJECT).with_interface("java/util/Collection"),
        class("java/util/AbstractList", "java/util/AbstractCollection")
            .with_interface("java/util/List"),
        class("java/util/ArrayList", "java/util/AbstractList"),
        class("java/util/LinkedList", "java/util/AbstractList"),
        class("java/util/Arrays$ArrayList", "java/util/AbstractList"),
        class("java/util/AbstractMap", OBJECT).with_interface("java/util/Map"),
        class("java/util/HashMap", "java/util/AbstractMap"),
        class("java/util/LinkedHashMap", "java/util/HashMap"),
        class("java/util/TreeMap", "java/util/AbstractMap"),
        class("java/util/Arrays", OBJECT),
        class("java/util/Collections", OBJECT),
    ]);
    classes
}
