//! Whole programs for call-tree reconstruction and runtime tests.

use rewind_bytecode::{
    AccessFlags, ArithOp, BaseType, ClassDef, CodeBuilder, FieldType, Insn, ValueKind,
};

use crate::{method, OBJECT};

pub const SHAPE: &str = "fixtures/Shape";
pub const SQUARE: &str = "fixtures/Square";
pub const SHAPE_FACTORY: &str = "fixtures/ShapeFactory";
pub const GAP_CALLER: &str = "fixtures/GapCaller";
pub const GAP_RELAY: &str = "fixtures/GapRelay";
pub const THROWER: &str = "fixtures/Thrower";
pub const INVENTORY: &str = "fixtures/Inventory";
pub const FAULTS: &str = "fixtures/Faults";

const STATIC: AccessFlags = AccessFlags::from_bits(0x0009);
const LIST: &str = "java/util/List";
const MAP: &str = "java/util/Map";

pub fn classes() -> Vec<ClassDef> {
    vec![
        shape_class(),
        square_class(),
        shape_factory_class(),
        gap_caller_class(),
        gap_relay_class(),
        thrower_class(),
        inventory_class(),
        faults_class(),
    ]
}

/// ```java
/// class Shape {
///     int sides;
///     Shape(int sides) { this.sides = sides; }
/// }
/// ```
pub fn shape_class() -> ClassDef {
    let mut code = CodeBuilder::new();
    code.line(4)
        .aload(0)
        .invokespecial(OBJECT, "<init>", "()V")
        .line(5)
        .aload(0)
        .iload(1)
        .putfield(SHAPE, "sides", "I")
        .line(6)
        .ret(None);
    ClassDef::new(SHAPE, Some(OBJECT))
        .with_field(AccessFlags::default(), "sides", "I")
        .with_method(method(AccessFlags::default(), "<init>", "(I)V", code))
}

/// ```java
/// class Square extends Shape {
///     int size;
///     Square() { super(4); this.size = 1; }
/// }
/// ```
pub fn square_class() -> ClassDef {
    let mut code = CodeBuilder::new();
    code.line(4)
        .aload(0)
        .iconst(4)
        .invokespecial(SHAPE, "<init>", "(I)V")
        .line(5)
        .aload(0)
        .iconst(1)
        .putfield(SQUARE, "size", "I")
        .line(6)
        .ret(None);
    ClassDef::new(SQUARE, Some(SHAPE))
        .with_field(AccessFlags::default(), "size", "I")
        .with_method(method(AccessFlags::default(), "<init>", "()V", code))
}

/// `static Square square() { return new Square(); }`
pub fn shape_factory_class() -> ClassDef {
    let mut code = CodeBuilder::new();
    code.line(3)
        .new_object(SQUARE)
        .insn(Insn::Dup)
        .invokespecial(SQUARE, "<init>", "()V")
        .ret(Some(ValueKind::Reference));
    ClassDef::new(SHAPE_FACTORY, Some(OBJECT)).with_method(method(
        STATIC,
        "square",
        "()Lfixtures/Square;",
        code,
    ))
}

/// ```java
/// class GapCaller {
///     static int outer() { return GapRelay.relay() + 1; }
///     static int inner() { return 41; }
/// }
/// ```
pub fn gap_caller_class() -> ClassDef {
    let mut outer = CodeBuilder::new();
    outer
        .line(3)
        .invokestatic(GAP_RELAY, "relay", "()I")
        .iconst(1)
        .arith(ArithOp::Add, ValueKind::Int)
        .ret(Some(ValueKind::Int));
    let mut inner = CodeBuilder::new();
    inner.line(7).iconst(41).ret(Some(ValueKind::Int));
    ClassDef::new(GAP_CALLER, Some(OBJECT))
        .with_method(method(STATIC, "outer", "()I", outer))
        .with_method(method(STATIC, "inner", "()I", inner))
}

/// `static int relay() { return GapCaller.inner(); }`
pub fn gap_relay_class() -> ClassDef {
    let mut code = CodeBuilder::new();
    code.line(3)
        .invokestatic(GAP_CALLER, "inner", "()I")
        .ret(Some(ValueKind::Int));
    ClassDef::new(GAP_RELAY, Some(OBJECT)).with_method(method(STATIC, "relay", "()I", code))
}

/// ```java
/// static void level1() { level2(); }
/// static void level2() { level3(); }
/// static void level3() { throw new IllegalStateException("deep"); }
/// ```
pub fn thrower_class() -> ClassDef {
    let mut class = ClassDef::new(THROWER, Some(OBJECT));
    for (level, next) in [(1, "level2"), (2, "level3")] {
        let mut code = CodeBuilder::new();
        code.line(level * 10)
            .invokestatic(THROWER, next, "()V")
            .line(level * 10 + 1)
            .ret(None);
        class = class.with_method(method(STATIC, &format!("level{level}"), "()V", code));
    }

    let mut code = CodeBuilder::new();
    code.line(30)
        .new_object("java/lang/IllegalStateException")
        .insn(Insn::Dup)
        .sconst("deep")
        .invokespecial(
            "java/lang/IllegalStateException",
            "<init>",
            "(Ljava/lang/String;)V",
        )
        .athrow();
    class.with_method(method(STATIC, "level3", "()V", code))
}

/// ```java
/// static List<String> fruit() {
///     List<String> items = new ArrayList<>();
///     items.add("pear");
///     items.add("apple");
///     Collections.sort(items);
///     items.add("fig");
///     return items;
/// }
///
/// static Map<String, Integer> counts() {
///     Map<String, Integer> counts = new HashMap<>();
///     counts.put("a", 1);
///     counts.put("b", 2);
///     counts.remove("a");
///     return counts;
/// }
/// ```
pub fn inventory_class() -> ClassDef {
    let mut fruit = CodeBuilder::new();
    let start = fruit.new_label();
    fruit
        .line(10)
        .new_object("java/util/ArrayList")
        .insn(Insn::Dup)
        .invokespecial("java/util/ArrayList", "<init>", "()V")
        .astore(0)
        .mark(start);
    for (line, item) in [(11, "pear"), (12, "apple")] {
        fruit
            .line(line)
            .aload(0)
            .sconst(item)
            .invokeinterface(LIST, "add", "(Ljava/lang/Object;)Z")
            .insn(Insn::Pop);
    }
    fruit
        .line(13)
        .aload(0)
        .invokestatic("java/util/Collections", "sort", "(Ljava/util/List;)V")
        .line(14)
        .aload(0)
        .sconst("fig")
        .invokeinterface(LIST, "add", "(Ljava/lang/Object;)Z")
        .insn(Insn::Pop)
        .line(15)
        .aload(0)
        .ret(Some(ValueKind::Reference));
    let end = fruit.label();
    fruit.local("items", "Ljava/util/List;", 0, start, end);

    let mut counts = CodeBuilder::new();
    counts
        .line(20)
        .new_object("java/util/HashMap")
        .insn(Insn::Dup)
        .invokespecial("java/util/HashMap", "<init>", "()V")
        .astore(0);
    for (line, key, value) in [(21, "a", 1), (22, "b", 2)] {
        counts
            .line(line)
            .aload(0)
            .sconst(key)
            .iconst(value)
            .invokestatic("java/lang/Integer", "valueOf", "(I)Ljava/lang/Integer;")
            .invokeinterface(
                MAP,
                "put",
                "(Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;",
            )
            .insn(Insn::Pop);
    }
    counts
        .line(23)
        .aload(0)
        .sconst("a")
        .invokeinterface(MAP, "remove", "(Ljava/lang/Object;)Ljava/lang/Object;")
        .insn(Insn::Pop)
        .line(24)
        .aload(0)
        .ret(Some(ValueKind::Reference));

    ClassDef::new(INVENTORY, Some(OBJECT))
        .with_method(method(STATIC, "fruit", "()Ljava/util/List;", fruit))
        .with_method(method(STATIC, "counts", "()Ljava/util/Map;", counts))
}

/// Methods that fault in the runtime in various ways.
///
/// ```java
/// static int count;
///
/// static int divide(int a, int b) {
///     try { return a / b; } catch (ArithmeticException e) { return -1; }
/// }
/// static int forever(int n) { return forever(n + 1); }
/// static int readArray(int index) { int[] values = new int[3]; return values[index]; }
/// static void castList() { Object o = (Map) new ArrayList(); }
/// static int bump() { return ++count; }
/// static int parse(String text) { return Integer.parseInt(text); }
/// ```
pub fn faults_class() -> ClassDef {
    let mut divide = CodeBuilder::new();
    let start = divide.label();
    divide
        .iload(0)
        .iload(1)
        .arith(ArithOp::Div, ValueKind::Int)
        .ret(Some(ValueKind::Int));
    let handler = divide.label();
    divide
        .astore(2)
        .iconst(-1)
        .ret(Some(ValueKind::Int))
        .try_catch(start, handler, handler, Some("java/lang/ArithmeticException"));

    let mut forever = CodeBuilder::new();
    forever
        .iload(0)
        .iconst(1)
        .arith(ArithOp::Add, ValueKind::Int)
        .invokestatic(FAULTS, "forever", "(I)I")
        .ret(Some(ValueKind::Int));

    let mut read_array = CodeBuilder::new();
    read_array
        .iconst(3)
        .new_array(FieldType::Base(BaseType::Int))
        .astore(1)
        .aload(1)
        .iload(0)
        .insn(Insn::ArrayLoad(ValueKind::Int))
        .ret(Some(ValueKind::Int));

    let mut cast_list = CodeBuilder::new();
    cast_list
        .new_object("java/util/ArrayList")
        .insn(Insn::Dup)
        .invokespecial("java/util/ArrayList", "<init>", "()V")
        .checkcast(MAP)
        .astore(0)
        .ret(None);

    let mut bump = CodeBuilder::new();
    bump.getstatic(FAULTS, "count", "I")
        .iconst(1)
        .arith(ArithOp::Add, ValueKind::Int)
        .insn(Insn::Dup)
        .putstatic(FAULTS, "count", "I")
        .ret(Some(ValueKind::Int));

    let mut parse = CodeBuilder::new();
    parse
        .aload(0)
        .invokestatic("java/lang/Integer", "parseInt", "(Ljava/lang/String;)I")
        .ret(Some(ValueKind::Int));

    ClassDef::new(FAULTS, Some(OBJECT))
        .with_field(STATIC, "count", "I")
        .with_method(method(STATIC, "divide", "(II)I", divide))
        .with_method(method(STATIC, "forever", "(I)I", forever))
        .with_method(method(STATIC, "readArray", "(I)I", read_array))
        .with_method(method(STATIC, "castList", "()V", cast_list))
        .with_method(method(STATIC, "bump", "()I", bump))
        .with_method(method(STATIC, "parse", "(Ljava/lang/String;)I", parse))
}
