//! Small classes with one method per kind of probe site.

use rewind_bytecode::{
    AccessFlags, ArithOp, BaseType, ClassDef, CodeBuilder, Cond, FieldType, Insn, MethodDef,
    ValueKind,
};

use crate::{default_constructor, method, OBJECT};

pub const INSTANCE_VARIABLES: &str = "fixtures/Probes$InstanceVariables";
pub const METHODS_BASE: &str = "fixtures/Probes$MethodsBase";
pub const CALLABLE: &str = "fixtures/Probes$Callable";
pub const METHODS: &str = "fixtures/Probes$Methods";

pub const PARAMETER_TYPES: &str = "(ZBCSIJFDLjava/lang/Object;[Ljava/lang/Object;)I";

const PUBLIC: AccessFlags = AccessFlags::PUBLIC;

pub fn classes() -> Vec<ClassDef> {
    vec![
        instance_variables_class(),
        methods_base_class(),
        callable_interface(),
        methods_class(),
    ]
}

/// ```java
/// public static class InstanceVariables {
///     private boolean a = true;
///     private byte b = 1;
///     private char c = '2';
///     private short d = 3;
///     private int e = 4;
///     private long f = 5;
///     private float g = 6;
///     private double h = 7;
///     private Object i = null;
///     private Object[] j = null;
/// }
/// ```
pub fn instance_variables_class() -> ClassDef {
    let fields: [(&str, &str, fn(&mut CodeBuilder)); 10] = [
        ("a", "Z", |code| {
            code.iconst(1);
        }),
        ("b", "B", |code| {
            code.iconst(1);
        }),
        ("c", "C", |code| {
            code.iconst(i32::from(b'2'));
        }),
        ("d", "S", |code| {
            code.iconst(3);
        }),
        ("e", "I", |code| {
            code.iconst(4);
        }),
        ("f", "J", |code| {
            code.lconst(5);
        }),
        ("g", "F", |code| {
            code.fconst(6.0);
        }),
        ("h", "D", |code| {
            code.dconst(7.0);
        }),
        ("i", "Ljava/lang/Object;", |code| {
            code.aconst_null();
        }),
        ("j", "[Ljava/lang/Object;", |code| {
            code.aconst_null();
        }),
    ];

    let mut code = CodeBuilder::new();
    code.line(20)
        .aload(0)
        .invokespecial(OBJECT, "<init>", "()V");
    let mut class = ClassDef::new(INSTANCE_VARIABLES, Some(OBJECT));
    for (line, (name, descriptor, push)) in (21..).zip(fields) {
        code.line(line).aload(0);
        push(&mut code);
        code.putfield(INSTANCE_VARIABLES, name, descriptor);
        class = class.with_field(AccessFlags::PRIVATE, name, descriptor);
    }
    code.ret(None);

    class.with_method(method(PUBLIC, "<init>", "()V", code))
}

/// ```java
/// public static class MethodsBase {
///     public int superMethod() { return 3; }
/// }
/// ```
pub fn methods_base_class() -> ClassDef {
    let mut code = CodeBuilder::new();
    code.iconst(3).ret(Some(ValueKind::Int));
    ClassDef::new(METHODS_BASE, Some(OBJECT))
        .with_method(default_constructor(OBJECT))
        .with_method(method(PUBLIC, "superMethod", "()I", code))
}

pub fn callable_interface() -> ClassDef {
    ClassDef::new(CALLABLE, Some(OBJECT)).with_method(MethodDef::without_code(
        PUBLIC | AccessFlags::ABSTRACT,
        "interfaceMethod",
        "(I)I",
    ))
}

/// `Methods extends MethodsBase implements Callable`: one method per probe
/// site, each named after the Java method it mirrors.
pub fn methods_class() -> ClassDef {
    let mut class = ClassDef::new(METHODS, Some(METHODS_BASE))
        .with_interface(CALLABLE)
        .with_method(default_constructor(METHODS_BASE))
        .with_method(local_variable_types());

    for (name, descriptor, kind, push) in simple_methods() {
        let mut code = CodeBuilder::new();
        push(&mut code);
        code.ret(kind);
        class = class.with_method(method(PUBLIC, name, descriptor, code));

        // callSimpleXMethod() { simpleXMethod(); }
        let mut code = CodeBuilder::new();
        code.aload(0).invokevirtual(METHODS, name, descriptor);
        if kind.is_some() {
            code.insn(Insn::Pop);
        }
        code.ret(None);
        let caller = format!("call{}{}", name[..1].to_uppercase(), &name[1..]);
        class = class.with_method(method(PUBLIC, &caller, "()V", code));
    }

    class
        .with_method(increment_variable())
        .with_method(write_array())
        .with_method(write_other_arrays())
        .with_method(recursive_method())
        .with_method(int_parameter_method(false))
        .with_method(int_parameter_method(true))
        .with_method(call_parameter_types())
        .with_method(parameter_types())
        .with_method(call_static_method())
        .with_method(call_constructor())
        .with_method(throw_exception())
        .with_method(throw_uncaught_exception())
        .with_method(call_interface_method())
        .with_method(interface_method())
        .with_method(call_super_method())
}

type Push = fn(&mut CodeBuilder);

fn simple_methods() -> [(&'static str, &'static str, Option<ValueKind>, Push); 6] {
    [
        ("simpleVoidMethod", "()V", None, |_| {}),
        ("simpleIntMethod", "()I", Some(ValueKind::Int), |code| {
            code.iconst(2);
        }),
        ("simpleFloatMethod", "()F", Some(ValueKind::Float), |code| {
            code.fconst(2.0);
        }),
        ("simpleDoubleMethod", "()D", Some(ValueKind::Double), |code| {
            code.dconst(2.0);
        }),
        ("simpleLongMethod", "()J", Some(ValueKind::Long), |code| {
            code.lconst(2);
        }),
        (
            "simpleStringMethod",
            "()Ljava/lang/String;",
            Some(ValueKind::Reference),
            |code| {
                code.sconst("2");
            },
        ),
    ]
}

/// ```java
/// boolean a = true; byte b = 1; char c = '2'; short d = 3; int e = 4;
/// long f = 5; float g = 6; double h = 7; Object i = null; Object[] j = null;
/// ```
fn local_variable_types() -> MethodDef {
    let mut code = CodeBuilder::new();
    let start = code.label();
    code.iconst(1)
        .istore(1)
        .iconst(1)
        .istore(2)
        .iconst(i32::from(b'2'))
        .istore(3)
        .iconst(3)
        .istore(4)
        .iconst(4)
        .istore(5)
        .lconst(5)
        .lstore(6)
        .fconst(6.0)
        .store(ValueKind::Float, 8)
        .dconst(7.0)
        .store(ValueKind::Double, 9)
        .aconst_null()
        .astore(11)
        .aconst_null()
        .astore(12)
        .ret(None);
    let end = code.label();

    for (name, descriptor, slot) in [
        ("this", "Lfixtures/Probes$Methods;", 0),
        ("a", "Z", 1),
        ("b", "B", 2),
        ("c", "C", 3),
        ("d", "S", 4),
        ("e", "I", 5),
        ("f", "J", 6),
        ("g", "F", 8),
        ("h", "D", 9),
        ("i", "Ljava/lang/Object;", 11),
        ("j", "[Ljava/lang/Object;", 12),
    ] {
        code.local(name, descriptor, slot, start, end);
    }
    method(PUBLIC, "localVariableTypes", "()V", code)
}

/// `int x = 1; x++; return x;`
fn increment_variable() -> MethodDef {
    let mut code = CodeBuilder::new();
    code.iconst(1)
        .istore(1)
        .iinc(1, 1)
        .iload(1)
        .ret(Some(ValueKind::Int));
    method(PUBLIC, "incrementVariable", "()I", code)
}

/// `int[] a = new int[5]; for (int x = 0; x < a.length; x++) a[x] = x + 10;`
fn write_array() -> MethodDef {
    let mut code = CodeBuilder::new();
    let check = code.new_label();
    let done = code.new_label();
    code.iconst(5)
        .new_array(FieldType::Base(BaseType::Int))
        .astore(1)
        .iconst(0)
        .istore(2)
        .mark(check)
        .iload(2)
        .aload(1)
        .insn(Insn::ArrayLength)
        .if_icmp(Cond::Ge, done)
        .aload(1)
        .iload(2)
        .iload(2)
        .iconst(10)
        .arith(ArithOp::Add, ValueKind::Int)
        .insn(Insn::ArrayStore(ValueKind::Int))
        .iinc(2, 1)
        .goto(check)
        .mark(done)
        .ret(None);
    method(PUBLIC, "writeArray", "()V", code)
}

/// `int[] a = { 1 }; float[] b = { 2 }; double[] c = { 3 }; long[] d = { 4 };
/// Object[] e = { "5" };`
fn write_other_arrays() -> MethodDef {
    let arrays: [(FieldType, ValueKind, Push); 5] = [
        (FieldType::Base(BaseType::Int), ValueKind::Int, |code| {
            code.iconst(1);
        }),
        (FieldType::Base(BaseType::Float), ValueKind::Float, |code| {
            code.fconst(2.0);
        }),
        (FieldType::Base(BaseType::Double), ValueKind::Double, |code| {
            code.dconst(3.0);
        }),
        (FieldType::Base(BaseType::Long), ValueKind::Long, |code| {
            code.lconst(4);
        }),
        (FieldType::object(OBJECT), ValueKind::Reference, |code| {
            code.sconst("5");
        }),
    ];

    let mut code = CodeBuilder::new();
    for (slot, (component, kind, push)) in (1..).zip(arrays) {
        code.iconst(1)
            .new_array(component)
            .insn(Insn::Dup)
            .iconst(0);
        push(&mut code);
        code.insn(Insn::ArrayStore(kind)).astore(slot);
    }
    code.ret(None);
    method(PUBLIC, "writeOtherArrays", "()V", code)
}

/// `return (n <= 1) ? 1 : n * recursiveMethod(n - 1, b);`
fn recursive_method() -> MethodDef {
    let mut code = CodeBuilder::new();
    let recurse = code.new_label();
    let done = code.new_label();
    code.iload(1)
        .iconst(1)
        .if_icmp(Cond::Gt, recurse)
        .iconst(1)
        .goto(done)
        .mark(recurse)
        .iload(1)
        .aload(0)
        .iload(1)
        .iconst(1)
        .arith(ArithOp::Sub, ValueKind::Int)
        .iload(2)
        .invokevirtual(METHODS, "recursiveMethod", "(IZ)I")
        .arith(ArithOp::Mul, ValueKind::Int)
        .mark(done)
        .ret(Some(ValueKind::Int));
    method(PUBLIC, "recursiveMethod", "(IZ)I", code)
}

/// `return x + y;`, as an instance or a static method.
fn int_parameter_method(is_static: bool) -> MethodDef {
    let first = u16::from(!is_static);
    let mut code = CodeBuilder::new();
    code.iload(first)
        .iload(first + 1)
        .arith(ArithOp::Add, ValueKind::Int)
        .ret(Some(ValueKind::Int));
    if is_static {
        method(
            PUBLIC | AccessFlags::STATIC,
            "staticIntParameterMethod",
            "(II)I",
            code,
        )
    } else {
        method(PUBLIC, "intParameterMethod", "(II)I", code)
    }
}

/// `return parameterTypes(true, (byte) 1, '2', (short) 3, 4, 5, 6, 7, null, null);`
fn call_parameter_types() -> MethodDef {
    let mut code = CodeBuilder::new();
    code.aload(0)
        .iconst(1)
        .iconst(1)
        .iconst(i32::from(b'2'))
        .iconst(3)
        .iconst(4)
        .lconst(5)
        .fconst(6.0)
        .dconst(7.0)
        .aconst_null()
        .aconst_null()
        .invokevirtual(METHODS, "parameterTypes", PARAMETER_TYPES)
        .ret(Some(ValueKind::Int));
    method(PUBLIC, "callParameterTypes", "()I", code)
}

fn parameter_types() -> MethodDef {
    let mut code = CodeBuilder::new();
    code.iconst(1).ret(Some(ValueKind::Int));
    method(PUBLIC, "parameterTypes", PARAMETER_TYPES, code)
}

/// `Integer.valueOf(1); Integer.valueOf(2); Integer.valueOf(3);`
fn call_static_method() -> MethodDef {
    let mut code = CodeBuilder::new();
    for value in 1..=3 {
        code.iconst(value)
            .invokestatic("java/lang/Integer", "valueOf", "(I)Ljava/lang/Integer;")
            .insn(Insn::Pop);
    }
    code.ret(None);
    method(PUBLIC, "callStaticMethod", "()V", code)
}

/// `new ArrayList<>(5);`
fn call_constructor() -> MethodDef {
    let mut code = CodeBuilder::new();
    code.new_object("java/util/ArrayList")
        .insn(Insn::Dup)
        .iconst(5)
        .invokespecial("java/util/ArrayList", "<init>", "(I)V")
        .insn(Insn::Pop)
        .ret(None);
    method(PUBLIC, "callConstructor", "()V", code)
}

fn new_runtime_exception(code: &mut CodeBuilder) -> &mut CodeBuilder {
    code.new_object("java/lang/RuntimeException")
        .insn(Insn::Dup)
        .sconst("Test Exception")
        .invokespecial(
            "java/lang/RuntimeException",
            "<init>",
            "(Ljava/lang/String;)V",
        )
}

/// ```java
/// try {
///     throw new RuntimeException("Test Exception");
/// } catch (RuntimeException e) {
///     return 2;
/// }
/// ```
fn throw_exception() -> MethodDef {
    let mut code = CodeBuilder::new();
    let start = code.label();
    new_runtime_exception(&mut code).athrow();
    let handler = code.label();
    code.astore(1).iconst(2).ret(Some(ValueKind::Int));
    let end = code.label();
    code.try_catch(start, handler, handler, Some("java/lang/RuntimeException"))
        .local("e", "Ljava/lang/RuntimeException;", 1, handler, end);
    method(PUBLIC, "throwException", "()I", code)
}

fn throw_uncaught_exception() -> MethodDef {
    let mut code = CodeBuilder::new();
    new_runtime_exception(&mut code).athrow();
    method(PUBLIC, "throwUncaughtException", "()I", code)
}

/// `return ((Callable) this).interfaceMethod(2);`
fn call_interface_method() -> MethodDef {
    let mut code = CodeBuilder::new();
    code.aload(0)
        .iconst(2)
        .invokeinterface(CALLABLE, "interfaceMethod", "(I)I")
        .ret(Some(ValueKind::Int));
    method(PUBLIC, "callInterfaceMethod", "()I", code)
}

fn interface_method() -> MethodDef {
    let mut code = CodeBuilder::new();
    code.iconst(3).ret(Some(ValueKind::Int));
    method(PUBLIC, "interfaceMethod", "(I)I", code)
}

/// `return super.superMethod();`
fn call_super_method() -> MethodDef {
    let mut code = CodeBuilder::new();
    code.aload(0)
        .invokespecial(METHODS_BASE, "superMethod", "()I")
        .ret(Some(ValueKind::Int));
    method(PUBLIC, "callSuperMethod", "()I", code)
}
