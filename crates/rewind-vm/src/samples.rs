//! Ready-made classes for demos and tests, assembled the way `javac` would
//! compile them.

use rewind_bytecode::{AccessFlags, ClassDef, CodeBuilder, Cond, Insn, MethodDef, Result, ValueKind};

pub const QUICK_SORT: &str = "demo/QuickSort";
pub const SORT_DESCRIPTOR: &str = "(Ljava/util/List;)Ljava/util/List;";

const LIST: &str = "java/util/List";
const ARRAY_LIST: &str = "java/util/ArrayList";
const INTEGER: &str = "java/lang/Integer";

/// `demo.QuickSort`: a recursive sort over `List<Integer>` that splits on the
/// first element, sending smaller values left.
///
/// ```java
/// public static List<Integer> sort(List<Integer> values) {
///     if (values.size() <= 1) {
///         return values;
///     }
///     int pivot = values.get(0);
///     List<Integer> left = new ArrayList<>();
///     List<Integer> right = new ArrayList<>();
///     for (int x = 1; x < values.size(); x++) {
///         if (values.get(x) < pivot) {
///             left.add(values.get(x));
///         } else {
///             right.add(values.get(x));
///         }
///     }
///     List<Integer> result = new ArrayList<>();
///     result.addAll(sort(left));
///     result.add(pivot);
///     result.addAll(sort(right));
///     return result;
/// }
/// ```
pub fn quick_sort_class() -> Result<ClassDef> {
    Ok(ClassDef::new(QUICK_SORT, Some("java/lang/Object"))
        .with_method(default_constructor(6)?)
        .with_method(sort_method()?))
}

fn default_constructor(line: u32) -> Result<MethodDef> {
    let mut code = CodeBuilder::new();
    let start = code.label();
    code.line(line)
        .aload(0)
        .invokespecial("java/lang/Object", "<init>", "()V")
        .ret(None);
    let end = code.label();
    code.local("this", &format!("L{QUICK_SORT};"), 0, start, end);
    method(AccessFlags::PUBLIC, "<init>", "()V", code)
}

fn sort_method() -> Result<MethodDef> {
    let mut code = CodeBuilder::new();
    let split = code.new_label();
    let loop_check = code.new_label();
    let go_right = code.new_label();
    let loop_next = code.new_label();
    let merge = code.new_label();

    let start = code.label();
    code.line(8)
        .aload(0)
        .invokeinterface(LIST, "size", "()I")
        .iconst(1)
        .if_icmp(Cond::Gt, split)
        .line(9)
        .aload(0)
        .ret(Some(ValueKind::Reference));

    code.mark(split).line(12);
    list_get(&mut code, 0, |code| {
        code.iconst(0);
    });
    code.invokevirtual(INTEGER, "intValue", "()I").istore(1);
    let pivot_start = code.label();
    code.line(13);
    new_array_list(&mut code).astore(2);
    let left_start = code.label();
    code.line(14);
    new_array_list(&mut code).astore(3);
    let right_start = code.label();

    code.line(15).iconst(1).istore(4);
    let x_start = code.label();
    code.mark(loop_check)
        .iload(4)
        .aload(0)
        .invokeinterface(LIST, "size", "()I")
        .if_icmp(Cond::Ge, merge)
        .line(16);
    list_get(&mut code, 0, |code| {
        code.iload(4);
    });
    code.invokevirtual(INTEGER, "intValue", "()I")
        .iload(1)
        .if_icmp(Cond::Ge, go_right)
        .line(17)
        .aload(2);
    list_get(&mut code, 0, |code| {
        code.iload(4);
    });
    code.invokeinterface(LIST, "add", "(Ljava/lang/Object;)Z")
        .insn(Insn::Pop)
        .goto(loop_next);

    code.mark(go_right).line(19).aload(3);
    list_get(&mut code, 0, |code| {
        code.iload(4);
    });
    code.invokeinterface(LIST, "add", "(Ljava/lang/Object;)Z")
        .insn(Insn::Pop);

    code.mark(loop_next).line(15).iinc(4, 1).goto(loop_check);

    code.mark(merge).line(23);
    let x_end = merge;
    new_array_list(&mut code).astore(5);
    let result_start = code.label();
    code.line(24).aload(5).aload(2);
    sort_call(&mut code)
        .invokeinterface(LIST, "addAll", "(Ljava/util/Collection;)Z")
        .insn(Insn::Pop)
        .line(25)
        .aload(5)
        .iload(1)
        .invokestatic(INTEGER, "valueOf", "(I)Ljava/lang/Integer;")
        .invokeinterface(LIST, "add", "(Ljava/lang/Object;)Z")
        .insn(Insn::Pop)
        .line(26)
        .aload(5)
        .aload(3);
    sort_call(&mut code)
        .invokeinterface(LIST, "addAll", "(Ljava/util/Collection;)Z")
        .insn(Insn::Pop)
        .line(28)
        .aload(5)
        .ret(Some(ValueKind::Reference));
    let end = code.label();

    code.local("values", "Ljava/util/List;", 0, start, end)
        .local("pivot", "I", 1, pivot_start, end)
        .local("left", "Ljava/util/List;", 2, left_start, end)
        .local("right", "Ljava/util/List;", 3, right_start, end)
        .local("x", "I", 4, x_start, x_end)
        .local("result", "Ljava/util/List;", 5, result_start, end);

    method(
        AccessFlags::PUBLIC | AccessFlags::STATIC,
        "sort",
        SORT_DESCRIPTOR,
        code,
    )
}

/// `values.get(<index>)` cast to `Integer`, where `values` is in `slot`.
fn list_get(code: &mut CodeBuilder, slot: u16, index: impl FnOnce(&mut CodeBuilder)) {
    code.aload(slot);
    index(code);
    code.invokeinterface(LIST, "get", "(I)Ljava/lang/Object;")
        .checkcast(INTEGER);
}

fn new_array_list(code: &mut CodeBuilder) -> &mut CodeBuilder {
    code.new_object(ARRAY_LIST)
        .insn(Insn::Dup)
        .invokespecial(ARRAY_LIST, "<init>", "()V")
}

fn sort_call(code: &mut CodeBuilder) -> &mut CodeBuilder {
    code.invokestatic(QUICK_SORT, "sort", SORT_DESCRIPTOR)
}

fn method(
    access: AccessFlags,
    name: &str,
    descriptor: &str,
    code: CodeBuilder,
) -> Result<MethodDef> {
    MethodDef::new(access, name, descriptor, code.build())
}
