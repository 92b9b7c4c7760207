//! Utilities shared by Rewind tests.
//!
//! Every fixture is a [`ClassDef`] assembled with [`CodeBuilder`] in the
//! shape `javac` gives the equivalent Java source, which is quoted on each
//! constructor function. Fixtures are deliberately uninstrumented; tests load
//! them into a runtime and instrument them there.

pub mod probes;
pub mod programs;

use rewind_bytecode::{AccessFlags, ClassDef, CodeBuilder, MethodDef};

pub const OBJECT: &str = "java/lang/Object";

pub(crate) fn method(
    access: AccessFlags,
    name: &str,
    descriptor: &str,
    code: CodeBuilder,
) -> MethodDef {
    MethodDef::new(access, name, descriptor, code.build())
        .unwrap_or_else(|err| panic!("fixture {name}{descriptor} does not verify: {err}"))
}

/// `aload_0; invokespecial <super>.<init>()V; return`
pub(crate) fn default_constructor(super_name: &str) -> MethodDef {
    let mut code = CodeBuilder::new();
    code.aload(0)
        .invokespecial(super_name, "<init>", "()V")
        .ret(None);
    method(AccessFlags::PUBLIC, "<init>", "()V", code)
}

/// Every class a fixture needs, superclasses first, ready to load in order.
pub fn all_classes() -> Vec<ClassDef> {
    let mut classes = probes::classes();
    classes.extend(programs::classes());
    classes
}
