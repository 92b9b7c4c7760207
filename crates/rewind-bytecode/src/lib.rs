#![forbid(unsafe_code)]

mod analysis;
mod builder;
mod class;
mod descriptor;
mod error;
mod insn;
mod loader;

pub use crate::analysis::{
    compute_max_locals, compute_max_stack, find_delegating_init, label_positions, stack_effect,
};
pub use crate::builder::CodeBuilder;
pub use crate::class::{
    AccessFlags, ClassDef, FieldDef, LocalVariable, MethodBody, MethodDef, TryCatchBlock,
};
pub use crate::descriptor::{parse_field_descriptor, parse_method_descriptor};
pub use crate::descriptor::{BaseType, FieldType, MethodDescriptor, ReturnType};
pub use crate::error::{Error, Result};
pub use crate::insn::{
    ArithOp, Cond, Constant, Insn, InvokeKind, Label, MemberRef, Probe, ValueKind,
};
pub use crate::loader::{ClassRedefiner, RedefineError};
