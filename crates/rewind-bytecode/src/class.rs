use std::collections::HashMap;
use std::fmt;

use crate::analysis::{compute_max_locals, compute_max_stack, label_positions};
use crate::descriptor::{parse_method_descriptor, MethodDescriptor};
use crate::error::{Error, Result};
use crate::insn::{Insn, Label};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct AccessFlags(u16);

impl AccessFlags {
    pub const PUBLIC: AccessFlags = AccessFlags(0x0001);
    pub const PRIVATE: AccessFlags = AccessFlags(0x0002);
    pub const PROTECTED: AccessFlags = AccessFlags(0x0004);
    pub const STATIC: AccessFlags = AccessFlags(0x0008);
    pub const FINAL: AccessFlags = AccessFlags(0x0010);
    pub const SYNCHRONIZED: AccessFlags = AccessFlags(0x0020);
    pub const NATIVE: AccessFlags = AccessFlags(0x0100);
    pub const INTERFACE: AccessFlags = AccessFlags(0x0200);
    pub const ABSTRACT: AccessFlags = AccessFlags(0x0400);

    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, other: AccessFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for AccessFlags {
    type Output = AccessFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        AccessFlags(self.0 | rhs.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TryCatchBlock {
    pub start: Label,
    pub end: Label,
    pub handler: Label,
    /// `None` catches everything.
    pub catch_type: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalVariable {
    pub name: String,
    pub descriptor: String,
    pub start: Label,
    pub end: Label,
    pub index: u16,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MethodBody {
    pub insns: Vec<Insn>,
    /// Searched in order; the first entry covering the faulting instruction
    /// whose type matches wins.
    pub try_catch: Vec<TryCatchBlock>,
    pub local_variables: Vec<LocalVariable>,
    pub max_stack: u16,
    pub max_locals: u16,
    next_label: u32,
}

impl MethodBody {
    pub fn new(
        insns: Vec<Insn>,
        try_catch: Vec<TryCatchBlock>,
        local_variables: Vec<LocalVariable>,
    ) -> Self {
        let next_label = insns
            .iter()
            .filter_map(|insn| match insn {
                Insn::Label(label) => Some(*label),
                other => other.jump_target(),
            })
            .chain(
                try_catch
                    .iter()
                    .flat_map(|block| [block.start, block.end, block.handler]),
            )
            .chain(
                local_variables
                    .iter()
                    .flat_map(|local| [local.start, local.end]),
            )
            .map(|label| label.as_u32() + 1)
            .max()
            .unwrap_or(0);

        Self {
            insns,
            try_catch,
            local_variables,
            max_stack: 0,
            max_locals: 0,
            next_label,
        }
    }

    /// Allocate a label that is not used anywhere in this body yet.
    pub fn new_label(&mut self) -> Label {
        let label = Label::new(self.next_label);
        self.next_label += 1;
        label
    }

    pub fn label_positions(&self) -> Result<HashMap<Label, usize>> {
        label_positions(&self.insns)
    }

    /// Labels that are bound to user-declared exception handlers.
    pub fn handler_labels(&self) -> impl Iterator<Item = Label> + '_ {
        self.try_catch.iter().map(|block| block.handler)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MethodDef {
    pub access: AccessFlags,
    pub name: String,
    pub descriptor: String,
    /// `None` for native and abstract methods.
    pub body: Option<MethodBody>,
}

impl MethodDef {
    /// Create a method with code, computing `max_stack` and `max_locals`.
    pub fn new(
        access: AccessFlags,
        name: impl Into<String>,
        descriptor: impl Into<String>,
        mut body: MethodBody,
    ) -> Result<Self> {
        let name = name.into();
        let descriptor = descriptor.into();
        let parsed = parse_method_descriptor(&descriptor)?;
        let is_static = access.contains(AccessFlags::STATIC);
        body.max_locals = compute_max_locals(&body, &parsed, is_static)?;
        body.max_stack = compute_max_stack(&body)?;
        Ok(Self {
            access,
            name,
            descriptor,
            body: Some(body),
        })
    }

    pub fn without_code(
        access: AccessFlags,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Self {
            access,
            name: name.into(),
            descriptor: descriptor.into(),
            body: None,
        }
    }

    pub fn is_static(&self) -> bool {
        self.access.contains(AccessFlags::STATIC)
    }

    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }

    pub fn parsed_descriptor(&self) -> Result<MethodDescriptor> {
        parse_method_descriptor(&self.descriptor)
    }

    pub fn body(&self) -> Result<&MethodBody> {
        self.body.as_ref().ok_or_else(|| Error::MissingBody {
            method: format!("{}{}", self.name, self.descriptor),
        })
    }
}

impl fmt::Display for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.descriptor)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDef {
    pub access: AccessFlags,
    pub name: String,
    pub descriptor: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClassDef {
    /// Internal name, e.g. `demo/QuickSort`.
    pub name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<FieldDef>,
    pub methods: Vec<MethodDef>,
}

impl ClassDef {
    pub fn new(name: impl Into<String>, super_name: Option<&str>) -> Self {
        Self {
            name: name.into(),
            super_name: super_name.map(str::to_owned),
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn with_interface(mut self, name: impl Into<String>) -> Self {
        self.interfaces.push(name.into());
        self
    }

    pub fn with_field(
        mut self,
        access: AccessFlags,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        self.fields.push(FieldDef {
            access,
            name: name.into(),
            descriptor: descriptor.into(),
        });
        self
    }

    pub fn with_method(mut self, method: MethodDef) -> Self {
        self.methods.push(method);
        self
    }

    pub fn method(&self, name: &str, descriptor: &str) -> Option<&MethodDef> {
        self.methods
            .iter()
            .find(|method| method.name == name && method.descriptor == descriptor)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Simple name as shown to users (`Outer$Inner` → `Inner`).
    pub fn simple_name(&self) -> &str {
        let base = self.name.rsplit('/').next().unwrap_or(&self.name);
        base.rsplit('$').next().unwrap_or(base)
    }
}
