use std::cmp::Ordering;
use std::fmt;

use crate::descriptor::{parse_method_descriptor, FieldType, ReturnType};
use crate::error::Result;

/// A position marker inside a method body. Labels are bound by [`Insn::Label`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(u32);

impl Label {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Computational kind of an operand stack value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Int,
    Long,
    Float,
    Double,
    Reference,
}

impl ValueKind {
    pub fn slot_size(self) -> u16 {
        match self {
            ValueKind::Long | ValueKind::Double => 2,
            ValueKind::Int | ValueKind::Float | ValueKind::Reference => 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    Null,
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cond {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

impl Cond {
    pub fn holds(self, ordering: Ordering) -> bool {
        match self {
            Cond::Eq => ordering == Ordering::Equal,
            Cond::Ne => ordering != Ordering::Equal,
            Cond::Lt => ordering == Ordering::Less,
            Cond::Ge => ordering != Ordering::Less,
            Cond::Gt => ordering == Ordering::Greater,
            Cond::Le => ordering != Ordering::Greater,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InvokeKind {
    Virtual,
    Interface,
    Special,
    Static,
}

impl InvokeKind {
    pub fn has_receiver(self) -> bool {
        !matches!(self, InvokeKind::Static)
    }
}

/// Symbolic reference to a field or method.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MemberRef {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

impl MemberRef {
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }

    /// `name` followed by `descriptor`, e.g. `add(Ljava/lang/Object;)Z`.
    pub fn signature(&self) -> String {
        format!("{}{}", self.name, self.descriptor)
    }
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.owner, self.name, self.descriptor)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Insn {
    Label(Label),
    /// Source line of the instructions that follow.
    Line(u32),
    Nop,
    Const(Constant),
    Load {
        kind: ValueKind,
        slot: u16,
    },
    Store {
        kind: ValueKind,
        slot: u16,
    },
    Iinc {
        slot: u16,
        delta: i32,
    },
    Arith {
        op: ArithOp,
        kind: ValueKind,
    },
    Convert {
        from: ValueKind,
        to: ValueKind,
    },
    Pop,
    Dup,
    /// Duplicates the top two entries.
    Dup2,
    DupX1,
    DupX2,
    Swap,
    Goto(Label),
    /// Compares the top int against zero.
    If {
        cond: Cond,
        target: Label,
    },
    /// Compares the top two ints.
    IfCmp {
        cond: Cond,
        target: Label,
    },
    IfNull(Label),
    IfNonNull(Label),
    New(String),
    /// Pops a length and pushes a new array of the given component type.
    NewArray(FieldType),
    ArrayLength,
    ArrayLoad(ValueKind),
    ArrayStore(ValueKind),
    GetField(MemberRef),
    PutField(MemberRef),
    GetStatic(MemberRef),
    PutStatic(MemberRef),
    Invoke {
        kind: InvokeKind,
        method: MemberRef,
    },
    CheckCast(String),
    Return(Option<ValueKind>),
    Throw,
    Probe(Probe),
}

impl Insn {
    /// Pseudo instructions only mark positions and never execute.
    pub fn is_pseudo(&self) -> bool {
        matches!(self, Insn::Label(_) | Insn::Line(_))
    }

    pub fn jump_target(&self) -> Option<Label> {
        match self {
            Insn::Goto(target)
            | Insn::IfNull(target)
            | Insn::IfNonNull(target)
            | Insn::If { target, .. }
            | Insn::IfCmp { target, .. } => Some(*target),
            _ => None,
        }
    }

    /// Whether execution can continue with the next instruction.
    pub fn falls_through(&self) -> bool {
        !matches!(self, Insn::Goto(_) | Insn::Return(_) | Insn::Throw)
    }
}

/// A call into the trace session injected by the instrumentor.
///
/// Every probe pops its operands followed by the activation id of the
/// running method; only [`Probe::NextActivation`] pushes a value (a fresh id).
#[derive(Clone, Debug, PartialEq)]
pub enum Probe {
    NextActivation,
    /// `[args..., id]`
    Enter {
        method: MemberRef,
        is_static: bool,
        line: Option<u32>,
    },
    /// `[receiver, id]`
    SetReceiver { line: Option<u32> },
    /// `[object, value, id]`
    PutField {
        name: String,
        ty: FieldType,
        line: Option<u32>,
    },
    /// `[value, id]`
    StoreLocal { slot: u16, line: Option<u32> },
    /// `[array, index, value, id]`
    StoreElement { line: Option<u32> },
    /// `[receiver (unless static), args..., id]`
    Invoke {
        kind: InvokeKind,
        method: MemberRef,
        line: Option<u32>,
    },
    /// `[value, id]`
    Returned { ty: ReturnType, line: Option<u32> },
    /// `[value, id]`
    Return { ty: ReturnType, line: Option<u32> },
    /// `[exception, id]`
    Throw { line: Option<u32> },
    /// `[exception, id]`
    Catch { line: Option<u32> },
    /// `[value, id]`
    ExitWithValue { ty: ReturnType, line: Option<u32> },
    /// `[exception, id]`
    ExitWithException { line: Option<u32> },
    /// `[id]`
    LocalName {
        slot: u16,
        name: String,
        line: Option<u32>,
    },
}

impl Probe {
    /// Number of operand stack entries consumed, including the activation id.
    pub fn pops(&self) -> Result<usize> {
        Ok(match self {
            Probe::NextActivation => 0,
            Probe::Enter { method, .. } => {
                parse_method_descriptor(&method.descriptor)?.params.len() + 1
            }
            Probe::Invoke { kind, method, .. } => {
                let params = parse_method_descriptor(&method.descriptor)?.params.len();
                params + usize::from(kind.has_receiver()) + 1
            }
            Probe::StoreElement { .. } => 4,
            Probe::PutField { .. } => 3,
            Probe::SetReceiver { .. }
            | Probe::StoreLocal { .. }
            | Probe::Returned { .. }
            | Probe::Return { .. }
            | Probe::Throw { .. }
            | Probe::Catch { .. }
            | Probe::ExitWithValue { .. }
            | Probe::ExitWithException { .. } => 2,
            Probe::LocalName { .. } => 1,
        })
    }

    pub fn pushes(&self) -> usize {
        usize::from(matches!(self, Probe::NextActivation))
    }

    pub fn line(&self) -> Option<u32> {
        match self {
            Probe::NextActivation => None,
            Probe::Enter { line, .. }
            | Probe::SetReceiver { line }
            | Probe::PutField { line, .. }
            | Probe::StoreLocal { line, .. }
            | Probe::StoreElement { line }
            | Probe::Invoke { line, .. }
            | Probe::Returned { line, .. }
            | Probe::Return { line, .. }
            | Probe::Throw { line }
            | Probe::Catch { line }
            | Probe::ExitWithValue { line, .. }
            | Probe::ExitWithException { line }
            | Probe::LocalName { line, .. } => *line,
        }
    }
}
