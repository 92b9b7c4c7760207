use crate::class::{LocalVariable, MethodBody, TryCatchBlock};
use crate::descriptor::FieldType;
use crate::insn::{
    ArithOp, Cond, Constant, Insn, InvokeKind, Label, MemberRef, ValueKind,
};

/// Assembles a [`MethodBody`] one instruction at a time.
///
/// ```
/// use rewind_bytecode::{CodeBuilder, ValueKind};
///
/// let mut code = CodeBuilder::new();
/// code.line(3).iconst(1).istore(0).ret(None);
/// let body = code.build();
/// assert_eq!(body.insns.len(), 4);
/// # let _ = ValueKind::Int;
/// ```
#[derive(Debug, Default)]
pub struct CodeBuilder {
    insns: Vec<Insn>,
    try_catch: Vec<TryCatchBlock>,
    locals: Vec<LocalVariable>,
    next_label: u32,
}

impl CodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_label(&mut self) -> Label {
        let label = Label::new(self.next_label);
        self.next_label += 1;
        label
    }

    /// Bind `label` at the current position.
    pub fn mark(&mut self, label: Label) -> &mut Self {
        self.insn(Insn::Label(label))
    }

    /// Allocate a fresh label and bind it here.
    pub fn label(&mut self) -> Label {
        let label = self.new_label();
        self.mark(label);
        label
    }

    pub fn line(&mut self, line: u32) -> &mut Self {
        self.insn(Insn::Line(line))
    }

    pub fn insn(&mut self, insn: Insn) -> &mut Self {
        self.insns.push(insn);
        self
    }

    pub fn iconst(&mut self, value: i32) -> &mut Self {
        self.insn(Insn::Const(Constant::Int(value)))
    }

    pub fn lconst(&mut self, value: i64) -> &mut Self {
        self.insn(Insn::Const(Constant::Long(value)))
    }

    pub fn fconst(&mut self, value: f32) -> &mut Self {
        self.insn(Insn::Const(Constant::Float(value)))
    }

    pub fn dconst(&mut self, value: f64) -> &mut Self {
        self.insn(Insn::Const(Constant::Double(value)))
    }

    pub fn sconst(&mut self, value: impl Into<String>) -> &mut Self {
        self.insn(Insn::Const(Constant::String(value.into())))
    }

    pub fn aconst_null(&mut self) -> &mut Self {
        self.insn(Insn::Const(Constant::Null))
    }

    pub fn load(&mut self, kind: ValueKind, slot: u16) -> &mut Self {
        self.insn(Insn::Load { kind, slot })
    }

    pub fn store(&mut self, kind: ValueKind, slot: u16) -> &mut Self {
        self.insn(Insn::Store { kind, slot })
    }

    pub fn iload(&mut self, slot: u16) -> &mut Self {
        self.load(ValueKind::Int, slot)
    }

    pub fn istore(&mut self, slot: u16) -> &mut Self {
        self.store(ValueKind::Int, slot)
    }

    pub fn lstore(&mut self, slot: u16) -> &mut Self {
        self.store(ValueKind::Long, slot)
    }

    pub fn aload(&mut self, slot: u16) -> &mut Self {
        self.load(ValueKind::Reference, slot)
    }

    pub fn astore(&mut self, slot: u16) -> &mut Self {
        self.store(ValueKind::Reference, slot)
    }

    pub fn iinc(&mut self, slot: u16, delta: i32) -> &mut Self {
        self.insn(Insn::Iinc { slot, delta })
    }

    pub fn arith(&mut self, op: ArithOp, kind: ValueKind) -> &mut Self {
        self.insn(Insn::Arith { op, kind })
    }

    pub fn goto(&mut self, target: Label) -> &mut Self {
        self.insn(Insn::Goto(target))
    }

    pub fn if_(&mut self, cond: Cond, target: Label) -> &mut Self {
        self.insn(Insn::If { cond, target })
    }

    pub fn if_icmp(&mut self, cond: Cond, target: Label) -> &mut Self {
        self.insn(Insn::IfCmp { cond, target })
    }

    pub fn ifnull(&mut self, target: Label) -> &mut Self {
        self.insn(Insn::IfNull(target))
    }

    pub fn ifnonnull(&mut self, target: Label) -> &mut Self {
        self.insn(Insn::IfNonNull(target))
    }

    pub fn new_object(&mut self, class: impl Into<String>) -> &mut Self {
        self.insn(Insn::New(class.into()))
    }

    pub fn new_array(&mut self, component: FieldType) -> &mut Self {
        self.insn(Insn::NewArray(component))
    }

    pub fn getfield(&mut self, owner: &str, name: &str, descriptor: &str) -> &mut Self {
        self.insn(Insn::GetField(MemberRef::new(owner, name, descriptor)))
    }

    pub fn putfield(&mut self, owner: &str, name: &str, descriptor: &str) -> &mut Self {
        self.insn(Insn::PutField(MemberRef::new(owner, name, descriptor)))
    }

    pub fn getstatic(&mut self, owner: &str, name: &str, descriptor: &str) -> &mut Self {
        self.insn(Insn::GetStatic(MemberRef::new(owner, name, descriptor)))
    }

    pub fn putstatic(&mut self, owner: &str, name: &str, descriptor: &str) -> &mut Self {
        self.insn(Insn::PutStatic(MemberRef::new(owner, name, descriptor)))
    }

    pub fn invoke(
        &mut self,
        kind: InvokeKind,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> &mut Self {
        self.insn(Insn::Invoke {
            kind,
            method: MemberRef::new(owner, name, descriptor),
        })
    }

    pub fn invokevirtual(&mut self, owner: &str, name: &str, descriptor: &str) -> &mut Self {
        self.invoke(InvokeKind::Virtual, owner, name, descriptor)
    }

    pub fn invokeinterface(&mut self, owner: &str, name: &str, descriptor: &str) -> &mut Self {
        self.invoke(InvokeKind::Interface, owner, name, descriptor)
    }

    pub fn invokespecial(&mut self, owner: &str, name: &str, descriptor: &str) -> &mut Self {
        self.invoke(InvokeKind::Special, owner, name, descriptor)
    }

    pub fn invokestatic(&mut self, owner: &str, name: &str, descriptor: &str) -> &mut Self {
        self.invoke(InvokeKind::Static, owner, name, descriptor)
    }

    pub fn checkcast(&mut self, class: impl Into<String>) -> &mut Self {
        self.insn(Insn::CheckCast(class.into()))
    }

    pub fn ret(&mut self, kind: Option<ValueKind>) -> &mut Self {
        self.insn(Insn::Return(kind))
    }

    pub fn athrow(&mut self) -> &mut Self {
        self.insn(Insn::Throw)
    }

    pub fn try_catch(
        &mut self,
        start: Label,
        end: Label,
        handler: Label,
        catch_type: Option<&str>,
    ) -> &mut Self {
        self.try_catch.push(TryCatchBlock {
            start,
            end,
            handler,
            catch_type: catch_type.map(str::to_owned),
        });
        self
    }

    /// Declare a named local variable visible between `start` and `end`.
    pub fn local(
        &mut self,
        name: &str,
        descriptor: &str,
        index: u16,
        start: Label,
        end: Label,
    ) -> &mut Self {
        self.locals.push(LocalVariable {
            name: name.to_owned(),
            descriptor: descriptor.to_owned(),
            start,
            end,
            index,
        });
        self
    }

    pub fn build(self) -> MethodBody {
        MethodBody::new(self.insns, self.try_catch, self.locals)
    }
}
