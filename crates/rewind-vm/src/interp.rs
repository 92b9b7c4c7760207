//! The instruction loop.
//!
//! Frames live on an explicit stack rather than the Rust call stack, so deep
//! recursion in traced programs is bounded by `max_call_depth` alone.

use std::sync::Arc;

use rewind_bytecode::{
    parse_method_descriptor, ArithOp, Constant, FieldType, Insn, InvokeKind, MemberRef, ValueKind,
};
use rewind_trace::{ObjRef, ObjectData, ThreadRef, Value};

use crate::class::RuntimeMethod;
use crate::error::VmError;
use crate::natives::{NativeCall, NativeFn};
use crate::runtime::{default_value, runtime_class_of, to_stack, Raise, VmShared};

pub(crate) struct Frame {
    pub(crate) method: Arc<RuntimeMethod>,
    pub(crate) pc: usize,
    pub(crate) locals: Vec<Value>,
    pub(crate) stack: Vec<Value>,
}

enum Step {
    Next,
    Jump(usize),
    Call(Frame),
    Return(Option<Value>),
}

pub(crate) enum Target {
    Code(Arc<RuntimeMethod>),
    Native(NativeFn),
}

impl Frame {
    pub(crate) fn new(
        method: Arc<RuntimeMethod>,
        receiver: Option<Value>,
        args: Vec<Value>,
    ) -> Result<Self, VmError> {
        let descriptor = parse_method_descriptor(&method.descriptor)?;
        let needed = usize::from(descriptor.param_slots()) + usize::from(receiver.is_some());
        let mut locals = vec![Value::Null; needed.max(usize::from(method.body.max_locals))];
        let stack = Vec::with_capacity(usize::from(method.body.max_stack));

        let mut slot = 0;
        if let Some(receiver) = receiver {
            locals[0] = receiver;
            slot = 1;
        }
        for (arg, ty) in args.into_iter().zip(&descriptor.params) {
            locals[slot] = to_stack(arg);
            slot += usize::from(ty.slot_size());
        }

        Ok(Self {
            method,
            pc: 0,
            locals,
            stack,
        })
    }

    fn verify(&self, message: impl Into<String>) -> VmError {
        VmError::Verify {
            method: self.method.qualified_name(),
            pc: self.pc,
            message: message.into(),
        }
    }

    fn pop(&mut self) -> Result<Value, VmError> {
        match self.stack.pop() {
            Some(value) => Ok(value),
            None => Err(self.verify("operand stack underflow")),
        }
    }

    pub(crate) fn pop_n(&mut self, count: usize) -> Result<Vec<Value>, VmError> {
        if self.stack.len() < count {
            return Err(self.verify("operand stack underflow"));
        }
        let at = self.stack.len() - count;
        Ok(self.stack.split_off(at))
    }

    fn pop_int(&mut self) -> Result<i32, VmError> {
        let value = self.pop()?;
        value
            .as_int()
            .ok_or_else(|| self.verify(format!("expected int, found {value:?}")))
    }

    fn peek(&self) -> Result<&Value, VmError> {
        self.stack
            .last()
            .ok_or_else(|| self.verify("operand stack underflow"))
    }

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }
}

impl VmShared {
    /// Run `entry` to completion on `thread`.
    pub(crate) fn run(&self, thread: &ThreadRef, entry: Frame) -> Result<Option<Value>, VmError> {
        let mut frames = vec![entry];
        while let Some(frame) = frames.last_mut() {
            match self.step(thread, frame) {
                Ok(Step::Next) => frame.pc += 1,
                Ok(Step::Jump(target)) => frame.pc = target,
                Ok(Step::Call(callee)) => {
                    if frames.len() >= self.config.max_call_depth {
                        let error = self.new_exception("java/lang/StackOverflowError", None);
                        self.unwind(&mut frames, error)?;
                    } else {
                        frames.push(callee);
                    }
                }
                Ok(Step::Return(value)) => {
                    frames.pop();
                    match frames.last_mut() {
                        Some(caller) => {
                            if let Some(value) = value {
                                caller.push(value);
                            }
                            caller.pc += 1;
                        }
                        None => return Ok(value),
                    }
                }
                Err(Raise::Exception(exception)) => self.unwind(&mut frames, exception)?,
                Err(Raise::Fatal(err)) => return Err(err),
            }
        }
        Ok(None)
    }

    /// Transfer control to the nearest handler accepting `exception`, popping
    /// frames that have none.
    fn unwind(&self, frames: &mut Vec<Frame>, exception: ObjRef) -> Result<(), VmError> {
        while let Some(frame) = frames.last_mut() {
            let handler = frame.method.find_handler(frame.pc, |catch_type| {
                self.classes.is_assignable(exception.class_name(), catch_type)
            });
            if let Some(target) = handler {
                frame.stack.clear();
                frame.stack.push(Value::Object(exception));
                frame.pc = target;
                return Ok(());
            }
            frames.pop();
        }
        Err(VmError::Uncaught(exception))
    }

    /// Find the code or native implementation of `name descriptor`, starting
    /// at `class` and walking up the superclass chain.
    pub(crate) fn resolve(
        &self,
        class: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<Target, VmError> {
        self.classes.require(class)?;
        let mut declared = false;
        for ancestor in self.classes.ancestors(class) {
            if let Some(method) = ancestor.method(name, descriptor) {
                return Ok(Target::Code(method));
            }
            if let Some(native) = self.natives.get(&ancestor.def.name, name, descriptor) {
                return Ok(Target::Native(native));
            }
            declared |= ancestor.def.method(name, descriptor).is_some();
        }
        if declared {
            return Err(VmError::AbstractMethod {
                owner: class.to_owned(),
                name: name.to_owned(),
                descriptor: descriptor.to_owned(),
            });
        }
        Err(VmError::MethodNotFound {
            owner: class.to_owned(),
            name: name.to_owned(),
            descriptor: descriptor.to_owned(),
        })
    }

    pub(crate) fn call_native(
        &self,
        native: NativeFn,
        receiver: Option<Value>,
        args: Vec<Value>,
    ) -> Result<Option<Value>, Raise> {
        let call = NativeCall {
            vm: self,
            receiver,
            args,
        };
        Ok(native(&call)?.map(to_stack))
    }

    fn step(&self, thread: &ThreadRef, frame: &mut Frame) -> Result<Step, Raise> {
        let method = Arc::clone(&frame.method);
        let Some(insn) = method.body.insns.get(frame.pc) else {
            return Err(frame.verify("execution ran past the last instruction").into());
        };

        match insn {
            Insn::Label(_) | Insn::Line(_) | Insn::Nop => {}
            Insn::Const(constant) => frame.push(match constant {
                Constant::Null => Value::Null,
                Constant::Int(v) => Value::Int(*v),
                Constant::Long(v) => Value::Long(*v),
                Constant::Float(v) => Value::Float(*v),
                Constant::Double(v) => Value::Double(*v),
                Constant::String(v) => Value::str(v),
            }),
            Insn::Load { slot, .. } => {
                let value = frame
                    .locals
                    .get(usize::from(*slot))
                    .cloned()
                    .ok_or_else(|| frame.verify(format!("local {slot} out of range")))?;
                frame.push(value);
            }
            Insn::Store { slot, .. } => {
                let value = frame.pop()?;
                let slot = usize::from(*slot);
                if slot >= frame.locals.len() {
                    frame.locals.resize(slot + 2, Value::Null);
                }
                frame.locals[slot] = value;
            }
            Insn::Iinc { slot, delta } => {
                let slot = usize::from(*slot);
                match frame.locals.get(slot).and_then(Value::as_int) {
                    Some(current) => frame.locals[slot] = Value::Int(current.wrapping_add(*delta)),
                    None => {
                        return Err(frame.verify(format!("iinc on non-int local {slot}")).into())
                    }
                }
            }
            Insn::Arith { op, kind } => {
                let rhs = frame.pop()?;
                let lhs = frame.pop()?;
                let result = self.arith(frame, *op, *kind, lhs, rhs)?;
                frame.push(result);
            }
            Insn::Convert { to, .. } => {
                let value = frame.pop()?;
                let converted = convert(&value, *to)
                    .ok_or_else(|| frame.verify(format!("cannot convert {value:?}")))?;
                frame.push(converted);
            }
            Insn::Pop => {
                frame.pop()?;
            }
            Insn::Dup => {
                let top = frame.peek()?.clone();
                frame.push(top);
            }
            Insn::Dup2 => {
                let pair = frame.pop_n(2)?;
                frame.stack.extend(pair.iter().cloned());
                frame.stack.extend(pair);
            }
            Insn::DupX1 => {
                let a = frame.pop()?;
                let b = frame.pop()?;
                frame.stack.extend([a.clone(), b, a]);
            }
            Insn::DupX2 => {
                let a = frame.pop()?;
                let b = frame.pop()?;
                let c = frame.pop()?;
                frame.stack.extend([a.clone(), c, b, a]);
            }
            Insn::Swap => {
                let a = frame.pop()?;
                let b = frame.pop()?;
                frame.stack.extend([a, b]);
            }
            Insn::Goto(label) => return self.jump(frame, *label),
            Insn::If { cond, target } => {
                if cond.holds(frame.pop_int()?.cmp(&0)) {
                    return self.jump(frame, *target);
                }
            }
            Insn::IfCmp { cond, target } => {
                let rhs = frame.pop_int()?;
                let lhs = frame.pop_int()?;
                if cond.holds(lhs.cmp(&rhs)) {
                    return self.jump(frame, *target);
                }
            }
            Insn::IfNull(target) => {
                if frame.pop()?.is_null() {
                    return self.jump(frame, *target);
                }
            }
            Insn::IfNonNull(target) => {
                if !frame.pop()?.is_null() {
                    return self.jump(frame, *target);
                }
            }
            Insn::New(class) => {
                let object = self.instantiate(class)?;
                frame.push(Value::Object(object));
            }
            Insn::NewArray(component) => {
                let length = frame.pop_int()?;
                let Ok(length) = usize::try_from(length) else {
                    let message = Some(length.to_string());
                    return Err(self.raise("java/lang/NegativeArraySizeException", message));
                };
                let elements = vec![default_value(component); length];
                frame.push(Value::Object(ObjRef::array(component.clone(), elements)));
            }
            Insn::ArrayLength => {
                let array = self.non_null(frame.pop()?)?;
                let length = match &*array.data() {
                    ObjectData::Array { elements, .. } => elements.len(),
                    _ => return Err(frame.verify("arraylength on a non-array").into()),
                };
                frame.push(Value::Int(i32::try_from(length).unwrap_or(i32::MAX)));
            }
            Insn::ArrayLoad(_) => {
                let index = frame.pop_int()?;
                let array = self.non_null(frame.pop()?)?;
                let element = self.with_element(frame, &array, index, |slot| slot.clone())?;
                frame.push(element);
            }
            Insn::ArrayStore(_) => {
                let value = frame.pop()?;
                let index = frame.pop_int()?;
                let array = self.non_null(frame.pop()?)?;
                self.with_element(frame, &array, index, |slot| *slot = value)?;
            }
            Insn::GetField(field) => {
                let object = self.non_null(frame.pop()?)?;
                let value = object.field(&field.name).ok_or_else(|| VmError::FieldNotFound {
                    owner: object.class_name().to_owned(),
                    name: field.name.clone(),
                })?;
                frame.push(value);
            }
            Insn::PutField(field) => {
                let value = frame.pop()?;
                let object = self.non_null(frame.pop()?)?;
                if object.field(&field.name).is_none() {
                    return Err(VmError::FieldNotFound {
                        owner: object.class_name().to_owned(),
                        name: field.name.clone(),
                    }
                    .into());
                }
                object.set_field(&field.name, value);
            }
            Insn::GetStatic(field) => {
                let value = self.get_static(field)?;
                frame.push(value);
            }
            Insn::PutStatic(field) => {
                let value = frame.pop()?;
                self.get_static(field)?;
                self.statics
                    .lock()
                    .insert((field.owner.clone(), field.name.clone()), value);
            }
            Insn::Invoke { kind, method } => return self.invoke(frame, *kind, method),
            Insn::CheckCast(class) => {
                if let Some(actual) = runtime_class_of(frame.peek()?) {
                    if !self.classes.is_assignable(actual, class) {
                        let message = format!(
                            "class {} cannot be cast to class {}",
                            actual.replace('/', "."),
                            class.replace('/', ".")
                        );
                        return Err(self.raise("java/lang/ClassCastException", Some(message)));
                    }
                }
            }
            Insn::Return(kind) => {
                let value = match kind {
                    Some(_) => Some(frame.pop()?),
                    None => None,
                };
                return Ok(Step::Return(value));
            }
            Insn::Throw => {
                let exception = self.non_null(frame.pop()?)?;
                return Err(Raise::Exception(exception));
            }
            Insn::Probe(probe) => self.dispatch_probe(thread, frame, probe)?,
        }
        Ok(Step::Next)
    }

    fn jump(&self, frame: &Frame, label: rewind_bytecode::Label) -> Result<Step, Raise> {
        match frame.method.target(label) {
            Some(target) => Ok(Step::Jump(target)),
            None => Err(frame.verify(format!("jump to unbound label {label}")).into()),
        }
    }

    fn non_null(&self, value: Value) -> Result<ObjRef, Raise> {
        match value {
            Value::Object(object) => Ok(object),
            _ => Err(self.raise("java/lang/NullPointerException", None)),
        }
    }

    fn with_element<R>(
        &self,
        frame: &Frame,
        array: &ObjRef,
        index: i32,
        f: impl FnOnce(&mut Value) -> R,
    ) -> Result<R, Raise> {
        let mut data = array.data();
        let ObjectData::Array { elements, .. } = &mut *data else {
            return Err(frame.verify("array access on a non-array").into());
        };
        let length = elements.len();
        match usize::try_from(index).ok().filter(|&i| i < length) {
            Some(i) => Ok(f(&mut elements[i])),
            None => Err(self.raise(
                "java/lang/ArrayIndexOutOfBoundsException",
                Some(format!("Index {index} out of bounds for length {length}")),
            )),
        }
    }

    fn get_static(&self, field: &MemberRef) -> Result<Value, VmError> {
        let key = (field.owner.clone(), field.name.clone());
        if let Some(value) = self.statics.lock().get(&key) {
            return Ok(value.clone());
        }
        let declared = self
            .classes
            .require(&field.owner)?
            .def
            .field(&field.name)
            .map(|def| def.descriptor.clone());
        let Some(descriptor) = declared else {
            return Err(VmError::FieldNotFound {
                owner: field.owner.clone(),
                name: field.name.clone(),
            });
        };
        let ty: FieldType = rewind_bytecode::parse_field_descriptor(&descriptor)?;
        Ok(default_value(&ty))
    }

    fn arith(
        &self,
        frame: &Frame,
        op: ArithOp,
        kind: ValueKind,
        lhs: Value,
        rhs: Value,
    ) -> Result<Value, Raise> {
        let divide_by_zero =
            || self.raise("java/lang/ArithmeticException", Some("/ by zero".to_owned()));
        Ok(match (kind, lhs, rhs) {
            (ValueKind::Int, Value::Int(a), Value::Int(b)) => Value::Int(match op {
                ArithOp::Add => a.wrapping_add(b),
                ArithOp::Sub => a.wrapping_sub(b),
                ArithOp::Mul => a.wrapping_mul(b),
                ArithOp::Div if b == 0 => return Err(divide_by_zero()),
                ArithOp::Div => a.wrapping_div(b),
                ArithOp::Rem if b == 0 => return Err(divide_by_zero()),
                ArithOp::Rem => a.wrapping_rem(b),
            }),
            (ValueKind::Long, Value::Long(a), Value::Long(b)) => Value::Long(match op {
                ArithOp::Add => a.wrapping_add(b),
                ArithOp::Sub => a.wrapping_sub(b),
                ArithOp::Mul => a.wrapping_mul(b),
                ArithOp::Div if b == 0 => return Err(divide_by_zero()),
                ArithOp::Div => a.wrapping_div(b),
                ArithOp::Rem if b == 0 => return Err(divide_by_zero()),
                ArithOp::Rem => a.wrapping_rem(b),
            }),
            (ValueKind::Float, Value::Float(a), Value::Float(b)) => Value::Float(match op {
                ArithOp::Add => a + b,
                ArithOp::Sub => a - b,
                ArithOp::Mul => a * b,
                ArithOp::Div => a / b,
                ArithOp::Rem => a % b,
            }),
            (ValueKind::Double, Value::Double(a), Value::Double(b)) => Value::Double(match op {
                ArithOp::Add => a + b,
                ArithOp::Sub => a - b,
                ArithOp::Mul => a * b,
                ArithOp::Div => a / b,
                ArithOp::Rem => a % b,
            }),
            (kind, lhs, rhs) => {
                return Err(frame
                    .verify(format!("{op:?} on {kind:?} with {lhs:?} and {rhs:?}"))
                    .into())
            }
        })
    }

    fn invoke(
        &self,
        frame: &mut Frame,
        kind: InvokeKind,
        method: &MemberRef,
    ) -> Result<Step, Raise> {
        let descriptor = parse_method_descriptor(&method.descriptor)?;
        let args = frame.pop_n(descriptor.params.len())?;
        let receiver = if kind.has_receiver() {
            Some(frame.pop()?)
        } else {
            None
        };

        let lookup = match &receiver {
            Some(Value::Null) => return Err(self.raise("java/lang/NullPointerException", None)),
            Some(receiver) if matches!(kind, InvokeKind::Virtual | InvokeKind::Interface) => {
                runtime_class_of(receiver).unwrap_or(&method.owner).to_owned()
            }
            _ => method.owner.clone(),
        };

        match self.resolve(&lookup, &method.name, &method.descriptor)? {
            Target::Code(callee) => Ok(Step::Call(Frame::new(callee, receiver, args)?)),
            Target::Native(native) => {
                if let Some(result) = self.call_native(native, receiver, args)? {
                    frame.push(result);
                }
                Ok(Step::Next)
            }
        }
    }
}

fn convert(value: &Value, to: ValueKind) -> Option<Value> {
    let (int, float) = match value {
        Value::Int(v) => (i64::from(*v), f64::from(*v)),
        Value::Long(v) => (*v, *v as f64),
        Value::Float(v) => (*v as i64, f64::from(*v)),
        Value::Double(v) => (*v as i64, *v),
        _ => return None,
    };
    Some(match (value, to) {
        (Value::Float(v), ValueKind::Int) => Value::Int(*v as i32),
        (Value::Double(v), ValueKind::Int) => Value::Int(*v as i32),
        (_, ValueKind::Int) => Value::Int(int as i32),
        (_, ValueKind::Long) => Value::Long(int),
        (_, ValueKind::Float) => Value::Float(float as f32),
        (_, ValueKind::Double) => Value::Double(float),
        (_, ValueKind::Reference) => return None,
    })
}
