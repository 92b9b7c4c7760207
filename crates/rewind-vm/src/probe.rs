use std::sync::Once;

use rewind_bytecode::{parse_method_descriptor, InvokeKind, MemberRef, Probe};
use rewind_trace::{ActivationId, EventKind, ObjectData, ThreadRef, Value};

use crate::error::VmError;
use crate::interp::Frame;
use crate::runtime::{Raise, VmShared};

impl VmShared {
    /// Execute a probe instruction: pop its operands and hand the event to
    /// the trace session.
    pub(crate) fn dispatch_probe(
        &self,
        thread: &ThreadRef,
        frame: &mut Frame,
        probe: &Probe,
    ) -> Result<(), Raise> {
        if let Probe::NextActivation = probe {
            let id = self.session.next_activation_id();
            frame.stack.push(Value::Int(activation_slot(id)));
            return Ok(());
        }

        let mut operands = frame.pop_n(probe.pops()?)?;
        let activation = match operands.pop().as_ref().and_then(Value::as_int) {
            Some(id) => ActivationId::from(id),
            None => {
                return Err(VmError::Verify {
                    method: frame.method.qualified_name(),
                    pc: frame.pc,
                    message: "probe operand is not an activation id".to_owned(),
                }
                .into())
            }
        };

        let kind = event_for(probe, operands)?;
        self.session.record(thread, activation, probe.line(), kind);
        Ok(())
    }
}

static ID_OVERFLOW: Once = Once::new();

/// The `int` a method keeps its activation id in. Ids past `i32::MAX` wrap
/// into the non-negative range so they never collide with
/// [`rewind_trace::NOT_INSTRUMENTED`].
fn activation_slot(id: ActivationId) -> i32 {
    i32::try_from(id).unwrap_or_else(|_| {
        ID_OVERFLOW.call_once(|| {
            tracing::warn!(
                target: "rewind.vm",
                activation = id,
                "activation ids no longer fit an int slot; wrapping"
            );
        });
        (id & i64::from(i32::MAX)) as i32
    })
}

fn event_for(probe: &Probe, operands: Vec<Value>) -> Result<EventKind, Raise> {
    let mut operands = operands.into_iter();
    let mut next = || operands.next().unwrap_or(Value::Null);

    Ok(match probe {
        Probe::NextActivation => {
            let misuse = rewind_bytecode::Error::Other("activation ids are not events");
            return Err(Raise::Fatal(VmError::Bytecode(misuse)));
        }
        Probe::Enter {
            method, is_static, ..
        } => EventKind::EnterActivation {
            args: boxed_args(method, std::iter::from_fn(|| Some(next())))?,
            method: method.clone(),
            is_static: *is_static,
        },
        Probe::SetReceiver { .. } => EventKind::SetReceiver { receiver: next() },
        Probe::PutField { name, ty, .. } => EventKind::PutField {
            target: next(),
            value: next().boxed_as(ty),
            name: name.clone(),
        },
        Probe::StoreLocal { slot, .. } => EventKind::StoreLocal {
            slot: *slot,
            value: next(),
        },
        Probe::StoreElement { .. } => {
            let array = next();
            let index = next().as_int().unwrap_or_default();
            let component = array.as_object().and_then(|array| match &*array.data() {
                ObjectData::Array { component, .. } => Some(component.clone()),
                _ => None,
            });
            let value = match component {
                Some(component) => next().boxed_as(&component),
                None => next(),
            };
            EventKind::StoreElement {
                array,
                index,
                value,
            }
        }
        Probe::Invoke { kind, method, .. } => {
            let receiver = if kind.has_receiver() {
                next()
            } else {
                Value::Null
            };
            let args = boxed_args(method, std::iter::from_fn(|| Some(next())))?;
            let method = method.clone();
            match kind {
                InvokeKind::Static => EventKind::InvokeStatic { method, args },
                InvokeKind::Special => EventKind::InvokeSpecial {
                    receiver,
                    method,
                    args,
                },
                InvokeKind::Virtual | InvokeKind::Interface => EventKind::InvokeVirtual {
                    receiver,
                    method,
                    args,
                },
            }
        }
        Probe::Returned { ty, .. } => EventKind::ReturnedValue {
            value: next().boxed_as_return(ty),
        },
        Probe::Return { ty, .. } => EventKind::ReturnValue {
            value: next().boxed_as_return(ty),
        },
        Probe::ExitWithValue { ty, .. } => EventKind::ExitWithValue {
            value: next().boxed_as_return(ty),
        },
        Probe::Throw { .. } => EventKind::ThrowValue { exception: next() },
        Probe::Catch { .. } => EventKind::CatchValue { exception: next() },
        Probe::ExitWithException { .. } => EventKind::ExitWithException { exception: next() },
        Probe::LocalName { slot, name, .. } => EventKind::SetLocalName {
            slot: *slot,
            name: name.clone(),
        },
    })
}

/// Take one value per declared parameter, boxed to its declared type.
fn boxed_args(
    method: &MemberRef,
    values: impl Iterator<Item = Value>,
) -> Result<Vec<Value>, Raise> {
    let descriptor = parse_method_descriptor(&method.descriptor)?;
    Ok(descriptor
        .params
        .iter()
        .zip(values)
        .map(|(ty, value)| value.boxed_as(ty))
        .collect())
}
