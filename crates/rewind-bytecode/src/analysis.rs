//! Stack and local-slot bookkeeping over instruction sequences.

use std::collections::HashMap;

use crate::class::MethodBody;
use crate::descriptor::{parse_field_descriptor, parse_method_descriptor, MethodDescriptor};
use crate::error::{Error, Result};
use crate::insn::{Insn, InvokeKind, Label};

/// Map every bound label to the index of its [`Insn::Label`] marker.
pub fn label_positions(insns: &[Insn]) -> Result<HashMap<Label, usize>> {
    let mut positions = HashMap::new();
    for (index, insn) in insns.iter().enumerate() {
        if let Insn::Label(label) = insn {
            if positions.insert(*label, index).is_some() {
                return Err(Error::DuplicateLabel(*label));
            }
        }
    }
    Ok(positions)
}

/// `(pops, pushes)` of a single instruction, counted in stack entries.
pub fn stack_effect(insn: &Insn) -> Result<(usize, usize)> {
    Ok(match insn {
        Insn::Label(_) | Insn::Line(_) | Insn::Nop | Insn::Iinc { .. } | Insn::Goto(_) => (0, 0),
        Insn::Const(_) | Insn::Load { .. } | Insn::New(_) | Insn::GetStatic(_) => (0, 1),
        Insn::Store { .. } | Insn::Pop | Insn::PutStatic(_) | Insn::Throw => (1, 0),
        Insn::If { .. } | Insn::IfNull(_) | Insn::IfNonNull(_) => (1, 0),
        Insn::IfCmp { .. } | Insn::PutField(_) => (2, 0),
        Insn::Arith { .. } | Insn::ArrayLoad(_) => (2, 1),
        Insn::Convert { .. }
        | Insn::NewArray(_)
        | Insn::ArrayLength
        | Insn::GetField(_)
        | Insn::CheckCast(_) => (1, 1),
        Insn::Dup => (1, 2),
        Insn::Dup2 => (2, 4),
        Insn::DupX1 => (2, 3),
        Insn::DupX2 => (3, 4),
        Insn::Swap => (2, 2),
        Insn::ArrayStore(_) => (3, 0),
        Insn::Invoke { kind, method } => {
            let desc = parse_method_descriptor(&method.descriptor)?;
            let pops = desc.params.len() + usize::from(kind.has_receiver());
            let pushes = usize::from(!desc.return_type.is_void());
            (pops, pushes)
        }
        Insn::Return(kind) => (usize::from(kind.is_some()), 0),
        Insn::Probe(probe) => (probe.pops()?, probe.pushes()),
    })
}

/// Compute the maximum operand stack depth over every reachable path.
///
/// Fails on undefined labels, stack underflow, inconsistent depths where
/// paths merge, and control flow that runs past the last instruction.
pub fn compute_max_stack(body: &MethodBody) -> Result<u16> {
    let positions = body.label_positions()?;
    let resolve = |label: Label| {
        positions
            .get(&label)
            .copied()
            .ok_or(Error::UndefinedLabel(label))
    };

    let mut handlers_by_index: Vec<Vec<usize>> = vec![Vec::new(); body.insns.len()];
    for block in &body.try_catch {
        let start = resolve(block.start)?;
        let end = resolve(block.end)?;
        let handler = resolve(block.handler)?;
        for covered in handlers_by_index.iter_mut().take(end).skip(start) {
            covered.push(handler);
        }
    }
    for local in &body.local_variables {
        resolve(local.start)?;
        resolve(local.end)?;
    }

    let mut depths: Vec<Option<usize>> = vec![None; body.insns.len()];
    let mut worklist = vec![(0usize, 0usize)];
    let mut max = 0usize;

    while let Some((index, depth)) = worklist.pop() {
        let Some(insn) = body.insns.get(index) else {
            return Err(Error::FallsOffEnd);
        };
        match depths[index] {
            Some(existing) if existing != depth => {
                return Err(Error::StackMismatch {
                    index,
                    expected: existing,
                    found: depth,
                })
            }
            Some(_) => continue,
            None => depths[index] = Some(depth),
        }

        for handler in &handlers_by_index[index] {
            max = max.max(1);
            worklist.push((*handler, 1));
        }

        let (pops, pushes) = stack_effect(insn)?;
        if depth < pops {
            return Err(Error::StackUnderflow { index });
        }
        let next = depth - pops + pushes;
        max = max.max(depth).max(next);

        if let Some(target) = insn.jump_target() {
            worklist.push((resolve(target)?, next));
        }
        if insn.falls_through() {
            worklist.push((index + 1, next));
        }
    }

    u16::try_from(max).map_err(|_| Error::Other("operand stack deeper than 65535 entries"))
}

/// Number of local slots needed by the receiver, the parameters, every
/// load/store in the body and every declared local variable.
pub fn compute_max_locals(
    body: &MethodBody,
    descriptor: &MethodDescriptor,
    is_static: bool,
) -> Result<u16> {
    let mut max = u32::from(descriptor.param_slots()) + u32::from(!is_static);
    for insn in &body.insns {
        let end = match insn {
            Insn::Load { kind, slot } | Insn::Store { kind, slot } => {
                u32::from(*slot) + u32::from(kind.slot_size())
            }
            Insn::Iinc { slot, .. } => u32::from(*slot) + 1,
            _ => continue,
        };
        max = max.max(end);
    }
    for local in &body.local_variables {
        let ty = parse_field_descriptor(&local.descriptor)?;
        max = max.max(u32::from(local.index) + u32::from(ty.slot_size()));
    }
    u16::try_from(max).map_err(|_| Error::TooManyLocals)
}

/// Find the `<init>` call through which a constructor delegates to its
/// superclass (or to another constructor of the same class).
///
/// The scan follows the uninitialized receiver loaded from slot 0 through
/// the stack shuffles that precede the call, so `new` expressions evaluated
/// as constructor arguments are not mistaken for the delegating call.
pub fn find_delegating_init(body: &MethodBody) -> Option<usize> {
    // `true` marks an entry that holds the uninitialized receiver.
    let mut stack: Vec<bool> = Vec::new();

    for (index, insn) in body.insns.iter().enumerate() {
        match insn {
            Insn::Load { slot: 0, .. } => stack.push(true),
            Insn::Dup => {
                let top = *stack.last()?;
                stack.push(top);
            }
            Insn::Dup2 => {
                let len = stack.len();
                if len < 2 {
                    return None;
                }
                stack.extend_from_within(len - 2..);
            }
            Insn::DupX1 => {
                let a = stack.pop()?;
                let b = stack.pop()?;
                stack.extend([a, b, a]);
            }
            Insn::DupX2 => {
                let a = stack.pop()?;
                let b = stack.pop()?;
                let c = stack.pop()?;
                stack.extend([a, c, b, a]);
            }
            Insn::Swap => {
                let a = stack.pop()?;
                let b = stack.pop()?;
                stack.extend([a, b]);
            }
            Insn::Invoke {
                kind: InvokeKind::Special,
                method,
            } if method.name == "<init>" => {
                let params = parse_method_descriptor(&method.descriptor).ok()?.params.len();
                let receiver_at = stack.len().checked_sub(params + 1)?;
                if stack[receiver_at] {
                    return Some(index);
                }
                stack.truncate(receiver_at);
            }
            other => {
                let (pops, pushes) = stack_effect(other).ok()?;
                let keep = stack.len().checked_sub(pops)?;
                stack.truncate(keep);
                stack.extend(std::iter::repeat(false).take(pushes));
                if !other.falls_through() {
                    // Returning or throwing before delegating leaves nothing to find.
                    return None;
                }
            }
        }
    }
    None
}
