use std::collections::{BTreeMap, HashSet};

use rewind_bytecode::{
    compute_max_locals, compute_max_stack, find_delegating_init, parse_field_descriptor,
    parse_method_descriptor, ClassDef, Constant, Insn, InvokeKind, Label, MemberRef,
    MethodBody, MethodDef, Probe, ReturnType, TryCatchBlock, ValueKind,
};
use rewind_config::InstrumentConfig;

use crate::region::ProtectiveRegion;
use crate::InstrumentError;

/// Rewrites one method body.
///
/// The activation id lives in the first slot past the original locals;
/// scratch slots for call arguments and array stores follow it and are
/// reused from one site to the next.
pub(crate) struct MethodRewriter<'a> {
    config: &'a InstrumentConfig,
    owner: &'a str,
    method: &'a MethodDef,
    /// Working copy; only used to allocate labels that do not collide with
    /// the original ones.
    body: MethodBody,
    out: Vec<Insn>,
    region: ProtectiveRegion,
    id_slot: u16,
    line: Option<u32>,
}

impl<'a> MethodRewriter<'a> {
    pub(crate) fn new(
        config: &'a InstrumentConfig,
        class: &'a ClassDef,
        method: &'a MethodDef,
    ) -> Result<Self, InstrumentError> {
        let original = method.body().map_err(|source| bytecode(method, source))?;
        let descriptor = method
            .parsed_descriptor()
            .map_err(|source| bytecode(method, source))?;
        compute_max_stack(original).map_err(|source| bytecode(method, source))?;
        let id_slot = compute_max_locals(original, &descriptor, method.is_static())
            .map_err(|source| bytecode(method, source))?
            .max(original.max_locals);

        Ok(Self {
            config,
            owner: &class.name,
            method,
            body: original.clone(),
            out: Vec::with_capacity(original.insns.len() * 3),
            region: ProtectiveRegion::new(),
            id_slot,
            line: None,
        })
    }

    pub(crate) fn rewrite(mut self) -> Result<MethodBody, InstrumentError> {
        let original = self.body.clone();

        let delegating_init = if self.method.is_constructor() {
            let index = find_delegating_init(&original);
            if index.is_none() && self.owner != "java/lang/Object" {
                return Err(InstrumentError::MissingDelegatingInit {
                    method: self.qualified_name(),
                });
            }
            index
        } else {
            None
        };

        let try_starts: HashSet<Label> = original.try_catch.iter().map(|b| b.start).collect();
        let handlers: HashSet<Label> = original.handler_labels().collect();

        self.emit_entry(&original)?;

        for (index, insn) in original.insns.iter().enumerate() {
            match insn {
                Insn::Label(label) => {
                    if try_starts.contains(label) || handlers.contains(label) {
                        self.region.close(&mut self.body, &mut self.out);
                    }
                    self.out.push(insn.clone());
                    if handlers.contains(label) {
                        self.out.push(Insn::Dup);
                        self.probe(Probe::Catch { line: self.line() });
                    }
                }
                Insn::Line(line) => {
                    if self.config.line_numbers {
                        self.line = Some(*line);
                    }
                    self.out.push(insn.clone());
                }
                _ => {
                    self.region.open(&mut self.body, &mut self.out);
                    self.emit_instruction(insn)?;
                    if delegating_init == Some(index) {
                        self.out.push(Insn::Load {
                            kind: ValueKind::Reference,
                            slot: 0,
                        });
                        self.probe(Probe::SetReceiver { line: self.line() });
                    }
                    if matches!(insn, Insn::Return(_) | Insn::Throw) {
                        self.region.close(&mut self.body, &mut self.out);
                    }
                }
            }
        }
        self.region.close(&mut self.body, &mut self.out);

        let mut try_catch = original.try_catch.clone();
        let ranges = std::mem::replace(&mut self.region, ProtectiveRegion::new()).into_ranges();
        if !ranges.is_empty() {
            let handler = self.body.new_label();
            self.out.push(Insn::Label(handler));
            self.out.push(Insn::Dup);
            self.probe(Probe::ExitWithException { line: self.line() });
            self.out.push(Insn::Throw);
            try_catch.extend(ranges.into_iter().map(|(start, end)| TryCatchBlock {
                start,
                end,
                handler,
                catch_type: None,
            }));
        }

        let descriptor = self
            .method
            .parsed_descriptor()
            .map_err(|source| bytecode(self.method, source))?;
        let mut rewritten = MethodBody::new(self.out, try_catch, original.local_variables);
        rewritten.max_locals =
            compute_max_locals(&rewritten, &descriptor, self.method.is_static())
                .map_err(|source| bytecode(self.method, source))?;
        rewritten.max_stack =
            compute_max_stack(&rewritten).map_err(|source| bytecode(self.method, source))?;
        Ok(rewritten)
    }

    fn qualified_name(&self) -> String {
        format!("{}.{}{}", self.owner, self.method.name, self.method.descriptor)
    }

    fn line(&self) -> Option<u32> {
        self.line
    }

    /// Push the activation id and the probe itself.
    fn probe(&mut self, probe: Probe) {
        self.out.push(Insn::Load {
            kind: ValueKind::Int,
            slot: self.id_slot,
        });
        self.out.push(Insn::Probe(probe));
    }

    fn emit_entry(&mut self, original: &MethodBody) -> Result<(), InstrumentError> {
        let descriptor = self
            .method
            .parsed_descriptor()
            .map_err(|source| bytecode(self.method, source))?;
        let is_static = self.method.is_static();

        // Line of the first statement, so the entry is attributed to it.
        let entry_line = if self.config.line_numbers {
            original.insns.iter().find_map(|insn| match insn {
                Insn::Line(line) => Some(*line),
                _ => None,
            })
        } else {
            None
        };

        self.out.push(Insn::Probe(Probe::NextActivation));
        self.out.push(Insn::Store {
            kind: ValueKind::Int,
            slot: self.id_slot,
        });

        let mut slot = u16::from(!is_static);
        for param in &descriptor.params {
            self.out.push(Insn::Load {
                kind: param.value_kind(),
                slot,
            });
            slot += param.slot_size();
        }
        self.probe(Probe::Enter {
            method: MemberRef::new(self.owner, &self.method.name, &self.method.descriptor),
            is_static,
            line: entry_line,
        });

        if !is_static && !self.method.is_constructor() {
            self.out.push(Insn::Load {
                kind: ValueKind::Reference,
                slot: 0,
            });
            self.probe(Probe::SetReceiver { line: entry_line });
        }

        if self.config.local_names {
            // A slot javac reuses is announced under its last declaration.
            let names: BTreeMap<u16, &str> = original
                .local_variables
                .iter()
                .map(|local| (local.index, local.name.as_str()))
                .collect();
            for (slot, name) in names {
                self.probe(Probe::LocalName {
                    slot,
                    name: name.to_owned(),
                    line: entry_line,
                });
            }
        }
        Ok(())
    }

    fn scratch(&self, offset: u16) -> u16 {
        self.id_slot + 1 + offset
    }

    fn emit_instruction(&mut self, insn: &Insn) -> Result<(), InstrumentError> {
        let line = self.line();
        match insn {
            Insn::PutField(field) => {
                let ty = parse_field_descriptor(&field.descriptor)
                    .map_err(|source| bytecode(self.method, source))?;
                self.out.push(Insn::Dup2);
                self.probe(Probe::PutField {
                    name: field.name.clone(),
                    ty,
                    line,
                });
                self.out.push(insn.clone());
            }
            Insn::Store { slot, .. } => {
                self.out.push(Insn::Dup);
                self.probe(Probe::StoreLocal { slot: *slot, line });
                self.out.push(insn.clone());
            }
            Insn::Iinc { slot, .. } => {
                self.out.push(insn.clone());
                self.out.push(Insn::Load {
                    kind: ValueKind::Int,
                    slot: *slot,
                });
                self.probe(Probe::StoreLocal { slot: *slot, line });
            }
            Insn::ArrayStore(kind) => self.emit_array_store(*kind, line),
            Insn::Invoke { kind, method } => self.emit_invoke(*kind, method, line)?,
            Insn::Return(kind) => {
                let ty = parse_method_descriptor(&self.method.descriptor)
                    .map_err(|source| bytecode(self.method, source))?
                    .return_type;
                for exit in [
                    Probe::Return {
                        ty: ty.clone(),
                        line,
                    },
                    Probe::ExitWithValue { ty, line },
                ] {
                    self.push_copy_or_null(*kind);
                    self.probe(exit);
                }
                self.out.push(insn.clone());
            }
            Insn::Throw => {
                self.out.push(Insn::Dup);
                self.probe(Probe::Throw { line });
                self.out.push(Insn::Throw);
            }
            other => self.out.push(other.clone()),
        }
        Ok(())
    }

    fn push_copy_or_null(&mut self, kind: Option<ValueKind>) {
        self.out.push(match kind {
            Some(_) => Insn::Dup,
            None => Insn::Const(Constant::Null),
        });
    }

    fn emit_array_store(&mut self, kind: ValueKind, line: Option<u32>) {
        let array = self.scratch(0);
        let index = self.scratch(1);
        let value = self.scratch(2);
        let operands = [
            (ValueKind::Reference, array),
            (ValueKind::Int, index),
            (kind, value),
        ];

        for (kind, slot) in operands.iter().rev() {
            self.out.push(Insn::Store {
                kind: *kind,
                slot: *slot,
            });
        }
        self.load_all(&operands);
        self.probe(Probe::StoreElement { line });
        self.load_all(&operands);
        self.out.push(Insn::ArrayStore(kind));
    }

    fn emit_invoke(
        &mut self,
        kind: InvokeKind,
        method: &MemberRef,
        line: Option<u32>,
    ) -> Result<(), InstrumentError> {
        let descriptor = parse_method_descriptor(&method.descriptor)
            .map_err(|source| bytecode(self.method, source))?;

        let mut args = Vec::with_capacity(descriptor.params.len());
        let mut offset = 0u16;
        for param in &descriptor.params {
            args.push((param.value_kind(), self.scratch(offset)));
            offset += param.slot_size();
        }

        for (kind, slot) in args.iter().rev() {
            self.out.push(Insn::Store {
                kind: *kind,
                slot: *slot,
            });
        }
        if kind.has_receiver() {
            if method.name == "<init>" {
                // The target is not initialized yet and cannot be observed.
                self.out.push(Insn::Const(Constant::Null));
            } else {
                self.out.push(Insn::Dup);
            }
        }
        self.load_all(&args);
        self.probe(Probe::Invoke {
            kind,
            method: method.clone(),
            line,
        });
        self.load_all(&args);
        self.out.push(Insn::Invoke {
            kind,
            method: method.clone(),
        });

        let ty: ReturnType = descriptor.return_type;
        self.push_copy_or_null(ty.value_kind());
        self.probe(Probe::Returned { ty, line });
        Ok(())
    }

    fn load_all(&mut self, slots: &[(ValueKind, u16)]) {
        for (kind, slot) in slots {
            self.out.push(Insn::Load {
                kind: *kind,
                slot: *slot,
            });
        }
    }
}

fn bytecode(method: &MethodDef, source: rewind_bytecode::Error) -> InstrumentError {
    InstrumentError::Bytecode {
        method: method.to_string(),
        source,
    }
}
