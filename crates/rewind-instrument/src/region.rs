use rewind_bytecode::{Insn, Label, MethodBody};

/// Tracks the synthesized catch-all ranges of one method.
///
/// A range opens before the first instruction that can fault or call out
/// and closes before a label that starts a user try block or handler, and
/// right after a return or throw. All ranges share one handler.
#[derive(Debug)]
pub(crate) struct ProtectiveRegion {
    open: Option<Label>,
    ranges: Vec<(Label, Label)>,
}

impl ProtectiveRegion {
    pub(crate) fn new() -> Self {
        Self {
            open: None,
            ranges: Vec::new(),
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Open a range here unless one is already open.
    pub(crate) fn open(&mut self, body: &mut MethodBody, out: &mut Vec<Insn>) {
        if self.open.is_none() {
            let start = body.new_label();
            out.push(Insn::Label(start));
            self.open = Some(start);
        }
    }

    /// Close the open range here, if any.
    pub(crate) fn close(&mut self, body: &mut MethodBody, out: &mut Vec<Insn>) {
        if let Some(start) = self.open.take() {
            let end = body.new_label();
            out.push(Insn::Label(end));
            self.ranges.push((start, end));
        }
    }

    pub(crate) fn into_ranges(self) -> Vec<(Label, Label)> {
        debug_assert!(self.open.is_none(), "range left open");
        self.ranges
    }
}
