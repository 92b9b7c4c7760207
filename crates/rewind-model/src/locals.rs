use std::collections::BTreeMap;

use rewind_bytecode::parse_method_descriptor;
use rewind_trace::{ActivationId, EventKind, TraceEvent, Value};

#[derive(Debug)]
struct Frame {
    activation: ActivationId,
    values: BTreeMap<u16, Value>,
    names: BTreeMap<u16, String>,
}

impl Frame {
    fn enter(activation: ActivationId, descriptor: &str, is_static: bool, args: &[Value]) -> Self {
        let mut values = BTreeMap::new();
        match parse_method_descriptor(descriptor) {
            Ok(parsed) => {
                let mut slot = u16::from(!is_static);
                for (param, value) in parsed.params.iter().zip(args) {
                    values.insert(slot, value.clone());
                    slot += param.slot_size();
                }
            }
            Err(err) => tracing::warn!(
                target: "rewind.model",
                descriptor,
                error = %err,
                "cannot lay out parameters"
            ),
        }
        Self {
            activation,
            values,
            names: BTreeMap::new(),
        }
    }

    fn into_named(self) -> BTreeMap<String, Value> {
        let Frame { values, names, .. } = self;
        values
            .into_iter()
            .map(|(slot, value)| {
                let name = names
                    .get(&slot)
                    .cloned()
                    .unwrap_or_else(|| format!("local-{slot}"));
                (name, value)
            })
            .collect()
    }
}

/// Replay the local-variable events of one lane and return the variables of
/// the innermost open activation, keyed by declared name.
pub(crate) fn locals_at<'a>(
    events: impl IntoIterator<Item = &'a TraceEvent>,
) -> BTreeMap<String, Value> {
    let mut frames: Vec<Frame> = Vec::new();
    for event in events {
        match &event.kind {
            EventKind::EnterActivation {
                method,
                is_static,
                args,
            } => frames.push(Frame::enter(
                event.activation,
                &method.descriptor,
                *is_static,
                args,
            )),
            EventKind::SetReceiver { receiver } => {
                if let Some(frame) = frame_of(&mut frames, event.activation) {
                    frame.values.insert(0, receiver.clone());
                    frame.names.entry(0).or_insert_with(|| "this".to_owned());
                }
            }
            EventKind::StoreLocal { slot, value } => {
                if let Some(frame) = frame_of(&mut frames, event.activation) {
                    frame.values.insert(*slot, value.clone());
                }
            }
            EventKind::SetLocalName { slot, name } => {
                if let Some(frame) = frame_of(&mut frames, event.activation) {
                    frame.names.insert(*slot, name.clone());
                }
            }
            EventKind::ExitWithValue { .. } | EventKind::ExitWithException { .. } => {
                if let Some(index) = frames
                    .iter()
                    .rposition(|frame| frame.activation == event.activation)
                {
                    frames.truncate(index);
                }
            }
            _ => {}
        }
    }
    frames.pop().map(Frame::into_named).unwrap_or_default()
}

fn frame_of(frames: &mut [Frame], activation: ActivationId) -> Option<&mut Frame> {
    frames
        .iter_mut()
        .rev()
        .find(|frame| frame.activation == activation)
}
