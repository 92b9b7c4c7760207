//! Text rendering of values and events for the human-readable log.

use crate::event::EventKind;
use crate::label::IdentityLabeler;
use crate::snapshot::{Resolver, SnapshotValue};
use crate::value::{ObjRef, ObjectData, Value};

/// Rendering of a primitive or string, `None` for null and references.
pub(crate) fn render_primitive(value: &Value) -> Option<String> {
    Some(match value {
        Value::Boolean(v) => v.to_string(),
        Value::Byte(v) => v.to_string(),
        Value::Char(v) => char::from_u32(u32::from(*v))
            .unwrap_or(char::REPLACEMENT_CHARACTER)
            .to_string(),
        Value::Short(v) => v.to_string(),
        Value::Int(v) => v.to_string(),
        Value::Long(v) => v.to_string(),
        Value::Float(v) => format!("{v:?}"),
        Value::Double(v) => format!("{v:?}"),
        Value::Str(v) => v.to_string(),
        Value::Null | Value::Object(_) => return None,
    })
}

/// Java-style `toString` of a runtime exception: dotted class name and
/// message (`null` when absent).
pub fn exception_summary(value: &Value) -> String {
    match value.as_object() {
        Some(obj) => {
            let message = match obj.field("message") {
                Some(Value::Str(message)) => message.to_string(),
                _ => "null".to_owned(),
            };
            format!("{}, {message}", obj.class_name().replace('/', "."))
        }
        None => "null, null".to_owned(),
    }
}

fn unresolved(_: &ObjRef) -> Option<SnapshotValue> {
    None
}

pub struct ValueRenderer<'a> {
    labeler: &'a IdentityLabeler,
}

impl<'a> ValueRenderer<'a> {
    pub fn new(labeler: &'a IdentityLabeler) -> Self {
        Self { labeler }
    }

    pub fn render(&self, value: &Value) -> String {
        self.render_resolved(value, &unresolved)
    }

    /// Like [`ValueRenderer::render`], but every container `resolve` knows,
    /// nested ones included, is shown with the resolved contents instead of
    /// its live state.
    pub fn render_resolved(&self, value: &Value, resolve: &Resolver<'_>) -> String {
        let mut out = String::new();
        self.render_into(value, resolve, &mut Vec::new(), &mut out);
        out
    }

    pub fn render_all(&self, values: &[Value]) -> String {
        let rendered: Vec<String> = values.iter().map(|value| self.render(value)).collect();
        format!("[{}]", rendered.join(", "))
    }

    pub fn render_snapshot(&self, snapshot: &SnapshotValue) -> String {
        match snapshot {
            SnapshotValue::Sequence(values) => self.render_all(values),
            SnapshotValue::Map(entries) => {
                let rendered: Vec<String> = entries
                    .iter()
                    .map(|(key, value)| format!("{}={}", self.render(key), self.render(value)))
                    .collect();
                format!("{{{}}}", rendered.join(", "))
            }
        }
    }

    fn render_into(
        &self,
        value: &Value,
        resolve: &Resolver<'_>,
        parents: &mut Vec<ObjRef>,
        out: &mut String,
    ) {
        let obj = match value {
            Value::Null => {
                out.push_str("null");
                return;
            }
            Value::Object(obj) => obj,
            other => {
                out.push_str(&render_primitive(other).unwrap_or_default());
                return;
            }
        };
        if parents.contains(obj) {
            out.push_str("(this Collection)");
            return;
        }

        // Copy out before recursing so no object lock is held while rendering
        // nested containers.
        let contents = match resolve(obj) {
            Some(SnapshotValue::Sequence(elements)) => Contents::Sequence(elements),
            Some(SnapshotValue::Map(entries)) => Contents::Map(entries),
            None => match &*obj.data() {
                ObjectData::List(elements) => Contents::Sequence(elements.clone()),
                ObjectData::Map(entries) => Contents::Map(entries.clone()),
                ObjectData::Instance { .. } | ObjectData::Array { .. } => Contents::Opaque,
            },
        };

        parents.push(obj.clone());
        match contents {
            Contents::Sequence(elements) => {
                out.push('[');
                for (index, element) in elements.iter().enumerate() {
                    if index > 0 {
                        out.push_str(", ");
                    }
                    self.render_into(element, resolve, parents, out);
                }
                out.push(']');
            }
            Contents::Map(entries) => {
                out.push('{');
                for (index, (key, value)) in entries.iter().enumerate() {
                    if index > 0 {
                        out.push_str(", ");
                    }
                    self.render_into(key, resolve, parents, out);
                    out.push('=');
                    self.render_into(value, resolve, parents, out);
                }
                out.push('}');
            }
            Contents::Opaque => out.push_str(&self.labeler.label(obj)),
        }
        parents.pop();
    }

    /// The fixed-format log line for an event.
    pub fn render_event(&self, kind: &EventKind) -> String {
        match kind {
            EventKind::EnterActivation { method, args, .. } => format!(
                "ENTER METHOD: {}, {}, {}, {}",
                method.owner,
                method.name,
                method.descriptor,
                self.render_all(args)
            ),
            EventKind::SetReceiver { receiver } => {
                format!("SETTHIS: {}", self.labeler.label_value(receiver))
            }
            EventKind::PutField {
                target,
                name,
                value,
            } => format!(
                "PUT FIELD: {}, {name}, {}",
                self.labeler.label_value(target),
                self.render(value)
            ),
            EventKind::StoreLocal { slot, value } => {
                format!("STORE: {slot}, {}", self.render(value))
            }
            EventKind::StoreElement {
                array,
                index,
                value,
            } => format!(
                "STORE ARRAY: {}, {index}, {}",
                self.labeler.label_value(array),
                self.render(value)
            ),
            EventKind::InvokeVirtual {
                receiver,
                method,
                args,
            } => format!(
                "INVOKE: {}, {}, {}, {}",
                self.labeler.label_value(receiver),
                method.name,
                method.descriptor,
                self.render_all(args)
            ),
            EventKind::InvokeSpecial {
                receiver,
                method,
                args,
            } => format!(
                "INVOKE SPECIAL: {}, {}, {}, {}, {}",
                self.labeler.label_value(receiver),
                method.owner,
                method.name,
                method.descriptor,
                self.render_all(args)
            ),
            EventKind::InvokeStatic { method, args } => format!(
                "INVOKE STATIC: {}, {}, {}, {}",
                method.owner,
                method.name,
                method.descriptor,
                self.render_all(args)
            ),
            EventKind::ReturnValue { value } => format!("RETURN: {}", self.render(value)),
            EventKind::ReturnedValue { value } => format!("RETURNED: {}", self.render(value)),
            EventKind::ThrowValue { exception } => {
                format!("THROW: {}", exception_summary(exception))
            }
            EventKind::CatchValue { exception } => {
                format!("CATCH: {}", exception_summary(exception))
            }
            EventKind::ExitWithValue { value } => format!("EXIT VALUE: {}", self.render(value)),
            EventKind::ExitWithException { exception } => {
                format!("EXIT EXCEPTION: {}", exception_summary(exception))
            }
            EventKind::SetLocalName { slot, name } => format!("SET LOCAL NAME: {name}, {slot}"),
            EventKind::ObjectSnapshot {
                object,
                strategy,
                snapshot,
            } => format!(
                "{strategy} SNAPSHOT: {}, {}",
                self.labeler.label(object),
                self.render_snapshot(snapshot)
            ),
        }
    }
}

enum Contents {
    Sequence(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Opaque,
}
