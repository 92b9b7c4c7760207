use std::collections::HashMap;

use parking_lot::Mutex;
use rewind_bytecode::parse_field_descriptor;
use rewind_bytecode::FieldType;

use crate::value::{ObjRef, ObjectId, Value};

pub const NULL_LABEL: &str = "null";

#[derive(Debug, Default)]
struct LabelState {
    labels: HashMap<ObjectId, String>,
    /// Keyed by internal class name; two classes sharing a simple name still
    /// count separately.
    counters: HashMap<String, u32>,
}

/// Assigns stable `Type-N` labels to objects by identity.
///
/// Labels are handed out lazily on first request and live until
/// [`IdentityLabeler::clear`].
#[derive(Debug, Default)]
pub struct IdentityLabeler {
    state: Mutex<LabelState>,
}

impl IdentityLabeler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(&self, object: &ObjRef) -> String {
        let mut state = self.state.lock();
        if let Some(label) = state.labels.get(&object.id()) {
            return label.clone();
        }
        let counter = state
            .counters
            .entry(object.class_name().to_owned())
            .or_insert(0);
        *counter += 1;
        let label = format!("{}-{}", simple_type_name(object.class_name()), counter);
        state.labels.insert(object.id(), label.clone());
        label
    }

    /// Label for an arbitrary value: `null`, an object label, or the plain
    /// rendering of a primitive or string (those carry no identity).
    pub fn label_value(&self, value: &Value) -> String {
        match value {
            Value::Null => NULL_LABEL.to_owned(),
            Value::Object(obj) => self.label(obj),
            other => crate::render::render_primitive(other).unwrap_or_default(),
        }
    }

    /// The label previously assigned to `object`, without assigning one.
    pub fn existing(&self, object: &ObjRef) -> Option<String> {
        self.state.lock().labels.get(&object.id()).cloned()
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.labels.clear();
        state.counters.clear();
    }
}

/// User-facing short name of an internal class name.
///
/// `demo/Outer$Inner` becomes `Inner`, `[I` becomes `int[]` and
/// `[[Ljava/lang/String;` becomes `String[][]`.
pub fn simple_type_name(class_name: &str) -> String {
    if class_name.starts_with('[') {
        if let Ok(ty) = parse_field_descriptor(class_name) {
            return field_type_simple_name(&ty);
        }
    }
    let base = class_name.rsplit('/').next().unwrap_or(class_name);
    base.rsplit('$').next().unwrap_or(base).to_owned()
}

fn field_type_simple_name(ty: &FieldType) -> String {
    match ty {
        FieldType::Base(base) => base.java_name().to_owned(),
        FieldType::Object(name) => simple_type_name(name),
        FieldType::Array(component) => format!("{}[]", field_type_simple_name(component)),
    }
}
