use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use parking_lot::Mutex;
use rewind_bytecode::{BaseType, FieldType};
use rewind_config::VmConfig;
use rewind_trace::{ObjRef, ObjectData, TraceSession, Value};

use crate::class::ClassTable;
use crate::error::VmError;
use crate::natives::NativeRegistry;

/// State shared by every lane of one runtime.
pub(crate) struct VmShared {
    pub(crate) session: Arc<TraceSession>,
    pub(crate) config: VmConfig,
    pub(crate) classes: ClassTable,
    pub(crate) natives: NativeRegistry,
    pub(crate) statics: Mutex<HashMap<(String, String), Value>>,
    pub(crate) next_lane: AtomicU64,
}

/// Abrupt completion of an instruction: either a Java exception that may be
/// caught further up, or a fault of the runtime itself.
#[derive(Debug)]
pub(crate) enum Raise {
    Exception(ObjRef),
    Fatal(VmError),
}

impl From<VmError> for Raise {
    fn from(err: VmError) -> Self {
        Raise::Fatal(err)
    }
}

impl From<rewind_bytecode::Error> for Raise {
    fn from(err: rewind_bytecode::Error) -> Self {
        Raise::Fatal(VmError::Bytecode(err))
    }
}

impl VmShared {
    pub(crate) fn new_exception(&self, class: &str, message: Option<String>) -> ObjRef {
        let mut fields = BTreeMap::new();
        fields.insert(
            "message".to_owned(),
            message.map_or(Value::Null, |message| Value::str(&message)),
        );
        ObjRef::new(class, ObjectData::Instance { fields })
    }

    pub(crate) fn raise(&self, class: &str, message: Option<String>) -> Raise {
        let exception = self.new_exception(class, message);
        tracing::trace!(target: "rewind.vm", class, "runtime exception raised");
        Raise::Exception(exception)
    }

    /// Allocate an instance of `class` with every declared field set to its
    /// default value. Collection classes get list or map storage.
    pub(crate) fn instantiate(&self, class: &str) -> Result<ObjRef, VmError> {
        self.classes.require(class)?;
        if self.classes.is_assignable(class, "java/util/List") {
            return Ok(ObjRef::list(class, Vec::new()));
        }
        if self.classes.is_assignable(class, "java/util/Map") {
            return Ok(ObjRef::new(class, ObjectData::Map(Vec::new())));
        }

        let mut fields = BTreeMap::new();
        for ancestor in self.classes.ancestors(class) {
            for field in &ancestor.def.fields {
                if field.access.contains(rewind_bytecode::AccessFlags::STATIC) {
                    continue;
                }
                let ty = rewind_bytecode::parse_field_descriptor(&field.descriptor)?;
                fields
                    .entry(field.name.clone())
                    .or_insert_with(|| default_value(&ty));
            }
        }
        Ok(ObjRef::new(class, ObjectData::Instance { fields }))
    }
}

pub(crate) fn default_value(ty: &FieldType) -> Value {
    match ty {
        FieldType::Base(BaseType::Long) => Value::Long(0),
        FieldType::Base(BaseType::Float) => Value::Float(0.0),
        FieldType::Base(BaseType::Double) => Value::Double(0.0),
        FieldType::Base(_) => Value::Int(0),
        FieldType::Object(_) | FieldType::Array(_) => Value::Null,
    }
}

/// Operand stacks only hold ints for the small integral types.
pub(crate) fn to_stack(value: Value) -> Value {
    match value {
        Value::Boolean(v) => Value::Int(i32::from(v)),
        Value::Byte(v) => Value::Int(i32::from(v)),
        Value::Char(v) => Value::Int(i32::from(v)),
        Value::Short(v) => Value::Int(i32::from(v)),
        other => other,
    }
}

/// Class used for virtual dispatch and casts. Stack ints stand in for boxed
/// `Integer`s.
pub(crate) fn runtime_class_of(value: &Value) -> Option<&str> {
    Some(match value {
        Value::Null => return None,
        Value::Boolean(_) => "java/lang/Boolean",
        Value::Byte(_) => "java/lang/Byte",
        Value::Char(_) => "java/lang/Character",
        Value::Short(_) => "java/lang/Short",
        Value::Int(_) => "java/lang/Integer",
        Value::Long(_) => "java/lang/Long",
        Value::Float(_) => "java/lang/Float",
        Value::Double(_) => "java/lang/Double",
        Value::Str(_) => "java/lang/String",
        Value::Object(obj) => obj.class_name(),
    })
}
