use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use rewind_bytecode::{BaseType, FieldType, ReturnType};
use serde::Serialize;

/// Process-wide identity of a heap object. Ids are never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ObjectData {
    Instance { fields: BTreeMap<String, Value> },
    Array { component: FieldType, elements: Vec<Value> },
    List(Vec<Value>),
    /// Entries in insertion order.
    Map(Vec<(Value, Value)>),
}

#[derive(Debug)]
pub struct HeapObject {
    id: ObjectId,
    class_name: String,
    data: Mutex<ObjectData>,
}

/// Shared handle to a heap object.
///
/// Equality and hashing go through the object's identity, never its
/// contents, so an `ObjRef` can key maps the way `IdentityHashMap` keys do.
#[derive(Clone)]
pub struct ObjRef(Arc<HeapObject>);

impl ObjRef {
    pub fn new(class_name: impl Into<String>, data: ObjectData) -> Self {
        Self(Arc::new(HeapObject {
            id: ObjectId::next(),
            class_name: class_name.into(),
            data: Mutex::new(data),
        }))
    }

    pub fn instance(class_name: impl Into<String>) -> Self {
        Self::new(
            class_name,
            ObjectData::Instance {
                fields: BTreeMap::new(),
            },
        )
    }

    pub fn list(class_name: impl Into<String>, elements: Vec<Value>) -> Self {
        Self::new(class_name, ObjectData::List(elements))
    }

    pub fn array(component: FieldType, elements: Vec<Value>) -> Self {
        Self::new(
            component.array_type_name(),
            ObjectData::Array {
                component,
                elements,
            },
        )
    }

    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    /// Internal runtime class name, e.g. `java/util/ArrayList` or `[I`.
    pub fn class_name(&self) -> &str {
        &self.0.class_name
    }

    /// Lock the object's contents. Never hold the guard across a call back
    /// into the trace session.
    pub fn data(&self) -> MutexGuard<'_, ObjectData> {
        self.0.data.lock()
    }

    pub fn field(&self, name: &str) -> Option<Value> {
        match &*self.data() {
            ObjectData::Instance { fields } => fields.get(name).cloned(),
            _ => None,
        }
    }

    pub fn set_field(&self, name: &str, value: Value) {
        if let ObjectData::Instance { fields } = &mut *self.data() {
            fields.insert(name.to_owned(), value);
        }
    }

    /// Copy of the elements if this object is a list.
    pub fn list_elements(&self) -> Option<Vec<Value>> {
        match &*self.data() {
            ObjectData::List(elements) => Some(elements.clone()),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        self.0.class_name.starts_with('[')
    }
}

impl PartialEq for ObjRef {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for ObjRef {}

impl Hash for ObjRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjRef({}{})", self.class_name(), self.id())
    }
}

/// A runtime value as seen by probes: primitives, immutable strings and
/// references to heap objects.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(Arc<str>),
    Object(ObjRef),
}

impl Value {
    pub fn str(value: &str) -> Self {
        Value::Str(Arc::from(value))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Boolean(v) => Some(i32::from(*v)),
            Value::Byte(v) => Some(i32::from(*v)),
            Value::Char(v) => Some(i32::from(*v)),
            Value::Short(v) => Some(i32::from(*v)),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Runtime class of a reference value; `None` for null and primitives.
    pub fn runtime_class(&self) -> Option<&str> {
        match self {
            Value::Str(_) => Some("java/lang/String"),
            Value::Object(obj) => Some(obj.class_name()),
            _ => None,
        }
    }

    /// Reinterpret a stack int according to the declared static type, so a
    /// `boolean` parameter is reported as `true` rather than `1`.
    pub fn boxed_as(self, ty: &FieldType) -> Value {
        let FieldType::Base(base) = ty else {
            return self;
        };
        let Value::Int(raw) = self else {
            return self;
        };
        match base {
            BaseType::Boolean => Value::Boolean(raw != 0),
            BaseType::Byte => Value::Byte(raw as i8),
            BaseType::Char => Value::Char(raw as u16),
            BaseType::Short => Value::Short(raw as i16),
            _ => Value::Int(raw),
        }
    }

    pub fn boxed_as_return(self, ty: &ReturnType) -> Value {
        match ty {
            ReturnType::Void => self,
            ReturnType::Type(ty) => self.boxed_as(ty),
        }
    }
}

impl From<ObjRef> for Value {
    fn from(obj: ObjRef) -> Self {
        Value::Object(obj)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}
