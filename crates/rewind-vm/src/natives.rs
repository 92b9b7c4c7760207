//! Host implementations of the library methods traced programs call.
//!
//! Boxed integers never exist on the heap: an `Integer` is a stack
//! [`Value::Int`], and `Integer.valueOf`/`intValue` are identities.

use std::collections::HashMap;

use rewind_bytecode::FieldType;
use rewind_trace::{ObjRef, ObjectData, Value};

use crate::runtime::{Raise, VmShared};

pub(crate) type NativeFn = fn(&NativeCall<'_>) -> Result<Option<Value>, Raise>;

pub(crate) struct NativeCall<'a> {
    pub(crate) vm: &'a VmShared,
    pub(crate) receiver: Option<Value>,
    pub(crate) args: Vec<Value>,
}

impl NativeCall<'_> {
    fn raise(&self, class: &str, message: impl Into<String>) -> Raise {
        self.vm.raise(class, Some(message.into()))
    }

    fn npe(&self) -> Raise {
        self.vm.raise("java/lang/NullPointerException", None)
    }

    fn receiver(&self) -> Result<&Value, Raise> {
        match &self.receiver {
            Some(Value::Null) | None => Err(self.npe()),
            Some(value) => Ok(value),
        }
    }

    fn this(&self) -> Result<&ObjRef, Raise> {
        self.receiver()?.as_object().ok_or_else(|| self.npe())
    }

    fn arg(&self, index: usize) -> &Value {
        self.args.get(index).unwrap_or(&Value::Null)
    }

    fn int_arg(&self, index: usize) -> Result<i32, Raise> {
        self.arg(index).as_int().ok_or_else(|| self.npe())
    }

    fn object_arg(&self, index: usize) -> Result<&ObjRef, Raise> {
        self.arg(index).as_object().ok_or_else(|| self.npe())
    }

    fn str_arg(&self, index: usize) -> Result<&str, Raise> {
        match self.arg(index) {
            Value::Str(value) => Ok(value),
            _ => Err(self.npe()),
        }
    }

    fn out_of_bounds(&self, index: i32, length: usize) -> Raise {
        self.raise(
            "java/lang/IndexOutOfBoundsException",
            format!("Index {index} out of bounds for length {length}"),
        )
    }

    fn unsupported(&self) -> Raise {
        self.vm.raise("java/lang/UnsupportedOperationException", None)
    }

    /// Run `f` over the receiver's list storage.
    fn with_list<R>(&self, f: impl FnOnce(&mut Vec<Value>) -> R) -> Result<R, Raise> {
        let this = self.this()?;
        let mut data = this.data();
        match &mut *data {
            ObjectData::List(elements) => Ok(f(elements)),
            _ => Err(self.raise("java/lang/ClassCastException", this.class_name())),
        }
    }

    fn with_map<R>(&self, f: impl FnOnce(&mut Vec<(Value, Value)>) -> R) -> Result<R, Raise> {
        let this = self.this()?;
        let mut data = this.data();
        match &mut *data {
            ObjectData::Map(entries) => Ok(f(entries)),
            _ => Err(self.raise("java/lang/ClassCastException", this.class_name())),
        }
    }
}

/// Lookup table of native methods, keyed by declaring class and signature.
#[derive(Default)]
pub(crate) struct NativeRegistry {
    methods: HashMap<String, NativeFn>,
}

impl std::fmt::Debug for NativeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeRegistry")
            .field("methods", &self.methods.len())
            .finish()
    }
}

impl NativeRegistry {
    pub(crate) fn get(&self, owner: &str, name: &str, descriptor: &str) -> Option<NativeFn> {
        self.methods
            .get(&format!("{owner}.{name}{descriptor}"))
            .copied()
    }

    fn register(&mut self, owner: &str, signature: &str, native: NativeFn) {
        self.methods.insert(format!("{owner}.{signature}"), native);
    }

    pub(crate) fn with_builtins() -> Self {
        let mut natives = Self::default();
        natives.register_lang();
        natives.register_lists();
        natives.register_maps();
        natives.register_utilities();
        natives
    }

    fn register_lang(&mut self) {
        const OBJECT: &str = "java/lang/Object";
        self.register(OBJECT, "<init>()V", |_| Ok(None));
        self.register(OBJECT, "hashCode()I", |call| {
            Ok(Some(Value::Int(identity_hash(call.this()?))))
        });
        self.register(OBJECT, "equals(Ljava/lang/Object;)Z", |call| {
            Ok(Some(Value::Boolean(call.receiver()? == call.arg(0))))
        });
        self.register(OBJECT, "toString()Ljava/lang/String;", |call| {
            Ok(Some(Value::str(&java_string(call.receiver()?))))
        });

        const THROWABLE: &str = "java/lang/Throwable";
        self.register(THROWABLE, "<init>()V", |_| Ok(None));
        self.register(THROWABLE, "<init>(Ljava/lang/String;)V", |call| {
            call.this()?.set_field("message", call.arg(0).clone());
            Ok(None)
        });
        self.register(THROWABLE, "getMessage()Ljava/lang/String;", |call| {
            Ok(Some(call.this()?.field("message").unwrap_or(Value::Null)))
        });
        self.register(THROWABLE, "toString()Ljava/lang/String;", |call| {
            let this = call.this()?;
            let name = this.class_name().replace('/', ".");
            Ok(Some(Value::str(&match this.field("message") {
                Some(Value::Str(message)) => format!("{name}: {message}"),
                _ => name,
            })))
        });

        const INTEGER: &str = "java/lang/Integer";
        self.register(INTEGER, "valueOf(I)Ljava/lang/Integer;", |call| {
            Ok(Some(Value::Int(call.int_arg(0)?)))
        });
        self.register(INTEGER, "intValue()I", |call| {
            Ok(Some(Value::Int(call.receiver()?.as_int().ok_or_else(|| call.npe())?)))
        });
        self.register(INTEGER, "hashCode()I", |call| {
            Ok(Some(Value::Int(call.receiver()?.as_int().ok_or_else(|| call.npe())?)))
        });
        self.register(INTEGER, "parseInt(Ljava/lang/String;)I", |call| {
            let text = call.str_arg(0)?;
            match text.parse::<i32>() {
                Ok(value) => Ok(Some(Value::Int(value))),
                Err(_) => Err(call.raise(
                    "java/lang/NumberFormatException",
                    format!("For input string: \"{text}\""),
                )),
            }
        });
        self.register(INTEGER, "toString(I)Ljava/lang/String;", |call| {
            Ok(Some(Value::str(&call.int_arg(0)?.to_string())))
        });
        self.register(INTEGER, "compareTo(Ljava/lang/Integer;)I", compare_to);
        self.register(INTEGER, "compareTo(Ljava/lang/Object;)I", compare_to);

        const MATH: &str = "java/lang/Math";
        self.register(MATH, "max(II)I", |call| {
            Ok(Some(Value::Int(call.int_arg(0)?.max(call.int_arg(1)?))))
        });
        self.register(MATH, "min(II)I", |call| {
            Ok(Some(Value::Int(call.int_arg(0)?.min(call.int_arg(1)?))))
        });
        self.register(MATH, "abs(I)I", |call| {
            Ok(Some(Value::Int(call.int_arg(0)?.wrapping_abs())))
        });

        const STRING: &str = "java/lang/String";
        self.register(STRING, "length()I", |call| {
            let this = string_receiver(call)?;
            Ok(Some(Value::Int(to_int(this.encode_utf16().count()))))
        });
        self.register(STRING, "charAt(I)C", |call| {
            let this = string_receiver(call)?;
            let index = call.int_arg(0)?;
            let units: Vec<u16> = this.encode_utf16().collect();
            match usize::try_from(index).ok().and_then(|i| units.get(i)) {
                Some(unit) => Ok(Some(Value::Char(*unit))),
                None => Err(call.raise(
                    "java/lang/StringIndexOutOfBoundsException",
                    format!("index {index}, length {}", units.len()),
                )),
            }
        });
        self.register(STRING, "equals(Ljava/lang/Object;)Z", |call| {
            Ok(Some(Value::Boolean(call.receiver()? == call.arg(0))))
        });
        self.register(STRING, "hashCode()I", |call| {
            Ok(Some(Value::Int(string_hash(string_receiver(call)?))))
        });
        self.register(STRING, "concat(Ljava/lang/String;)Ljava/lang/String;", |call| {
            let joined = format!("{}{}", string_receiver(call)?, call.str_arg(0)?);
            Ok(Some(Value::str(&joined)))
        });
        self.register(STRING, "toString()Ljava/lang/String;", |call| {
            Ok(Some(call.receiver()?.clone()))
        });
        self.register(STRING, "valueOf(I)Ljava/lang/String;", |call| {
            Ok(Some(Value::str(&call.int_arg(0)?.to_string())))
        });
        self.register(STRING, "valueOf(Ljava/lang/Object;)Ljava/lang/String;", |call| {
            Ok(Some(Value::str(&java_string(call.arg(0)))))
        });

        const BUILDER: &str = "java/lang/StringBuilder";
        self.register(BUILDER, "<init>()V", |call| {
            call.this()?.set_field("value", Value::str(""));
            Ok(None)
        });
        self.register(BUILDER, "append(Ljava/lang/String;)Ljava/lang/StringBuilder;", append);
        self.register(BUILDER, "append(Ljava/lang/Object;)Ljava/lang/StringBuilder;", append);
        self.register(BUILDER, "append(I)Ljava/lang/StringBuilder;", append);
        self.register(BUILDER, "toString()Ljava/lang/String;", |call| {
            Ok(Some(call.this()?.field("value").unwrap_or_else(|| Value::str(""))))
        });
    }

    fn register_lists(&mut self) {
        const LIST: &str = "java/util/AbstractList";
        self.register(LIST, "<init>()V", |_| Ok(None));
        self.register(LIST, "<init>(I)V", |call| {
            if call.int_arg(0)? < 0 {
                let message = format!("Illegal Capacity: {}", call.int_arg(0)?);
                return Err(call.raise("java/lang/IllegalArgumentException", message));
            }
            Ok(None)
        });
        self.register(LIST, "<init>(Ljava/util/Collection;)V", |call| {
            let source = collection_elements(call, call.object_arg(0)?)?;
            call.with_list(|elements| elements.extend(source))?;
            Ok(None)
        });
        self.register(LIST, "size()I", |call| {
            Ok(Some(Value::Int(to_int(call.with_list(|elements| elements.len())?))))
        });
        self.register(LIST, "isEmpty()Z", |call| {
            Ok(Some(Value::Boolean(call.with_list(|elements| elements.is_empty())?)))
        });
        self.register(LIST, "get(I)Ljava/lang/Object;", |call| {
            let index = call.int_arg(0)?;
            let (found, length) = call.with_list(|elements| {
                let found = usize::try_from(index).ok().and_then(|i| elements.get(i)).cloned();
                (found, elements.len())
            })?;
            found
                .map(Some)
                .ok_or_else(|| call.out_of_bounds(index, length))
        });
        self.register(LIST, "set(ILjava/lang/Object;)Ljava/lang/Object;", |call| {
            let index = call.int_arg(0)?;
            let value = call.arg(1).clone();
            let (previous, length) = call.with_list(|elements| {
                let length = elements.len();
                let slot = usize::try_from(index).ok().and_then(|i| elements.get_mut(i));
                (slot.map(|slot| std::mem::replace(slot, value)), length)
            })?;
            previous
                .map(Some)
                .ok_or_else(|| call.out_of_bounds(index, length))
        });
        self.register(LIST, "add(Ljava/lang/Object;)Z", |call| {
            let value = call.arg(0).clone();
            call.with_list(|elements| elements.push(value))?;
            Ok(Some(Value::Boolean(true)))
        });
        self.register(LIST, "add(ILjava/lang/Object;)V", |call| {
            let index = call.int_arg(0)?;
            let value = call.arg(1).clone();
            let inserted = call.with_list(|elements| {
                let length = elements.len();
                match usize::try_from(index).ok().filter(|&i| i <= length) {
                    Some(i) => {
                        elements.insert(i, value);
                        Ok(())
                    }
                    None => Err(length),
                }
            })?;
            inserted.map_err(|length| call.out_of_bounds(index, length))?;
            Ok(None)
        });
        self.register(LIST, "addAll(Ljava/util/Collection;)Z", |call| {
            let source = collection_elements(call, call.object_arg(0)?)?;
            let changed = !source.is_empty();
            call.with_list(|elements| elements.extend(source))?;
            Ok(Some(Value::Boolean(changed)))
        });
        self.register(LIST, "remove(I)Ljava/lang/Object;", |call| {
            let index = call.int_arg(0)?;
            let (removed, length) = call.with_list(|elements| {
                let length = elements.len();
                let removed = usize::try_from(index)
                    .ok()
                    .filter(|&i| i < length)
                    .map(|i| elements.remove(i));
                (removed, length)
            })?;
            removed
                .map(Some)
                .ok_or_else(|| call.out_of_bounds(index, length))
        });
        self.register(LIST, "remove(Ljava/lang/Object;)Z", |call| {
            let target = call.arg(0).clone();
            let removed = call.with_list(|elements| {
                match elements.iter().position(|element| *element == target) {
                    Some(i) => {
                        elements.remove(i);
                        true
                    }
                    None => false,
                }
            })?;
            Ok(Some(Value::Boolean(removed)))
        });
        self.register(LIST, "removeAll(Ljava/util/Collection;)Z", |call| {
            let other = collection_elements(call, call.object_arg(0)?)?;
            let changed = call.with_list(|elements| {
                let before = elements.len();
                elements.retain(|element| !other.contains(element));
                before != elements.len()
            })?;
            Ok(Some(Value::Boolean(changed)))
        });
        self.register(LIST, "retainAll(Ljava/util/Collection;)Z", |call| {
            let other = collection_elements(call, call.object_arg(0)?)?;
            let changed = call.with_list(|elements| {
                let before = elements.len();
                elements.retain(|element| other.contains(element));
                before != elements.len()
            })?;
            Ok(Some(Value::Boolean(changed)))
        });
        self.register(LIST, "clear()V", |call| {
            call.with_list(Vec::clear)?;
            Ok(None)
        });
        self.register(LIST, "contains(Ljava/lang/Object;)Z", |call| {
            let target = call.arg(0).clone();
            let found = call.with_list(|elements| elements.contains(&target))?;
            Ok(Some(Value::Boolean(found)))
        });
        self.register(LIST, "indexOf(Ljava/lang/Object;)I", |call| {
            let target = call.arg(0).clone();
            let index = call.with_list(|elements| {
                elements.iter().position(|element| *element == target)
            })?;
            Ok(Some(Value::Int(index.map_or(-1, to_int))))
        });
        self.register(LIST, "toString()Ljava/lang/String;", |call| {
            Ok(Some(Value::str(&java_string(call.receiver()?))))
        });

        // Fixed-size view returned by `Arrays.asList`.
        const FIXED: &str = "java/util/Arrays$ArrayList";
        for signature in [
            "add(Ljava/lang/Object;)Z",
            "add(ILjava/lang/Object;)V",
            "addAll(Ljava/util/Collection;)Z",
            "remove(I)Ljava/lang/Object;",
            "remove(Ljava/lang/Object;)Z",
            "removeAll(Ljava/util/Collection;)Z",
            "retainAll(Ljava/util/Collection;)Z",
            "clear()V",
        ] {
            self.register(FIXED, signature, |call| Err(call.unsupported()));
        }
    }

    fn register_maps(&mut self) {
        const MAP: &str = "java/util/AbstractMap";
        self.register(MAP, "<init>()V", |_| Ok(None));
        self.register(MAP, "size()I", |call| {
            Ok(Some(Value::Int(to_int(call.with_map(|entries| entries.len())?))))
        });
        self.register(MAP, "isEmpty()Z", |call| {
            Ok(Some(Value::Boolean(call.with_map(|entries| entries.is_empty())?)))
        });
        self.register(
            MAP,
            "put(Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;",
            |call| {
                let key = call.arg(0).clone();
                let value = call.arg(1).clone();
                let previous = call.with_map(|entries| put_entry(entries, key, value))?;
                Ok(Some(previous.unwrap_or(Value::Null)))
            },
        );
        self.register(MAP, "get(Ljava/lang/Object;)Ljava/lang/Object;", |call| {
            let key = call.arg(0);
            let found = call.with_map(|entries| {
                entries
                    .iter()
                    .find(|(existing, _)| existing == key)
                    .map(|(_, value)| value.clone())
            })?;
            Ok(Some(found.unwrap_or(Value::Null)))
        });
        self.register(MAP, "containsKey(Ljava/lang/Object;)Z", |call| {
            let key = call.arg(0);
            let found =
                call.with_map(|entries| entries.iter().any(|(existing, _)| existing == key))?;
            Ok(Some(Value::Boolean(found)))
        });
        self.register(MAP, "remove(Ljava/lang/Object;)Ljava/lang/Object;", |call| {
            let key = call.arg(0);
            let removed = call.with_map(|entries| {
                let index = entries.iter().position(|(existing, _)| existing == key)?;
                Some(entries.remove(index).1)
            })?;
            Ok(Some(removed.unwrap_or(Value::Null)))
        });
        self.register(MAP, "clear()V", |call| {
            call.with_map(Vec::clear)?;
            Ok(None)
        });
        self.register(MAP, "putAll(Ljava/util/Map;)V", |call| {
            let source = call.object_arg(0)?;
            let copied = match &*source.data() {
                ObjectData::Map(entries) => entries.clone(),
                _ => return Err(call.raise("java/lang/ClassCastException", source.class_name())),
            };
            call.with_map(|entries| {
                for (key, value) in copied {
                    put_entry(entries, key, value);
                }
            })?;
            Ok(None)
        });
        self.register(MAP, "toString()Ljava/lang/String;", |call| {
            Ok(Some(Value::str(&java_string(call.receiver()?))))
        });
    }

    fn register_utilities(&mut self) {
        const ARRAYS: &str = "java/util/Arrays";
        self.register(ARRAYS, "asList([Ljava/lang/Object;)Ljava/util/List;", |call| {
            let array = call.object_arg(0)?;
            let elements = match &*array.data() {
                ObjectData::Array { elements, .. } => elements.clone(),
                _ => return Err(call.raise("java/lang/ClassCastException", array.class_name())),
            };
            Ok(Some(Value::Object(ObjRef::list(
                "java/util/Arrays$ArrayList",
                elements,
            ))))
        });
        self.register(ARRAYS, "toString([I)Ljava/lang/String;", |call| {
            Ok(Some(Value::str(&java_string(call.arg(0)))))
        });

        const COLLECTIONS: &str = "java/util/Collections";
        self.register(COLLECTIONS, "sort(Ljava/util/List;)V", |call| {
            let list = call.object_arg(0)?;
            let mut elements = collection_elements(call, list)?;
            sort_naturally(call, &mut elements)?;
            if let ObjectData::List(target) = &mut *list.data() {
                *target = elements;
            }
            Ok(None)
        });
        self.register(COLLECTIONS, "reverse(Ljava/util/List;)V", |call| {
            if let ObjectData::List(elements) = &mut *call.object_arg(0)?.data() {
                elements.reverse();
            }
            Ok(None)
        });
    }
}

fn compare_to(call: &NativeCall<'_>) -> Result<Option<Value>, Raise> {
    let this = call.receiver()?.as_int().ok_or_else(|| call.npe())?;
    let other = call.int_arg(0)?;
    Ok(Some(Value::Int(this.cmp(&other) as i32)))
}

fn append(call: &NativeCall<'_>) -> Result<Option<Value>, Raise> {
    let this = call.this()?;
    let current = match this.field("value") {
        Some(Value::Str(current)) => current.to_string(),
        _ => String::new(),
    };
    let joined = current + &java_string(call.arg(0));
    this.set_field("value", Value::str(&joined));
    Ok(Some(Value::Object(this.clone())))
}

fn string_receiver<'a>(call: &'a NativeCall<'_>) -> Result<&'a str, Raise> {
    match call.receiver()? {
        Value::Str(value) => Ok(value),
        _ => Err(call.npe()),
    }
}

fn collection_elements(call: &NativeCall<'_>, source: &ObjRef) -> Result<Vec<Value>, Raise> {
    match &*source.data() {
        ObjectData::List(elements) => Ok(elements.clone()),
        ObjectData::Map(entries) => Ok(entries.iter().map(|(key, _)| key.clone()).collect()),
        _ => Err(call.raise("java/lang/ClassCastException", source.class_name())),
    }
}

fn put_entry(entries: &mut Vec<(Value, Value)>, key: Value, value: Value) -> Option<Value> {
    match entries.iter_mut().find(|(existing, _)| *existing == key) {
        Some((_, slot)) => Some(std::mem::replace(slot, value)),
        None => {
            entries.push((key, value));
            None
        }
    }
}

/// Stable sort by natural ordering; only integers and strings are
/// `Comparable` here.
fn sort_naturally(call: &NativeCall<'_>, elements: &mut [Value]) -> Result<(), Raise> {
    if elements.iter().any(Value::is_null) {
        return Err(call.npe());
    }
    if elements.iter().all(|element| matches!(element, Value::Int(_))) {
        elements.sort_by_key(|element| element.as_int());
        return Ok(());
    }
    if elements.iter().all(|element| matches!(element, Value::Str(_))) {
        elements.sort_by(|a, b| match (a, b) {
            (Value::Str(a), Value::Str(b)) => a.encode_utf16().cmp(b.encode_utf16()),
            _ => std::cmp::Ordering::Equal,
        });
        return Ok(());
    }
    let offender = elements
        .iter()
        .find_map(|element| element.as_object().map(|object| object.class_name().to_owned()))
        .unwrap_or_default();
    Err(call.raise(
        "java/lang/ClassCastException",
        format!(
            "class {} cannot be cast to class java.lang.Comparable",
            offender.replace('/', ".")
        ),
    ))
}

fn to_int(length: usize) -> i32 {
    i32::try_from(length).unwrap_or(i32::MAX)
}

fn identity_hash(object: &ObjRef) -> i32 {
    (object.id().as_u64() & 0x7fff_ffff) as i32
}

fn string_hash(value: &str) -> i32 {
    value
        .encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

/// What `String.valueOf` would produce, without calling user `toString`
/// overrides.
pub(crate) fn java_string(value: &Value) -> String {
    let mut out = String::new();
    write_java_string(value, None, &mut out);
    out
}

fn write_java_string(value: &Value, container: Option<&ObjRef>, out: &mut String) {
    let object = match value {
        Value::Null => return out.push_str("null"),
        Value::Boolean(v) => return out.push_str(&v.to_string()),
        Value::Byte(v) => return out.push_str(&v.to_string()),
        Value::Char(v) => {
            return out.push(char::from_u32(u32::from(*v)).unwrap_or(char::REPLACEMENT_CHARACTER))
        }
        Value::Short(v) => return out.push_str(&v.to_string()),
        Value::Int(v) => return out.push_str(&v.to_string()),
        Value::Long(v) => return out.push_str(&v.to_string()),
        Value::Float(v) => return out.push_str(&format!("{v:?}")),
        Value::Double(v) => return out.push_str(&format!("{v:?}")),
        Value::Str(v) => return out.push_str(v),
        Value::Object(object) => object,
    };
    if container == Some(object) {
        return out.push_str("(this Collection)");
    }

    let data = object.data().clone();
    match data {
        ObjectData::List(elements) => {
            write_sequence(&elements, Some(object), out);
        }
        ObjectData::Array {
            component: FieldType::Base(_),
            elements,
        } => write_sequence(&elements, Some(object), out),
        ObjectData::Map(entries) => {
            out.push('{');
            for (i, (key, value)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_java_string(key, Some(object), out);
                out.push('=');
                write_java_string(value, Some(object), out);
            }
            out.push('}');
        }
        ObjectData::Array { .. } | ObjectData::Instance { .. } => {
            let message = match object.field("message") {
                Some(Value::Str(message)) => Some(message),
                _ => None,
            };
            out.push_str(&object.class_name().replace('/', "."));
            match message {
                Some(message) => {
                    out.push_str(": ");
                    out.push_str(&message);
                }
                None => out.push_str(&format!("@{:x}", identity_hash(object))),
            }
        }
    }
}

fn write_sequence(elements: &[Value], container: Option<&ObjRef>, out: &mut String) {
    out.push('[');
    for (i, element) in elements.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_java_string(element, container, out);
    }
    out.push(']');
}
