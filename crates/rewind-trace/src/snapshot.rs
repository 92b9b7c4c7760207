//! Point-in-time copies of mutable containers.
//!
//! A [`SnapshotStrategy`] knows how to copy one family of containers and how
//! to replay the mutating calls recorded against it. Materializing an object
//! at a log position starts from the strategy's empty value, adopts every
//! [`EventKind::ObjectSnapshot`] of that object and applies every forwarded
//! call whose receiver is the object.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::event::{EventKind, TraceEvent};
use crate::value::{ObjRef, ObjectData, Value};

#[derive(Clone, Debug, PartialEq)]
pub enum SnapshotValue {
    Sequence(Vec<Value>),
    Map(Vec<(Value, Value)>),
}

impl SnapshotValue {
    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            SnapshotValue::Sequence(values) => Some(values),
            SnapshotValue::Map(_) => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            SnapshotValue::Map(entries) => Some(entries),
            SnapshotValue::Sequence(_) => None,
        }
    }

    /// Every value held, keys before values for maps.
    pub fn values(&self) -> Vec<&Value> {
        match self {
            SnapshotValue::Sequence(values) => values.iter().collect(),
            SnapshotValue::Map(entries) => entries
                .iter()
                .flat_map(|(key, value)| [key, value])
                .collect(),
        }
    }

    /// Elements of a sequence or keys of a map, used when the snapshot is an
    /// argument to a bulk operation such as `addAll`.
    fn members(&self) -> Vec<Value> {
        match self {
            SnapshotValue::Sequence(values) => values.clone(),
            SnapshotValue::Map(entries) => entries.iter().map(|(key, _)| key.clone()).collect(),
        }
    }
}

/// Materializes another object at the position of the operation being applied.
pub type Resolver<'a> = dyn Fn(&ObjRef) -> Option<SnapshotValue> + 'a;

pub trait SnapshotStrategy: Send + Sync {
    /// Upper-case tag used in log lines (`LIST SNAPSHOT: ...`).
    fn name(&self) -> &'static str;

    fn is_compatible(&self, object: &ObjRef) -> bool;

    fn create_empty(&self) -> SnapshotValue;

    /// Method signatures (`name` + descriptor) that mutate the receiver and
    /// are replayed by [`SnapshotStrategy::apply`].
    fn forwarded_operations(&self) -> &[&'static str];

    /// Eager copy of the object's current contents.
    fn to_snapshot_event(&self, object: &ObjRef) -> SnapshotValue;

    /// Snapshots to take after `invocation` returned, for calls that mutate an
    /// argument instead of the receiver.
    fn to_snapshot_events(&self, invocation: &EventKind) -> Vec<(ObjRef, SnapshotValue)> {
        let _ = invocation;
        Vec::new()
    }

    /// Replay one forwarded operation. Unknown signatures and out-of-range
    /// indices leave `working` untouched.
    fn apply(
        &self,
        working: &mut SnapshotValue,
        signature: &str,
        args: &[Value],
        resolve: &Resolver<'_>,
    );
}

/// Run a strategy callback. A panic is logged and swallowed so a faulty
/// strategy never reaches the traced program or a query.
pub(crate) fn guarded<T>(
    strategy: &dyn SnapshotStrategy,
    callback: &'static str,
    f: impl FnOnce() -> T,
) -> Option<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(
                target: "rewind.trace",
                strategy = strategy.name(),
                callback,
                "snapshot strategy panicked; result ignored"
            );
            None
        }
    }
}

fn resolve_members(value: &Value, resolve: &Resolver<'_>) -> Option<Vec<Value>> {
    let obj = value.as_object()?;
    resolve(obj).map(|snapshot| snapshot.members())
}

fn index_arg(args: &[Value], at: usize) -> Option<usize> {
    args.get(at)?.as_int().and_then(|index| usize::try_from(index).ok())
}

const LIST_OPERATIONS: &[&str] = &[
    "add(Ljava/lang/Object;)Z",
    "add(ILjava/lang/Object;)V",
    "addAll(Ljava/util/Collection;)Z",
    "clear()V",
    "remove(I)Ljava/lang/Object;",
    "remove(Ljava/lang/Object;)Z",
    "removeAll(Ljava/util/Collection;)Z",
    "retainAll(Ljava/util/Collection;)Z",
    "set(ILjava/lang/Object;)Ljava/lang/Object;",
];

/// Static calls that reorder the list passed as their first argument.
const LIST_INDIRECT: &[(&str, &str, &str)] = &[
    ("java/util/Collections", "sort", "(Ljava/util/List;)V"),
    (
        "java/util/Collections",
        "sort",
        "(Ljava/util/List;Ljava/util/Comparator;)V",
    ),
    ("java/util/Collections", "reverse", "(Ljava/util/List;)V"),
];

#[derive(Debug, Default, Clone, Copy)]
pub struct ListSnapshotStrategy;

impl SnapshotStrategy for ListSnapshotStrategy {
    fn name(&self) -> &'static str {
        "LIST"
    }

    fn is_compatible(&self, object: &ObjRef) -> bool {
        matches!(&*object.data(), ObjectData::List(_))
    }

    fn create_empty(&self) -> SnapshotValue {
        SnapshotValue::Sequence(Vec::new())
    }

    fn forwarded_operations(&self) -> &[&'static str] {
        LIST_OPERATIONS
    }

    fn to_snapshot_event(&self, object: &ObjRef) -> SnapshotValue {
        SnapshotValue::Sequence(object.list_elements().unwrap_or_default())
    }

    fn to_snapshot_events(&self, invocation: &EventKind) -> Vec<(ObjRef, SnapshotValue)> {
        let EventKind::InvokeStatic { method, args } = invocation else {
            return Vec::new();
        };
        let indirect = LIST_INDIRECT.iter().any(|(owner, name, desc)| {
            method.owner == *owner && method.name == *name && method.descriptor == *desc
        });
        if !indirect {
            return Vec::new();
        }
        match args.first().and_then(Value::as_object) {
            Some(list) if self.is_compatible(list) => {
                vec![(list.clone(), self.to_snapshot_event(list))]
            }
            _ => Vec::new(),
        }
    }

    fn apply(
        &self,
        working: &mut SnapshotValue,
        signature: &str,
        args: &[Value],
        resolve: &Resolver<'_>,
    ) {
        let SnapshotValue::Sequence(list) = working else {
            return;
        };
        match signature {
            "add(Ljava/lang/Object;)Z" => {
                if let Some(value) = args.first() {
                    list.push(value.clone());
                }
            }
            "add(ILjava/lang/Object;)V" => {
                if let (Some(index), Some(value)) = (index_arg(args, 0), args.get(1)) {
                    if index <= list.len() {
                        list.insert(index, value.clone());
                    }
                }
            }
            "addAll(Ljava/util/Collection;)Z" => {
                if let Some(members) = args.first().and_then(|arg| resolve_members(arg, resolve)) {
                    list.extend(members);
                }
            }
            "clear()V" => list.clear(),
            "remove(I)Ljava/lang/Object;" => {
                if let Some(index) = index_arg(args, 0).filter(|index| *index < list.len()) {
                    list.remove(index);
                }
            }
            "remove(Ljava/lang/Object;)Z" => {
                if let Some(value) = args.first() {
                    if let Some(pos) = list.iter().position(|element| element == value) {
                        list.remove(pos);
                    }
                }
            }
            "removeAll(Ljava/util/Collection;)Z" => {
                if let Some(members) = args.first().and_then(|arg| resolve_members(arg, resolve)) {
                    list.retain(|element| !members.contains(element));
                }
            }
            "retainAll(Ljava/util/Collection;)Z" => {
                if let Some(members) = args.first().and_then(|arg| resolve_members(arg, resolve)) {
                    list.retain(|element| members.contains(element));
                }
            }
            "set(ILjava/lang/Object;)Ljava/lang/Object;" => {
                if let (Some(index), Some(value)) = (index_arg(args, 0), args.get(1)) {
                    if let Some(slot) = list.get_mut(index) {
                        *slot = value.clone();
                    }
                }
            }
            _ => {}
        }
    }
}

const MAP_OPERATIONS: &[&str] = &[
    "put(Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;",
    "remove(Ljava/lang/Object;)Ljava/lang/Object;",
    "clear()V",
    "putAll(Ljava/util/Map;)V",
];

#[derive(Debug, Default, Clone, Copy)]
pub struct MapSnapshotStrategy;

fn map_put(entries: &mut Vec<(Value, Value)>, key: Value, value: Value) {
    match entries.iter_mut().find(|(existing, _)| *existing == key) {
        Some(entry) => entry.1 = value,
        None => entries.push((key, value)),
    }
}

impl SnapshotStrategy for MapSnapshotStrategy {
    fn name(&self) -> &'static str {
        "MAP"
    }

    fn is_compatible(&self, object: &ObjRef) -> bool {
        matches!(&*object.data(), ObjectData::Map(_))
    }

    fn create_empty(&self) -> SnapshotValue {
        SnapshotValue::Map(Vec::new())
    }

    fn forwarded_operations(&self) -> &[&'static str] {
        MAP_OPERATIONS
    }

    fn to_snapshot_event(&self, object: &ObjRef) -> SnapshotValue {
        match &*object.data() {
            ObjectData::Map(entries) => SnapshotValue::Map(entries.clone()),
            _ => SnapshotValue::Map(Vec::new()),
        }
    }

    fn apply(
        &self,
        working: &mut SnapshotValue,
        signature: &str,
        args: &[Value],
        resolve: &Resolver<'_>,
    ) {
        let SnapshotValue::Map(entries) = working else {
            return;
        };
        match (signature, args) {
            ("put(Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;", [key, value]) => {
                map_put(entries, key.clone(), value.clone());
            }
            ("remove(Ljava/lang/Object;)Ljava/lang/Object;", [key]) => {
                entries.retain(|(existing, _)| existing != key);
            }
            ("clear()V", _) => entries.clear(),
            ("putAll(Ljava/util/Map;)V", [other]) => {
                let other = other.as_object().and_then(|obj| resolve(obj));
                if let Some(SnapshotValue::Map(other)) = other {
                    for (key, value) in other {
                        map_put(entries, key, value);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Ordered set of strategies; the first compatible one owns an object.
#[derive(Clone)]
pub struct SnapshotRegistry {
    strategies: Vec<Arc<dyn SnapshotStrategy>>,
}

impl Default for SnapshotRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(ListSnapshotStrategy);
        registry.register(MapSnapshotStrategy);
        registry
    }
}

impl std::fmt::Debug for SnapshotRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.strategies.iter().map(|strategy| strategy.name()))
            .finish()
    }
}

impl SnapshotRegistry {
    pub fn empty() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    pub fn register(&mut self, strategy: impl SnapshotStrategy + 'static) {
        self.strategies.push(Arc::new(strategy));
    }

    pub fn strategies(&self) -> impl Iterator<Item = &dyn SnapshotStrategy> {
        self.strategies.iter().map(|strategy| strategy.as_ref())
    }

    pub fn strategy_for(&self, object: &ObjRef) -> Option<&dyn SnapshotStrategy> {
        self.strategies().find(|strategy| {
            guarded(*strategy, "is_compatible", || strategy.is_compatible(object))
                .unwrap_or(false)
        })
    }

    /// Contents of `object` after replaying `events` (a log prefix).
    ///
    /// Returns `None` when no strategy claims the object or when the log
    /// never mentions it. An operation whose replay panics leaves the value
    /// as it was before that operation.
    pub fn materialize(&self, object: &ObjRef, events: &[TraceEvent]) -> Option<SnapshotValue> {
        let strategy = self.strategy_for(object)?;
        let mut working = guarded(strategy, "create_empty", || strategy.create_empty())?;
        let mut seen = false;

        for (index, event) in events.iter().enumerate() {
            match &event.kind {
                EventKind::ObjectSnapshot {
                    object: target,
                    snapshot,
                    ..
                } if target == object => {
                    working = snapshot.clone();
                    seen = true;
                }
                EventKind::InvokeVirtual {
                    receiver: Value::Object(receiver),
                    method,
                    args,
                } if receiver == object => {
                    let signature = method.signature();
                    if strategy.forwarded_operations().contains(&signature.as_str()) {
                        let prefix = &events[..index];
                        let resolve = |other: &ObjRef| self.materialize(other, prefix);
                        let mut next = working.clone();
                        let applied = guarded(strategy, "apply", || {
                            strategy.apply(&mut next, &signature, args, &resolve)
                        });
                        if applied.is_some() {
                            working = next;
                        }
                        seen = true;
                    }
                }
                _ => {}
            }
        }

        seen.then_some(working)
    }
}
