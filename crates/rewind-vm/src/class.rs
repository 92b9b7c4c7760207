use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use rewind_bytecode::{ClassDef, Label, MethodBody, MethodDef, RedefineError};

use crate::error::VmError;

/// A method with code, with its labels and exception table resolved to
/// instruction indices.
#[derive(Debug)]
pub(crate) struct RuntimeMethod {
    pub(crate) owner: String,
    pub(crate) name: String,
    pub(crate) descriptor: String,
    pub(crate) is_static: bool,
    pub(crate) body: MethodBody,
    labels: HashMap<Label, usize>,
    handlers: Vec<Handler>,
}

#[derive(Debug)]
struct Handler {
    start: usize,
    end: usize,
    target: usize,
    catch_type: Option<String>,
}

impl RuntimeMethod {
    fn prepare(owner: &str, def: MethodDef) -> Result<Option<Self>, VmError> {
        let is_static = def.is_static();
        let Some(body) = def.body else {
            return Ok(None);
        };
        let labels = body.label_positions()?;
        let resolve = |label: Label| {
            labels
                .get(&label)
                .copied()
                .ok_or(rewind_bytecode::Error::UndefinedLabel(label))
        };
        let mut handlers = Vec::with_capacity(body.try_catch.len());
        for block in &body.try_catch {
            handlers.push(Handler {
                start: resolve(block.start)?,
                end: resolve(block.end)?,
                target: resolve(block.handler)?,
                catch_type: block.catch_type.clone(),
            });
        }
        Ok(Some(Self {
            owner: owner.to_owned(),
            name: def.name,
            descriptor: def.descriptor,
            is_static,
            body,
            labels,
            handlers,
        }))
    }

    pub(crate) fn target(&self, label: Label) -> Option<usize> {
        self.labels.get(&label).copied()
    }

    /// The first handler covering `pc` whose type accepts the exception.
    pub(crate) fn find_handler(
        &self,
        pc: usize,
        accepts: impl Fn(&str) -> bool,
    ) -> Option<usize> {
        self.handlers
            .iter()
            .find(|handler| {
                handler.start <= pc
                    && pc < handler.end
                    && handler.catch_type.as_deref().map_or(true, &accepts)
            })
            .map(|handler| handler.target)
    }

    pub(crate) fn qualified_name(&self) -> String {
        format!("{}.{}{}", self.owner, self.name, self.descriptor)
    }
}

#[derive(Debug)]
pub(crate) struct RuntimeClass {
    pub(crate) def: ClassDef,
    methods: HashMap<(String, String), Arc<RuntimeMethod>>,
}

impl RuntimeClass {
    pub(crate) fn prepare(def: ClassDef) -> Result<Self, VmError> {
        let mut methods = HashMap::new();
        for method in &def.methods {
            let key = (method.name.clone(), method.descriptor.clone());
            if let Some(prepared) = RuntimeMethod::prepare(&def.name, method.clone())? {
                methods.insert(key, Arc::new(prepared));
            }
        }
        Ok(Self { def, methods })
    }

    pub(crate) fn method(&self, name: &str, descriptor: &str) -> Option<Arc<RuntimeMethod>> {
        self.methods
            .get(&(name.to_owned(), descriptor.to_owned()))
            .cloned()
    }
}

/// Every class the runtime knows, built-in or loaded.
#[derive(Debug, Default)]
pub(crate) struct ClassTable {
    classes: RwLock<HashMap<String, Arc<RuntimeClass>>>,
}

impl ClassTable {
    /// A table holding only the library classes in [`crate::builtins`].
    pub(crate) fn with_builtins() -> Self {
        let classes = crate::builtins::builtin_classes()
            .into_iter()
            .map(|def| {
                let runtime = RuntimeClass {
                    def,
                    methods: HashMap::new(),
                };
                (runtime.def.name.clone(), Arc::new(runtime))
            })
            .collect();
        Self {
            classes: RwLock::new(classes),
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<Arc<RuntimeClass>> {
        self.classes.read().get(name).cloned()
    }

    pub(crate) fn require(&self, name: &str) -> Result<Arc<RuntimeClass>, VmError> {
        self.get(name)
            .ok_or_else(|| VmError::ClassNotFound(name.to_owned()))
    }

    pub(crate) fn insert(&self, class: ClassDef) -> Result<(), VmError> {
        let name = class.name.clone();
        let prepared = Arc::new(RuntimeClass::prepare(class)?);
        let mut classes = self.classes.write();
        if classes.contains_key(&name) {
            return Err(VmError::DuplicateClass(name));
        }
        classes.insert(name, prepared);
        Ok(())
    }

    /// Swap method bodies of a loaded class. Frames already running keep
    /// executing the old code.
    pub(crate) fn replace(&self, class: ClassDef) -> Result<(), RedefineError> {
        let existing = self
            .get(&class.name)
            .ok_or_else(|| RedefineError::NotLoaded(class.name.clone()))?;
        check_same_schema(&existing.def, &class)?;
        let prepared = RuntimeClass::prepare(class.clone())
            .map_err(|err| RedefineError::Other(err.to_string()))?;
        self.classes.write().insert(class.name, Arc::new(prepared));
        Ok(())
    }

    /// Superclass chain starting at `name` itself.
    pub(crate) fn ancestors(&self, name: &str) -> Vec<Arc<RuntimeClass>> {
        let mut chain = Vec::new();
        let mut next = self.get(name);
        while let Some(class) = next {
            next = class.def.super_name.as_deref().and_then(|s| self.get(s));
            chain.push(class);
        }
        chain
    }

    /// Whether a value of runtime class `class` can be assigned to `target`.
    pub(crate) fn is_assignable(&self, class: &str, target: &str) -> bool {
        if class == target || target == "java/lang/Object" {
            return true;
        }
        if class.starts_with('[') {
            return false;
        }
        self.ancestors(class).iter().any(|ancestor| {
            ancestor.def.name == target
                || ancestor
                    .def
                    .interfaces
                    .iter()
                    .any(|interface| self.is_assignable(interface, target))
        })
    }
}

fn check_same_schema(old: &ClassDef, new: &ClassDef) -> Result<(), RedefineError> {
    let change = |detail: String| RedefineError::SchemaChange {
        class: old.name.clone(),
        detail,
    };
    if old.super_name != new.super_name || old.interfaces != new.interfaces {
        return Err(change("class hierarchy differs".to_owned()));
    }
    if old.fields != new.fields {
        return Err(change("fields differ".to_owned()));
    }
    let signatures = |class: &ClassDef| {
        let mut all: Vec<String> = class.methods.iter().map(ToString::to_string).collect();
        all.sort();
        all
    };
    if signatures(old) != signatures(new) {
        return Err(change("methods added or removed".to_owned()));
    }
    Ok(())
}
