use std::sync::Arc;

use rewind_bytecode::parse_method_descriptor;
use rewind_trace::{ObjRef, ThreadRef, Value};

use crate::error::VmError;
use crate::interp::{Frame, Target};
use crate::runtime::{Raise, VmShared};

/// One sequential execution lane. Events recorded while running code on a
/// lane carry its [`ThreadRef`]; lanes may run concurrently on separate OS
/// threads.
pub struct Lane {
    shared: Arc<VmShared>,
    thread: ThreadRef,
}

impl Lane {
    pub(crate) fn new(shared: Arc<VmShared>, thread: ThreadRef) -> Self {
        Self { shared, thread }
    }

    pub fn thread(&self) -> &ThreadRef {
        &self.thread
    }

    /// Call a static method. The result is boxed to the declared return type,
    /// so a `boolean` method yields [`Value::Boolean`].
    pub fn invoke_static(
        &self,
        class: &str,
        name: &str,
        descriptor: &str,
        args: Vec<Value>,
    ) -> Result<Option<Value>, VmError> {
        self.call(class, name, descriptor, None, args)
    }

    /// Call an instance method, dispatching on the receiver's runtime class.
    pub fn invoke_virtual(
        &self,
        receiver: Value,
        name: &str,
        descriptor: &str,
        args: Vec<Value>,
    ) -> Result<Option<Value>, VmError> {
        let class = match crate::runtime::runtime_class_of(&receiver) {
            Some(class) => class.to_owned(),
            None => {
                let npe = self.shared.new_exception("java/lang/NullPointerException", None);
                return Err(VmError::Uncaught(npe));
            }
        };
        self.call(&class, name, descriptor, Some(receiver), args)
    }

    /// Allocate an instance of `class` and run the constructor matching
    /// `descriptor` on it.
    pub fn new_object(
        &self,
        class: &str,
        descriptor: &str,
        args: Vec<Value>,
    ) -> Result<ObjRef, VmError> {
        let object = self.shared.instantiate(class)?;
        let receiver = Value::Object(object.clone());
        self.call(class, "<init>", descriptor, Some(receiver), args)?;
        Ok(object)
    }

    fn call(
        &self,
        class: &str,
        name: &str,
        descriptor: &str,
        receiver: Option<Value>,
        args: Vec<Value>,
    ) -> Result<Option<Value>, VmError> {
        let parsed = parse_method_descriptor(descriptor)?;
        if parsed.params.len() != args.len() {
            return Err(VmError::Verify {
                method: format!("{class}.{name}{descriptor}"),
                pc: 0,
                message: format!("expected {} arguments, got {}", parsed.params.len(), args.len()),
            });
        }

        tracing::debug!(
            target: "rewind.vm",
            lane = %self.thread,
            method = %format_args!("{class}.{name}{descriptor}"),
            "entering lane call"
        );
        let result = match self.shared.resolve(class, name, descriptor)? {
            Target::Code(method) => {
                let frame = Frame::new(method, receiver, args)?;
                self.shared.run(&self.thread, frame)
            }
            Target::Native(native) => match self.shared.call_native(native, receiver, args) {
                Ok(value) => Ok(value),
                Err(Raise::Exception(exception)) => Err(VmError::Uncaught(exception)),
                Err(Raise::Fatal(err)) => Err(err),
            },
        };

        if let Err(err) = &result {
            tracing::debug!(
                target: "rewind.vm",
                lane = %self.thread,
                error = %err,
                "lane call failed"
            );
        }
        Ok(result?.map(|value| value.boxed_as_return(&parsed.return_type)))
    }
}

impl std::fmt::Debug for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lane").field("thread", &self.thread).finish()
    }
}
