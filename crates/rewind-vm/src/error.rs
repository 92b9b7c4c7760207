use rewind_trace::{exception_summary, ObjRef, Value};
use thiserror::Error;

/// Faults that are not Java exceptions: linkage and verification problems,
/// plus exceptions that escaped the outermost frame of a lane.
#[derive(Debug, Error)]
pub enum VmError {
    #[error("class {0} is not loaded")]
    ClassNotFound(String),
    #[error("class {0} is already loaded")]
    DuplicateClass(String),
    #[error("no method {owner}.{name}{descriptor}")]
    MethodNotFound {
        owner: String,
        name: String,
        descriptor: String,
    },
    #[error("method {owner}.{name}{descriptor} has no code and no native implementation")]
    AbstractMethod {
        owner: String,
        name: String,
        descriptor: String,
    },
    #[error("no field {owner}.{name}")]
    FieldNotFound { owner: String, name: String },
    #[error("verification failed in {method} at instruction {pc}: {message}")]
    Verify {
        method: String,
        pc: usize,
        message: String,
    },
    #[error(transparent)]
    Bytecode(#[from] rewind_bytecode::Error),
    #[error("uncaught exception: {}", exception_summary(&Value::Object(.0.clone())))]
    Uncaught(ObjRef),
}

impl VmError {
    /// The escaped exception object, if this error is an uncaught exception.
    pub fn exception(&self) -> Option<&ObjRef> {
        match self {
            VmError::Uncaught(exception) => Some(exception),
            _ => None,
        }
    }
}
