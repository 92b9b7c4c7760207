use std::fmt;

use crate::class::ClassDef;

/// Sink that swaps the definition of an already loaded class.
///
/// Implemented by whatever runs the program; the instrumentor only hands
/// rewritten classes over and never inspects the result beyond the error.
pub trait ClassRedefiner {
    fn redefine_class(&self, class: ClassDef) -> Result<(), RedefineError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedefineError {
    NotLoaded(String),
    /// Redefinition may only replace method bodies.
    SchemaChange { class: String, detail: String },
    Other(String),
}

impl fmt::Display for RedefineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedefineError::NotLoaded(class) => write!(f, "class {class} is not loaded"),
            RedefineError::SchemaChange { class, detail } => {
                write!(f, "redefinition of {class} changes its schema: {detail}")
            }
            RedefineError::Other(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for RedefineError {}
